//! Authorization flow controller
//!
//! Orchestrates `GET /oauth/authorize` (request validation, login
//! redirect, role gate, consent page) and `POST /oauth/authorize`
//! (decision handling, consent upsert, code issuance).
//!
//! Error surface rule: until the redirect URI has been validated
//! against the client's registered set, failures are JSON; afterwards
//! they are redirects carrying `error`/`error_description`/`state`, so
//! the client application displays them instead of this server.

use axum::{
    extract::{Query, State},
    http::{header::COOKIE, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

use taskboard_core::{ensure_authorizing_role, OAuthError, ScopeSet, WorkspaceRole};
use taskboard_storage::{AuthorizationCodeRepository, ClientRecord};

use super::{oauth_error_redirect, oauth_json_error};
use crate::server::AppState;

/// Query parameters of the authorize request. Everything is optional
/// at the type level so missing fields map to OAuth errors instead of
/// extractor rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// A fully validated authorization request.
struct ValidRequest {
    client: ClientRecord,
    redirect_uri: String,
    requested: ScopeSet,
    /// Original scope string, echoed through the consent form.
    scope: String,
    state: Option<String>,
    code_challenge: String,
}

/// How a rejected request is surfaced.
enum FlowRejection {
    /// Redirect URI not yet trusted: JSON error body.
    Json(OAuthError),
    /// Redirect URI validated: error redirect to the client.
    Redirect {
        redirect_uri: String,
        err: OAuthError,
        state: Option<String>,
    },
}

impl FlowRejection {
    fn into_response(self) -> Response {
        match self {
            FlowRejection::Json(err) => oauth_json_error(&err),
            FlowRejection::Redirect {
                redirect_uri,
                err,
                state,
            } => oauth_error_redirect(&redirect_uri, &err, state.as_deref()),
        }
    }
}

/// Steps 1-2 of the flow: parameter shape, client lookup, redirect URI
/// validation, scope grammar, PKCE parameters.
async fn validate_request(
    state: &AppState,
    params: &AuthorizeParams,
) -> Result<ValidRequest, FlowRejection> {
    let client_id = params
        .client_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FlowRejection::Json(OAuthError::invalid_request("Missing client_id")))?;
    let redirect_uri = params
        .redirect_uri
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FlowRejection::Json(OAuthError::invalid_request("Missing redirect_uri")))?;

    let client = match state.clients.get_by_client_id(client_id).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            warn!("[OAuth] Unknown client_id: {}", client_id);
            return Err(FlowRejection::Json(OAuthError::invalid_client(
                "Client not registered",
            )));
        }
        Err(e) => return Err(FlowRejection::Json(e.into())),
    };

    if !client.has_redirect_uri(redirect_uri) {
        warn!(
            "[OAuth] Redirect URI not registered for client {}: {}",
            client.client_id, redirect_uri
        );
        return Err(FlowRejection::Json(OAuthError::access_denied(
            "Redirect URI not registered for this client",
        )));
    }

    // From here on the redirect URI is trusted: errors go back to the
    // client as redirects.
    let reject = |err: OAuthError| FlowRejection::Redirect {
        redirect_uri: redirect_uri.to_string(),
        err,
        state: params.state.clone(),
    };

    if params.response_type.as_deref() != Some("code") {
        return Err(reject(OAuthError::invalid_request(
            "response_type must be 'code'",
        )));
    }

    let code_challenge = params
        .code_challenge
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| reject(OAuthError::invalid_request("PKCE code_challenge is required")))?;
    match params.code_challenge_method.as_deref() {
        Some("S256") => {}
        Some("plain") => {
            return Err(reject(OAuthError::invalid_request(
                "The 'plain' code_challenge_method is not supported; use S256",
            )))
        }
        _ => {
            return Err(reject(OAuthError::invalid_request(
                "code_challenge_method must be S256",
            )))
        }
    }

    let scope = params
        .scope
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| reject(OAuthError::invalid_request("Missing scope")))?;
    let requested = ScopeSet::parse(scope).map_err(&reject)?;

    Ok(ValidRequest {
        client,
        redirect_uri: redirect_uri.to_string(),
        requested,
        scope: scope.to_string(),
        state: params.state.clone(),
        code_challenge: code_challenge.to_string(),
    })
}

/// The raw Cookie header, passed opaquely to the session resolver.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Steps 3-4 of the flow: resolve the signed-in user, then require an
/// authorizing role in the target workspace.
async fn resolve_authorizing_user(
    state: &AppState,
    headers: &HeaderMap,
    request: &ValidRequest,
) -> Result<(String, WorkspaceRole), Response> {
    let cookie = session_cookie(headers).unwrap_or_default();
    let user_id = match state.sessions.current_user(&cookie).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            // Not signed in: send to login, come back here afterwards.
            return Err(login_redirect(request));
        }
        Err(e) => {
            return Err(oauth_error_redirect(
                &request.redirect_uri,
                &OAuthError::from(e),
                request.state.as_deref(),
            ));
        }
    };

    let role = match state
        .roles
        .role(&request.requested.workspace_id, &user_id)
        .await
    {
        Ok(role) => role,
        Err(e) => {
            return Err(oauth_error_redirect(
                &request.redirect_uri,
                &OAuthError::from(e),
                request.state.as_deref(),
            ));
        }
    };

    let role = ensure_authorizing_role(role).map_err(|err| {
        warn!(
            "[OAuth] Role gate rejected user {} for workspace {}",
            user_id, request.requested.workspace_id
        );
        oauth_error_redirect(&request.redirect_uri, &err, request.state.as_deref())
    })?;

    Ok((user_id, role))
}

fn login_redirect(request: &ValidRequest) -> Response {
    let mut return_to = format!(
        "/oauth/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&code_challenge={}&code_challenge_method=S256",
        urlencoding::encode(&request.client.client_id),
        urlencoding::encode(&request.redirect_uri),
        urlencoding::encode(&request.scope),
        urlencoding::encode(&request.code_challenge),
    );
    if let Some(ref s) = request.state {
        return_to.push_str(&format!("&state={}", urlencoding::encode(s)));
    }
    Redirect::to(&format!("/login?return_to={}", urlencoding::encode(&return_to))).into_response()
}

/// `GET /oauth/authorize`
pub async fn oauth_authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    info!(
        "[OAuth] Authorization request: client_id={:?}, redirect_uri={:?}",
        params.client_id, params.redirect_uri
    );

    let request = match validate_request(&state, &params).await {
        Ok(r) => r,
        Err(rejection) => return rejection.into_response(),
    };

    let (user_id, _role) = match resolve_authorizing_user(&state, &headers, &request).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    info!(
        "[OAuth] Showing consent page: client={}, workspace={}, user={}",
        request.client.client_id, request.requested.workspace_id, user_id
    );

    Html(render_consent_page(&request)).into_response()
}

/// Form fields of the consent decision POST.
#[derive(Debug, Default)]
struct DecisionForm {
    params: AuthorizeParams,
    decision: Option<String>,
    approved_tools: Vec<String>,
}

/// Parse the urlencoded body by hand: `approved_tools` is a repeated
/// field, which plain struct deserialization cannot collect.
fn parse_decision_form(body: &str) -> DecisionForm {
    let mut form = DecisionForm::default();
    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        let value = value.into_owned();
        match key.as_ref() {
            "response_type" => form.params.response_type = Some(value),
            "client_id" => form.params.client_id = Some(value),
            "redirect_uri" => form.params.redirect_uri = Some(value),
            "scope" => form.params.scope = Some(value),
            "state" => form.params.state = Some(value),
            "code_challenge" => form.params.code_challenge = Some(value),
            "code_challenge_method" => form.params.code_challenge_method = Some(value),
            "decision" => form.decision = Some(value),
            "approved_tools" => form.approved_tools.push(value),
            _ => {}
        }
    }
    form
}

/// `POST /oauth/authorize`
///
/// The POST body is untrusted input, so the full request is validated
/// again (client, redirect, scope, session, role) before any decision
/// is honored.
pub async fn oauth_authorize_decision(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let form = parse_decision_form(&body);

    let request = match validate_request(&state, &form.params).await {
        Ok(r) => r,
        Err(rejection) => return rejection.into_response(),
    };

    let (user_id, role) = match resolve_authorizing_user(&state, &headers, &request).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    if form.decision.as_deref() != Some("approve") {
        info!(
            "[OAuth] User {} denied consent for client {}",
            user_id, request.client.client_id
        );
        return oauth_error_redirect(
            &request.redirect_uri,
            &OAuthError::access_denied("User denied the request"),
            request.state.as_deref(),
        );
    }

    // Intersect against the original request: tampered form fields can
    // narrow the grant but never widen it.
    let approved = request
        .requested
        .intersect_tools(form.approved_tools.iter().map(String::as_str));
    if approved.is_empty() {
        return oauth_error_redirect(
            &request.redirect_uri,
            &OAuthError::access_denied("At least one tool must be approved"),
            request.state.as_deref(),
        );
    }

    let approved_tools: Vec<String> = approved.tools.iter().cloned().collect();

    if let Err(e) = state
        .consents
        .upsert(
            &user_id,
            &approved.workspace_id,
            &request.client.id,
            &approved_tools,
            role.as_str(),
        )
        .await
    {
        return oauth_error_redirect(
            &request.redirect_uri,
            &OAuthError::from(e),
            request.state.as_deref(),
        );
    }

    let code = mint_authorization_code();
    let record = AuthorizationCodeRepository::new_record(
        code.clone(),
        request.client.id.clone(),
        user_id.clone(),
        approved.workspace_id.clone(),
        request.redirect_uri.clone(),
        approved_tools,
        request.code_challenge.clone(),
        state.auth_code_ttl,
    );
    if let Err(e) = state.codes.save_code(&record).await {
        return oauth_error_redirect(
            &request.redirect_uri,
            &OAuthError::from(e),
            request.state.as_deref(),
        );
    }

    info!(
        "[OAuth] Consent approved: client={}, workspace={}, tools={}",
        request.client.client_id,
        approved.workspace_id,
        approved.tools.len()
    );

    let mut url = request.redirect_uri.clone();
    url.push_str(if url.contains('?') { "&" } else { "?" });
    url.push_str(&format!("code={}", urlencoding::encode(&code)));
    if let Some(ref s) = request.state {
        url.push_str(&format!("&state={}", urlencoding::encode(s)));
    }
    Redirect::to(&url).into_response()
}

/// Unguessable opaque code value.
fn mint_authorization_code() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    format!("tbc_{}", URL_SAFE_NO_PAD.encode(&random_bytes))
}

/// Minimal HTML escaping for attribute and text positions.
fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Render the consent form. Every requested tool is individually
/// checkable and defaults to checked; the form echoes the complete
/// original request so the POST can be re-validated from scratch.
fn render_consent_page(request: &ValidRequest) -> String {
    let client_name = html_escape(&request.client.client_name);
    let workspace = html_escape(&request.requested.workspace_id);

    let tool_rows: String = request
        .requested
        .tools
        .iter()
        .map(|tool| {
            let escaped = html_escape(tool);
            format!(
                r#"            <label class="tool">
                <input type="checkbox" name="approved_tools" value="{escaped}" checked>
                <code>{escaped}</code>
            </label>
"#
            )
        })
        .collect();

    let hidden_fields = [
        ("response_type", "code".to_string()),
        ("client_id", request.client.client_id.clone()),
        ("redirect_uri", request.redirect_uri.clone()),
        ("scope", request.scope.clone()),
        ("code_challenge", request.code_challenge.clone()),
        ("code_challenge_method", "S256".to_string()),
    ]
    .iter()
    .map(|(name, value)| {
        format!(
            r#"            <input type="hidden" name="{}" value="{}">
"#,
            name,
            html_escape(value)
        )
    })
    .chain(request.state.iter().map(|s| {
        format!(
            r#"            <input type="hidden" name="state" value="{}">
"#,
            html_escape(s)
        )
    }))
    .collect::<String>();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Taskboard - Authorize {client_name}</title>
    <style>
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            background: #f4f5f7;
            color: #172b4d;
            padding: 1rem;
        }}
        .card {{
            background: #fff;
            border-radius: 12px;
            box-shadow: 0 4px 16px rgba(9, 30, 66, 0.15);
            max-width: 420px;
            width: 100%;
            padding: 2rem;
        }}
        h1 {{ font-size: 1.25rem; margin-bottom: 0.5rem; }}
        .subtitle {{ color: #5e6c84; margin-bottom: 1.5rem; line-height: 1.5; }}
        .subtitle strong {{ color: #172b4d; }}
        .tools {{ margin-bottom: 1.5rem; }}
        .tool {{
            display: flex;
            align-items: center;
            gap: 0.5rem;
            padding: 0.4rem 0;
            cursor: pointer;
        }}
        .tool code {{ font-size: 0.875rem; }}
        .actions {{ display: flex; gap: 0.75rem; }}
        .btn {{
            flex: 1;
            padding: 0.6rem 1rem;
            border-radius: 6px;
            border: none;
            font-size: 1rem;
            cursor: pointer;
        }}
        .btn-approve {{ background: #0052cc; color: #fff; }}
        .btn-deny {{ background: #ebecf0; color: #42526e; }}
    </style>
</head>
<body>
    <div class="card">
        <h1>Authorize {client_name}</h1>
        <p class="subtitle">
            <strong>{client_name}</strong> is requesting access to tools in
            workspace <strong>{workspace}</strong>. Uncheck any tool you do
            not want to grant.
        </p>
        <form method="post" action="/oauth/authorize">
{hidden_fields}            <div class="tools">
{tool_rows}            </div>
            <div class="actions">
                <button class="btn btn-approve" type="submit" name="decision" value="approve">Approve</button>
                <button class="btn btn-deny" type="submit" name="decision" value="deny">Deny</button>
            </div>
        </form>
    </div>
</body>
</html>"#
    )
}
