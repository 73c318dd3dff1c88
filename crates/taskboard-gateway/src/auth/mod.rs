//! Token verification (tool gate)
//!
//! Resolves a bearer token to an [`AuthContext`] for the tool-calling
//! endpoint. Every 401 carries a `WWW-Authenticate` challenge pointing
//! at this server's protected-resource metadata, so well-behaved
//! clients can restart the flow.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use tracing::{debug, warn};

use taskboard_core::{AuthContext, OAuthError};
use taskboard_storage::{TokenRepository, TokenType};

use crate::oauth::OAuthErrorBody;
use crate::server::AppState;

/// Resolve a bearer token to an authenticated context.
///
/// Fails with `invalid_token` when the token is unknown, not an access
/// token, revoked, or expired. Lookup is by hash, so the comparison
/// never touches a stored secret with attacker-controlled timing.
pub async fn authenticate_access_token(
    state: &AppState,
    bearer_token: &str,
) -> Result<AuthContext, OAuthError> {
    let record = state
        .tokens
        .find_by_hash(&TokenRepository::hash_token(bearer_token))
        .await?
        .filter(|t| t.token_type == TokenType::Access)
        .ok_or_else(|| OAuthError::invalid_token("Unknown access token"))?;

    if record.is_revoked() {
        return Err(OAuthError::invalid_token("Access token has been revoked"));
    }
    if record.is_expired() {
        return Err(OAuthError::invalid_token("Access token has expired"));
    }

    // Tokens store the internal client key; the context carries the
    // public client_id the rest of the system knows the client by.
    let client = state
        .clients
        .get_by_internal_id(&record.client_id)
        .await?
        .ok_or_else(|| OAuthError::invalid_token("Client no longer registered"))?;

    let scopes = taskboard_core::ScopeSet::from_parts(
        record.workspace_id.clone(),
        record.tool_scopes.clone(),
    );

    debug!(
        "[Auth] Authenticated token {} for client {}",
        record.token_prefix, client.client_id
    );

    Ok(AuthContext::new(
        record.workspace_id,
        record.user_id,
        client.client_id,
        &scopes,
    ))
}

/// Middleware guarding the tool-calling routes. Injects the resolved
/// [`AuthContext`] into request extensions on success.
pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // CORS preflight carries no credentials.
    if request.method() == axum::http::Method::OPTIONS {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    let Some(auth_value) = auth_header else {
        warn!("[Auth] Missing Authorization header");
        return unauthorized_response(
            &state.base_url,
            &OAuthError::invalid_token("Missing Authorization header"),
        );
    };

    let Some(token) = auth_value.strip_prefix("Bearer ") else {
        warn!("[Auth] Authorization header must use Bearer scheme");
        return unauthorized_response(
            &state.base_url,
            &OAuthError::invalid_token("Authorization header must use Bearer scheme"),
        );
    };

    let context = match authenticate_access_token(&state, token).await {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!("[Auth] Token verification failed: {}", err);
            return unauthorized_response(&state.base_url, &err);
        }
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

/// 401 with the RFC 9728 challenge header.
fn unauthorized_response(base_url: &str, err: &OAuthError) -> Response {
    let challenge = format!(
        r#"Bearer resource_metadata="{}/.well-known/oauth-protected-resource/mcp", error="{}", error_description="{}""#,
        base_url,
        err.code.as_str(),
        err.description
    );
    (
        StatusCode::UNAUTHORIZED,
        [("WWW-Authenticate", challenge)],
        Json(OAuthErrorBody::from_error(err)),
    )
        .into_response()
}
