//! Connection management API
//!
//! Workspace-admin operations over standing consents: list the clients
//! with access, narrow a grant's tool scopes, or revoke a grant
//! entirely (which cascades to its outstanding tokens). Widening a
//! grant is never possible here; that requires a fresh authorize flow.

use axum::{
    extract::{Path, State},
    http::{header::COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use taskboard_core::{ensure_authorizing_role, is_known_tool, OAuthError};
use taskboard_storage::ConsentRecord;

use crate::oauth::{oauth_json_error, OAuthErrorBody};
use crate::server::AppState;

/// Resolve the session user and require an authorizing role in the
/// workspace. Same gate as the authorize flow, surfaced as JSON since
/// this is a browser-facing management API, not an OAuth redirect flow.
async fn require_workspace_admin(
    state: &AppState,
    headers: &HeaderMap,
    workspace_id: &str,
) -> Result<String, Response> {
    let cookie = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let user_id = match state.sessions.current_user(cookie).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Err(oauth_json_error(&OAuthError::invalid_token(
                "Authentication required",
            )));
        }
        Err(e) => return Err(oauth_json_error(&OAuthError::from(e))),
    };

    let role = match state.roles.role(workspace_id, &user_id).await {
        Ok(role) => role,
        Err(e) => return Err(oauth_json_error(&OAuthError::from(e))),
    };

    ensure_authorizing_role(role).map_err(|err| {
        warn!(
            "[Connections] User {} denied admin access to workspace {}",
            user_id, workspace_id
        );
        oauth_json_error(&err)
    })?;

    Ok(user_id)
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(OAuthErrorBody {
            error: "invalid_request".to_string(),
            error_description: Some("Connection not found".to_string()),
        }),
    )
        .into_response()
}

/// Look up a consent and check it belongs to the workspace in the path.
async fn find_workspace_consent(
    state: &AppState,
    workspace_id: &str,
    consent_id: &str,
) -> Result<ConsentRecord, Response> {
    match state.consents.get(consent_id).await {
        Ok(Some(consent)) if consent.workspace_id == workspace_id => Ok(consent),
        Ok(_) => Err(not_found()),
        Err(e) => Err(oauth_json_error(&OAuthError::from(e))),
    }
}

/// `GET /workspaces/{id}/connections`
pub async fn list_connections(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Response {
    if let Err(response) = require_workspace_admin(&state, &headers, &workspace_id).await {
        return response;
    }

    match state.consents.list_for_workspace(&workspace_id).await {
        Ok(connections) => Json(connections).into_response(),
        Err(e) => oauth_json_error(&OAuthError::from(e)),
    }
}

/// Scope update body for narrowing a connection.
#[derive(Debug, Deserialize)]
pub struct UpdateScopesRequest {
    pub tool_scopes: Vec<String>,
}

/// `PATCH /workspaces/{id}/connections/{consent_id}/scopes`
///
/// Narrow-only: the new tool set must be a non-empty subset of the
/// currently granted set.
pub async fn update_connection_scopes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, consent_id)): Path<(String, String)>,
    Json(request): Json<UpdateScopesRequest>,
) -> Response {
    if let Err(response) = require_workspace_admin(&state, &headers, &workspace_id).await {
        return response;
    }

    let consent = match find_workspace_consent(&state, &workspace_id, &consent_id).await {
        Ok(consent) => consent,
        Err(response) => return response,
    };

    if request.tool_scopes.is_empty() {
        return oauth_json_error(&OAuthError::invalid_scope(
            "At least one tool scope is required; delete the connection to revoke access",
        ));
    }
    for tool in &request.tool_scopes {
        if !is_known_tool(tool) {
            return oauth_json_error(&OAuthError::invalid_scope(format!(
                "Unknown tool: {}",
                tool
            )));
        }
        if !consent.tool_scopes.contains(tool) {
            warn!(
                "[Connections] Rejected widening of consent {}: tool '{}' not granted",
                consent_id, tool
            );
            return oauth_json_error(&OAuthError::invalid_scope(
                "Scopes can only be narrowed; granting new tools requires a fresh authorization",
            ));
        }
    }

    if let Err(e) = state
        .consents
        .update_tool_scopes(&consent_id, &request.tool_scopes)
        .await
    {
        return oauth_json_error(&OAuthError::from(e));
    }

    info!(
        "[Connections] Narrowed consent {} to {} tools",
        consent_id,
        request.tool_scopes.len()
    );

    match state.consents.get(&consent_id).await {
        Ok(Some(updated)) => Json(updated).into_response(),
        Ok(None) => not_found(),
        Err(e) => oauth_json_error(&OAuthError::from(e)),
    }
}

/// `DELETE /workspaces/{id}/connections/{consent_id}`
///
/// Deleting a consent revokes every outstanding access and refresh
/// token issued under the same (user, workspace, client) grant.
pub async fn delete_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, consent_id)): Path<(String, String)>,
) -> Response {
    if let Err(response) = require_workspace_admin(&state, &headers, &workspace_id).await {
        return response;
    }

    if let Err(response) = find_workspace_consent(&state, &workspace_id, &consent_id).await {
        return response;
    }

    let deleted = match state.consents.delete(&consent_id).await {
        Ok(Some(consent)) => consent,
        Ok(None) => return not_found(),
        Err(e) => return oauth_json_error(&OAuthError::from(e)),
    };

    match state
        .tokens
        .revoke_for_grant(&deleted.user_id, &deleted.workspace_id, &deleted.client_id)
        .await
    {
        Ok(revoked) => {
            info!(
                "[Connections] Deleted consent {} and revoked {} tokens",
                consent_id, revoked
            );
        }
        Err(e) => return oauth_json_error(&OAuthError::from(e)),
    }

    StatusCode::NO_CONTENT.into_response()
}
