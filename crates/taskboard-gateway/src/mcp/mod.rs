//! Tool-calling endpoint
//!
//! The protected resource: agent clients call workspace tools here with
//! a bearer token. The bearer middleware has already resolved the token
//! to an [`AuthContext`]; this handler enforces per-tool scope before
//! delegating to the domain's tool executor.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use taskboard_core::{AuthContext, OAuthError};

use crate::oauth::{oauth_json_error, OAuthErrorBody};
use crate::server::AppState;

/// Tool invocation request body.
#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Tool invocation response body.
#[derive(Debug, Serialize)]
pub struct ToolCallResponse {
    pub result: Value,
}

/// `POST /mcp/tools/call`
pub async fn call_tool(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(request): Json<ToolCallRequest>,
) -> Response {
    if let Err(err) = context.ensure_tool_allowed(&request.name) {
        warn!(
            "[Tools] Client {} denied tool '{}' in workspace {}",
            context.client_id, request.name, context.workspace_id
        );
        // The token authenticated fine; the grant just does not cover
        // this tool. That is a 403, not a malformed request.
        return (
            StatusCode::FORBIDDEN,
            Json(OAuthErrorBody::from_error(&err)),
        )
            .into_response();
    }

    info!(
        "[Tools] {} invoking '{}' in workspace {}",
        context.client_id, request.name, context.workspace_id
    );

    match state
        .tools
        .execute(&context, &request.name, request.arguments)
        .await
    {
        Ok(result) => Json(ToolCallResponse { result }).into_response(),
        Err(e) => oauth_json_error(&OAuthError::from(e)),
    }
}
