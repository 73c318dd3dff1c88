//! OAuth discovery documents
//!
//! RFC 8414 authorization server metadata and RFC 9728 protected
//! resource metadata. Clients fetch these to locate the authorize,
//! token, registration, and revocation endpoints.

use axum::{extract::State, response::Json};
use serde::Serialize;
use tracing::info;

use crate::server::AppState;
use taskboard_core::TOOL_CATALOG;

/// Authorization Server Metadata (RFC 8414)
#[derive(Debug, Serialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub registration_endpoint: String,
    pub revocation_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
}

/// Authorization server metadata endpoint (RFC 8414)
pub async fn authorization_server_metadata(
    State(state): State<AppState>,
) -> Json<AuthorizationServerMetadata> {
    info!("[Gateway] Serving authorization server metadata");
    let base = &state.base_url;

    // Advertise the workspace scope shape plus every concrete tool scope.
    let mut scopes_supported = vec!["mcp:workspace:<workspace_id>".to_string()];
    scopes_supported.extend(TOOL_CATALOG.iter().map(|t| format!("mcp:tool:{}", t)));

    Json(AuthorizationServerMetadata {
        issuer: base.to_string(),
        authorization_endpoint: format!("{}/oauth/authorize", base),
        token_endpoint: format!("{}/oauth/token", base),
        registration_endpoint: format!("{}/oauth/register", base),
        revocation_endpoint: format!("{}/oauth/revoke", base),
        response_types_supported: vec!["code".to_string()],
        grant_types_supported: vec![
            "authorization_code".to_string(),
            "refresh_token".to_string(),
        ],
        code_challenge_methods_supported: vec!["S256".to_string()],
        token_endpoint_auth_methods_supported: vec!["none".to_string()],
        scopes_supported,
    })
}

/// Protected Resource Metadata (RFC 9728)
#[derive(Debug, Serialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
}

/// Protected resource metadata endpoint (RFC 9728)
///
/// Tells agent clients which authorization server issues tokens for
/// the tool-calling endpoint.
pub async fn protected_resource_metadata(
    State(state): State<AppState>,
) -> Json<ProtectedResourceMetadata> {
    info!("[Gateway] Serving protected resource metadata");
    let base = &state.base_url;
    Json(ProtectedResourceMetadata {
        resource: format!("{}/mcp", base),
        authorization_servers: vec![base.to_string()],
        scopes_supported: Some(TOOL_CATALOG.iter().map(|t| format!("mcp:tool:{}", t)).collect()),
    })
}
