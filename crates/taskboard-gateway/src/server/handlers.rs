//! HTTP handlers for the gateway server

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::debug;

use crate::oauth::{oauth_json_error, process_registration, RegistrationRequest};
use crate::server::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    debug!("[Gateway] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /oauth/register` — dynamic client registration.
pub async fn oauth_register(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> Response {
    match process_registration(&state.clients, request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => oauth_json_error(&err),
    }
}
