//! OAuth 2.1 authorization server
//!
//! Authorization-code-with-PKCE flow for agent clients: dynamic client
//! registration, scoped consent, token issuance/refresh/revocation, and
//! the metadata documents clients use to discover all of it.

mod authorize;
mod discovery;
mod pkce;
mod registration;
mod token;

pub use authorize::{oauth_authorize, oauth_authorize_decision};
pub use discovery::{
    authorization_server_metadata, protected_resource_metadata, AuthorizationServerMetadata,
    ProtectedResourceMetadata,
};
pub use pkce::{build_s256_code_challenge, verify_s256, PkceChallenge};
pub use registration::{
    process_registration, validate_redirect_uris, RegistrationRequest, RegistrationResponse,
};
pub use token::{mint_token, oauth_revoke, oauth_token, TokenRequest, TokenResponseBody};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::Serialize;

use taskboard_core::OAuthError;

/// RFC 6749 error body.
#[derive(Debug, Serialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthErrorBody {
    pub fn from_error(err: &OAuthError) -> Self {
        Self {
            error: err.code.as_str().to_string(),
            error_description: Some(err.description.clone()),
        }
    }
}

/// Map an [`OAuthError`] to a JSON response with its HTTP status.
///
/// Used wherever the redirect URI is not yet trusted (registration,
/// token endpoint, pre-redirect authorize validation).
pub fn oauth_json_error(err: &OAuthError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(OAuthErrorBody::from_error(err))).into_response()
}

/// Redirect back to the client's redirect URI with `error`,
/// `error_description`, and `state` query parameters.
///
/// Only called after the redirect URI has been validated against the
/// client's registered set.
pub fn oauth_error_redirect(redirect_uri: &str, err: &OAuthError, state: Option<&str>) -> Response {
    let mut url = redirect_uri.to_string();
    url.push_str(if url.contains('?') { "&" } else { "?" });
    url.push_str(&format!(
        "error={}&error_description={}",
        err.code.as_str(),
        urlencoding::encode(&err.description)
    ));
    if let Some(s) = state {
        url.push_str(&format!("&state={}", urlencoding::encode(s)));
    }
    Redirect::to(&url).into_response()
}
