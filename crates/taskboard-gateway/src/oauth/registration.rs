//! Dynamic Client Registration (RFC 7591)
//!
//! Agent clients register themselves before starting the authorization
//! flow. The database is the single source of truth; there is no
//! in-memory client registry.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use taskboard_core::OAuthError;
use taskboard_storage::{now_timestamp, ClientRecord, ClientRepository};

/// Client registration request (RFC 7591)
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    /// Human-readable name of the client
    pub client_name: String,
    /// Array of allowed redirect URIs (exact-match set)
    pub redirect_uris: Vec<String>,
    /// OAuth 2.0 grant types the client may use
    #[serde(default)]
    pub grant_types: Vec<String>,
    /// OAuth 2.0 response types the client may use
    #[serde(default)]
    pub response_types: Vec<String>,
    /// Authentication method for the token endpoint
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,
}

/// Client registration response (RFC 7591)
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResponse {
    /// Unique client identifier
    pub client_id: String,
    /// Human-readable name of the client
    pub client_name: String,
    /// Array of allowed redirect URIs
    pub redirect_uris: Vec<String>,
    /// OAuth 2.0 grant types the client may use
    pub grant_types: Vec<String>,
    /// OAuth 2.0 response types the client may use
    pub response_types: Vec<String>,
    /// Authentication method for the token endpoint
    pub token_endpoint_auth_method: String,
    /// Timestamp of when the client was registered
    pub client_id_issued_at: u64,
}

/// Validate redirect URIs for registration.
///
/// Every URI must be absolute and fragment-free; matching later is
/// exact string comparison, so there is nothing wildcard-shaped to
/// reject here beyond basic well-formedness.
pub fn validate_redirect_uris(uris: &[String]) -> Result<(), OAuthError> {
    if uris.is_empty() {
        return Err(OAuthError::invalid_request(
            "At least one redirect_uri is required",
        ));
    }

    for uri in uris {
        let parsed = Url::parse(uri).map_err(|_| {
            warn!("[DCR] Rejected malformed redirect_uri: {}", uri);
            OAuthError::invalid_request(format!("Malformed redirect_uri: {}", uri))
        })?;

        if parsed.fragment().is_some() {
            warn!("[DCR] Rejected redirect_uri with fragment: {}", uri);
            return Err(OAuthError::invalid_request(
                "redirect_uri must not contain a fragment",
            ));
        }

        debug!("[DCR] Validated redirect_uri: {}", uri);
    }

    Ok(())
}

fn default_grant_types(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        vec![
            "authorization_code".to_string(),
            "refresh_token".to_string(),
        ]
    } else {
        requested.to_vec()
    }
}

fn default_response_types(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        vec!["code".to_string()]
    } else {
        requested.to_vec()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Process a registration request against the client repository.
///
/// Registration is idempotent by client_name: re-registering under the
/// same name keeps the client_id and merges new redirect URIs into the
/// registered set, so previously issued grants stay valid.
pub async fn process_registration(
    repo: &ClientRepository,
    request: RegistrationRequest,
) -> Result<RegistrationResponse, OAuthError> {
    info!(
        "[DCR] Processing registration for: {} (redirect_uris: {:?})",
        request.client_name, request.redirect_uris
    );

    if request.client_name.trim().is_empty() {
        return Err(OAuthError::invalid_request("client_name is required"));
    }
    validate_redirect_uris(&request.redirect_uris)?;

    let grant_types = default_grant_types(&request.grant_types);
    let response_types = default_response_types(&request.response_types);
    let token_endpoint_auth_method = request
        .token_endpoint_auth_method
        .clone()
        .unwrap_or_else(|| "none".to_string());

    let existing = repo.find_by_name(&request.client_name).await?;

    if let Some(existing) = existing {
        info!(
            "[DCR] Updating existing client: {} ({})",
            request.client_name, existing.client_id
        );

        let merged_uris = repo
            .merge_redirect_uris(&existing.client_id, &request.redirect_uris)
            .await?;

        return Ok(RegistrationResponse {
            client_id: existing.client_id,
            client_name: request.client_name,
            redirect_uris: merged_uris,
            grant_types,
            response_types,
            token_endpoint_auth_method,
            client_id_issued_at: unix_now(),
        });
    }

    let now = now_timestamp();
    let client = ClientRecord {
        id: Uuid::new_v4().to_string(),
        client_id: format!("tb_{}", &Uuid::new_v4().simple().to_string()[..16]),
        client_name: request.client_name.clone(),
        redirect_uris: request.redirect_uris.clone(),
        created_at: now.clone(),
        updated_at: now,
    };

    repo.save_client(&client).await?;

    info!(
        "[DCR] New client registered: {} ({})",
        client.client_name, client.client_id
    );

    Ok(RegistrationResponse {
        client_id: client.client_id,
        client_name: client.client_name,
        redirect_uris: client.redirect_uris,
        grant_types,
        response_types,
        token_endpoint_auth_method,
        client_id_issued_at: unix_now(),
    })
}
