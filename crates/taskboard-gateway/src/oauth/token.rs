//! Token issuance, refresh, and revocation
//!
//! Tokens are opaque random values; only their SHA-256 hash is stored.
//! A refresh exchange rotates the access token but keeps the refresh
//! token stable until it is explicitly revoked.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Form,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use taskboard_core::{OAuthError, ScopeSet};
use taskboard_storage::{now_timestamp, timestamp_in, TokenRecord, TokenRepository, TokenType};

use super::{oauth_json_error, verify_s256};
use crate::server::AppState;

/// Prefix for access token values.
pub const ACCESS_TOKEN_PREFIX: &str = "tb_at_";
/// Prefix for refresh token values.
pub const REFRESH_TOKEN_PREFIX: &str = "tb_rt_";

/// Length of the stored display prefix (enough to identify a token in
/// logs or an admin view without revealing it).
const DISPLAY_PREFIX_LEN: usize = 12;

/// Mint a high-entropy opaque token with the given prefix.
pub fn mint_token(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    format!("{}{}", prefix, URL_SAFE_NO_PAD.encode(&random_bytes))
}

/// Token endpoint request body (`application/x-www-form-urlencoded`).
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// Token endpoint success body.
#[derive(Debug, Serialize)]
pub struct TokenResponseBody {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// The scope actually granted, which may be narrower than requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// `POST /oauth/token`
pub async fn oauth_token(
    State(state): State<AppState>,
    Form(request): Form<TokenRequest>,
) -> Response {
    info!(
        "[OAuth] Token request: grant_type={}, client_id={:?}",
        request.grant_type, request.client_id
    );

    let result = match request.grant_type.as_str() {
        "authorization_code" => exchange_authorization_code(&state, &request).await,
        "refresh_token" => refresh_access_token(&state, &request).await,
        other => {
            warn!("[OAuth] Unsupported grant_type: {}", other);
            Err(OAuthError::unsupported_grant_type(
                "Only authorization_code and refresh_token are supported",
            ))
        }
    };

    match result {
        Ok(body) => token_response(body),
        Err(err) => oauth_json_error(&err),
    }
}

/// Token responses carry no-store caching headers per OAuth 2.1.
fn token_response(body: TokenResponseBody) -> Response {
    (
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(body),
    )
        .into_response()
}

async fn exchange_authorization_code(
    state: &AppState,
    request: &TokenRequest,
) -> Result<TokenResponseBody, OAuthError> {
    let code = request
        .code
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing authorization code"))?;
    let code_verifier = request
        .code_verifier
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing code_verifier"))?;
    let client_id = request
        .client_id
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing client_id"))?;
    let redirect_uri = request
        .redirect_uri
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing redirect_uri"))?;

    let client = state
        .clients
        .get_by_client_id(client_id)
        .await?
        .ok_or_else(|| OAuthError::invalid_client("Client not registered"))?;

    // The consume is the atomic single-use check: of two racing
    // exchanges, exactly one gets the record back.
    let record = state
        .codes
        .consume_code(code)
        .await?
        .ok_or_else(|| OAuthError::invalid_grant("Authorization code is invalid or expired"))?;

    if record.client_id != client.id {
        warn!("[OAuth] Code was issued to a different client");
        return Err(OAuthError::invalid_grant(
            "Authorization code was issued to a different client",
        ));
    }
    if record.redirect_uri != redirect_uri {
        warn!("[OAuth] redirect_uri mismatch at code exchange");
        return Err(OAuthError::invalid_grant("Redirect URI mismatch"));
    }
    if record.is_expired() {
        return Err(OAuthError::invalid_grant(
            "Authorization code is invalid or expired",
        ));
    }
    if !verify_s256(code_verifier, &record.code_challenge) {
        warn!("[OAuth] PKCE verification failed");
        return Err(OAuthError::invalid_grant("PKCE verification failed"));
    }

    let granted = ScopeSet::from_parts(record.workspace_id.clone(), record.tool_scopes.clone());

    // Refresh token first: the access token records it as its parent so
    // rotation and cascade revocation can find the pair.
    let refresh_plain = mint_token(REFRESH_TOKEN_PREFIX);
    let refresh_record = new_token_record(
        TokenType::Refresh,
        &refresh_plain,
        &client.id,
        &record.user_id,
        &record.workspace_id,
        &record.tool_scopes,
        None,
        None,
    );
    state.tokens.save_token(&refresh_record).await?;

    let access_plain = mint_token(ACCESS_TOKEN_PREFIX);
    let access_record = new_token_record(
        TokenType::Access,
        &access_plain,
        &client.id,
        &record.user_id,
        &record.workspace_id,
        &record.tool_scopes,
        Some(timestamp_in(state.access_token_ttl)),
        Some(refresh_record.id.clone()),
    );
    state.tokens.save_token(&access_record).await?;

    info!(
        "[OAuth] Issued token pair for client {} (expires_in={}s)",
        client.client_id, state.access_token_ttl
    );

    Ok(TokenResponseBody {
        access_token: access_plain,
        token_type: "Bearer".to_string(),
        expires_in: state.access_token_ttl,
        refresh_token: Some(refresh_plain),
        scope: Some(granted.to_scope_string()),
    })
}

async fn refresh_access_token(
    state: &AppState,
    request: &TokenRequest,
) -> Result<TokenResponseBody, OAuthError> {
    let refresh_plain = request
        .refresh_token
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing refresh_token"))?;
    let client_id = request
        .client_id
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing client_id"))?;

    let client = state
        .clients
        .get_by_client_id(client_id)
        .await?
        .ok_or_else(|| OAuthError::invalid_client("Client not registered"))?;

    let record = state
        .tokens
        .find_by_hash(&TokenRepository::hash_token(refresh_plain))
        .await?
        .filter(|t| t.token_type == TokenType::Refresh)
        .ok_or_else(|| OAuthError::invalid_grant("Refresh token is invalid"))?;

    if record.client_id != client.id {
        warn!("[OAuth] Refresh token was issued to a different client");
        return Err(OAuthError::invalid_grant("Refresh token is invalid"));
    }
    if record.is_revoked() || record.is_expired() {
        return Err(OAuthError::invalid_grant(
            "Refresh token is revoked or expired",
        ));
    }

    let original = ScopeSet::from_parts(record.workspace_id.clone(), record.tool_scopes.clone());

    // A refresh may narrow the grant but never widen it; omitting
    // `scope` keeps the original grant.
    let granted = match request.scope.as_deref() {
        Some(scope) => {
            let requested = ScopeSet::parse(scope)?;
            if !original.covers(&requested) {
                warn!("[OAuth] Refresh attempted to widen scope");
                return Err(OAuthError::invalid_scope(
                    "Requested scope exceeds the original grant",
                ));
            }
            requested
        }
        None => original,
    };

    // Rotate: outstanding access tokens under this refresh token die.
    state.tokens.revoke_access_children(&record.id).await?;

    let granted_tools: Vec<String> = granted.tools.iter().cloned().collect();
    let access_plain = mint_token(ACCESS_TOKEN_PREFIX);
    let access_record = new_token_record(
        TokenType::Access,
        &access_plain,
        &client.id,
        &record.user_id,
        &record.workspace_id,
        &granted_tools,
        Some(timestamp_in(state.access_token_ttl)),
        Some(record.id.clone()),
    );
    state.tokens.save_token(&access_record).await?;

    info!("[OAuth] Refreshed access token for client {}", client.client_id);

    Ok(TokenResponseBody {
        access_token: access_plain,
        token_type: "Bearer".to_string(),
        expires_in: state.access_token_ttl,
        refresh_token: Some(refresh_plain.to_string()),
        scope: Some(granted.to_scope_string()),
    })
}

#[allow(clippy::too_many_arguments)]
fn new_token_record(
    token_type: TokenType,
    plaintext: &str,
    client_internal_id: &str,
    user_id: &str,
    workspace_id: &str,
    tool_scopes: &[String],
    expires_at: Option<String>,
    parent_token_id: Option<String>,
) -> TokenRecord {
    TokenRecord {
        id: Uuid::new_v4().to_string(),
        token_type,
        token_hash: TokenRepository::hash_token(plaintext),
        token_prefix: plaintext.chars().take(DISPLAY_PREFIX_LEN).collect(),
        client_id: client_internal_id.to_string(),
        user_id: user_id.to_string(),
        workspace_id: workspace_id.to_string(),
        tool_scopes: tool_scopes.to_vec(),
        expires_at,
        revoked_at: None,
        parent_token_id,
        created_at: now_timestamp(),
    }
}

/// Revocation request body (RFC 7009).
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub token: String,
    pub client_id: Option<String>,
    #[allow(dead_code)] // Accepted per RFC 7009; lookup is by hash regardless.
    pub token_type_hint: Option<String>,
}

/// `POST /oauth/revoke`
///
/// Always returns 200 with an empty body, whether or not the token
/// existed, so response codes cannot be used to probe token validity.
pub async fn oauth_revoke(
    State(state): State<AppState>,
    Form(request): Form<RevokeRequest>,
) -> Response {
    let found = match state
        .tokens
        .find_by_hash(&TokenRepository::hash_token(&request.token))
        .await
    {
        Ok(found) => found,
        Err(e) => {
            // Revocation reports success regardless (anti-enumeration).
            tracing::error!("[OAuth] Revocation lookup failed: {:#}", e);
            return StatusCode::OK.into_response();
        }
    };

    if let Some(record) = found {
        // When the caller identifies itself, only revoke its own tokens.
        let client_matches = match request.client_id.as_deref() {
            Some(client_id) => matches!(
                state.clients.get_by_client_id(client_id).await,
                Ok(Some(client)) if client.id == record.client_id
            ),
            None => true,
        };

        if client_matches {
            if let Err(e) = state.tokens.revoke_by_id(&record.id).await {
                tracing::error!("[OAuth] Revocation failed: {:#}", e);
            }
        } else {
            warn!("[OAuth] Revocation request from non-owning client ignored");
        }
    }

    StatusCode::OK.into_response()
}
