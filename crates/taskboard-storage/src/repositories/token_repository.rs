//! Access and refresh token storage.
//!
//! Only SHA-256 hashes of token values are persisted, plus a short
//! display prefix; a database compromise does not leak usable secrets.
//! Lookup is by hash, which also keeps comparisons timing-safe: the
//! attacker-controlled value is hashed before it touches any stored
//! secret.

use anyhow::Result;
use rusqlite::params;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Database;

use super::now_timestamp;

/// Token kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "access" => Some(TokenType::Access),
            "refresh" => Some(TokenType::Refresh),
            _ => None,
        }
    }
}

/// Stored token record.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub id: String,
    pub token_type: TokenType,
    pub token_hash: String,
    pub token_prefix: String,
    /// Internal client id (oauth_clients.id).
    pub client_id: String,
    pub user_id: String,
    pub workspace_id: String,
    pub tool_scopes: Vec<String>,
    pub expires_at: Option<String>,
    pub revoked_at: Option<String>,
    /// For access rows: the refresh row they were minted under.
    pub parent_token_id: Option<String>,
    pub created_at: String,
}

impl TokenRecord {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        match &self.expires_at {
            Some(expires_at) => expires_at < &now_timestamp(),
            None => false,
        }
    }
}

pub struct TokenRepository {
    db: Arc<Mutex<Database>>,
}

impl TokenRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Hash a token for storage (we never store raw tokens).
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    const COLUMNS: &'static str =
        "id, token_type, token_hash, token_prefix, client_id, user_id, workspace_id,
         tool_scopes, expires_at, revoked_at, parent_token_id, created_at";

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<TokenRecord> {
        let token_type_str: String = row.get(1)?;
        let tool_scopes_json: String = row.get(7)?;
        Ok(TokenRecord {
            id: row.get(0)?,
            token_type: TokenType::from_str(&token_type_str).unwrap_or(TokenType::Access),
            token_hash: row.get(2)?,
            token_prefix: row.get(3)?,
            client_id: row.get(4)?,
            user_id: row.get(5)?,
            workspace_id: row.get(6)?,
            tool_scopes: serde_json::from_str(&tool_scopes_json).unwrap_or_default(),
            expires_at: row.get(8)?,
            revoked_at: row.get(9)?,
            parent_token_id: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    pub async fn save_token(&self, record: &TokenRecord) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute(
            "INSERT INTO oauth_tokens
                (id, token_type, token_hash, token_prefix, client_id, user_id, workspace_id,
                 tool_scopes, expires_at, revoked_at, parent_token_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.id,
                record.token_type.as_str(),
                record.token_hash,
                record.token_prefix,
                record.client_id,
                record.user_id,
                record.workspace_id,
                serde_json::to_string(&record.tool_scopes)?,
                record.expires_at,
                record.revoked_at,
                record.parent_token_id,
                record.created_at,
            ],
        )?;
        debug!(
            "[OAuth] Saved {} token for client: {}",
            record.token_type.as_str(),
            record.client_id
        );
        Ok(())
    }

    /// Find a token row by the hash of its plaintext value.
    pub async fn find_by_hash(&self, token_hash: &str) -> Result<Option<TokenRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM oauth_tokens WHERE token_hash = ?1",
            Self::COLUMNS
        ))?;

        match stmt.query_row(params![token_hash], Self::map_row) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Revoke a token and all its child tokens. Idempotent: revoking an
    /// already-revoked row keeps the original `revoked_at`.
    pub async fn revoke_by_id(&self, token_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let now = now_timestamp();

        conn.execute(
            "UPDATE oauth_tokens SET revoked_at = ?1 WHERE id = ?2 AND revoked_at IS NULL",
            params![now, token_id],
        )?;
        conn.execute(
            "UPDATE oauth_tokens SET revoked_at = ?1 WHERE parent_token_id = ?2 AND revoked_at IS NULL",
            params![now, token_id],
        )?;

        info!("[OAuth] Revoked token: {}", token_id);
        Ok(())
    }

    /// Revoke the outstanding access tokens minted under a refresh
    /// token (access-token rotation on refresh).
    pub async fn revoke_access_children(&self, refresh_token_id: &str) -> Result<usize> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let count = conn.execute(
            "UPDATE oauth_tokens SET revoked_at = ?1
             WHERE parent_token_id = ?2 AND token_type = 'access' AND revoked_at IS NULL",
            params![now_timestamp(), refresh_token_id],
        )?;
        Ok(count)
    }

    /// Revoke every token issued under one (user, workspace, client)
    /// grant. Used when a consent is deleted.
    pub async fn revoke_for_grant(
        &self,
        user_id: &str,
        workspace_id: &str,
        client_id: &str,
    ) -> Result<usize> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let count = conn.execute(
            "UPDATE oauth_tokens SET revoked_at = ?1
             WHERE user_id = ?2 AND workspace_id = ?3 AND client_id = ?4 AND revoked_at IS NULL",
            params![now_timestamp(), user_id, workspace_id, client_id],
        )?;
        if count > 0 {
            info!(
                "[OAuth] Revoked {} tokens for grant user={} workspace={} client={}",
                count, user_id, workspace_id, client_id
            );
        }
        Ok(count)
    }

    /// Delete expired tokens. Maintenance helper, never timer-driven.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let deleted = conn.execute(
            "DELETE FROM oauth_tokens WHERE expires_at IS NOT NULL AND expires_at < ?1",
            params![now_timestamp()],
        )?;
        if deleted > 0 {
            info!("[OAuth] Cleaned up {} expired tokens", deleted);
        }
        Ok(deleted)
    }
}
