//! Authorization code storage.
//!
//! Codes are redeemable at most once. Consumption is a conditional
//! update on `consumed_at IS NULL`: of two racing exchanges, exactly
//! one observes a changed row and wins.

use anyhow::Result;
use rusqlite::params;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Database;

use super::{now_timestamp, timestamp_in};

/// A pending (or consumed) authorization code.
#[derive(Debug, Clone)]
pub struct AuthorizationCodeRecord {
    pub code: String,
    /// Internal client id (oauth_clients.id).
    pub client_id: String,
    pub user_id: String,
    pub workspace_id: String,
    pub redirect_uri: String,
    pub tool_scopes: Vec<String>,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub expires_at: String,
    pub consumed_at: Option<String>,
    pub created_at: String,
}

impl AuthorizationCodeRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at < now_timestamp()
    }
}

pub struct AuthorizationCodeRepository {
    db: Arc<Mutex<Database>>,
}

impl AuthorizationCodeRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Persist a freshly issued code with a TTL in seconds.
    pub async fn save_code(
        &self,
        record: &AuthorizationCodeRecord,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute(
            "INSERT INTO authorization_codes
                (code, client_id, user_id, workspace_id, redirect_uri, tool_scopes,
                 code_challenge, code_challenge_method, expires_at, consumed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10)",
            params![
                record.code,
                record.client_id,
                record.user_id,
                record.workspace_id,
                record.redirect_uri,
                serde_json::to_string(&record.tool_scopes)?,
                record.code_challenge,
                record.code_challenge_method,
                record.expires_at,
                record.created_at,
            ],
        )?;
        debug!(
            "[OAuth] Saved authorization code for client: {}",
            record.client_id
        );
        Ok(())
    }

    /// Build a record with standard timestamps for a TTL in seconds.
    pub fn new_record(
        code: String,
        client_id: String,
        user_id: String,
        workspace_id: String,
        redirect_uri: String,
        tool_scopes: Vec<String>,
        code_challenge: String,
        ttl_seconds: i64,
    ) -> AuthorizationCodeRecord {
        AuthorizationCodeRecord {
            code,
            client_id,
            user_id,
            workspace_id,
            redirect_uri,
            tool_scopes,
            code_challenge,
            code_challenge_method: "S256".to_string(),
            expires_at: timestamp_in(ttl_seconds),
            consumed_at: None,
            created_at: now_timestamp(),
        }
    }

    /// Atomically mark a code consumed and return it.
    ///
    /// Returns `None` when the code is unknown or already consumed.
    /// The compare-and-set runs first, so two near-simultaneous
    /// exchanges can never both receive the record. Expiry is the
    /// caller's check; an expired code still gets consumed here so it
    /// can never be retried.
    pub async fn consume_code(&self, code: &str) -> Result<Option<AuthorizationCodeRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let now = now_timestamp();
        let changed = conn.execute(
            "UPDATE authorization_codes SET consumed_at = ?1 WHERE code = ?2 AND consumed_at IS NULL",
            params![now, code],
        )?;

        if changed == 0 {
            debug!("[OAuth] Authorization code unknown or already consumed");
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            "SELECT code, client_id, user_id, workspace_id, redirect_uri, tool_scopes,
                    code_challenge, code_challenge_method, expires_at, consumed_at, created_at
             FROM authorization_codes WHERE code = ?1",
        )?;

        let record = stmt.query_row(params![code], |row| {
            let tool_scopes_json: String = row.get(5)?;
            Ok(AuthorizationCodeRecord {
                code: row.get(0)?,
                client_id: row.get(1)?,
                user_id: row.get(2)?,
                workspace_id: row.get(3)?,
                redirect_uri: row.get(4)?,
                tool_scopes: serde_json::from_str(&tool_scopes_json).unwrap_or_default(),
                code_challenge: row.get(6)?,
                code_challenge_method: row.get(7)?,
                expires_at: row.get(8)?,
                consumed_at: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?;

        debug!(
            "[OAuth] Consumed authorization code for client: {}",
            record.client_id
        );
        Ok(Some(record))
    }

    /// Delete expired codes. Maintenance helper, never timer-driven.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let deleted = conn.execute(
            "DELETE FROM authorization_codes WHERE expires_at < ?1",
            params![now_timestamp()],
        )?;
        if deleted > 0 {
            info!("[OAuth] Cleaned up {} expired authorization codes", deleted);
        }
        Ok(deleted)
    }
}
