//! Registered OAuth client storage.
//!
//! Clients are created by dynamic registration and never deleted in
//! normal operation. Redirect URIs are an exact-match set; there is no
//! wildcard or prefix matching anywhere in the lookup path.

use anyhow::Result;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::Database;

use super::now_timestamp;

/// A registered OAuth client.
///
/// `id` is the internal key referenced by consents, codes, and tokens;
/// `client_id` is the public opaque identifier clients present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ClientRecord {
    /// Exact-match redirect URI check.
    pub fn has_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}

pub struct ClientRepository {
    db: Arc<Mutex<Database>>,
}

impl ClientRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    const COLUMNS: &'static str =
        "id, client_id, client_name, redirect_uris, created_at, updated_at";

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ClientRecord> {
        let redirect_uris_json: String = row.get(3)?;
        Ok(ClientRecord {
            id: row.get(0)?,
            client_id: row.get(1)?,
            client_name: row.get(2)?,
            redirect_uris: serde_json::from_str(&redirect_uris_json).unwrap_or_default(),
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    /// Register or re-register a client (upsert by public client_id).
    pub async fn save_client(&self, client: &ClientRecord) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute(
            "INSERT INTO oauth_clients (id, client_id, client_name, redirect_uris, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(client_id) DO UPDATE SET
                client_name = ?3, redirect_uris = ?4, updated_at = ?6",
            params![
                client.id,
                client.client_id,
                client.client_name,
                serde_json::to_string(&client.redirect_uris)?,
                client.created_at,
                client.updated_at,
            ],
        )?;
        debug!(
            "[OAuth] Saved client: {} ({})",
            client.client_name, client.client_id
        );
        Ok(())
    }

    /// Look up by public client_id.
    pub async fn get_by_client_id(&self, client_id: &str) -> Result<Option<ClientRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM oauth_clients WHERE client_id = ?1",
            Self::COLUMNS
        ))?;

        match stmt.query_row(params![client_id], Self::map_row) {
            Ok(client) => Ok(Some(client)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up by internal id (used when joining from consents/tokens).
    pub async fn get_by_internal_id(&self, id: &str) -> Result<Option<ClientRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM oauth_clients WHERE id = ?1",
            Self::COLUMNS
        ))?;

        match stmt.query_row(params![id], Self::map_row) {
            Ok(client) => Ok(Some(client)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find by display name, for idempotent re-registration.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<ClientRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM oauth_clients WHERE client_name = ?1",
            Self::COLUMNS
        ))?;

        match stmt.query_row(params![name], Self::map_row) {
            Ok(client) => Ok(Some(client)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge new redirect URIs into an existing registration, keeping
    /// previously registered URIs valid.
    pub async fn merge_redirect_uris(
        &self,
        client_id: &str,
        new_uris: &[String],
    ) -> Result<Vec<String>> {
        let existing = self.get_by_client_id(client_id).await?;
        let mut merged = existing.map(|c| c.redirect_uris).unwrap_or_default();
        for uri in new_uris {
            if !merged.contains(uri) {
                merged.push(uri.clone());
            }
        }

        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute(
            "UPDATE oauth_clients SET redirect_uris = ?1, updated_at = ?2 WHERE client_id = ?3",
            params![serde_json::to_string(&merged)?, now_timestamp(), client_id],
        )?;

        debug!("[OAuth] Merged redirect_uris for client: {}", client_id);
        Ok(merged)
    }
}
