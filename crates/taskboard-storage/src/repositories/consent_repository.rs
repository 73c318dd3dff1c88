//! Consent storage.
//!
//! One row per (user, workspace, client) triple. Re-approval updates
//! the existing row; the unique constraint plus `ON CONFLICT` makes the
//! upsert atomic across concurrent approvals.

use anyhow::Result;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Database;

use super::now_timestamp;

/// A standing consent: which tools a client may invoke on behalf of a
/// user within a workspace, and the role the approver held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: String,
    pub user_id: String,
    pub workspace_id: String,
    /// Internal client id (oauth_clients.id).
    pub client_id: String,
    pub tool_scopes: Vec<String>,
    pub granted_by_role: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A consent joined with its client metadata, for the connection
/// management listing.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceConnection {
    pub consent_id: String,
    pub user_id: String,
    pub client_id: String,
    pub client_name: String,
    pub tool_scopes: Vec<String>,
    pub granted_by_role: String,
    pub updated_at: String,
}

pub struct ConsentRepository {
    db: Arc<Mutex<Database>>,
}

impl ConsentRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    const COLUMNS: &'static str =
        "id, user_id, workspace_id, client_id, tool_scopes, granted_by_role, created_at, updated_at";

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ConsentRecord> {
        let tool_scopes_json: String = row.get(4)?;
        Ok(ConsentRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            workspace_id: row.get(2)?,
            client_id: row.get(3)?,
            tool_scopes: serde_json::from_str(&tool_scopes_json).unwrap_or_default(),
            granted_by_role: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    /// Create or update the consent for a (user, workspace, client)
    /// triple and return the stored row.
    pub async fn upsert(
        &self,
        user_id: &str,
        workspace_id: &str,
        client_id: &str,
        tool_scopes: &[String],
        granted_by_role: &str,
    ) -> Result<ConsentRecord> {
        let now = now_timestamp();
        {
            let db = self.db.lock().await;
            let conn = db.connection();
            conn.execute(
                "INSERT INTO consents
                    (id, user_id, workspace_id, client_id, tool_scopes, granted_by_role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(user_id, workspace_id, client_id) DO UPDATE SET
                    tool_scopes = ?5, granted_by_role = ?6, updated_at = ?7",
                params![
                    Uuid::new_v4().to_string(),
                    user_id,
                    workspace_id,
                    client_id,
                    serde_json::to_string(tool_scopes)?,
                    granted_by_role,
                    now,
                ],
            )?;
        }
        debug!(
            "[Consent] Upserted consent for user={} workspace={} client={}",
            user_id, workspace_id, client_id
        );

        self.get_for_grant(user_id, workspace_id, client_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Consent row missing after upsert"))
    }

    pub async fn get(&self, consent_id: &str) -> Result<Option<ConsentRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM consents WHERE id = ?1",
            Self::COLUMNS
        ))?;

        match stmt.query_row(params![consent_id], Self::map_row) {
            Ok(consent) => Ok(Some(consent)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_for_grant(
        &self,
        user_id: &str,
        workspace_id: &str,
        client_id: &str,
    ) -> Result<Option<ConsentRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM consents WHERE user_id = ?1 AND workspace_id = ?2 AND client_id = ?3",
            Self::COLUMNS
        ))?;

        match stmt.query_row(params![user_id, workspace_id, client_id], Self::map_row) {
            Ok(consent) => Ok(Some(consent)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List every standing consent in a workspace with client metadata.
    pub async fn list_for_workspace(&self, workspace_id: &str) -> Result<Vec<WorkspaceConnection>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.user_id, oc.client_id, oc.client_name, c.tool_scopes,
                    c.granted_by_role, c.updated_at
             FROM consents c
             JOIN oauth_clients oc ON oc.id = c.client_id
             WHERE c.workspace_id = ?1
             ORDER BY c.updated_at DESC",
        )?;

        let connections = stmt
            .query_map(params![workspace_id], |row| {
                let tool_scopes_json: String = row.get(4)?;
                Ok(WorkspaceConnection {
                    consent_id: row.get(0)?,
                    user_id: row.get(1)?,
                    client_id: row.get(2)?,
                    client_name: row.get(3)?,
                    tool_scopes: serde_json::from_str(&tool_scopes_json).unwrap_or_default(),
                    granted_by_role: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(
            "[Consent] Listed {} connections for workspace {}",
            connections.len(),
            workspace_id
        );
        Ok(connections)
    }

    /// Replace a consent's tool scopes. Narrowing checks belong to the
    /// caller; this is a plain persisted update.
    pub async fn update_tool_scopes(
        &self,
        consent_id: &str,
        tool_scopes: &[String],
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let rows = conn.execute(
            "UPDATE consents SET tool_scopes = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                serde_json::to_string(tool_scopes)?,
                now_timestamp(),
                consent_id
            ],
        )?;
        Ok(rows > 0)
    }

    /// Delete a consent, returning the deleted row so the caller can
    /// cascade token revocation for the same grant triple.
    pub async fn delete(&self, consent_id: &str) -> Result<Option<ConsentRecord>> {
        let existing = self.get(consent_id).await?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("DELETE FROM consents WHERE id = ?1", params![consent_id])?;

        info!(
            "[Consent] Deleted consent {} (workspace={}, client={})",
            consent_id, existing.workspace_id, existing.client_id
        );
        Ok(Some(existing))
    }
}
