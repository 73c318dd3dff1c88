//! Workspace roles
//!
//! Granting an AI agent tool access to a workspace is an administrative
//! act: only owners and admins may authorize or manage connections.
//! Role lookup itself lives outside this subsystem and is consumed
//! through [`RoleDirectory`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A member's role within a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Admin,
    Member,
}

impl WorkspaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Owner => "owner",
            WorkspaceRole::Admin => "admin",
            WorkspaceRole::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(WorkspaceRole::Owner),
            "admin" => Some(WorkspaceRole::Admin),
            "member" => Some(WorkspaceRole::Member),
            _ => None,
        }
    }

    /// Whether this role may approve consents and manage connections.
    pub fn can_authorize(&self) -> bool {
        matches!(self, WorkspaceRole::Owner | WorkspaceRole::Admin)
    }
}

/// Role lookup for workspace membership, provided by the surrounding
/// application. `None` means the user is not a member at all.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn role(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> anyhow::Result<Option<WorkspaceRole>>;
}
