//! Authenticated context for tool calls
//!
//! Produced by the token verifier from a bearer token; consumed by the
//! tool gate before any domain service runs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::OAuthError;
use crate::role::WorkspaceRole;
use crate::scope::ScopeSet;

/// Everything the tool-execution layer needs to know about the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub workspace_id: String,
    pub user_id: String,
    pub client_id: String,
    /// Tool names the grant allows. Set semantics, no ordering.
    pub tool_permissions: BTreeSet<String>,
}

impl AuthContext {
    pub fn new(
        workspace_id: impl Into<String>,
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        scopes: &ScopeSet,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            user_id: user_id.into(),
            client_id: client_id.into(),
            tool_permissions: scopes.tools.clone(),
        }
    }

    /// Fail with `invalid_scope` when the grant does not cover `tool`.
    pub fn ensure_tool_allowed(&self, tool: &str) -> Result<(), OAuthError> {
        if self.tool_permissions.contains(tool) {
            Ok(())
        } else {
            Err(OAuthError::invalid_scope(format!(
                "Tool '{}' is not covered by the granted scope",
                tool
            )))
        }
    }
}

/// Fail with `access_denied` unless the role may administer agent
/// access. Used by the authorize flow and the connection API alike.
pub fn ensure_authorizing_role(role: Option<WorkspaceRole>) -> Result<WorkspaceRole, OAuthError> {
    match role {
        Some(r) if r.can_authorize() => Ok(r),
        Some(_) => Err(OAuthError::access_denied(
            "Only workspace owners and admins may manage agent access",
        )),
        None => Err(OAuthError::access_denied(
            "Not a member of this workspace",
        )),
    }
}
