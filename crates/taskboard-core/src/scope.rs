//! Scope grammar
//!
//! A requested scope string binds a grant to exactly one workspace and
//! one or more tools from the fixed catalog. Raw scope strings never
//! travel past this module; everything downstream works with a parsed
//! [`ScopeSet`].
//!
//! Grammar (whitespace-separated tokens):
//! - `mcp:workspace:<workspaceId>` — exactly one required
//! - `mcp:tool:<toolName>` — at least one required, from [`TOOL_CATALOG`]

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::OAuthError;

const WORKSPACE_PREFIX: &str = "mcp:workspace:";
const TOOL_PREFIX: &str = "mcp:tool:";

/// Every tool an agent may be granted. Scope validation rejects
/// anything not listed here.
pub const TOOL_CATALOG: &[&str] = &[
    "create_task",
    "update_task",
    "delete_task",
    "get_task",
    "list_tasks",
    "move_task",
    "create_project",
    "list_projects",
    "add_comment",
    "list_comments",
    "search_tasks",
];

/// Check a tool name against the catalog.
pub fn is_known_tool(name: &str) -> bool {
    TOOL_CATALOG.contains(&name)
}

/// A validated scope set: one workspace, a non-empty set of tools.
///
/// Tool order is not significant; `BTreeSet` gives set semantics and a
/// deterministic rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSet {
    pub workspace_id: String,
    pub tools: BTreeSet<String>,
}

impl ScopeSet {
    /// Parse and validate a requested scope string.
    pub fn parse(scope: &str) -> Result<Self, OAuthError> {
        let mut workspace_id: Option<String> = None;
        let mut tools = BTreeSet::new();

        for token in scope.split_whitespace() {
            if let Some(ws) = token.strip_prefix(WORKSPACE_PREFIX) {
                if workspace_id.is_some() {
                    return Err(OAuthError::invalid_scope(
                        "Scope must contain exactly one workspace scope",
                    ));
                }
                if ws.is_empty() {
                    return Err(OAuthError::invalid_scope("Empty workspace identifier"));
                }
                workspace_id = Some(ws.to_string());
            } else if let Some(tool) = token.strip_prefix(TOOL_PREFIX) {
                if !is_known_tool(tool) {
                    return Err(OAuthError::invalid_scope(format!(
                        "Unknown tool: {}",
                        tool
                    )));
                }
                tools.insert(tool.to_string());
            } else {
                return Err(OAuthError::invalid_scope(format!(
                    "Unrecognized scope token: {}",
                    token
                )));
            }
        }

        let workspace_id = workspace_id.ok_or_else(|| {
            OAuthError::invalid_scope("Scope must contain a workspace scope")
        })?;
        if tools.is_empty() {
            return Err(OAuthError::invalid_scope(
                "Scope must contain at least one tool scope",
            ));
        }

        Ok(Self {
            workspace_id,
            tools,
        })
    }

    /// Build a scope set from an already-validated workspace id and a
    /// tool list (used when reloading stored grants).
    pub fn from_parts(
        workspace_id: impl Into<String>,
        tools: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            tools: tools.into_iter().collect(),
        }
    }

    /// Render as a canonical scope string: workspace scope first, tools
    /// in sorted order.
    pub fn to_scope_string(&self) -> String {
        let mut out = format!("{}{}", WORKSPACE_PREFIX, self.workspace_id);
        for tool in &self.tools {
            out.push(' ');
            out.push_str(TOOL_PREFIX);
            out.push_str(tool);
        }
        out
    }

    pub fn contains_tool(&self, tool: &str) -> bool {
        self.tools.contains(tool)
    }

    /// Intersect this set's tools with an approved selection, keeping
    /// the workspace binding. Tools not present in `self` are silently
    /// dropped; a consent form can never escalate beyond the request.
    pub fn intersect_tools<'a>(&self, approved: impl IntoIterator<Item = &'a str>) -> Self {
        let tools = approved
            .into_iter()
            .filter(|t| self.tools.contains(*t))
            .map(String::from)
            .collect();
        Self {
            workspace_id: self.workspace_id.clone(),
            tools,
        }
    }

    /// True when `other` grants no workspace or tool beyond `self`.
    pub fn covers(&self, other: &ScopeSet) -> bool {
        self.workspace_id == other.workspace_id && other.tools.is_subset(&self.tools)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
