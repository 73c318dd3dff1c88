//! # Taskboard Core Library
//!
//! Domain logic and business rules for agent access to Taskboard
//! workspaces.
//!
//! ## Modules
//!
//! - `error` - OAuth error taxonomy (RFC 6749 vocabulary)
//! - `scope` - Scope grammar and the tool catalog
//! - `role` - Workspace roles and the role directory trait
//! - `session` - Signed-in user resolution trait
//! - `context` - Authenticated context for tool calls
//! - `tools` - Tool execution trait (boundary to domain services)

pub mod context;
pub mod error;
pub mod role;
pub mod scope;
pub mod session;
pub mod tools;

pub use context::{ensure_authorizing_role, AuthContext};
pub use error::{OAuthError, OAuthErrorCode};
pub use role::{RoleDirectory, WorkspaceRole};
pub use scope::{is_known_tool, ScopeSet, TOOL_CATALOG};
pub use session::SessionResolver;
pub use tools::ToolExecutor;
