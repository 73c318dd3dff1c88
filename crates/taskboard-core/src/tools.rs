//! Tool execution boundary
//!
//! The task/project/comment domain services live outside this
//! subsystem. The gateway authenticates the bearer token, checks scope
//! membership, and only then delegates through this trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::AuthContext;

/// Executes a single tool call on behalf of an authenticated agent.
///
/// Implementations may assume `ctx.tool_permissions` already contains
/// `tool`; the gate enforces that before delegating.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, ctx: &AuthContext, tool: &str, arguments: Value)
        -> anyhow::Result<Value>;
}
