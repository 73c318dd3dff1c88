//! Signed-in user resolution
//!
//! Cookie-session authentication is owned by the surrounding web app.
//! The authorization flow only needs "who is the current user, if
//! anyone" and receives it through this trait; the resolved user is
//! then passed explicitly through every flow step.

use async_trait::async_trait;

/// Resolves the signed-in user from an opaque session cookie value.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Returns the user id for a valid session, `None` otherwise.
    async fn current_user(&self, session_cookie: &str) -> anyhow::Result<Option<String>>;
}
