//! Taskboard Gateway
//!
//! The authorization server granting AI-agent clients scoped,
//! time-limited access to one workspace's task-management tools:
//! - OAuth 2.1 authorization-code flow with mandatory PKCE (S256)
//! - Dynamic client registration (RFC 7591) and discovery documents
//!   (RFC 8414 / RFC 9728)
//! - Human-in-the-loop consent with per-tool approval, role-gated to
//!   workspace owners and admins
//! - Opaque access/refresh tokens stored only as hashes, with rotation
//!   on refresh and cascade revocation (RFC 7009)
//! - A bearer-protected tool-calling endpoint and a workspace-admin
//!   connection management API

pub mod auth;
pub mod connections;
pub mod logging;
pub mod mcp;
pub mod oauth;
pub mod server;

pub use auth::authenticate_access_token;
pub use oauth::{
    build_s256_code_challenge, verify_s256, PkceChallenge, RegistrationRequest,
    RegistrationResponse, TokenResponseBody,
};
pub use server::{build_router, AppState, GatewayConfig, GatewayDependencies, GatewayServer};
