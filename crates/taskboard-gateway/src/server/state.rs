//! Gateway application state
//!
//! All external collaborators (session lookup, role directory, tool
//! execution) are injected through [`GatewayDependencies`], so tests
//! can run the full router against in-memory fakes.

use std::sync::Arc;

use tokio::sync::Mutex;

use taskboard_core::{RoleDirectory, SessionResolver, ToolExecutor};
use taskboard_storage::{
    AuthorizationCodeRepository, ClientRepository, ConsentRepository, Database, TokenRepository,
};

use super::GatewayConfig;

/// External dependencies injected into the gateway.
pub struct GatewayDependencies {
    pub database: Arc<Mutex<Database>>,
    pub sessions: Arc<dyn SessionResolver>,
    pub roles: Arc<dyn RoleDirectory>,
    pub tools: Arc<dyn ToolExecutor>,
}

/// Shared handler state. Cheap to clone; everything inside is an Arc.
#[derive(Clone)]
pub struct AppState {
    pub base_url: String,
    /// Authorization code lifetime in seconds.
    pub auth_code_ttl: i64,
    /// Access token lifetime in seconds.
    pub access_token_ttl: i64,

    pub clients: Arc<ClientRepository>,
    pub consents: Arc<ConsentRepository>,
    pub codes: Arc<AuthorizationCodeRepository>,
    pub tokens: Arc<TokenRepository>,

    pub sessions: Arc<dyn SessionResolver>,
    pub roles: Arc<dyn RoleDirectory>,
    pub tools: Arc<dyn ToolExecutor>,
}

impl AppState {
    pub fn new(config: &GatewayConfig, dependencies: GatewayDependencies) -> Self {
        let db = dependencies.database;
        Self {
            base_url: config.base_url(),
            auth_code_ttl: config.auth_code_ttl,
            access_token_ttl: config.access_token_ttl,
            clients: Arc::new(ClientRepository::new(db.clone())),
            consents: Arc::new(ConsentRepository::new(db.clone())),
            codes: Arc::new(AuthorizationCodeRepository::new(db.clone())),
            tokens: Arc::new(TokenRepository::new(db)),
            sessions: dependencies.sessions,
            roles: dependencies.roles,
            tools: dependencies.tools,
        }
    }
}
