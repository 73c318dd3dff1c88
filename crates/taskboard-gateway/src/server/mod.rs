//! Gateway Server
//!
//! HTTP server exposing the OAuth endpoints, the connection management
//! API, and the bearer-protected tool-calling route. Self-contained
//! with dependency injection: session lookup, role directory, and tool
//! execution are constructor arguments, so tests run the full router
//! against in-memory fakes.

mod handlers;
pub mod logging_middleware;
pub mod rate_limit;
mod state;

pub use state::{AppState, GatewayDependencies};

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::bearer_auth_middleware;
use crate::{connections, mcp, oauth};

/// Gateway server configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS for browser access
    pub enable_cors: bool,
    /// Authorization code lifetime in seconds.
    pub auth_code_ttl: i64,
    /// Access token lifetime in seconds.
    pub access_token_ttl: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7420,
            enable_cors: true,
            auth_code_ttl: 600,
            access_token_ttl: 3600,
        }
    }
}

impl GatewayConfig {
    /// Get the socket address
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// Base URL for this gateway, used as the OAuth issuer.
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// Authorization gateway server.
pub struct GatewayServer {
    config: GatewayConfig,
    state: AppState,
}

impl GatewayServer {
    /// Create a new gateway server with dependency injection.
    pub fn new(config: GatewayConfig, dependencies: GatewayDependencies) -> Self {
        info!("[Gateway] Initializing with dependency injection...");
        let state = AppState::new(&config, dependencies);
        Self { config, state }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the Axum router. Public so integration tests can drive the
    /// full HTTP surface without binding a socket.
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone(), self.config.enable_cors)
    }

    /// Run the gateway server.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.addr()?;

        info!("[Gateway] Starting on {}", addr);
        info!(
            "[Gateway] CORS: {}",
            if self.config.enable_cors {
                "enabled"
            } else {
                "disabled"
            }
        );

        let router = self.build_router();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("[Gateway] Ready to accept connections");
        axum::serve(listener, router).await?;

        Ok(())
    }

    /// Start the server in the background.
    pub fn spawn(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Assemble the full route table.
pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    // Tool calls require a verified bearer token.
    let protected_routes = Router::new()
        .route("/mcp/tools/call", post(mcp::call_tool))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_middleware,
        ));

    // Connection management is session-authenticated, admin-gated in
    // the handlers themselves.
    let connection_routes = Router::new()
        .route(
            "/workspaces/{workspace_id}/connections",
            get(connections::list_connections),
        )
        .route(
            "/workspaces/{workspace_id}/connections/{consent_id}/scopes",
            patch(connections::update_connection_scopes),
        )
        .route(
            "/workspaces/{workspace_id}/connections/{consent_id}",
            delete(connections::delete_connection),
        );

    let rate_limiter = rate_limit::default_oauth_rate_limiter();

    let mut router = Router::new()
        // Health check (public)
        .route("/health", get(handlers::health))
        // Discovery documents (public)
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth::authorization_server_metadata),
        )
        .route(
            "/.well-known/oauth-protected-resource/mcp",
            get(oauth::protected_resource_metadata),
        )
        // OAuth protocol endpoints (public)
        .route("/oauth/register", post(handlers::oauth_register))
        .route(
            "/oauth/authorize",
            get(oauth::oauth_authorize).post(oauth::oauth_authorize_decision),
        )
        .route("/oauth/token", post(oauth::oauth_token))
        .route("/oauth/revoke", post(oauth::oauth_revoke))
        .merge(protected_routes)
        .merge(connection_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Request/Response logging with body (DEBUG level)
        .layer(middleware::from_fn(
            logging_middleware::http_logging_middleware,
        ))
        // Rate limiting on OAuth endpoints
        .layer(axum::Extension(rate_limiter))
        .layer(middleware::from_fn(rate_limit::rate_limit_middleware));

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router
}
