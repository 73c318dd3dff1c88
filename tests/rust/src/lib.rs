//! Shared test utilities and fixtures for Taskboard gateway integration tests.

pub use taskboard_core::{AuthContext, OAuthErrorCode, ScopeSet, WorkspaceRole, TOOL_CATALOG};
pub use taskboard_storage::{
    AuthorizationCodeRecord, ClientRecord, ConsentRecord, Database, TokenRecord, TokenType,
};

pub use mocks::{MockRoleDirectory, MockSessionResolver, MockToolExecutor};

/// Database test helpers
pub mod db {
    use std::path::{Path, PathBuf};
    use taskboard_storage::Database;
    use tempfile::TempDir;

    /// Database file name
    const DB_FILE: &str = "taskboard.db";

    /// Create a temporary database for testing
    pub struct TestDatabase {
        pub db: Database,
        _temp_dir: TempDir,
        db_path: PathBuf,
    }

    impl TestDatabase {
        /// Create a new test database in a temporary directory
        pub fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let db_path = temp_dir.path().join(DB_FILE);
            let db = Database::open(&db_path).expect("Failed to open test database");
            Self {
                db,
                db_path,
                _temp_dir: temp_dir,
            }
        }

        /// Create an in-memory database for fast tests
        pub fn in_memory() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let db = Database::open_in_memory().expect("Failed to open in-memory database");
            Self {
                db,
                db_path: PathBuf::new(),
                _temp_dir: temp_dir,
            }
        }

        /// Get the database directory path
        pub fn path(&self) -> &Path {
            self._temp_dir.path()
        }

        /// Get the full database file path
        pub fn db_path(&self) -> &Path {
            &self.db_path
        }
    }

    impl Default for TestDatabase {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Gateway test harness: the full router over an in-memory database
/// with mock session, role, and tool collaborators.
pub mod gateway {
    use std::sync::Arc;

    use axum::Router;
    use tokio::sync::Mutex;

    use taskboard_core::WorkspaceRole;
    use taskboard_gateway::{build_router, AppState, GatewayConfig, GatewayDependencies};
    use taskboard_storage::Database;

    use crate::mocks::{MockRoleDirectory, MockSessionResolver, MockToolExecutor};

    /// Default test workspace, user, and session cookie.
    pub const WORKSPACE: &str = "ws-1";
    pub const OWNER_USER: &str = "user-owner";
    pub const OWNER_COOKIE: &str = "session=owner-session";
    pub const MEMBER_USER: &str = "user-member";
    pub const MEMBER_COOKIE: &str = "session=member-session";

    pub struct TestGateway {
        pub router: Router,
        pub state: AppState,
        pub sessions: Arc<MockSessionResolver>,
        pub roles: Arc<MockRoleDirectory>,
        pub tools: Arc<MockToolExecutor>,
    }

    impl TestGateway {
        /// A gateway with an owner and a member already signed in.
        pub fn new() -> Self {
            let sessions = Arc::new(
                MockSessionResolver::new()
                    .with_user(OWNER_COOKIE, OWNER_USER)
                    .with_user(MEMBER_COOKIE, MEMBER_USER),
            );
            let roles = Arc::new(
                MockRoleDirectory::new()
                    .with_role(WORKSPACE, OWNER_USER, WorkspaceRole::Owner)
                    .with_role(WORKSPACE, MEMBER_USER, WorkspaceRole::Member),
            );
            let tools = Arc::new(MockToolExecutor::new());

            let database = Arc::new(Mutex::new(
                Database::open_in_memory().expect("Failed to open in-memory database"),
            ));

            let config = GatewayConfig::default();
            let state = AppState::new(
                &config,
                GatewayDependencies {
                    database,
                    sessions: sessions.clone(),
                    roles: roles.clone(),
                    tools: tools.clone(),
                },
            );

            let router = build_router(state.clone(), false);

            Self {
                router,
                state,
                sessions,
                roles,
                tools,
            }
        }

        pub fn base_url(&self) -> String {
            self.state.base_url.clone()
        }
    }

    impl Default for TestGateway {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Driving the router without a socket.
pub mod http {
    use axum::body::Body;
    use axum::http::{header, Method, Request, Response, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    /// Send a request through a clone of the router.
    pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("Router never fails");
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.expect("Body collects").to_bytes();
        Response::from_parts(parts, Body::from(bytes))
    }

    pub fn get(path: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .expect("Request builds")
    }

    pub fn get_with_cookie(path: &str, cookie: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .expect("Request builds")
    }

    pub fn post_form(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("Request builds")
    }

    pub fn post_form_with_cookie(path: &str, body: &str, cookie: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, cookie)
            .body(Body::from(body.to_string()))
            .expect("Request builds")
    }

    pub fn post_json(path: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Request builds")
    }

    pub fn post_json_with_bearer(path: &str, body: &Value, token: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(body.to_string()))
            .expect("Request builds")
    }

    pub fn patch_json_with_cookie(path: &str, body: &Value, cookie: &str) -> Request<Body> {
        Request::builder()
            .method(Method::PATCH)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, cookie)
            .body(Body::from(body.to_string()))
            .expect("Request builds")
    }

    pub fn delete_with_cookie(path: &str, cookie: &str) -> Request<Body> {
        Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .expect("Request builds")
    }

    /// Read the buffered response body as a UTF-8 string.
    pub async fn body_string(response: Response<Body>) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Body collects")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("Body is UTF-8")
    }

    /// Read the buffered response body as JSON.
    pub async fn body_json(response: Response<Body>) -> Value {
        let text = body_string(response).await;
        serde_json::from_str(&text).expect("Body is JSON")
    }

    /// The `Location` header of a redirect response.
    pub fn location(response: &Response<Body>) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .expect("Redirect carries a Location header")
            .to_str()
            .expect("Location is ASCII")
            .to_string()
    }

    /// Assert an OAuth JSON error body and return its description.
    pub async fn assert_oauth_error(
        response: Response<Body>,
        status: StatusCode,
        code: &str,
    ) -> String {
        assert_eq!(response.status(), status);
        let body = body_json(response).await;
        assert_eq!(body["error"], code);
        body["error_description"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }
}

/// OAuth flow helpers shared between the oauth and gateway suites.
pub mod flow {
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use url::Url;

    use taskboard_gateway::build_s256_code_challenge;

    use crate::gateway::{TestGateway, OWNER_COOKIE, WORKSPACE};
    use crate::http;

    pub const REDIRECT_URI: &str = "https://agent.example/callback";
    pub const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    pub fn default_scope() -> String {
        format!(
            "mcp:workspace:{} mcp:tool:create_task mcp:tool:list_tasks",
            WORKSPACE
        )
    }

    /// Register a client and return its client_id.
    pub async fn register_client(gw: &TestGateway, name: &str) -> String {
        let response = http::send(
            &gw.router,
            http::post_json(
                "/oauth/register",
                &json!({
                    "client_name": name,
                    "redirect_uris": [REDIRECT_URI],
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = http::body_json(response).await;
        body["client_id"].as_str().expect("client_id issued").to_string()
    }

    pub fn authorize_path(client_id: &str, scope: &str, state: &str) -> String {
        format!(
            "/oauth/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            urlenc(client_id),
            urlenc(REDIRECT_URI),
            urlenc(scope),
            urlenc(state),
            urlenc(&build_s256_code_challenge(VERIFIER)),
        )
    }

    /// The consent decision POST body approving the given tools.
    pub fn approval_body(client_id: &str, scope: &str, state: &str, tools: &[&str]) -> String {
        let mut body = format!(
            "response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256&decision=approve",
            urlenc(client_id),
            urlenc(REDIRECT_URI),
            urlenc(scope),
            urlenc(state),
            urlenc(&build_s256_code_challenge(VERIFIER)),
        );
        for tool in tools {
            body.push_str("&approved_tools=");
            body.push_str(&urlenc(tool));
        }
        body
    }

    /// Drive the consent approval and extract the code from the redirect.
    pub async fn approve_and_get_code(
        gw: &TestGateway,
        client_id: &str,
        scope: &str,
        tools: &[&str],
    ) -> String {
        let response = http::send(
            &gw.router,
            http::post_form_with_cookie(
                "/oauth/authorize",
                &approval_body(client_id, scope, "xyz", tools),
                OWNER_COOKIE,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = http::location(&response);
        assert!(location.starts_with(REDIRECT_URI));
        redirect_param(&location, "code").expect("Redirect carries a code")
    }

    /// Exchange an authorization code for a token response body.
    pub async fn exchange_code(gw: &TestGateway, client_id: &str, code: &str) -> Value {
        let body = format!(
            "grant_type=authorization_code&code={}&redirect_uri={}&client_id={}&code_verifier={}",
            urlenc(code),
            urlenc(REDIRECT_URI),
            urlenc(client_id),
            urlenc(VERIFIER),
        );
        let response = http::send(&gw.router, http::post_form("/oauth/token", &body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        http::body_json(response).await
    }

    /// Register, approve, and exchange in one step.
    pub async fn issue_tokens(gw: &TestGateway, name: &str, tools: &[&str]) -> (String, Value) {
        let client_id = register_client(gw, name).await;
        let code = approve_and_get_code(gw, &client_id, &default_scope(), tools).await;
        let tokens = exchange_code(gw, &client_id, &code).await;
        (client_id, tokens)
    }

    /// Pull one query parameter out of a redirect location.
    pub fn redirect_param(location: &str, name: &str) -> Option<String> {
        let url = Url::parse(location).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    fn urlenc(value: &str) -> String {
        url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
    }
}
