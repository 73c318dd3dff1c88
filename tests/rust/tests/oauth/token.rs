//! Token endpoint tests: code exchange, PKCE, single-use enforcement,
//! and refresh rotation.

use axum::http::{header, StatusCode};
use pretty_assertions::assert_eq;

use taskboard_gateway::authenticate_access_token;
use tests::flow::{
    approve_and_get_code, default_scope, exchange_code, issue_tokens, register_client,
    REDIRECT_URI, VERIFIER,
};
use tests::gateway::{TestGateway, OWNER_USER, WORKSPACE};
use tests::http;

fn exchange_body(client_id: &str, code: &str, verifier: &str) -> String {
    format!(
        "grant_type=authorization_code&code={}&redirect_uri={}&client_id={}&code_verifier={}",
        urlencoding::encode(code),
        urlencoding::encode(REDIRECT_URI),
        urlencoding::encode(client_id),
        urlencoding::encode(verifier),
    )
}

#[tokio::test]
async fn test_code_exchange_issues_a_token_pair() {
    let gw = TestGateway::new();
    let client_id = register_client(&gw, "Agent One").await;
    let code =
        approve_and_get_code(&gw, &client_id, &default_scope(), &["create_task", "list_tasks"])
            .await;

    let response = http::send(
        &gw.router,
        http::post_form("/oauth/token", &exchange_body(&client_id, &code, VERIFIER)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok()),
        Some("no-store")
    );

    let body = http::body_json(response).await;
    assert!(body["access_token"].as_str().unwrap().starts_with("tb_at_"));
    assert!(body["refresh_token"].as_str().unwrap().starts_with("tb_rt_"));
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert_eq!(
        body["scope"],
        format!(
            "mcp:workspace:{} mcp:tool:create_task mcp:tool:list_tasks",
            WORKSPACE
        )
    );
}

#[tokio::test]
async fn test_issued_token_resolves_to_the_granting_user() {
    let gw = TestGateway::new();
    let (client_id, tokens) = issue_tokens(&gw, "Agent One", &["create_task"]).await;

    let context = authenticate_access_token(&gw.state, tokens["access_token"].as_str().unwrap())
        .await
        .unwrap();

    assert_eq!(context.workspace_id, WORKSPACE);
    assert_eq!(context.user_id, OWNER_USER);
    assert_eq!(context.client_id, client_id);
    assert!(context.tool_permissions.contains("create_task"));
    assert_eq!(context.tool_permissions.len(), 1);
}

#[tokio::test]
async fn test_partial_approval_narrows_the_grant() {
    let gw = TestGateway::new();
    let client_id = register_client(&gw, "Agent One").await;

    // Request two tools, approve one.
    let code = approve_and_get_code(&gw, &client_id, &default_scope(), &["list_tasks"]).await;
    let tokens = exchange_code(&gw, &client_id, &code).await;

    assert_eq!(
        tokens["scope"],
        format!("mcp:workspace:{} mcp:tool:list_tasks", WORKSPACE)
    );
}

#[tokio::test]
async fn test_tampered_approval_cannot_widen_the_grant() {
    let gw = TestGateway::new();
    let client_id = register_client(&gw, "Agent One").await;

    // "delete_task" was never requested; the form field is dropped.
    let code = approve_and_get_code(
        &gw,
        &client_id,
        &default_scope(),
        &["create_task", "delete_task"],
    )
    .await;
    let tokens = exchange_code(&gw, &client_id, &code).await;

    assert_eq!(
        tokens["scope"],
        format!("mcp:workspace:{} mcp:tool:create_task", WORKSPACE)
    );
}

#[tokio::test]
async fn test_wrong_verifier_is_invalid_grant() {
    let gw = TestGateway::new();
    let client_id = register_client(&gw, "Agent One").await;
    let code = approve_and_get_code(&gw, &client_id, &default_scope(), &["create_task"]).await;

    let response = http::send(
        &gw.router,
        http::post_form(
            "/oauth/token",
            &exchange_body(&client_id, &code, "wrong-verifier-wrong-verifier-wrong-verifi"),
        ),
    )
    .await;
    http::assert_oauth_error(response, StatusCode::BAD_REQUEST, "invalid_grant").await;
}

#[tokio::test]
async fn test_code_reuse_is_invalid_grant() {
    let gw = TestGateway::new();
    let client_id = register_client(&gw, "Agent One").await;
    let code = approve_and_get_code(&gw, &client_id, &default_scope(), &["create_task"]).await;

    exchange_code(&gw, &client_id, &code).await;

    let response = http::send(
        &gw.router,
        http::post_form("/oauth/token", &exchange_body(&client_id, &code, VERIFIER)),
    )
    .await;
    http::assert_oauth_error(response, StatusCode::BAD_REQUEST, "invalid_grant").await;
}

#[tokio::test]
async fn test_racing_exchanges_mint_exactly_one_token() {
    let gw = TestGateway::new();
    let client_id = register_client(&gw, "Agent One").await;
    let code = approve_and_get_code(&gw, &client_id, &default_scope(), &["create_task"]).await;

    let body = exchange_body(&client_id, &code, VERIFIER);
    let (a, b) = tokio::join!(
        http::send(&gw.router, http::post_form("/oauth/token", &body)),
        http::send(&gw.router, http::post_form("/oauth/token", &body)),
    );

    let winners = [a.status(), b.status()]
        .iter()
        .filter(|s| **s == StatusCode::OK)
        .count();
    assert_eq!(winners, 1, "Exactly one exchange may win");
}

#[tokio::test]
async fn test_code_is_bound_to_the_issuing_client() {
    let gw = TestGateway::new();
    let client_a = register_client(&gw, "Agent One").await;
    let client_b = register_client(&gw, "Agent Two").await;
    let code = approve_and_get_code(&gw, &client_a, &default_scope(), &["create_task"]).await;

    let response = http::send(
        &gw.router,
        http::post_form("/oauth/token", &exchange_body(&client_b, &code, VERIFIER)),
    )
    .await;
    http::assert_oauth_error(response, StatusCode::BAD_REQUEST, "invalid_grant").await;
}

#[tokio::test]
async fn test_redirect_uri_must_match_at_exchange() {
    let gw = TestGateway::new();
    let client_id = register_client(&gw, "Agent One").await;
    let code = approve_and_get_code(&gw, &client_id, &default_scope(), &["create_task"]).await;

    let body = format!(
        "grant_type=authorization_code&code={}&redirect_uri=https%3A%2F%2Fother.example%2Fcb&client_id={}&code_verifier={}",
        urlencoding::encode(&code),
        urlencoding::encode(&client_id),
        urlencoding::encode(VERIFIER),
    );
    let response = http::send(&gw.router, http::post_form("/oauth/token", &body)).await;
    http::assert_oauth_error(response, StatusCode::BAD_REQUEST, "invalid_grant").await;
}

#[tokio::test]
async fn test_unsupported_grant_type() {
    let gw = TestGateway::new();

    let response = http::send(
        &gw.router,
        http::post_form("/oauth/token", "grant_type=client_credentials"),
    )
    .await;
    http::assert_oauth_error(response, StatusCode::BAD_REQUEST, "unsupported_grant_type").await;
}

// =============================================================================
// Refresh grant
// =============================================================================

fn refresh_body(client_id: &str, refresh_token: &str, scope: Option<&str>) -> String {
    let mut body = format!(
        "grant_type=refresh_token&refresh_token={}&client_id={}",
        urlencoding::encode(refresh_token),
        urlencoding::encode(client_id),
    );
    if let Some(scope) = scope {
        body.push_str("&scope=");
        body.push_str(&urlencoding::encode(scope));
    }
    body
}

#[tokio::test]
async fn test_refresh_rotates_the_access_token() {
    let gw = TestGateway::new();
    let (client_id, tokens) = issue_tokens(&gw, "Agent One", &["create_task", "list_tasks"]).await;
    let old_access = tokens["access_token"].as_str().unwrap();
    let refresh = tokens["refresh_token"].as_str().unwrap();

    let response = http::send(
        &gw.router,
        http::post_form("/oauth/token", &refresh_body(&client_id, refresh, None)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = http::body_json(response).await;

    let new_access = refreshed["access_token"].as_str().unwrap();
    assert_ne!(new_access, old_access);
    // The refresh token itself is stable.
    assert_eq!(refreshed["refresh_token"].as_str().unwrap(), refresh);
    // Omitted scope keeps the original grant.
    assert_eq!(refreshed["scope"], tokens["scope"]);

    // The rotated-out access token no longer authenticates.
    assert!(authenticate_access_token(&gw.state, old_access).await.is_err());
    assert!(authenticate_access_token(&gw.state, new_access).await.is_ok());
}

#[tokio::test]
async fn test_refresh_may_narrow_but_never_widen() {
    let gw = TestGateway::new();
    let (client_id, tokens) = issue_tokens(&gw, "Agent One", &["create_task", "list_tasks"]).await;
    let refresh = tokens["refresh_token"].as_str().unwrap();

    let narrow = format!("mcp:workspace:{} mcp:tool:list_tasks", WORKSPACE);
    let response = http::send(
        &gw.router,
        http::post_form(
            "/oauth/token",
            &refresh_body(&client_id, refresh, Some(&narrow)),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = http::body_json(response).await;
    assert_eq!(refreshed["scope"], narrow);

    let wide = format!(
        "mcp:workspace:{} mcp:tool:create_task mcp:tool:delete_task",
        WORKSPACE
    );
    let response = http::send(
        &gw.router,
        http::post_form(
            "/oauth/token",
            &refresh_body(&client_id, refresh, Some(&wide)),
        ),
    )
    .await;
    http::assert_oauth_error(response, StatusCode::BAD_REQUEST, "invalid_scope").await;
}

#[tokio::test]
async fn test_refresh_with_unknown_token_is_invalid_grant() {
    let gw = TestGateway::new();
    let client_id = register_client(&gw, "Agent One").await;

    let response = http::send(
        &gw.router,
        http::post_form(
            "/oauth/token",
            &refresh_body(&client_id, "tb_rt_not-a-real-token", None),
        ),
    )
    .await;
    http::assert_oauth_error(response, StatusCode::BAD_REQUEST, "invalid_grant").await;
}

#[tokio::test]
async fn test_access_token_cannot_be_used_as_refresh_token() {
    let gw = TestGateway::new();
    let (client_id, tokens) = issue_tokens(&gw, "Agent One", &["create_task"]).await;
    let access = tokens["access_token"].as_str().unwrap();

    let response = http::send(
        &gw.router,
        http::post_form("/oauth/token", &refresh_body(&client_id, access, None)),
    )
    .await;
    http::assert_oauth_error(response, StatusCode::BAD_REQUEST, "invalid_grant").await;
}

#[tokio::test]
async fn test_refresh_is_bound_to_the_issuing_client() {
    let gw = TestGateway::new();
    let (_, tokens) = issue_tokens(&gw, "Agent One", &["create_task"]).await;
    let other = register_client(&gw, "Agent Two").await;

    let response = http::send(
        &gw.router,
        http::post_form(
            "/oauth/token",
            &refresh_body(&other, tokens["refresh_token"].as_str().unwrap(), None),
        ),
    )
    .await;
    http::assert_oauth_error(response, StatusCode::BAD_REQUEST, "invalid_grant").await;
}
