//! Storage layer test suite.

mod consents;

use std::sync::Arc;
use tokio::sync::Mutex;

use tests::{ClientRecord, Database, TokenRecord, TokenType};

/// A fresh in-memory database behind the handle the repositories take.
pub fn test_db() -> Arc<Mutex<Database>> {
    Arc::new(Mutex::new(
        Database::open_in_memory().expect("Failed to open in-memory database"),
    ))
}

/// A client row satisfying the foreign keys of codes, consents, tokens.
pub fn test_client(internal_id: &str, client_id: &str) -> ClientRecord {
    let now = taskboard_storage::now_timestamp();
    ClientRecord {
        id: internal_id.to_string(),
        client_id: client_id.to_string(),
        client_name: format!("Client {}", client_id),
        redirect_uris: vec!["https://agent.example/callback".to_string()],
        created_at: now.clone(),
        updated_at: now,
    }
}

/// A token row bound to the given client's internal id.
pub fn test_token(
    id: &str,
    token_type: TokenType,
    plaintext: &str,
    client_internal_id: &str,
    parent_token_id: Option<&str>,
) -> TokenRecord {
    TokenRecord {
        id: id.to_string(),
        token_type,
        token_hash: taskboard_storage::TokenRepository::hash_token(plaintext),
        token_prefix: plaintext.chars().take(12).collect(),
        client_id: client_internal_id.to_string(),
        user_id: "user-1".to_string(),
        workspace_id: "ws-1".to_string(),
        tool_scopes: vec!["create_task".to_string(), "list_tasks".to_string()],
        expires_at: None,
        revoked_at: None,
        parent_token_id: parent_token_id.map(String::from),
        created_at: taskboard_storage::now_timestamp(),
    }
}
