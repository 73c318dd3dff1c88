//! Consent repository tests

use pretty_assertions::assert_eq;
use taskboard_storage::{ClientRepository, ConsentRepository};

use crate::{test_client, test_db};

fn tools(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_upsert_creates_and_returns_row() {
    let db = test_db();
    let clients = ClientRepository::new(db.clone());
    let consents = ConsentRepository::new(db);

    clients
        .save_client(&test_client("c-int", "tb_abc"))
        .await
        .unwrap();

    let consent = consents
        .upsert(
            "user-1",
            "ws-1",
            "c-int",
            &tools(&["create_task", "list_tasks"]),
            "owner",
        )
        .await
        .unwrap();

    assert_eq!(consent.user_id, "user-1");
    assert_eq!(consent.workspace_id, "ws-1");
    assert_eq!(consent.tool_scopes, tools(&["create_task", "list_tasks"]));
    assert_eq!(consent.granted_by_role, "owner");
}

#[tokio::test]
async fn test_reapproval_updates_the_same_row() {
    let db = test_db();
    let clients = ClientRepository::new(db.clone());
    let consents = ConsentRepository::new(db);

    clients
        .save_client(&test_client("c-int", "tb_abc"))
        .await
        .unwrap();

    let first = consents
        .upsert("user-1", "ws-1", "c-int", &tools(&["create_task"]), "owner")
        .await
        .unwrap();
    let second = consents
        .upsert(
            "user-1",
            "ws-1",
            "c-int",
            &tools(&["create_task", "add_comment"]),
            "admin",
        )
        .await
        .unwrap();

    // Same (user, workspace, client) triple keeps the same row.
    assert_eq!(first.id, second.id);
    assert_eq!(second.tool_scopes, tools(&["create_task", "add_comment"]));
    assert_eq!(second.granted_by_role, "admin");

    let listed = consents.list_for_workspace("ws-1").await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_list_joins_client_metadata() {
    let db = test_db();
    let clients = ClientRepository::new(db.clone());
    let consents = ConsentRepository::new(db);

    clients
        .save_client(&test_client("c-int", "tb_abc"))
        .await
        .unwrap();
    consents
        .upsert("user-1", "ws-1", "c-int", &tools(&["create_task"]), "owner")
        .await
        .unwrap();

    // A consent in a different workspace must not appear.
    consents
        .upsert("user-1", "ws-2", "c-int", &tools(&["list_tasks"]), "owner")
        .await
        .unwrap();

    let listed = consents.list_for_workspace("ws-1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].client_id, "tb_abc");
    assert_eq!(listed[0].client_name, "Client tb_abc");
    assert_eq!(listed[0].tool_scopes, tools(&["create_task"]));
    assert_eq!(listed[0].granted_by_role, "owner");
}

#[tokio::test]
async fn test_update_tool_scopes() {
    let db = test_db();
    let clients = ClientRepository::new(db.clone());
    let consents = ConsentRepository::new(db);

    clients
        .save_client(&test_client("c-int", "tb_abc"))
        .await
        .unwrap();
    let consent = consents
        .upsert(
            "user-1",
            "ws-1",
            "c-int",
            &tools(&["create_task", "list_tasks"]),
            "owner",
        )
        .await
        .unwrap();

    let changed = consents
        .update_tool_scopes(&consent.id, &tools(&["list_tasks"]))
        .await
        .unwrap();
    assert!(changed);

    let reloaded = consents.get(&consent.id).await.unwrap().unwrap();
    assert_eq!(reloaded.tool_scopes, tools(&["list_tasks"]));
}

#[tokio::test]
async fn test_update_unknown_consent_changes_nothing() {
    let consents = ConsentRepository::new(test_db());
    let changed = consents
        .update_tool_scopes("missing", &tools(&["list_tasks"]))
        .await
        .unwrap();
    assert!(!changed);
}

#[tokio::test]
async fn test_delete_returns_the_deleted_row() {
    let db = test_db();
    let clients = ClientRepository::new(db.clone());
    let consents = ConsentRepository::new(db);

    clients
        .save_client(&test_client("c-int", "tb_abc"))
        .await
        .unwrap();
    let consent = consents
        .upsert("user-1", "ws-1", "c-int", &tools(&["create_task"]), "owner")
        .await
        .unwrap();

    let deleted = consents.delete(&consent.id).await.unwrap().unwrap();
    assert_eq!(deleted.user_id, "user-1");
    assert_eq!(deleted.client_id, "c-int");

    assert!(consents.get(&consent.id).await.unwrap().is_none());
    assert!(consents.delete(&consent.id).await.unwrap().is_none());
}
