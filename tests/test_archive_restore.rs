mod common;

use std::time::Duration;

use common::{create_doc, id_of, titles};
use jotion::events::{QueryKey, StoreEvent};
use jotion::store::cascade::CascadeMode;

#[tokio::test]
async fn archive_cascades_to_descendants() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let root = create_doc(&server, "Root", None).await;
    let root_id = id_of(&root);
    let child = create_doc(&server, "Child", Some(&root_id)).await;
    let grandchild = create_doc(&server, "Grandchild", Some(&id_of(&child))).await;

    let response: serde_json::Value = server
        .post(&format!("/api/v1/documents/{root_id}/archive"))
        .await
        .json();

    assert_eq!(response["document"]["is_archived"].as_bool(), Some(true));
    assert_eq!(response["cascade"]["status"].as_str(), Some("completed"));
    let updated = response["cascade"]["updated"].as_array().unwrap();
    assert_eq!(updated.len(), 2);

    let trash: serde_json::Value = server.get("/api/v1/documents/trash").await.json();
    let mut trashed = titles(&trash);
    trashed.sort();
    assert_eq!(trashed, vec!["Child", "Grandchild", "Root"]);

    let sidebar: serde_json::Value = server.get("/api/v1/documents/sidebar").await.json();
    assert!(sidebar.as_array().unwrap().is_empty());

    // Archived documents stay readable by their owner
    let doc: serde_json::Value = server
        .get(&format!("/api/v1/documents/{}", id_of(&grandchild)))
        .await
        .json();
    assert_eq!(doc["is_archived"].as_bool(), Some(true));
}

#[tokio::test]
async fn restore_reattaches_whole_subtree() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let root = create_doc(&server, "Root", None).await;
    let root_id = id_of(&root);
    let child = create_doc(&server, "Child", Some(&root_id)).await;

    server
        .post(&format!("/api/v1/documents/{root_id}/archive"))
        .await
        .assert_status_ok();
    let response: serde_json::Value = server
        .post(&format!("/api/v1/documents/{root_id}/restore"))
        .await
        .json();
    assert_eq!(response["document"]["is_archived"].as_bool(), Some(false));

    let children: serde_json::Value = server
        .get("/api/v1/documents/sidebar")
        .add_query_param("parent_document", &root_id)
        .await
        .json();
    assert_eq!(titles(&children), vec!["Child"]);
    assert_eq!(id_of(&children[0]), id_of(&child));

    let trash: serde_json::Value = server.get("/api/v1/documents/trash").await.json();
    assert!(trash.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn restore_child_of_archived_parent_moves_to_root() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let root = create_doc(&server, "Root", None).await;
    let root_id = id_of(&root);
    let child = create_doc(&server, "Child", Some(&root_id)).await;
    let child_id = id_of(&child);

    server
        .post(&format!("/api/v1/documents/{root_id}/archive"))
        .await
        .assert_status_ok();

    let response: serde_json::Value = server
        .post(&format!("/api/v1/documents/{child_id}/restore"))
        .await
        .json();
    assert!(response["document"].get("parent_document").is_none());

    let roots: serde_json::Value = server.get("/api/v1/documents/sidebar").await.json();
    assert_eq!(titles(&roots), vec!["Child"]);

    // The parent is still in the trash
    let trash: serde_json::Value = server.get("/api/v1/documents/trash").await.json();
    assert_eq!(titles(&trash), vec!["Root"]);
}

#[tokio::test]
async fn restore_child_of_deleted_parent_keeps_reference() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let root = create_doc(&server, "Root", None).await;
    let root_id = id_of(&root);
    let child = create_doc(&server, "Child", Some(&root_id)).await;

    server
        .post(&format!("/api/v1/documents/{root_id}/archive"))
        .await
        .assert_status_ok();
    server
        .delete(&format!("/api/v1/documents/{root_id}"))
        .await
        .assert_status_ok();

    let response: serde_json::Value = server
        .post(&format!("/api/v1/documents/{}/restore", id_of(&child)))
        .await
        .json();
    assert_eq!(response["document"]["parent_document"], root_id.as_str());
    assert_eq!(response["document"]["is_archived"], false);

    // An orphan is not a root, but search still finds it
    let roots: serde_json::Value = server.get("/api/v1/documents/sidebar").await.json();
    assert!(titles(&roots).is_empty());
    let search: serde_json::Value = server.get("/api/v1/documents/search").await.json();
    assert_eq!(titles(&search), vec!["Child"]);
}

#[tokio::test]
async fn archive_other_users_document_is_forbidden() {
    let env = common::TestEnv::start();
    let alice = env.server_as("alice").await;
    let bob = env.server_as("bob").await;

    let doc = create_doc(&alice, "Alice's", None).await;
    let id = id_of(&doc);

    bob.post(&format!("/api/v1/documents/{id}/archive"))
        .await
        .assert_status_forbidden();
    bob.post(&format!("/api/v1/documents/{id}/restore"))
        .await
        .assert_status_forbidden();
    bob.post("/api/v1/documents/missing/archive")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn background_cascade_reports_pending_then_completes() {
    let env = common::TestEnv::with_cascade(CascadeMode::Background);
    let server = env.server_as("alice").await;

    let root = create_doc(&server, "Root", None).await;
    let root_id = id_of(&root);
    let child = create_doc(&server, "Child", Some(&root_id)).await;

    let mut trash = env.store.events().subscribe(QueryKey::Trash {
        user_id: "demo-alice".into(),
    });

    let response: serde_json::Value = server
        .post(&format!("/api/v1/documents/{root_id}/archive"))
        .await
        .json();
    assert_eq!(response["document"]["is_archived"].as_bool(), Some(true));
    assert_eq!(response["cascade"]["status"].as_str(), Some("pending"));

    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = trash.recv().await {
            if let StoreEvent::CascadeCompleted { root_id, updated, .. } = event {
                return Some((root_id, updated));
            }
        }
        None
    })
    .await
    .expect("cascade did not complete in time")
    .expect("event stream closed");

    assert_eq!(completed.0, root_id);
    assert_eq!(completed.1, vec![id_of(&child)]);

    let doc: serde_json::Value = server
        .get(&format!("/api/v1/documents/{}", id_of(&child)))
        .await
        .json();
    assert_eq!(doc["is_archived"].as_bool(), Some(true));
}
