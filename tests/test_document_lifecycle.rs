mod common;

use common::{create_doc, id_of, titles};

#[tokio::test]
async fn create_then_list_in_sidebar() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let root = create_doc(&server, "Projects", None).await;
    assert_eq!(root["title"].as_str(), Some("Projects"));
    assert_eq!(root["user_id"].as_str(), Some("demo-alice"));
    assert_eq!(root["is_archived"].as_bool(), Some(false));
    assert_eq!(root["is_published"].as_bool(), Some(false));
    assert!(root.get("parent_document").is_none());

    let root_id = id_of(&root);
    create_doc(&server, "Roadmap", Some(&root_id)).await;
    create_doc(&server, "Budget", Some(&root_id)).await;

    let roots: serde_json::Value = server.get("/api/v1/documents/sidebar").await.json();
    assert_eq!(titles(&roots), vec!["Projects"]);

    let children: serde_json::Value = server
        .get("/api/v1/documents/sidebar")
        .add_query_param("parent_document", &root_id)
        .await
        .json();
    // Newest first
    assert_eq!(titles(&children), vec!["Budget", "Roadmap"]);
}

#[tokio::test]
async fn empty_parent_query_lists_roots() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let root = create_doc(&server, "Root", None).await;
    create_doc(&server, "Child", Some(&id_of(&root))).await;

    let roots: serde_json::Value = server
        .get("/api/v1/documents/sidebar")
        .add_query_param("parent_document", "")
        .await
        .json();
    assert_eq!(titles(&roots), vec!["Root"]);
}

#[tokio::test]
async fn blank_title_becomes_untitled() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let doc = create_doc(&server, "   ", None).await;
    assert_eq!(doc["title"].as_str(), Some("Untitled"));

    let updated: serde_json::Value = server
        .patch(&format!("/api/v1/documents/{}", id_of(&doc)))
        .json(&serde_json::json!({ "title": "" }))
        .await
        .json();
    assert_eq!(updated["title"].as_str(), Some("Untitled"));
}

#[tokio::test]
async fn update_applies_only_given_fields() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let doc = create_doc(&server, "Draft", None).await;
    let id = id_of(&doc);

    server
        .patch(&format!("/api/v1/documents/{id}"))
        .json(&serde_json::json!({ "content": "[{\"type\":\"paragraph\"}]", "icon": "📝" }))
        .await
        .assert_status_ok();

    let updated: serde_json::Value = server
        .patch(&format!("/api/v1/documents/{id}"))
        .json(&serde_json::json!({ "title": "Final" }))
        .await
        .json();

    assert_eq!(updated["title"].as_str(), Some("Final"));
    assert_eq!(updated["content"].as_str(), Some("[{\"type\":\"paragraph\"}]"));
    assert_eq!(updated["icon"].as_str(), Some("📝"));
}

#[tokio::test]
async fn get_unknown_id_returns_null() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let response = server.get("/api/v1/documents/does-not-exist").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body.is_null());
}

#[tokio::test]
async fn other_users_private_document_is_forbidden() {
    let env = common::TestEnv::start();
    let alice = env.server_as("alice").await;
    let bob = env.server_as("bob").await;

    let doc = create_doc(&alice, "Diary", None).await;
    let id = id_of(&doc);

    bob.get(&format!("/api/v1/documents/{id}"))
        .await
        .assert_status_forbidden();
    bob.patch(&format!("/api/v1/documents/{id}"))
        .json(&serde_json::json!({ "title": "Mine now" }))
        .await
        .assert_status_forbidden();
    bob.delete(&format!("/api/v1/documents/{id}"))
        .await
        .assert_status_forbidden();

    let bobs_docs: serde_json::Value = bob.get("/api/v1/documents/search").await.json();
    assert!(bobs_docs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn anonymous_cannot_read_private_document() {
    let env = common::TestEnv::start();
    let alice = env.server_as("alice").await;
    let anonymous = env.server_permissive();

    let doc = create_doc(&alice, "Private", None).await;

    anonymous
        .get(&format!("/api/v1/documents/{}", id_of(&doc)))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn remove_deletes_only_that_document() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let parent = create_doc(&server, "Parent", None).await;
    let parent_id = id_of(&parent);
    let child = create_doc(&server, "Child", Some(&parent_id)).await;

    let removed: serde_json::Value = server
        .delete(&format!("/api/v1/documents/{parent_id}"))
        .await
        .json();
    assert_eq!(id_of(&removed), parent_id);

    let gone: serde_json::Value = server
        .get(&format!("/api/v1/documents/{parent_id}"))
        .await
        .json();
    assert!(gone.is_null());

    // The child survives with its dangling parent reference
    let orphan: serde_json::Value = server
        .get(&format!("/api/v1/documents/{}", id_of(&child)))
        .await
        .json();
    assert_eq!(orphan["parent_document"].as_str(), Some(parent_id.as_str()));

    server
        .delete(&format!("/api/v1/documents/{parent_id}"))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn search_lists_every_active_document() {
    let env = common::TestEnv::start();
    let server = env.server_as("alice").await;

    let root = create_doc(&server, "A", None).await;
    create_doc(&server, "B", Some(&id_of(&root))).await;
    let archived = create_doc(&server, "C", None).await;
    server
        .post(&format!("/api/v1/documents/{}/archive", id_of(&archived)))
        .await
        .assert_status_ok();

    let search: serde_json::Value = server.get("/api/v1/documents/search").await.json();
    assert_eq!(titles(&search), vec!["B", "A"]);
}
