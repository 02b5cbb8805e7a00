#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::{Duration, Utc};

use jotion::app::{build_router, AppState};
use jotion::auth::config::AuthConfig;
use jotion::auth::jwt::issue_token;
use jotion::auth::models::AuthenticatedUser;
use jotion::db::memory::MemoryDocumentRepository;
use jotion::db::repository::DocumentRepository;
use jotion::events::EventHub;
use jotion::storage::client::{MemoryStorageClient, StorageClient};
use jotion::store::cascade::CascadeMode;
use jotion::store::DocumentStore;

pub const JWT_SECRET: &str = "test-secret";
pub const JWT_ISSUER: &str = "jotion-test";

/// In-memory application wired the same way the binary wires it.
///
/// Both bearer tokens and the demo cookie are accepted.
pub struct TestEnv {
    pub router: Router,
    pub repo: Arc<dyn DocumentRepository>,
    pub storage: Arc<dyn StorageClient>,
    pub store: DocumentStore,
}

impl TestEnv {
    /// Build an environment whose cascades finish before archive/restore return.
    pub fn start() -> Self {
        Self::with_cascade(CascadeMode::Inline)
    }

    pub fn with_cascade(mode: CascadeMode) -> Self {
        let repo: Arc<dyn DocumentRepository> = Arc::new(MemoryDocumentRepository::new());
        let storage: Arc<dyn StorageClient> = Arc::new(MemoryStorageClient::new());
        let store = DocumentStore::new(repo.clone(), EventHub::default(), mode);

        let auth = AuthConfig::new(
            Some(JWT_SECRET.to_string()),
            Some(JWT_ISSUER.to_string()),
            true,
        );
        let app_state = AppState::new(store.clone(), storage.clone(), auth);
        let router = build_router(app_state, &[]);

        Self {
            router,
            repo,
            storage,
            store,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .expect_success_by_default()
            .build(self.router.clone())
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .build(self.router.clone())
    }

    /// Build a permissive server already logged in as a demo user.
    pub async fn server_as(&self, username: &str) -> axum_test::TestServer {
        let server = self.server_permissive();
        login(&server, username).await;
        server
    }
}

/// Log in through the demo endpoint; the cookie is kept by the server.
pub async fn login(server: &axum_test::TestServer, username: &str) {
    server
        .post("/api/auth/login")
        .json(&serde_json::json!({
            "username": username,
            "password": username
        }))
        .await
        .assert_status_ok();
}

/// Issue a bearer token the test environment accepts.
pub fn token_for(user: &AuthenticatedUser) -> String {
    issue_token(
        user,
        JWT_SECRET,
        Some(JWT_ISSUER),
        Utc::now() + Duration::minutes(10),
    )
    .expect("Failed to issue token")
}

/// Helper: create a document via the API and return its JSON body.
pub async fn create_doc(
    server: &axum_test::TestServer,
    title: &str,
    parent: Option<&str>,
) -> serde_json::Value {
    let response = server
        .post("/api/v1/documents")
        .json(&serde_json::json!({
            "title": title,
            "parent_document": parent
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json()
}

/// The `_id` of a document JSON body.
pub fn id_of(doc: &serde_json::Value) -> String {
    doc["_id"].as_str().expect("document has an id").to_string()
}

/// Titles of a JSON array of documents, in response order.
pub fn titles(docs: &serde_json::Value) -> Vec<String> {
    docs.as_array()
        .expect("expected an array")
        .iter()
        .map(|d| d["title"].as_str().unwrap_or_default().to_string())
        .collect()
}
