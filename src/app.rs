use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{documents, events, upload};
use crate::auth::config::AuthConfig;
use crate::auth::demo_auth;
use crate::storage::client::StorageClient;
use crate::store::DocumentStore;

/// Shared application state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: DocumentStore,
    pub storage_client: Arc<dyn StorageClient>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(store: DocumentStore, storage_client: Arc<dyn StorageClient>, auth: AuthConfig) -> Self {
        Self {
            store,
            storage_client,
            auth: Arc::new(auth),
        }
    }
}

/// Build the full HTTP router.
///
/// `cors_origins` lists browser origins allowed to call the API with
/// credentials; when empty no CORS layer is installed.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/documents", post(documents::create_handler))
        .route("/api/v1/documents/sidebar", get(documents::sidebar_handler))
        .route("/api/v1/documents/search", get(documents::search_handler))
        .route("/api/v1/documents/trash", get(documents::trash_handler))
        .route(
            "/api/v1/documents/{id}",
            get(documents::get_handler)
                .patch(documents::update_handler)
                .delete(documents::remove_handler),
        )
        .route(
            "/api/v1/documents/{id}/icon",
            delete(documents::remove_icon_handler),
        )
        .route(
            "/api/v1/documents/{id}/cover-image",
            delete(documents::remove_cover_image_handler),
        )
        .route(
            "/api/v1/documents/{id}/archive",
            post(documents::archive_handler),
        )
        .route(
            "/api/v1/documents/{id}/restore",
            post(documents::restore_handler),
        )
        .route("/api/v1/preview/{id}", get(documents::preview_handler))
        .route("/api/v1/events", get(events::events_handler))
        .route("/api/v1/upload-image", post(upload::upload_image_handler))
        .route(
            "/api/v1/image/{filename}",
            get(upload::serve_image_handler),
        )
        .route("/api/v1/image", delete(upload::delete_image_handler))
        .route("/api/auth/login", post(demo_auth::login_handler))
        .route("/api/auth/me", get(demo_auth::me_handler))
        .route("/api/auth/logout", post(demo_auth::logout_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match cors_layer(cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

async fn health_handler() -> &'static str {
    "ok"
}
