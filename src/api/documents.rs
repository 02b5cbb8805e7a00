//! HTTP handlers for the document store.
//!
//! Handlers only extract arguments and serialize results; every rule lives
//! in [`DocumentStore`](crate::store::DocumentStore).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::middleware::Principal;
use crate::db::models::{CreateDocumentRequest, Document, DocumentPatch};
use crate::error::AppError;
use crate::store::cascade::{Cascade, CascadeOutcome};

/// Query string of the sidebar listing.
#[derive(Debug, Default, Deserialize)]
pub struct SidebarQuery {
    /// Parent whose children to list; absent or empty lists the roots.
    #[serde(default)]
    pub parent_document: Option<String>,
}

/// State of an archive/restore cascade as reported to the client.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CascadeStatus {
    /// Every descendant already carries the new state.
    Completed { updated: Vec<String> },
    /// Descendants are still being written; watch the events stream.
    Pending,
}

/// Response body of archive and restore.
#[derive(Debug, Serialize, Deserialize)]
pub struct CascadeResponse {
    pub document: Document,
    pub cascade: CascadeStatus,
}

impl From<CascadeOutcome> for CascadeResponse {
    fn from(outcome: CascadeOutcome) -> Self {
        let cascade = match outcome.cascade {
            Cascade::Completed(report) => CascadeStatus::Completed {
                updated: report.updated,
            },
            // The task keeps running after its handle is dropped
            Cascade::Pending(_) => CascadeStatus::Pending,
        };
        Self {
            document: outcome.document,
            cascade,
        }
    }
}

/// Read-only projection served to public preview pages.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub is_published: bool,
}

impl From<Document> for PreviewDocument {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            content: doc.content,
            cover_image: doc.cover_image,
            icon: doc.icon,
            is_published: doc.is_published,
        }
    }
}

/// `POST /api/v1/documents`
pub async fn create_handler(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let doc = state.store.create(principal.user(), request).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// `GET /api/v1/documents/sidebar`
pub async fn sidebar_handler(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<SidebarQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let parent = query.parent_document.as_deref().filter(|p| !p.is_empty());
    let docs = state.store.get_sidebar(principal.user(), parent).await?;
    Ok(Json(docs))
}

/// `GET /api/v1/documents/search`
pub async fn search_handler(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.store.get_search(principal.user()).await?))
}

/// `GET /api/v1/documents/trash`
pub async fn trash_handler(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.store.get_trash(principal.user()).await?))
}

/// `GET /api/v1/documents/{id}`, `null` when the id does not resolve.
pub async fn get_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Option<Document>>, AppError> {
    Ok(Json(state.store.get_by_id(principal.user(), &id).await?))
}

/// `PATCH /api/v1/documents/{id}`
pub async fn update_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(patch): Json<DocumentPatch>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(state.store.update(principal.user(), &id, patch).await?))
}

/// `DELETE /api/v1/documents/{id}`
pub async fn remove_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(state.store.remove(principal.user(), &id).await?))
}

/// `DELETE /api/v1/documents/{id}/icon`
pub async fn remove_icon_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(state.store.remove_icon(principal.user(), &id).await?))
}

/// `DELETE /api/v1/documents/{id}/cover-image`
///
/// Only clears the field; the client deletes the stored image separately.
pub async fn remove_cover_image_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(state.store.remove_cover_image(principal.user(), &id).await?))
}

/// `POST /api/v1/documents/{id}/archive`
pub async fn archive_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<CascadeResponse>, AppError> {
    let outcome = state.store.archive(principal.user(), &id).await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/v1/documents/{id}/restore`
pub async fn restore_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<CascadeResponse>, AppError> {
    let outcome = state.store.restore(principal.user(), &id).await?;
    Ok(Json(outcome.into()))
}

/// `GET /api/v1/preview/{id}`
///
/// Same visibility as [`get_handler`]: public documents for anyone, any
/// document for its owner. Missing documents and anonymous callers on a
/// private one get 404, a signed-in stranger gets 403. The owner id is not
/// exposed.
pub async fn preview_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<PreviewDocument>, AppError> {
    let doc = match state.store.get_by_id(principal.user(), &id).await {
        Ok(doc) => doc,
        Err(AppError::Unauthenticated(_)) => None,
        Err(e) => return Err(e),
    };

    doc.map(|doc| Json(doc.into()))
        .ok_or_else(|| AppError::NotFound("Document not found".into()))
}
