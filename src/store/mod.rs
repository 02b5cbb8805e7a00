//! The document store: every operation the client views call.
//!
//! Each operation receives the optional request principal and applies the
//! authorization gate in [`access`] before touching the repository. Writes
//! publish a [`StoreEvent`] so subscribed queries can refresh.

pub mod access;
pub mod cascade;

use std::sync::Arc;

use crate::auth::models::AuthenticatedUser;
use crate::db::models::{CreateDocumentRequest, Document, DocumentChanges, DocumentPatch};
use crate::db::repository::DocumentRepository;
use crate::error::AppError;
use crate::events::{EventHub, QueryKey, StoreEvent, Subscription};

use self::access::{authorize_read, ensure_owner, require_principal};
use self::cascade::{
    cascade_archived, Cascade, CascadeMode, CascadeOutcome, CascadeReport, PendingCascade,
};

#[derive(Clone)]
pub struct DocumentStore {
    repo: Arc<dyn DocumentRepository>,
    events: EventHub,
    cascade_mode: CascadeMode,
}

impl DocumentStore {
    pub fn new(repo: Arc<dyn DocumentRepository>, events: EventHub, cascade_mode: CascadeMode) -> Self {
        Self {
            repo,
            events,
            cascade_mode,
        }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn cascade_mode(&self) -> CascadeMode {
        self.cascade_mode
    }

    /// Create a document owned by the caller.
    ///
    /// The parent reference is taken as given: it is neither resolved nor
    /// checked for ownership.
    pub async fn create(
        &self,
        principal: Option<&AuthenticatedUser>,
        request: CreateDocumentRequest,
    ) -> Result<Document, AppError> {
        let user = require_principal(principal)?;

        let doc = Document::new(&request.title, request.parent_document, &user.user_id);
        self.repo.insert(doc.clone()).await?;

        tracing::info!(document_id = %doc.id, user_id = %user.user_id, "Created document");
        self.publish_changed(&doc, None);
        Ok(doc)
    }

    /// Non-archived children of `parent_document` (roots when `None`).
    pub async fn get_sidebar(
        &self,
        principal: Option<&AuthenticatedUser>,
        parent_document: Option<&str>,
    ) -> Result<Vec<Document>, AppError> {
        let user = require_principal(principal)?;
        self.repo
            .list_children(&user.user_id, parent_document, Some(false))
            .await
    }

    /// Every non-archived document of the caller.
    pub async fn get_search(
        &self,
        principal: Option<&AuthenticatedUser>,
    ) -> Result<Vec<Document>, AppError> {
        let user = require_principal(principal)?;
        self.repo.list_by_owner(&user.user_id, false).await
    }

    /// Every archived document of the caller.
    pub async fn get_trash(
        &self,
        principal: Option<&AuthenticatedUser>,
    ) -> Result<Vec<Document>, AppError> {
        let user = require_principal(principal)?;
        self.repo.list_by_owner(&user.user_id, true).await
    }

    /// Resolve a document for reading.
    ///
    /// An unknown id is `Ok(None)`, not an error, so views can render a
    /// "not found" state.
    pub async fn get_by_id(
        &self,
        principal: Option<&AuthenticatedUser>,
        id: &str,
    ) -> Result<Option<Document>, AppError> {
        match self.repo.find_by_id(id).await? {
            Some(doc) => authorize_read(doc, principal).map(Some),
            None => Ok(None),
        }
    }

    /// Owner-only partial update. A blank title becomes "Untitled".
    pub async fn update(
        &self,
        principal: Option<&AuthenticatedUser>,
        id: &str,
        patch: DocumentPatch,
    ) -> Result<Document, AppError> {
        let user = require_principal(principal)?;
        self.load_owned(user, id).await?;

        let doc = self.apply(id, &DocumentChanges::from(patch)).await?;
        tracing::info!(document_id = %id, "Updated document");
        self.publish_changed(&doc, None);
        Ok(doc)
    }

    pub async fn remove_icon(
        &self,
        principal: Option<&AuthenticatedUser>,
        id: &str,
    ) -> Result<Document, AppError> {
        let changes = DocumentChanges {
            icon: Some(None),
            ..Default::default()
        };
        self.clear_field(principal, id, changes).await
    }

    pub async fn remove_cover_image(
        &self,
        principal: Option<&AuthenticatedUser>,
        id: &str,
    ) -> Result<Document, AppError> {
        let changes = DocumentChanges {
            cover_image: Some(None),
            ..Default::default()
        };
        self.clear_field(principal, id, changes).await
    }

    /// Archive a document and every descendant.
    pub async fn archive(
        &self,
        principal: Option<&AuthenticatedUser>,
        id: &str,
    ) -> Result<CascadeOutcome, AppError> {
        let user = require_principal(principal)?;
        self.load_owned(user, id).await?;

        let doc = self.apply(id, &DocumentChanges::archived(true)).await?;
        tracing::info!(document_id = %id, "Archived document");
        self.publish_changed(&doc, None);

        let cascade = self.run_cascade(&user.user_id, id, true).await?;
        Ok(CascadeOutcome {
            document: doc,
            cascade,
        })
    }

    /// Restore a document and every descendant.
    ///
    /// The restored root is moved to the top level when its parent is still
    /// archived. A parent that no longer exists stays referenced, like any
    /// other orphan. Descendants keep their parents.
    pub async fn restore(
        &self,
        principal: Option<&AuthenticatedUser>,
        id: &str,
    ) -> Result<CascadeOutcome, AppError> {
        let user = require_principal(principal)?;
        let existing = self.load_owned(user, id).await?;

        let mut changes = DocumentChanges::archived(false);
        let mut detached_from = None;
        if let Some(parent_id) = &existing.parent_document {
            let parent = self.repo.find_by_id(parent_id).await?;
            if matches!(parent, Some(p) if p.is_archived) {
                changes.parent_document = Some(None);
                detached_from = Some(parent_id.clone());
            }
        }

        let doc = self.apply(id, &changes).await?;
        tracing::info!(document_id = %id, detached = detached_from.is_some(), "Restored document");
        self.publish_changed(&doc, detached_from);

        let cascade = self.run_cascade(&user.user_id, id, false).await?;
        Ok(CascadeOutcome {
            document: doc,
            cascade,
        })
    }

    /// Permanently delete exactly one document. Children are left in place
    /// with their now dangling parent reference.
    pub async fn remove(
        &self,
        principal: Option<&AuthenticatedUser>,
        id: &str,
    ) -> Result<Document, AppError> {
        let user = require_principal(principal)?;
        let existing = self.load_owned(user, id).await?;

        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound("Not Found!".into()));
        }

        tracing::info!(document_id = %id, "Deleted document");
        self.events.publish(StoreEvent::DocumentRemoved {
            document: existing.clone(),
        });
        Ok(existing)
    }

    /// Subscribe to changes of `key`.
    ///
    /// Owner-scoped keys are bound to the caller; a document key follows the
    /// same visibility rule as [`get_by_id`](Self::get_by_id) and fails with
    /// `NotFound` for unknown ids. That rule is applied again to every event,
    /// so the stream ends once the caller loses read access.
    pub async fn subscribe(
        &self,
        principal: Option<&AuthenticatedUser>,
        key: QueryKey,
    ) -> Result<Subscription, AppError> {
        match &key {
            QueryKey::Document { id } => {
                if self.get_by_id(principal, id).await?.is_none() {
                    return Err(AppError::NotFound("Not Found!".into()));
                }
            }
            QueryKey::Sidebar { user_id, .. }
            | QueryKey::Search { user_id }
            | QueryKey::Trash { user_id } => {
                let user = require_principal(principal)?;
                if *user_id != user.user_id {
                    return Err(AppError::Forbidden("Forbidden!".into()));
                }
            }
        }
        Ok(self.events.subscribe_as(key, principal.cloned()))
    }

    async fn load_owned(&self, user: &AuthenticatedUser, id: &str) -> Result<Document, AppError> {
        let doc = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Not Found!".into()))?;
        ensure_owner(&doc, user)?;
        Ok(doc)
    }

    async fn apply(&self, id: &str, changes: &DocumentChanges) -> Result<Document, AppError> {
        // The document can vanish between the ownership check and the write
        self.repo
            .update(id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("Not Found!".into()))
    }

    async fn clear_field(
        &self,
        principal: Option<&AuthenticatedUser>,
        id: &str,
        changes: DocumentChanges,
    ) -> Result<Document, AppError> {
        let user = require_principal(principal)?;
        self.load_owned(user, id).await?;

        let doc = self.apply(id, &changes).await?;
        self.publish_changed(&doc, None);
        Ok(doc)
    }

    fn publish_changed(&self, doc: &Document, detached_from: Option<String>) {
        self.events.publish(StoreEvent::DocumentChanged {
            document: doc.clone(),
            detached_from,
        });
    }

    async fn run_cascade(&self, user_id: &str, root_id: &str, archived: bool) -> Result<Cascade, AppError> {
        match self.cascade_mode {
            CascadeMode::Inline => {
                let report = cascade_archived(self.repo.as_ref(), user_id, root_id, archived).await;
                let report = settle_cascade(&self.events, user_id, root_id, archived, report)?;
                Ok(Cascade::Completed(report))
            }
            CascadeMode::Background => {
                let repo = Arc::clone(&self.repo);
                let events = self.events.clone();
                let user_id = user_id.to_string();
                let task_root = root_id.to_string();

                let handle = tokio::spawn(async move {
                    let report = cascade_archived(repo.as_ref(), &user_id, &task_root, archived).await;
                    settle_cascade(&events, &user_id, &task_root, archived, report)
                });

                Ok(Cascade::Pending(PendingCascade {
                    root_id: root_id.to_string(),
                    handle,
                }))
            }
        }
    }
}

/// Publish the completion (or failure) of a cascade and pass the result on.
fn settle_cascade(
    events: &EventHub,
    user_id: &str,
    root_id: &str,
    archived: bool,
    report: Result<CascadeReport, AppError>,
) -> Result<CascadeReport, AppError> {
    match &report {
        Ok(report) => {
            tracing::info!(root_id, archived, descendants = report.updated.len(), "Cascade completed");
            events.publish(StoreEvent::CascadeCompleted {
                user_id: user_id.to_string(),
                root_id: root_id.to_string(),
                archived,
                updated: report.updated.clone(),
            });
        }
        Err(e) => {
            tracing::warn!(root_id, archived, "Cascade failed: {e}");
            events.publish(StoreEvent::CascadeFailed {
                user_id: user_id.to_string(),
                root_id: root_id.to_string(),
                archived,
                error: e.to_string(),
            });
        }
    }
    report
}
