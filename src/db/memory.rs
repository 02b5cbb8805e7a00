use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::db::models::{Document, DocumentChanges};
use crate::db::repository::DocumentRepository;
use crate::error::AppError;

/// In-process document repository used in demo mode and tests.
///
/// Documents are kept in insertion order, so walking the vector backwards
/// yields newest-first listings.
#[derive(Default)]
pub struct MemoryDocumentRepository {
    documents: Mutex<Vec<Document>>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Document>>, AppError> {
        self.documents
            .lock()
            .map_err(|_| AppError::Internal("document store lock poisoned".into()))
    }

    fn collect_newest_first<F>(&self, predicate: F) -> Result<Vec<Document>, AppError>
    where
        F: Fn(&Document) -> bool,
    {
        Ok(self
            .lock()?
            .iter()
            .rev()
            .filter(|d| predicate(d))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn insert(&self, doc: Document) -> Result<(), AppError> {
        let mut docs = self.lock()?;
        if docs.iter().any(|d| d.id == doc.id) {
            return Err(AppError::Database(format!("duplicate document id '{}'", doc.id)));
        }
        docs.push(doc);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>, AppError> {
        Ok(self.lock()?.iter().find(|d| d.id == id).cloned())
    }

    async fn list_children(
        &self,
        user_id: &str,
        parent: Option<&str>,
        archived: Option<bool>,
    ) -> Result<Vec<Document>, AppError> {
        self.collect_newest_first(|d| {
            d.user_id == user_id
                && d.parent_document.as_deref() == parent
                && archived.map_or(true, |a| d.is_archived == a)
        })
    }

    async fn list_by_owner(&self, user_id: &str, archived: bool) -> Result<Vec<Document>, AppError> {
        self.collect_newest_first(|d| d.user_id == user_id && d.is_archived == archived)
    }

    async fn update(
        &self,
        id: &str,
        changes: &DocumentChanges,
    ) -> Result<Option<Document>, AppError> {
        let mut docs = self.lock()?;
        Ok(docs.iter_mut().find(|d| d.id == id).map(|doc| {
            changes.apply_to(doc, Utc::now());
            doc.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut docs = self.lock()?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() < before)
    }
}
