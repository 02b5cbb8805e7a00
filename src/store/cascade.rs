//! Archive/restore propagation through a document subtree.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::db::models::{Document, DocumentChanges};
use crate::db::repository::DocumentRepository;
use crate::error::AppError;

/// When the descendant walk runs relative to the operation that started it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeMode {
    /// The walk completes before archive/restore returns.
    #[default]
    Inline,
    /// The walk runs as a spawned task; archive/restore return a
    /// [`PendingCascade`] and a completion event is published later.
    Background,
}

/// Result of a finished cascade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeReport {
    pub root_id: String,
    pub archived: bool,
    /// Descendant ids in the order they were written.
    pub updated: Vec<String>,
}

/// A cascade still running in the background.
#[derive(Debug)]
pub struct PendingCascade {
    pub(crate) root_id: String,
    pub(crate) handle: JoinHandle<Result<CascadeReport, AppError>>,
}

impl PendingCascade {
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Wait for the walk to finish.
    pub async fn wait(self) -> Result<CascadeReport, AppError> {
        self.handle
            .await
            .map_err(|e| AppError::Internal(format!("Cascade task failed: {e}")))?
    }
}

/// State of the descendant walk when archive/restore returned.
#[derive(Debug)]
pub enum Cascade {
    Completed(CascadeReport),
    Pending(PendingCascade),
}

/// What archive and restore return: the updated root plus its cascade.
#[derive(Debug)]
pub struct CascadeOutcome {
    pub document: Document,
    pub cascade: Cascade,
}

impl CascadeOutcome {
    /// Wait for the cascade if it is still running.
    pub async fn settle(self) -> Result<(Document, CascadeReport), AppError> {
        let report = match self.cascade {
            Cascade::Completed(report) => report,
            Cascade::Pending(pending) => pending.wait().await?,
        };
        Ok((self.document, report))
    }
}

/// Set `is_archived` on every transitive descendant of `root_id` owned by
/// `user_id`.
///
/// Breadth-first over a worklist, one write per descendant, sequential. The
/// root itself is not written. A document is never visited twice, so a
/// corrupt parent cycle cannot loop forever.
pub async fn cascade_archived(
    repo: &dyn DocumentRepository,
    user_id: &str,
    root_id: &str,
    archived: bool,
) -> Result<CascadeReport, AppError> {
    let mut queue = VecDeque::from([root_id.to_string()]);
    let mut visited = HashSet::from([root_id.to_string()]);
    let mut updated = Vec::new();
    let changes = DocumentChanges::archived(archived);

    while let Some(parent_id) = queue.pop_front() {
        let children = repo.list_children(user_id, Some(&parent_id), None).await?;

        for child in children {
            if !visited.insert(child.id.clone()) {
                continue;
            }

            repo.update(&child.id, &changes).await?;
            tracing::debug!(root_id, child_id = %child.id, archived, "Cascaded archive flag");

            updated.push(child.id.clone());
            queue.push_back(child.id);
        }
    }

    Ok(CascadeReport {
        root_id: root_id.to_string(),
        archived,
        updated,
    })
}
