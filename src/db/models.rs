use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title given to documents whose title is cleared.
pub const UNTITLED: &str = "Untitled";

/// A note stored in the `documents` collection.
///
/// Documents form a per-user forest through `parent_document`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque unique identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Serialized rich-text payload, owned by the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// URL of the cover image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// Icon glyph (usually a single emoji).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Parent document id. If None, the document is a root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_document: Option<String>,
    /// Owning principal. Never changes after creation.
    pub user_id: String,
    /// Soft-delete flag.
    #[serde(default)]
    pub is_archived: bool,
    /// Grants unauthenticated read access while the document is not archived.
    #[serde(default)]
    pub is_published: bool,
    /// Creation time, the ordering key of every listing.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Build a fresh, unarchived, unpublished document owned by `user_id`.
    pub fn new(title: &str, parent_document: Option<String>, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: normalize_title(title),
            content: None,
            cover_image: None,
            icon: None,
            parent_document,
            user_id: user_id.to_string(),
            is_archived: false,
            is_published: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether anyone, authenticated or not, may read this document.
    pub fn is_public(&self) -> bool {
        self.is_published && !self.is_archived
    }
}

/// Replace a blank title with [`UNTITLED`].
pub fn normalize_title(title: &str) -> String {
    if title.trim().is_empty() {
        UNTITLED.to_string()
    } else {
        title.to_string()
    }
}

/// Partial update accepted from the document owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_published: Option<bool>,
}

/// A set of field changes applied by the repository.
///
/// `Some(None)` on an optional field clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub parent_document: Option<Option<String>>,
    pub is_archived: Option<bool>,
    pub is_published: Option<bool>,
}

impl DocumentChanges {
    pub fn archived(is_archived: bool) -> Self {
        Self {
            is_archived: Some(is_archived),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the changes in place, stamping `updated_at`.
    pub fn apply_to(&self, doc: &mut Document, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            doc.title = title.clone();
        }
        if let Some(content) = &self.content {
            doc.content = Some(content.clone());
        }
        if let Some(cover_image) = &self.cover_image {
            doc.cover_image = cover_image.clone();
        }
        if let Some(icon) = &self.icon {
            doc.icon = icon.clone();
        }
        if let Some(parent) = &self.parent_document {
            doc.parent_document = parent.clone();
        }
        if let Some(is_archived) = self.is_archived {
            doc.is_archived = is_archived;
        }
        if let Some(is_published) = self.is_published {
            doc.is_published = is_published;
        }
        doc.updated_at = now;
    }
}

impl From<DocumentPatch> for DocumentChanges {
    fn from(patch: DocumentPatch) -> Self {
        Self {
            title: patch.title.as_deref().map(normalize_title),
            content: patch.content,
            cover_image: patch.cover_image.map(Some),
            icon: patch.icon.map(Some),
            is_published: patch.is_published,
            ..Default::default()
        }
    }
}

/// The request payload for document creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub parent_document: Option<String>,
}
