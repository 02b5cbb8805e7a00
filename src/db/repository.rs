use async_trait::async_trait;

use crate::db::models::{Document, DocumentChanges};
use crate::error::AppError;

/// Repository trait for document persistence.
///
/// Listing methods return documents newest first (descending `created_at`),
/// with no secondary sort key. Authorization is not this layer's concern.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document.
    async fn insert(&self, doc: Document) -> Result<(), AppError>;

    /// Find a document by its id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Document>, AppError>;

    /// List documents owned by `user_id` whose parent equals `parent`
    /// (`None` lists the roots). `archived` optionally filters on the flag.
    async fn list_children(
        &self,
        user_id: &str,
        parent: Option<&str>,
        archived: Option<bool>,
    ) -> Result<Vec<Document>, AppError>;

    /// List every document owned by `user_id` with the given archived flag.
    async fn list_by_owner(&self, user_id: &str, archived: bool) -> Result<Vec<Document>, AppError>;

    /// Apply `changes` to a document and return it as stored afterwards.
    /// Returns `None` if the id does not exist.
    async fn update(&self, id: &str, changes: &DocumentChanges)
        -> Result<Option<Document>, AppError>;

    /// Delete exactly one document. Returns `false` if it did not exist.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;
}

/// MongoDB implementation of the DocumentRepository.
#[cfg(feature = "mongo")]
pub struct MongoDocumentRepository {
    collection: mongodb::Collection<Document>,
}

#[cfg(feature = "mongo")]
impl MongoDocumentRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("documents"),
        }
    }

    /// Create the indexes backing the sidebar and owner listings.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::IndexModel;

        let by_user_parent = IndexModel::builder()
            .keys(doc! { "user_id": 1, "parent_document": 1, "created_at": -1 })
            .build();
        let by_user = IndexModel::builder()
            .keys(doc! { "user_id": 1, "is_archived": 1, "created_at": -1 })
            .build();

        self.collection
            .create_indexes(vec![by_user_parent, by_user])
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_sorted(
        &self,
        filter: mongodb::bson::Document,
    ) -> Result<Vec<Document>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self
            .collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Translate a change set into a MongoDB update document.
#[cfg(feature = "mongo")]
fn update_document(changes: &DocumentChanges) -> mongodb::bson::Document {
    use mongodb::bson::doc;

    let mut set = doc! { "updated_at": chrono::Utc::now().timestamp_millis() };
    let mut unset = mongodb::bson::Document::new();

    if let Some(title) = &changes.title {
        set.insert("title", title.as_str());
    }
    if let Some(content) = &changes.content {
        set.insert("content", content.as_str());
    }
    for (field, value) in [
        ("cover_image", &changes.cover_image),
        ("icon", &changes.icon),
        ("parent_document", &changes.parent_document),
    ] {
        match value {
            Some(Some(v)) => {
                set.insert(field, v.as_str());
            }
            Some(None) => {
                unset.insert(field, "");
            }
            None => {}
        }
    }
    if let Some(is_archived) = changes.is_archived {
        set.insert("is_archived", is_archived);
    }
    if let Some(is_published) = changes.is_published {
        set.insert("is_published", is_published);
    }

    let mut update = doc! { "$set": set };
    // MongoDB rejects an empty $unset
    if !unset.is_empty() {
        update.insert("$unset", unset);
    }
    update
}

#[cfg(feature = "mongo")]
#[async_trait]
impl DocumentRepository for MongoDocumentRepository {
    async fn insert(&self, doc: Document) -> Result<(), AppError> {
        self.collection
            .insert_one(&doc)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_children(
        &self,
        user_id: &str,
        parent: Option<&str>,
        archived: Option<bool>,
    ) -> Result<Vec<Document>, AppError> {
        use mongodb::bson::doc;

        // A null filter also matches documents without the field (roots)
        let mut filter = doc! { "user_id": user_id, "parent_document": parent };
        if let Some(archived) = archived {
            filter.insert("is_archived", archived);
        }

        self.find_sorted(filter).await
    }

    async fn list_by_owner(&self, user_id: &str, archived: bool) -> Result<Vec<Document>, AppError> {
        use mongodb::bson::doc;

        self.find_sorted(doc! { "user_id": user_id, "is_archived": archived })
            .await
    }

    async fn update(
        &self,
        id: &str,
        changes: &DocumentChanges,
    ) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.collection
            .find_one_and_update(doc! { "_id": id }, update_document(changes))
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.deleted_count > 0)
    }
}
