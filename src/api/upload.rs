use axum::extract::Multipart;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Principal;
use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;
use crate::storage::client::StorageClient;
use crate::store::access::require_principal;

/// Public path prefix under which uploaded images are served.
pub const IMAGE_URL_PREFIX: &str = "/api/v1/image/";

/// Response from a successful image upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// The URL path where the image can be accessed.
    pub url: String,
}

/// Request body for image deletion.
#[derive(Debug, Deserialize)]
pub struct DeleteImageRequest {
    pub url: String,
}

/// Map an image URL produced by [`store_image`] back to its storage key.
///
/// Accepts both the bare path and an absolute URL. Anything that does not
/// name a single file under the image prefix is rejected.
pub fn key_from_url(url: &str) -> Option<String> {
    let (_, filename) = url.split_once(IMAGE_URL_PREFIX)?;
    let filename = filename.split(['?', '#']).next().unwrap_or_default();
    if filename.is_empty() || filename.contains('/') || filename.contains("..") {
        return None;
    }
    Some(format!("images/{filename}"))
}

/// Filename prefix identifying the uploader. Never contains a `.`.
fn owner_tag(user: &AuthenticatedUser) -> String {
    user.user_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Whether the image stored under `key` was uploaded by `user`.
pub fn is_uploaded_by(key: &str, user: &AuthenticatedUser) -> bool {
    let filename = key.strip_prefix("images/").unwrap_or(key);
    filename
        .split_once('.')
        .is_some_and(|(tag, _)| tag == owner_tag(user))
}

/// Infer a content type from the file extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".svg") {
        "image/svg+xml"
    } else {
        "application/octet-stream"
    }
}

/// Upload an image on behalf of `owner` and return its URL.
///
/// The stored name starts with the owner's tag so later deletes can be
/// checked. When `replace_url` names an image of the same owner, that image
/// is deleted once the new one is stored. A failed delete is logged, not
/// returned: the new upload already succeeded.
pub async fn store_image(
    storage: &dyn StorageClient,
    owner: &AuthenticatedUser,
    file_name: &str,
    content_type: &str,
    data: Vec<u8>,
    replace_url: Option<&str>,
) -> Result<UploadResponse, AppError> {
    // Only allow image types
    if !content_type.starts_with("image/") {
        return Err(AppError::BadRequest("Only image files are allowed".into()));
    }
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }

    let sanitized_name = file_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect::<String>();
    let filename = format!(
        "{}.{}_{}",
        owner_tag(owner),
        uuid::Uuid::new_v4().simple(),
        sanitized_name
    );

    storage.put_object(&format!("images/{filename}"), data).await?;

    if let Some(old_key) = replace_url.and_then(key_from_url) {
        if !is_uploaded_by(&old_key, owner) {
            tracing::warn!(user_id = %owner.user_id, "Not replacing image '{old_key}' of another user");
        } else if let Err(e) = storage.delete_object(&old_key).await {
            tracing::warn!("Failed to delete replaced image '{old_key}': {e}");
        }
    }

    Ok(UploadResponse {
        url: format!("{IMAGE_URL_PREFIX}{filename}"),
    })
}

/// Delete an image uploaded by `owner`, by its URL.
pub async fn delete_image(
    storage: &dyn StorageClient,
    owner: &AuthenticatedUser,
    url: &str,
) -> Result<(), AppError> {
    let key = key_from_url(url)
        .ok_or_else(|| AppError::BadRequest(format!("Not an uploaded image URL: '{url}'")))?;
    if !is_uploaded_by(&key, owner) {
        return Err(AppError::Forbidden("Forbidden!".into()));
    }
    storage.delete_object(&key).await
}

/// Axum handler for `POST /api/v1/upload-image`.
///
/// Accepts a multipart form with a file field named "file" and an optional
/// "replace_url" text field.
pub async fn upload_image_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    principal: Principal,
    mut multipart: Multipart,
) -> Result<axum::Json<UploadResponse>, AppError> {
    let user = require_principal(principal.user())?;

    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut replace_url: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;
                file = Some((file_name, content_type, data.to_vec()));
            }
            "replace_url" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read field: {e}")))?;
                replace_url = Some(text).filter(|t| !t.is_empty());
            }
            _ => continue,
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::BadRequest("No file field found in request".into()))?;

    let response = store_image(
        state.storage_client.as_ref(),
        user,
        &file_name,
        &content_type,
        data,
        replace_url.as_deref(),
    )
    .await?;

    Ok(axum::Json(response))
}

/// Axum handler for `GET /api/v1/image/{filename}`.
///
/// Serves an image from storage. Images are public, like the published
/// documents that embed them.
pub async fn serve_image_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    axum::extract::Path(filename): axum::extract::Path<String>,
) -> Result<axum::response::Response, AppError> {
    use axum::response::IntoResponse;

    let s3_key = key_from_url(&format!("{IMAGE_URL_PREFIX}{filename}"))
        .ok_or_else(|| AppError::BadRequest("Invalid image name".into()))?;

    let data = state
        .storage_client
        .get_object(&s3_key)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".into()))?;

    Ok((
        [(axum::http::header::CONTENT_TYPE, content_type_for(&filename))],
        data,
    )
        .into_response())
}

/// Axum handler for `DELETE /api/v1/image`.
///
/// Only the uploader may delete an image.
pub async fn delete_image_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    principal: Principal,
    axum::Json(request): axum::Json<DeleteImageRequest>,
) -> Result<axum::http::StatusCode, AppError> {
    let user = require_principal(principal.user())?;
    delete_image(state.storage_client.as_ref(), user, &request.url).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
