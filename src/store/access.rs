//! The authorization gate shared by every store operation.

use crate::auth::models::AuthenticatedUser;
use crate::db::models::Document;
use crate::error::AppError;

/// Fail with `Unauthenticated` when there is no principal.
pub fn require_principal(
    principal: Option<&AuthenticatedUser>,
) -> Result<&AuthenticatedUser, AppError> {
    principal.ok_or_else(|| AppError::Unauthenticated("Unauthenticated!".into()))
}

/// Fail with `Forbidden` unless `user` owns `doc`.
pub fn ensure_owner(doc: &Document, user: &AuthenticatedUser) -> Result<(), AppError> {
    if doc.user_id != user.user_id {
        return Err(AppError::Forbidden("Forbidden!".into()));
    }
    Ok(())
}

/// Visibility rule for reading a single existing document.
///
/// Public documents (published and not archived) are readable by anyone.
/// Everything else needs the owner, including archived documents the owner
/// wants to preview before restoring.
pub fn authorize_read(
    doc: Document,
    principal: Option<&AuthenticatedUser>,
) -> Result<Document, AppError> {
    if doc.is_public() {
        return Ok(doc);
    }

    let user = require_principal(principal)?;
    ensure_owner(&doc, user)?;
    Ok(doc)
}
