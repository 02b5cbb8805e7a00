use serde::{Deserialize, Serialize};

/// Represents an authenticated user (the request principal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Unique user identifier from the identity provider (token subject).
    pub user_id: String,
    /// User email address.
    #[serde(default)]
    pub email: String,
    /// Display name shown in the sidebar.
    #[serde(default)]
    pub name: String,
    /// Avatar URL, if the provider supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl AuthenticatedUser {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            name: name.into(),
            image_url: None,
        }
    }
}
