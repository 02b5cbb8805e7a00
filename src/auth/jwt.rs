use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::config::AuthConfig;
use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;

/// Claims carried by identity provider tokens.
#[derive(Debug, Serialize, Deserialize)]
struct IdentityClaims {
    /// The user id; becomes the document owner.
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    /// Expiration timestamp (Unix seconds).
    exp: i64,
}

/// Sign an HS256 token for `user`.
///
/// The identity provider normally does this; the server only needs it for
/// tooling and tests.
pub fn issue_token(
    user: &AuthenticatedUser,
    secret: &str,
    issuer: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<String, AppError> {
    let claims = IdentityClaims {
        sub: user.user_id.clone(),
        email: Some(user.email.clone()).filter(|e| !e.is_empty()),
        name: Some(user.name.clone()).filter(|n| !n.is_empty()),
        picture: user.image_url.clone(),
        iss: issuer.map(str::to_string),
        exp: expires_at.timestamp(),
    };

    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::default(), &claims, &key)
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
}

/// Verify a bearer token and extract the principal it names.
pub fn verify_token(token: &str, config: &AuthConfig) -> Result<AuthenticatedUser, AppError> {
    let secret = config
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::Unauthenticated("Bearer tokens are not accepted".into()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    if let Some(issuer) = &config.jwt_issuer {
        validation.set_issuer(&[issuer]);
    }

    let data = decode::<IdentityClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AppError::Unauthenticated(format!("Invalid token: {e}")))?;

    let claims = data.claims;
    if claims.sub.is_empty() {
        return Err(AppError::Unauthenticated("Token has no subject".into()));
    }

    Ok(AuthenticatedUser {
        user_id: claims.sub,
        email: claims.email.unwrap_or_default(),
        name: claims.name.unwrap_or_default(),
        image_url: claims.picture,
    })
}
