use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;

use crate::app::AppState;
use crate::auth::config::AuthConfig;
use crate::auth::demo_auth::{demo_user, DEMO_COOKIE};
use crate::auth::jwt::verify_token;
use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;

/// Resolve the request principal from its headers.
///
/// A bearer token always wins; the demo cookie is only honoured in demo
/// mode. A request carrying neither is anonymous (`Ok(None)`), while a
/// credential that fails to verify is an error on every route, public reads
/// included. An expired session is reported as such instead of silently
/// downgrading the caller to anonymous.
pub fn principal_from_headers(
    headers: &HeaderMap,
    config: &AuthConfig,
) -> Result<Option<AuthenticatedUser>, AppError> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AppError::Unauthenticated("Malformed Authorization header".into()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthenticated("Expected a Bearer token".into()))?;
        return verify_token(token.trim(), config).map(Some);
    }

    if config.demo_mode {
        let jar = CookieJar::from_headers(headers);
        if let Some(cookie) = jar.get(DEMO_COOKIE) {
            let user = demo_user(cookie.value())
                .ok_or_else(|| AppError::Unauthenticated("Invalid session".into()))?;
            return Ok(Some(user));
        }
    }

    Ok(None)
}

/// Extractor for the optional request principal.
///
/// Handlers pass it straight to the store, which decides whether an
/// anonymous caller is acceptable.
#[derive(Debug, Clone)]
pub struct Principal(pub Option<AuthenticatedUser>);

impl Principal {
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers, &state.auth).map(Principal)
    }
}
