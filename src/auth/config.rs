use serde::Deserialize;

/// Identity configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider. When unset, bearer
    /// tokens are rejected.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim. When unset, the issuer is not checked.
    #[serde(default)]
    pub jwt_issuer: Option<String>,
    /// Accept the demo login cookie and seed demo documents.
    #[serde(default)]
    pub demo_mode: bool,
}

impl AuthConfig {
    /// Build with explicit values (useful for testing).
    pub fn new(jwt_secret: Option<String>, jwt_issuer: Option<String>, demo_mode: bool) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            demo_mode,
        }
    }

    /// Demo-only configuration: cookie login, no bearer tokens.
    pub fn demo() -> Self {
        Self::new(None, None, true)
    }
}
