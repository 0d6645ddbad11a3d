use serde::{Deserialize, Serialize};
use std::fmt;

/// Login input supplied by the caller
#[derive(Clone, Deserialize)]
pub struct LoginCredentials {
    #[serde(alias = "login")]
    pub identifier: String,
    #[serde(alias = "password")]
    pub secret: String,
}

impl LoginCredentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.identifier.trim().is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Opaque session token and the tenant it was obtained for
///
/// Never refreshed in place: once a downstream call reports an authentication
/// failure the caller acquires a new one.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SessionCredential {
    token: String,
    tenant: String,
}

impl SessionCredential {
    pub fn new(token: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            tenant: tenant.into(),
        }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("token", &format_args!("<{} chars>", self.token.len()))
            .field("tenant", &self.tenant)
            .finish()
    }
}
