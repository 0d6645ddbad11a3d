//! Cookie set sent with every data call
//!
//! A [`RequestContext`] is built fresh per call from a credential and tenant
//! parameters. Switching structure produces a new context; an existing one is
//! never modified.

use super::credential::SessionCredential;
use crate::settings::{NamedValue, PortalConfig};
use crate::utils::logging::LoggingHelper;

const TIMEZONE_COOKIE: &str = "tz";

/// Tenant-level selectors supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantParams {
    pub structure_id: Option<String>,
}

impl TenantParams {
    pub fn structure(id: impl Into<String>) -> Self {
        Self {
            structure_id: Some(id.into()),
        }
    }
}

/// Portal cookie conventions captured once from configuration
#[derive(Debug, Clone)]
pub struct RequestContextBuilder {
    portal: String,
    auth_cookie: String,
    structure_cookie: String,
    default_structure: String,
    timezone: String,
    extra_cookies: Vec<NamedValue>,
}

impl RequestContextBuilder {
    #[must_use]
    pub fn from_portal(portal: &PortalConfig) -> Self {
        Self {
            portal: portal.name.clone(),
            auth_cookie: portal.auth_cookie.clone(),
            structure_cookie: portal.structure_cookie.clone(),
            default_structure: portal.default_structure.clone(),
            timezone: portal.timezone.clone(),
            extra_cookies: portal.extra_cookies.clone(),
        }
    }

    /// Compose the cookie set for `credential`
    ///
    /// The structure is taken from `params`, then from the credential's tenant,
    /// then from the portal default. The auth cookie is always last.
    #[must_use]
    pub fn build(&self, credential: &SessionCredential, params: &TenantParams) -> RequestContext {
        let structure_id = [
            params.structure_id.as_deref(),
            Some(credential.tenant()),
            Some(self.default_structure.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|id| !id.is_empty())
        .unwrap_or_default()
        .to_string();

        let mut cookies = Vec::with_capacity(self.extra_cookies.len() + 3);
        if !self.timezone.is_empty() {
            cookies.push((
                TIMEZONE_COOKIE.to_string(),
                urlencoding::encode(&self.timezone).into_owned(),
            ));
        }
        cookies.extend(
            self.extra_cookies
                .iter()
                .map(|cookie| (cookie.name.clone(), cookie.value.clone())),
        );
        if !self.structure_cookie.is_empty() && !structure_id.is_empty() {
            cookies.push((self.structure_cookie.clone(), structure_id.clone()));
        }
        cookies.push((self.auth_cookie.clone(), credential.token().to_string()));

        let names: Vec<&str> = cookies.iter().map(|(name, _)| name.as_str()).collect();
        LoggingHelper::log_context_built(&self.portal, &structure_id, &names);

        RequestContext {
            credential: credential.clone(),
            structure_id,
            cookies,
            builder: self.clone(),
        }
    }
}

/// Credential plus the cookies a portal requires on data calls
#[derive(Debug, Clone)]
pub struct RequestContext {
    credential: SessionCredential,
    structure_id: String,
    cookies: Vec<(String, String)>,
    builder: RequestContextBuilder,
}

impl RequestContext {
    #[must_use]
    pub fn credential(&self) -> &SessionCredential {
        &self.credential
    }

    #[must_use]
    pub fn structure_id(&self) -> &str {
        &self.structure_id
    }

    #[must_use]
    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// Value of a single cookie
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(cookie, _)| cookie == name)
            .map(|(_, value)| value.as_str())
    }

    /// `Cookie` header value
    #[must_use]
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// New context for another organizational structure
    #[must_use]
    pub fn for_structure(&self, structure_id: &str) -> RequestContext {
        self.builder
            .build(&self.credential, &TenantParams::structure(structure_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elos_builder() -> RequestContextBuilder {
        RequestContextBuilder::from_portal(&PortalConfig::elos())
    }

    #[test]
    fn test_elos_cookie_header() {
        let credential = SessionCredential::new("abc123", "");
        let context = elos_builder().build(&credential, &TenantParams::default());
        assert_eq!(
            context.cookie_header(),
            "tz=America%2FMaceio; slot-routing-url=-; _ga=GA1.1.1853101631.1733855667; \
             _ga_H3Z1Q956EV=GS1.1.1738295739.7.0.1738295739.0.0.0; \
             current-organizational-structure=58; Authentication=abc123"
        );
        assert_eq!(context.structure_id(), "58");
    }

    #[test]
    fn test_structure_precedence() {
        let builder = elos_builder();
        let credential = SessionCredential::new("t", "12");
        assert_eq!(
            builder.build(&credential, &TenantParams::default()).structure_id(),
            "12"
        );
        assert_eq!(
            builder
                .build(&credential, &TenantParams::structure("99"))
                .structure_id(),
            "99"
        );
    }

    #[test]
    fn test_for_structure_returns_new_context() {
        let credential = SessionCredential::new("t", "58");
        let original = elos_builder().build(&credential, &TenantParams::default());
        let switched = original.for_structure("60");

        assert_eq!(original.cookie("current-organizational-structure"), Some("58"));
        assert_eq!(switched.cookie("current-organizational-structure"), Some("60"));
        assert_eq!(switched.cookie("Authentication"), Some("t"));
    }

    #[test]
    fn test_auth_cookie_always_present() {
        let portal = PortalConfig::avec();
        let context = RequestContextBuilder::from_portal(&portal)
            .build(&SessionCredential::new("sess", ""), &TenantParams::default());
        assert_eq!(context.cookie("ci3_session"), Some("sess"));
        assert_eq!(context.cookie("current-structure"), None);
        assert!(context.cookie_header().ends_with("ci3_session=sess"));
    }
}
