//! Portal configurations and inputs pointing at a local fixture portal

use crate::session::{
    LoginCredentials, RequestContext, RequestContextBuilder, SessionCredential, TenantParams,
};
use crate::settings::{HttpSettings, PortalConfig, PortalSettings};

use super::constants::{FIXTURE_AUTH_TOKEN, TEST_LOGIN, TEST_PASSWORD};

/// Central fixture provider
pub struct TestFixtures;

impl TestFixtures {
    /// Token-replay portal at `base_url` serving every data endpoint
    #[must_use]
    pub fn portal(base_url: &str) -> PortalConfig {
        let mut portal = PortalConfig {
            name: "fixture".to_string(),
            base_url: base_url.to_string(),
            ..PortalConfig::elos()
        };
        let backoffice = PortalConfig::avec().endpoints;
        portal.endpoints.comanda_list = backoffice.comanda_list;
        portal.endpoints.comanda_detail = backoffice.comanda_detail;
        portal.endpoints.client_form = backoffice.client_form;
        portal.endpoints.client_list = backoffice.client_list;
        portal
    }

    /// Short timeouts so a misbehaving fixture fails fast
    #[must_use]
    pub fn http() -> HttpSettings {
        HttpSettings {
            timeout_ms: 5_000,
            element_wait_ms: 2_000,
        }
    }

    /// Timeouts well below [`super::constants::SLOW_RESPONSE_MS`]
    #[must_use]
    pub fn impatient_http() -> HttpSettings {
        HttpSettings {
            timeout_ms: 200,
            element_wait_ms: 200,
        }
    }

    /// Settings holding only the fixture portal
    #[must_use]
    pub fn settings(base_url: &str) -> PortalSettings {
        PortalSettings {
            http: Self::http(),
            portals: vec![Self::portal(base_url)],
            ..PortalSettings::default()
        }
    }

    #[must_use]
    pub fn credentials() -> LoginCredentials {
        LoginCredentials::new(TEST_LOGIN, TEST_PASSWORD)
    }

    #[must_use]
    pub fn wrong_credentials() -> LoginCredentials {
        LoginCredentials::new(TEST_LOGIN, "wrong")
    }

    /// Context carrying the fixture credential for `portal`
    #[must_use]
    pub fn context(portal: &PortalConfig) -> RequestContext {
        RequestContextBuilder::from_portal(portal).build(
            &SessionCredential::new(FIXTURE_AUTH_TOKEN, ""),
            &TenantParams::default(),
        )
    }
}
