//! Selects the login strategy configured for a portal

use std::collections::HashMap;
use std::sync::Arc;

use super::acquirer::SessionAcquirer;
use super::browser::BrowserLoginAcquirer;
use super::token_replay::TokenReplayAcquirer;
use crate::error::PortalError;
use crate::settings::{HttpSettings, LoginStrategy, PortalConfig, PortalSettings};

pub type SharedAcquirer = Arc<dyn SessionAcquirer>;

/// Factory for session acquirers
pub struct AcquirerFactory;

impl AcquirerFactory {
    /// Acquirer for one portal, chosen by its `login_strategy`
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Configuration`] when the portal fails validation or
    /// the strategy cannot be constructed.
    pub fn for_portal(
        portal: &PortalConfig,
        http: &HttpSettings,
    ) -> Result<SharedAcquirer, PortalError> {
        portal.validate()?;
        let acquirer: SharedAcquirer = match portal.login_strategy {
            LoginStrategy::TokenReplay => Arc::new(TokenReplayAcquirer::new(portal.clone(), http)?),
            LoginStrategy::Browser => Arc::new(BrowserLoginAcquirer::new(portal.clone(), http)?),
        };
        Ok(acquirer)
    }

    /// One acquirer per configured portal, keyed by portal name
    ///
    /// # Errors
    ///
    /// Returns the first configuration error encountered.
    pub fn for_settings(
        settings: &PortalSettings,
    ) -> Result<HashMap<String, SharedAcquirer>, PortalError> {
        log::info!("🏭 Building session acquirers for {} portal(s)", settings.portals.len());
        settings
            .portals
            .iter()
            .map(|portal| {
                let acquirer = Self::for_portal(portal, &settings.http)?;
                log::info!(
                    "   └─ {} ({}) via {}",
                    portal.name,
                    portal.base_url,
                    acquirer.strategy_name()
                );
                Ok((portal.name.clone(), acquirer))
            })
            .collect()
    }
}
