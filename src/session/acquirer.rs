//! Login strategies behind a single capability

use async_trait::async_trait;

use super::credential::{LoginCredentials, SessionCredential};
use crate::error::PortalError;

/// Performs a portal's login handshake and yields a session credential
///
/// Implementations do not retry. Every failure to obtain a credential,
/// including timeouts, is reported as [`PortalError::AuthenticationFailure`].
#[async_trait]
pub trait SessionAcquirer: Send + Sync {
    /// Log in as `credentials` for `tenant`
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::AuthenticationFailure`] when the portal rejects the
    /// credentials, the credential marker is missing from the response, or the
    /// handshake times out. Returns [`PortalError::ExtractionFailure`] when the
    /// login page lacks the markers the strategy needs.
    async fn acquire(
        &self,
        credentials: &LoginCredentials,
        tenant: &str,
    ) -> Result<SessionCredential, PortalError>;

    /// Short name used in logs
    fn strategy_name(&self) -> &'static str;
}
