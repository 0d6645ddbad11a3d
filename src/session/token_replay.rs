//! Token-replay login
//!
//! 1. GET the login page and read the hidden anti-forgery token.
//! 2. POST identifier, secret and token as a urlencoded form without following
//!    redirects.
//! 3. The auth cookie in `Set-Cookie` is the credential. Portals usually answer
//!    a good login with `302`; with redirects disabled that response is
//!    inspected like any other.

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};

use super::acquirer::SessionAcquirer;
use super::credential::{LoginCredentials, SessionCredential};
use crate::error::PortalError;
use crate::extract::FieldRule;
use crate::settings::{HttpSettings, PortalConfig};
use crate::utils::headers::{cookie_from_headers, BrowserHeaderProfile, RequestStyle};
use crate::utils::logging::LoggingHelper;

pub struct TokenReplayAcquirer {
    portal: PortalConfig,
    client: Client,
    headers: BrowserHeaderProfile,
    token_rule: FieldRule,
}

impl TokenReplayAcquirer {
    /// Build an acquirer with its own redirect-free HTTP client
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Configuration`] if the HTTP client cannot be built
    /// or the token field name produces an invalid pattern.
    pub fn new(portal: PortalConfig, http: &HttpSettings) -> Result<Self, PortalError> {
        let token_rule = FieldRule::input_value("verification_token", &portal.login_form.token_field)
            .map_err(|e| PortalError::Configuration(format!("invalid token field: {e}")))?;
        let client = http
            .client_builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| PortalError::Configuration(format!("failed to build HTTP client: {e}")))?;
        let headers = BrowserHeaderProfile::new(&portal.base_url, portal.url(&portal.login_path));
        Ok(Self {
            portal,
            client,
            headers,
            token_rule,
        })
    }

    fn login_url(&self) -> String {
        self.portal.url(&self.portal.login_path)
    }

    /// Load the login page and read its anti-forgery token
    async fn fetch_verification_token(&self) -> Result<String, PortalError> {
        let response = self
            .headers
            .apply(self.client.get(self.login_url()), RequestStyle::Document)
            .send()
            .await
            .map_err(|e| login_transport_error("loading the login page", &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::authentication(format!(
                "login page answered with status {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| login_transport_error("reading the login page", &e))?;

        let token = self.token_rule.apply(&body);
        LoggingHelper::log_verification_token(&self.portal.name, token.is_some());
        token.ok_or_else(|| {
            PortalError::ExtractionFailure(format!(
                "input '{}' not found on the login page",
                self.portal.login_form.token_field
            ))
        })
    }

    /// Form fields in the order the portal's own page submits them
    fn login_form(&self, credentials: &LoginCredentials, token: &str) -> Vec<(String, String)> {
        let form = &self.portal.login_form;
        form.extra_fields
            .iter()
            .map(|field| (field.name.clone(), field.value.clone()))
            .chain([
                (form.identifier_field.clone(), credentials.identifier.clone()),
                (form.secret_field.clone(), credentials.secret.clone()),
                (form.token_field.clone(), token.to_string()),
            ])
            .collect()
    }

    async fn submit_login(
        &self,
        credentials: &LoginCredentials,
        token: &str,
    ) -> Result<String, PortalError> {
        let response = self
            .headers
            .apply(self.client.post(self.login_url()), RequestStyle::Document)
            .form(&self.login_form(credentials, token))
            .send()
            .await
            .map_err(|e| login_transport_error("submitting the login form", &e))?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(PortalError::authentication(format!(
                "login answered with status {status}"
            )));
        }

        cookie_from_headers(response.headers(), &self.portal.auth_cookie).ok_or_else(|| {
            PortalError::authentication(format!(
                "login response (status {status}) did not set the {} cookie",
                self.portal.auth_cookie
            ))
        })
    }
}

#[async_trait]
impl SessionAcquirer for TokenReplayAcquirer {
    async fn acquire(
        &self,
        credentials: &LoginCredentials,
        tenant: &str,
    ) -> Result<SessionCredential, PortalError> {
        let tenant = effective_tenant(tenant, &self.portal);
        LoggingHelper::log_login_start(&self.portal.name, self.strategy_name(), &tenant);

        let outcome = match self.fetch_verification_token().await {
            Ok(token) => self.submit_login(credentials, &token).await,
            Err(err) => Err(err),
        };

        LoggingHelper::log_login_outcome(
            &self.portal.name,
            self.strategy_name(),
            outcome.as_ref().err(),
        );
        outcome.map(|token| SessionCredential::new(token, tenant))
    }

    fn strategy_name(&self) -> &'static str {
        "token_replay"
    }
}

/// Tenant hint, or the portal's default structure when the hint is blank
pub(crate) fn effective_tenant(tenant: &str, portal: &PortalConfig) -> String {
    let tenant = tenant.trim();
    if tenant.is_empty() {
        portal.default_structure.clone()
    } else {
        tenant.to_string()
    }
}

fn login_transport_error(step: &str, err: &reqwest::Error) -> PortalError {
    if err.is_timeout() {
        PortalError::authentication(format!("timed out {step}"))
    } else {
        PortalError::authentication(format!("failed {step}: {err}"))
    }
}
