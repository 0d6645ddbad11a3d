//! Browser-driven login for portals whose login page only works with scripts
//!
//! Each acquisition launches its own Chromium instance and shuts it down
//! before returning, whatever the outcome. Every wait is bounded.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

use super::acquirer::SessionAcquirer;
use super::credential::{LoginCredentials, SessionCredential};
use super::token_replay::effective_tenant;
use crate::error::PortalError;
use crate::settings::{BrowserSettings, HttpSettings, PortalConfig};
use crate::utils::logging::LoggingHelper;

const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A launched browser plus the task driving its CDP connection
///
/// Dropping the session aborts the handler task; chromiumoxide kills the
/// child process when the `Browser` is dropped.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    wait: Duration,
}

impl BrowserSession {
    /// Launch an isolated browser
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Configuration`] when no executable is found and
    /// [`PortalError::AuthenticationFailure`] when the launch fails or times out.
    pub async fn launch(settings: &BrowserSettings, wait: Duration) -> Result<Self, PortalError> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .request_timeout(wait);
        if let Some(path) = &settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| PortalError::Configuration(format!("failed to build browser config: {e}")))?;

        LoggingHelper::log_browser_step("launching");
        let (browser, mut handler) = timeout(wait, Browser::launch(config))
            .await
            .map_err(|_| PortalError::authentication("timed out launching the browser"))?
            .map_err(|e| PortalError::authentication(format!("failed to launch the browser: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            wait,
        })
    }

    /// Close the browser and stop the handler task
    ///
    /// Each step is bounded by the element wait; a browser that does not exit
    /// in time is killed when the session drops.
    pub async fn shutdown(mut self) {
        LoggingHelper::log_browser_step("shutting down");
        if bounded_teardown("close", self.wait, self.browser.close()).await {
            bounded_teardown("exit", self.wait, self.browser.wait()).await;
        }
        // Drop aborts the handler task
    }
}

/// Run one teardown step; `false` when it did not finish within `wait`
async fn bounded_teardown<F, T, E>(step: &str, wait: Duration, step_future: F) -> bool
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match timeout(wait, step_future).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            log::debug!("Browser {step} reported: {e}");
            true
        }
        Err(_) => {
            log::warn!("Browser {step} did not finish within {wait:?}");
            false
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

pub struct BrowserLoginAcquirer {
    portal: PortalConfig,
    settings: BrowserSettings,
    element_wait: Duration,
}

impl BrowserLoginAcquirer {
    /// # Errors
    ///
    /// Returns [`PortalError::Configuration`] when the portal has no browser block.
    pub fn new(portal: PortalConfig, http: &HttpSettings) -> Result<Self, PortalError> {
        let settings = portal.browser.clone().ok_or_else(|| {
            PortalError::Configuration(format!(
                "portal '{}' has no browser settings",
                portal.name
            ))
        })?;
        Ok(Self {
            portal,
            settings,
            element_wait: http.element_wait(),
        })
    }

    fn login_url(&self, tenant: &str) -> String {
        render_login_url(
            &self.settings.login_url_template,
            &self.portal.base_url,
            tenant,
        )
    }

    async fn login(
        &self,
        session: &BrowserSession,
        credentials: &LoginCredentials,
        tenant: &str,
    ) -> Result<String, PortalError> {
        let url = self.login_url(tenant);
        LoggingHelper::log_browser_step(&format!("opening {url}"));
        let page = timeout(self.element_wait, session.browser.new_page(url.as_str()))
            .await
            .map_err(|_| PortalError::authentication("timed out opening the login page"))?
            .map_err(|e| PortalError::authentication(format!("failed to open the login page: {e}")))?;

        let username = self
            .wait_for_element(&page, &self.settings.username_selector)
            .await?;
        let password = self
            .wait_for_element(&page, &self.settings.password_selector)
            .await?;

        LoggingHelper::log_browser_step("typing credentials");
        username
            .click()
            .await
            .map_err(|e| PortalError::authentication(format!("failed to focus username: {e}")))?;
        username
            .type_str(&credentials.identifier)
            .await
            .map_err(|e| PortalError::authentication(format!("failed to type username: {e}")))?;
        password
            .click()
            .await
            .map_err(|e| PortalError::authentication(format!("failed to focus password: {e}")))?;
        password
            .type_str(&credentials.secret)
            .await
            .map_err(|e| PortalError::authentication(format!("failed to type password: {e}")))?;

        let submit = self
            .wait_for_element(&page, &self.settings.submit_selector)
            .await?;
        submit
            .click()
            .await
            .map_err(|e| PortalError::authentication(format!("failed to submit: {e}")))?;

        // Some logins re-render in place instead of navigating
        if timeout(self.element_wait, page.wait_for_navigation())
            .await
            .is_err()
        {
            LoggingHelper::log_browser_step("no navigation after submit");
        }

        let current = page
            .url()
            .await
            .map_err(|e| PortalError::authentication(format!("failed to read page URL: {e}")))?
            .unwrap_or_default();

        if is_login_url(&current, &self.portal.login_path) {
            let message = self.error_text(&page).await.unwrap_or_else(|| {
                "still on the login page after submitting credentials".to_string()
            });
            return Err(PortalError::authentication(message));
        }

        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| PortalError::authentication(format!("failed to read cookies: {e}")))?;
        cookies
            .into_iter()
            .find(|cookie| cookie.name == self.portal.auth_cookie && !cookie.value.is_empty())
            .map(|cookie| cookie.value)
            .ok_or_else(|| {
                PortalError::authentication(format!(
                    "{} cookie missing after login",
                    self.portal.auth_cookie
                ))
            })
    }

    /// Poll for `selector` until it appears or the element wait expires
    async fn wait_for_element(&self, page: &Page, selector: &str) -> Result<Element, PortalError> {
        let deadline = Instant::now() + self.element_wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, page.find_element(selector)).await {
                Ok(Ok(element)) => return Ok(element),
                Ok(Err(_)) if Instant::now() + ELEMENT_POLL_INTERVAL < deadline => {
                    sleep(ELEMENT_POLL_INTERVAL).await;
                }
                _ => {
                    return Err(PortalError::authentication(format!(
                        "timed out waiting for '{selector}'"
                    )))
                }
            }
        }
    }

    /// Visible error message on the login page, if any
    async fn error_text(&self, page: &Page) -> Option<String> {
        let element = page.find_element(&self.settings.error_selector).await.ok()?;
        element
            .inner_text()
            .await
            .ok()
            .flatten()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

#[async_trait]
impl SessionAcquirer for BrowserLoginAcquirer {
    async fn acquire(
        &self,
        credentials: &LoginCredentials,
        tenant: &str,
    ) -> Result<SessionCredential, PortalError> {
        let tenant = effective_tenant(tenant, &self.portal);
        LoggingHelper::log_login_start(&self.portal.name, self.strategy_name(), &tenant);

        let outcome = match BrowserSession::launch(&self.settings, self.element_wait).await {
            Ok(session) => {
                let outcome = self.login(&session, credentials, &tenant).await;
                session.shutdown().await;
                outcome
            }
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
        "browser"
    }
}

/// Substitute `{base}` and `{tenant}` in a login URL template
#[must_use]
pub fn render_login_url(template: &str, base_url: &str, tenant: &str) -> String {
    template
        .replace("{base}", base_url.trim_end_matches('/'))
        .replace("{tenant}", &urlencoding::encode(tenant))
}

/// Whether `url` still points at the login path
#[must_use]
pub fn is_login_url(url: &str, login_path: &str) -> bool {
    let login_path = login_path.trim_matches('/').to_ascii_lowercase();
    if login_path.is_empty() {
        return false;
    }
    let path = url::Url::parse(url).map_or_else(
        |_| url.split(['?', '#']).next().unwrap_or_default().to_string(),
        |parsed| parsed.path().to_string(),
    );
    path.trim_end_matches('/')
        .to_ascii_lowercase()
        .ends_with(&login_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_login_url() {
        assert_eq!(
            render_login_url("{base}/{tenant}/login", "https://admin.avec.beauty/", "salao x"),
            "https://admin.avec.beauty/salao%20x/login"
        );
        assert_eq!(
            render_login_url("{base}/login", "https://portal.test", "ignored"),
            "https://portal.test/login"
        );
    }

    #[test]
    fn test_is_login_url() {
        assert!(is_login_url("https://admin.avec.beauty/salao/login", "/login"));
        assert!(is_login_url("https://admin.avec.beauty/salao/login/?erro=1", "/login"));
        assert!(!is_login_url("https://admin.avec.beauty/admin/dashboard", "/login"));
        assert!(!is_login_url("https://admin.avec.beauty/admin", ""));
    }

    #[test]
    fn test_new_requires_browser_block() {
        let http = HttpSettings::default();
        assert!(BrowserLoginAcquirer::new(PortalConfig::avec(), &http).is_ok());
        assert!(matches!(
            BrowserLoginAcquirer::new(PortalConfig::elos(), &http),
            Err(PortalError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_teardown_step_is_bounded() {
        let wait = Duration::from_millis(20);
        let started = Instant::now();
        let hung = std::future::pending::<Result<(), std::io::Error>>();
        assert!(!bounded_teardown("exit", wait, hung).await);
        assert!(started.elapsed() < Duration::from_secs(2));

        let failed = async { Err::<(), _>(std::io::Error::other("already closed")) };
        assert!(bounded_teardown("close", wait, failed).await);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_failed_login_releases_browser() {
        let mut portal = PortalConfig::avec();
        portal.base_url = "data:text/html,".to_string();
        let mut browser = portal.browser.clone().unwrap();
        browser.login_url_template =
            "data:text/html,<form action='/login'><input name='usuario'></form>".to_string();
        portal.browser = Some(browser);

        let http = HttpSettings {
            element_wait_ms: 2_000,
            ..HttpSettings::default()
        };
        let acquirer = BrowserLoginAcquirer::new(portal, &http).unwrap();
        let err = acquirer
            .acquire(&LoginCredentials::new("ana", "pw"), "salao")
            .await
            .unwrap_err();
        assert!(err.is_authentication());
    }
}
