//! Data-surface client
//!
//! Sends calls with the request context's cookies and the browser header
//! profile, then classifies the answer:
//!
//! - `401`/`403`, or a login page in place of data: authentication failure
//! - any other non-2xx, or a transport error: upstream unavailable
//! - a 2xx body that is not the JSON the caller asked for: extraction failure

use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::PortalError;
use crate::extract::ensure_not_login_page;
use crate::session::RequestContext;
use crate::settings::{HttpSettings, PortalConfig};
use crate::utils::headers::{BrowserHeaderProfile, RequestStyle, STRUCTURE_HEADER};
use crate::utils::logging::LoggingHelper;

pub struct PortalClient {
    portal: PortalConfig,
    client: Client,
    headers: BrowserHeaderProfile,
}

impl PortalClient {
    /// # Errors
    ///
    /// Returns [`PortalError::Configuration`] if the HTTP client cannot be built.
    pub fn new(portal: PortalConfig, http: &HttpSettings) -> Result<Self, PortalError> {
        let client = http
            .client_builder()
            .build()
            .map_err(|e| PortalError::Configuration(format!("failed to build HTTP client: {e}")))?;
        let headers = BrowserHeaderProfile::new(
            &portal.base_url,
            portal.url(&portal.endpoints.referer_path),
        );
        Ok(Self {
            portal,
            client,
            headers,
        })
    }

    #[must_use]
    pub fn portal(&self) -> &PortalConfig {
        &self.portal
    }

    /// GET `path` with query parameters and return the body
    ///
    /// # Errors
    ///
    /// See the module documentation for the classification.
    pub async fn get_text(
        &self,
        path: &str,
        query: &[(String, String)],
        context: &RequestContext,
    ) -> Result<String, PortalError> {
        let url = self.portal.url(path);
        let builder = self.prepare(self.client.get(&url).query(query), context);
        self.send("GET", &url, builder).await
    }

    /// POST `form` urlencoded to `path` and return the body
    ///
    /// # Errors
    ///
    /// See the module documentation for the classification.
    pub async fn post_form_text(
        &self,
        path: &str,
        form: &[(&str, &str)],
        context: &RequestContext,
    ) -> Result<String, PortalError> {
        let url = self.portal.url(path);
        let builder = self.prepare(self.client.post(&url).form(form), context);
        self.send("POST", &url, builder).await
    }

    /// GET `path` and decode the JSON body
    ///
    /// # Errors
    ///
    /// See the module documentation for the classification.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        context: &RequestContext,
    ) -> Result<T, PortalError> {
        let body = self.get_text(path, query, context).await?;
        decode_json(path, &body)
    }

    /// POST `form` to `path` and decode the JSON body
    ///
    /// # Errors
    ///
    /// See the module documentation for the classification.
    pub async fn post_form_json<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
        context: &RequestContext,
    ) -> Result<T, PortalError> {
        let body = self.post_form_text(path, form, context).await?;
        decode_json(path, &body)
    }

    fn prepare(&self, builder: RequestBuilder, context: &RequestContext) -> RequestBuilder {
        let builder = self
            .headers
            .apply(builder, RequestStyle::Xhr)
            .header(COOKIE, context.cookie_header());
        if context.structure_id().is_empty() {
            builder
        } else {
            builder.header(STRUCTURE_HEADER, context.structure_id())
        }
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        builder: RequestBuilder,
    ) -> Result<String, PortalError> {
        LoggingHelper::log_portal_call(method, url);
        let outcome = match builder.send().await {
            Ok(response) => {
                let status = response.status();
                match response.text().await {
                    Ok(body) => classify(status, &body).map(|()| body),
                    Err(e) => Err(PortalError::from_transport(&e)),
                }
            }
            Err(e) => Err(PortalError::from_transport(&e)),
        };

        if let Err(err) = &outcome {
            LoggingHelper::log_upstream_failure(url, err);
        }
        outcome
    }
}

/// Map a data-surface answer onto the error taxonomy
pub(crate) fn classify(status: StatusCode, body: &str) -> Result<(), PortalError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(PortalError::authentication(format!(
            "portal answered with status {status}"
        )));
    }
    if !status.is_success() {
        return Err(PortalError::upstream(Some(status.as_u16()), body));
    }
    ensure_not_login_page(body)
}

fn decode_json<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, PortalError> {
    serde_json::from_str(body)
        .map_err(|e| PortalError::ExtractionFailure(format!("{path} did not return the expected JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_statuses() {
        assert!(classify(StatusCode::UNAUTHORIZED, "").unwrap_err().is_authentication());
        assert!(classify(StatusCode::FORBIDDEN, "").unwrap_err().is_authentication());
    }

    #[test]
    fn test_classify_outage_keeps_status_and_snippet() {
        match classify(StatusCode::SERVICE_UNAVAILABLE, "maintenance window") {
            Err(PortalError::UpstreamUnavailable { status, snippet }) => {
                assert_eq!(status, Some(503));
                assert_eq!(snippet, "maintenance window");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_classify_login_page_served_as_data() {
        let body = r#"<form action="/Login"><input type="password" name="Password"></form>"#;
        assert!(classify(StatusCode::OK, body).unwrap_err().is_authentication());
        assert!(classify(StatusCode::OK, r#"{"Data":[]}"#).is_ok());
    }

    #[test]
    fn test_decode_json_failure_is_extraction() {
        let err = decode_json::<serde_json::Value>("/Scheduler/Read", "<html>").unwrap_err();
        assert!(matches!(err, PortalError::ExtractionFailure(_)));
    }
}
