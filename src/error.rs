//! Error taxonomy shared by session acquisition, the data surface and extraction
//!
//! Individual optional fields that fail to extract are never errors; they fall
//! back to their rule default inside the extractor. Only structural failures,
//! authentication problems and upstream outages surface here.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Maximum number of characters of an upstream body kept for diagnostics
pub const SNIPPET_LEN: usize = 200;

/// Errors raised while talking to a portal
#[derive(Debug, Error)]
pub enum PortalError {
    /// Missing or invalid credential, rejected login, or a login page served
    /// where data was expected
    #[error("authentication failure: {reason}")]
    AuthenticationFailure { reason: String },

    /// Network error, timeout, or non-2xx answer from the data surface
    #[error("upstream unavailable (status {status:?}): {snippet}")]
    UpstreamUnavailable {
        status: Option<u16>,
        snippet: String,
    },

    /// A required structural marker is absent from the markup
    #[error("extraction failure: {0}")]
    ExtractionFailure(String),

    /// Invalid portal configuration or HTTP client construction failure
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller input the portal call cannot be built from
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl PortalError {
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailure {
            reason: reason.into(),
        }
    }

    /// Build an upstream error keeping only a short prefix of the body
    pub fn upstream(status: Option<u16>, body: &str) -> Self {
        Self::UpstreamUnavailable {
            status,
            snippet: snippet(body),
        }
    }

    /// Classify a transport error from `reqwest`
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if err.is_timeout() {
            Self::upstream(status, "request timed out")
        } else {
            Self::upstream(status, &err.to_string())
        }
    }

    /// Short machine-readable kind used in JSON error bodies
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailure { .. } => "authentication_failure",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::ExtractionFailure(_) => "extraction_failure",
            Self::Configuration(_) => "configuration_error",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::AuthenticationFailure { .. })
    }
}

impl ResponseError for PortalError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailure { .. } => StatusCode::UNAUTHORIZED,
            Self::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::ExtractionFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

/// Tagged failure of date normalization, always carrying the raw input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("empty date value")]
    Empty,
    #[error("unrecognised date value: {raw}")]
    Unparseable { raw: String },
}

/// Only caller-supplied dates convert; extraction absorbs its own date failures
impl From<NormalizationError> for PortalError {
    fn from(err: NormalizationError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl NormalizationError {
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::Unparseable { raw } => raw,
        }
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LEN).collect()
}
