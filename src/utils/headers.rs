//! HTTP header handling
//!
//! Outbound: the browser profile portals expect on form posts and XHR calls.
//! Inbound: the caller's bearer token, structure and portal selectors.

use actix_web::HttpRequest;
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::RequestBuilder;

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7";
const SEC_CH_UA: &str = r#""Not_A Brand";v="99", "Chromium";v="135""#;

pub const STRUCTURE_HEADER: &str = "x-organization-structure";
pub const PORTAL_HEADER: &str = "x-portal";

// ===============================
// OUTBOUND BROWSER PROFILE
// ===============================

/// What the portal expects the request to look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStyle {
    /// Top-level navigation, e.g. loading or posting the login page
    Document,
    /// jQuery-style XHR returning JSON or HTML fragments
    Xhr,
}

/// Header set that makes outbound calls look like the portal's own front-end
#[derive(Debug, Clone)]
pub struct BrowserHeaderProfile {
    origin: String,
    referer: String,
}

impl BrowserHeaderProfile {
    /// Profile for calls to `origin`, claiming to come from `referer`
    pub fn new(origin: impl Into<String>, referer: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            referer: referer.into(),
        }
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Attach the profile to a request
    pub fn apply(&self, builder: RequestBuilder, style: RequestStyle) -> RequestBuilder {
        let builder = builder
            .header("user-agent", USER_AGENT)
            .header("accept-language", ACCEPT_LANGUAGE)
            .header("origin", &self.origin)
            .header("referer", &self.referer)
            .header("sec-ch-ua", SEC_CH_UA)
            .header("sec-ch-ua-mobile", "?0")
            .header("sec-ch-ua-platform", "\"macOS\"");

        match style {
            RequestStyle::Document => builder.header(
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
            RequestStyle::Xhr => builder
                .header("accept", "application/json, text/javascript, */*; q=0.01")
                .header("x-requested-with", "XMLHttpRequest")
                .header("sec-fetch-mode", "cors")
                .header("sec-fetch-site", "same-origin"),
        }
    }
}

// ===============================
// SET-COOKIE PARSING
// ===============================

/// Value of cookie `name` among `Set-Cookie` header values
///
/// The value runs up to the first `;`. Empty values (deletions) are ignored.
pub fn cookie_from_set_cookie<'a, I>(set_cookies: I, name: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    set_cookies.into_iter().find_map(|header| {
        let pair = header.split(';').next()?.trim();
        let (cookie_name, value) = pair.split_once('=')?;
        (cookie_name.trim() == name && !value.trim().is_empty())
            .then(|| value.trim().to_string())
    })
}

/// Value of cookie `name` set by a response
#[must_use]
pub fn cookie_from_headers(headers: &HeaderMap, name: &str) -> Option<String> {
    cookie_from_set_cookie(
        headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok()),
        name,
    )
}

// ===============================
// INBOUND REQUEST HEADERS
// ===============================

/// Token from `Authorization: Bearer <token>`
#[must_use]
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            scheme
                .eq_ignore_ascii_case("bearer")
                .then(|| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

/// Trimmed, non-empty value of a request header
#[must_use]
pub fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_cookie_from_set_cookie() {
        let headers = [
            "ASP.NET_SessionId=xyz; path=/; HttpOnly",
            "Authentication=abc123; path=/; secure",
        ];
        assert_eq!(
            cookie_from_set_cookie(headers, "Authentication").as_deref(),
            Some("abc123")
        );
        assert_eq!(cookie_from_set_cookie(headers, "Missing"), None);
    }

    #[test]
    fn test_deleted_cookie_is_ignored() {
        let headers = ["Authentication=; expires=Thu, 01 Jan 1970 00:00:00 GMT"];
        assert_eq!(cookie_from_set_cookie(headers, "Authentication"), None);
    }

    #[test]
    fn test_cookie_name_must_match_exactly() {
        let headers = ["XAuthentication=nope; path=/"];
        assert_eq!(cookie_from_set_cookie(headers, "Authentication"), None);
    }

    #[test]
    fn test_bearer_token() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer tok-1"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("tok-1"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(&req), None);
    }

    #[test]
    fn test_header_value_ignores_blank() {
        let req = TestRequest::default()
            .insert_header((STRUCTURE_HEADER, "  "))
            .insert_header((PORTAL_HEADER, "avec"))
            .to_http_request();
        assert_eq!(header_value(&req, STRUCTURE_HEADER), None);
        assert_eq!(header_value(&req, PORTAL_HEADER).as_deref(), Some("avec"));
    }

    #[test]
    fn test_profile_trims_origin() {
        let profile = BrowserHeaderProfile::new("https://portal.test/", "https://portal.test/Login");
        assert_eq!(profile.origin(), "https://portal.test");
    }
}
