//! Structured extraction from portal markup
//!
//! Endpoints of the portals return HTML or script fragments that were never
//! meant as data APIs. Extraction is split into:
//!
//! - [`rows`] - segmentation of a table into per-record fragments
//! - [`rules`] - field rules (name, pattern, default) and the per-entity rule tables
//! - [`entities`] - the records handed to callers and their builders
//!
//! A rule that does not match yields its default; it never aborts the
//! extraction of sibling fields.

pub mod entities;
pub mod rows;
pub mod rules;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::PortalError;
use crate::status::{StatusRecord, StatusRegistry};
use crate::temporal::{NormalizedTimestamp, TemporalNormalizer};

pub use entities::{
    AppointmentRecord, ClientRecord, ComandaRecord, EntityKind, ExtractedEntity, ScheduleItem,
    ServiceLineItem,
};
pub use rows::RowBoundary;
pub use rules::{FieldKind, FieldRule};

static PASSWORD_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<input[^>]*type\s*=\s*["']password["']"#).unwrap());

static LOGIN_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<form[^>]*action\s*=\s*["'][^"']*(?:login|signin|entrar)"#).unwrap()
});

const VERIFICATION_TOKEN_FIELD: &str = "__RequestVerificationToken";

/// Value produced by a field rule
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Timestamp(NormalizedTimestamp),
    Status(StatusRecord),
    Absent,
}

/// Field name to value map produced by [`HtmlEntityExtractor::extract_fields`]
#[derive(Debug, Clone, Default)]
pub struct ExtractedFields {
    values: HashMap<&'static str, FieldValue>,
}

impl ExtractedFields {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(FieldValue::Text(value)) => Some(value.clone()),
            Some(FieldValue::Number(value)) => Some(value.to_string()),
            _ => None,
        }
    }

    /// Numeric value, 0 when absent or not numeric
    #[must_use]
    pub fn number(&self, name: &str) -> f64 {
        match self.values.get(name) {
            Some(FieldValue::Number(value)) => *value,
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FieldValue::Flag(true)))
    }

    #[must_use]
    pub fn timestamp(&self, name: &str) -> Option<NormalizedTimestamp> {
        match self.values.get(name) {
            Some(FieldValue::Timestamp(ts)) => Some(ts.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self, name: &str) -> Option<StatusRecord> {
        match self.values.get(name) {
            Some(FieldValue::Status(status)) => Some(status.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Pulls structured records out of raw markup using field rules
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlEntityExtractor {
    normalizer: TemporalNormalizer,
}

impl HtmlEntityExtractor {
    #[must_use]
    pub fn new(normalizer: TemporalNormalizer) -> Self {
        Self { normalizer }
    }

    #[must_use]
    pub fn normalizer(&self) -> &TemporalNormalizer {
        &self.normalizer
    }

    /// Split `fragment` into row fragments; never fails
    #[must_use]
    pub fn extract_rows<'a>(&self, fragment: &'a str, boundary: &RowBoundary) -> Vec<&'a str> {
        boundary.segment(fragment)
    }

    /// Apply every rule independently against `fragment`
    #[must_use]
    pub fn extract_fields(&self, fragment: &str, rules: &[FieldRule]) -> ExtractedFields {
        let values = rules
            .iter()
            .map(|rule| (rule.name(), self.resolve(rule, fragment)))
            .collect();
        ExtractedFields { values }
    }

    /// Extract a single rule's raw capture, without type conversion
    #[must_use]
    pub fn extract_raw(&self, fragment: &str, rule: &FieldRule) -> Option<String> {
        rule.apply(fragment)
    }

    fn resolve(&self, rule: &FieldRule, fragment: &str) -> FieldValue {
        let Some(raw) = rule.apply(fragment) else {
            return rule.default_value().clone();
        };

        match rule.kind() {
            FieldKind::Text => FieldValue::Text(raw),
            FieldKind::Number => {
                parse_number(&raw).map_or_else(|| rule.default_value().clone(), FieldValue::Number)
            }
            FieldKind::Flag => FieldValue::Flag(matches!(
                raw.to_ascii_lowercase().as_str(),
                "true" | "1" | "sim" | "yes"
            )),
            FieldKind::Date => match self.normalizer.normalize(&raw, None) {
                Ok(ts) => FieldValue::Timestamp(ts),
                Err(err) => {
                    log::warn!("Field '{}' kept its default: {err}", rule.name());
                    rule.default_value().clone()
                }
            },
            FieldKind::Status => FieldValue::Status(StatusRegistry::resolve(&raw)),
        }
    }
}

/// Detect a login page served where data was expected
#[must_use]
pub fn is_login_page(body: &str) -> bool {
    PASSWORD_INPUT.is_match(body)
        && (LOGIN_FORM.is_match(body) || body.contains(VERIFICATION_TOKEN_FIELD))
}

/// Reclassify a data response that is actually the portal's login page
///
/// # Errors
///
/// Returns [`PortalError::AuthenticationFailure`] when the body carries the login-page signature.
pub fn ensure_not_login_page(body: &str) -> Result<(), PortalError> {
    if is_login_page(body) {
        Err(PortalError::authentication(
            "portal answered with its login page; the session is no longer valid",
        ))
    } else {
        Ok(())
    }
}

/// Safe numeric parse accepting both `1234.5` and `1.234,5`
#[must_use]
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Decode the handful of entities that show up inside attribute values
#[must_use]
pub fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"
        <input type="hidden" name="cliente" value="321">
        <input type="text" id="nomeCliente" class="form-control" value="Maria &amp; Filhos">
        <input type="text" id="dataComanda" value="01/05/2024">
        <input type="hidden" name="itemQtde[]" value="2">
        <input type="hidden" name="status" value="2.0">
    "#;

    fn rules() -> Vec<FieldRule> {
        vec![
            FieldRule::input_value("client_id", "cliente").unwrap(),
            FieldRule::element_value("client_name", "nomeCliente").unwrap(),
            FieldRule::element_value("date", "dataComanda").unwrap().date(),
            FieldRule::input_value("quantity", "itemQtde[]").unwrap().number(1.0),
            FieldRule::input_value("status", "status").unwrap().status(),
            FieldRule::input_value("missing_total", "itemTotal[]").unwrap().number(0.0),
            FieldRule::element_value("missing_text", "doesNotExist").unwrap(),
        ]
    }

    #[test]
    fn test_missing_field_does_not_cascade() {
        let extractor = HtmlEntityExtractor::default();
        let fields = extractor.extract_fields(FRAGMENT, &rules());

        assert_eq!(fields.len(), 7);
        assert_eq!(fields.text("client_id").as_deref(), Some("321"));
        assert_eq!(fields.text("client_name").as_deref(), Some("Maria & Filhos"));
        assert!((fields.number("quantity") - 2.0).abs() < f64::EPSILON);
        assert_eq!(fields.timestamp("date").unwrap().date_string(), "2024-05-01");
        assert_eq!(fields.status("status").unwrap().id, "aguardando");

        assert_eq!(fields.get("missing_total"), Some(&FieldValue::Number(0.0)));
        assert_eq!(fields.get("missing_text"), Some(&FieldValue::Absent));
    }

    #[test]
    fn test_unparseable_values_fall_back_to_default() {
        let html = r#"<input name="itemValor[]" value="abc"><input id="dataComanda" value="ontem">"#;
        let rules = vec![
            FieldRule::input_value("price", "itemValor[]").unwrap().number(0.0),
            FieldRule::element_value("date", "dataComanda").unwrap().date(),
        ];
        let fields = HtmlEntityExtractor::default().extract_fields(html, &rules);
        assert_eq!(fields.get("price"), Some(&FieldValue::Number(0.0)));
        assert_eq!(fields.get("date"), Some(&FieldValue::Absent));
    }

    #[test]
    fn test_login_page_detection() {
        let login = r#"<form action="/Login" method="post">
            <input name="__RequestVerificationToken" type="hidden" value="tok">
            <input type="password" name="Password"></form>"#;
        assert!(is_login_page(login));
        assert!(ensure_not_login_page(login).unwrap_err().is_authentication());

        let data = r#"<table><tr class="itemComanda"><td>1</td></tr></table>"#;
        assert!(!is_login_page(data));
        assert!(ensure_not_login_page(data).is_ok());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("150.00"), Some(150.0));
        assert_eq!(parse_number("1.234,50"), Some(1234.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
    }
}
