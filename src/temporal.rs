//! Date normalization for portal payloads
//!
//! Portals mix at least three encodings in the same payloads: epoch sentinels
//! (`/Date(1700000000000)/`), ISO-8601-like strings and localized
//! `DD/MM/YYYY` dates. [`TemporalNormalizer`] detects the encoding from
//! structural markers and renders everything in one target offset.

use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::NormalizationError;

static EPOCH_SENTINEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/Date\((-?\d+)(?:[+-]\d{4})?\)/$").unwrap());

static YEAR_FIRST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}").unwrap());

static DAY_FIRST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}").unwrap());

/// Formats tried when no structural marker matched
const FALLBACK_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y%m%d",
];

/// Encoding a raw date value was recognised as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceEncoding {
    EpochSentinel,
    Iso8601,
    DayMonthYear,
    /// Parsed by the generic fallback parser
    Generic,
}

impl SourceEncoding {
    /// Detect the encoding from structural markers only
    #[must_use]
    pub fn detect(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.starts_with("/Date(") {
            Some(Self::EpochSentinel)
        } else if YEAR_FIRST.is_match(raw) {
            Some(Self::Iso8601)
        } else if DAY_FIRST.is_match(raw) {
            Some(Self::DayMonthYear)
        } else {
            None
        }
    }
}

/// A zoned instant together with the value it was parsed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTimestamp {
    pub instant: DateTime<FixedOffset>,
    pub raw: String,
    pub encoding: SourceEncoding,
}

impl NormalizedTimestamp {
    /// Calendar date in the target offset as `YYYY-MM-DD`
    #[must_use]
    pub fn date_string(&self) -> String {
        self.instant.format("%Y-%m-%d").to_string()
    }
}

/// Converts heterogeneous date strings to timestamps in a single offset
#[derive(Debug, Clone, Copy)]
pub struct TemporalNormalizer {
    target: FixedOffset,
}

impl Default for TemporalNormalizer {
    /// Brasília time (UTC-03:00), the zone every configured portal reports in
    fn default() -> Self {
        Self::with_offset_minutes(-180)
    }
}

impl TemporalNormalizer {
    #[must_use]
    pub fn new(target: FixedOffset) -> Self {
        Self { target }
    }

    /// Build from an offset in minutes east of UTC; out-of-range values fall back to UTC
    #[must_use]
    pub fn with_offset_minutes(minutes: i32) -> Self {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self { target: offset }
    }

    #[must_use]
    pub fn target(&self) -> FixedOffset {
        self.target
    }

    /// Normalize a raw date value
    ///
    /// `hint` skips detection when the caller already knows the encoding. When the
    /// primary parser fails the generic fallback parser is tried; if that fails too
    /// the raw input is returned inside the error.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizationError`] when the value is empty or no parser accepts it.
    pub fn normalize(
        &self,
        raw: &str,
        hint: Option<SourceEncoding>,
    ) -> Result<NormalizedTimestamp, NormalizationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NormalizationError::Empty);
        }

        let encoding = hint.or_else(|| SourceEncoding::detect(trimmed));
        let primary = match encoding {
            Some(SourceEncoding::EpochSentinel) => self.parse_epoch_sentinel(trimmed),
            Some(SourceEncoding::Iso8601) => self.parse_iso(trimmed),
            Some(SourceEncoding::DayMonthYear) => self.parse_day_month_year(trimmed),
            Some(SourceEncoding::Generic) | None => None,
        };

        let (instant, encoding) = match (primary, encoding) {
            (Some(instant), Some(encoding)) => (instant, encoding),
            _ => {
                let instant = self.parse_generic(trimmed).ok_or_else(|| {
                    NormalizationError::Unparseable {
                        raw: raw.to_string(),
                    }
                })?;
                (instant, SourceEncoding::Generic)
            }
        };

        Ok(NormalizedTimestamp {
            instant,
            raw: raw.to_string(),
            encoding,
        })
    }

    fn parse_epoch_sentinel(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        let millis: i64 = EPOCH_SENTINEL.captures(raw)?.get(1)?.as_str().parse().ok()?;
        DateTime::from_timestamp_millis(millis).map(|utc| utc.with_timezone(&self.target))
    }

    fn parse_iso(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
            return Some(zoned.with_timezone(&self.target));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return self.localize(naive);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| self.localize(date.and_time(NaiveTime::MIN)))
    }

    fn parse_day_month_year(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        for format in ["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return self.localize(naive);
            }
        }
        NaiveDate::parse_from_str(raw, "%d/%m/%Y")
            .ok()
            .and_then(|date| self.localize(date.and_time(NaiveTime::MIN)))
    }

    fn parse_generic(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(zoned) = DateTime::parse_from_rfc2822(raw) {
            return Some(zoned.with_timezone(&self.target));
        }
        if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
            return Some(zoned.with_timezone(&self.target));
        }
        FALLBACK_FORMATS.iter().find_map(|format| {
            NaiveDateTime::parse_from_str(raw, format)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(raw, format)
                        .ok()
                        .map(|d| d.and_time(NaiveTime::MIN))
                })
                .and_then(|naive| self.localize(naive))
        })
    }

    fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self.target.from_local_datetime(&naive) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt),
            LocalResult::None => None,
        }
    }
}

/// Convert `YYYY-MM-DD` to the portal's `DD/MM/YYYY`
///
/// # Errors
///
/// Returns [`NormalizationError::Unparseable`] when the input is not a valid ISO date.
pub fn iso_date_to_portal(date: &str) -> Result<String, NormalizationError> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map(|d| d.format("%d/%m/%Y").to_string())
        .map_err(|_| NormalizationError::Unparseable {
            raw: date.to_string(),
        })
}

/// Convert the portal's `DD/MM/YYYY` to `YYYY-MM-DD`
///
/// # Errors
///
/// Returns [`NormalizationError::Unparseable`] when the input is not a valid localized date.
pub fn portal_date_to_iso(date: &str) -> Result<String, NormalizationError> {
    NaiveDate::parse_from_str(date.trim(), "%d/%m/%Y")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| NormalizationError::Unparseable {
            raw: date.to_string(),
        })
}

/// First and last second of an ISO day, rendered the way the scheduler expects
///
/// # Errors
///
/// Returns [`NormalizationError::Unparseable`] when the input is not a valid ISO date.
pub fn portal_day_bounds(date: &str) -> Result<(String, String), NormalizationError> {
    let day = iso_date_to_portal(date)?;
    Ok((format!("{day} 00:00:00"), format!("{day} 23:59:59")))
}

/// Parse an `H:MM` duration into minutes, 0 when malformed
#[must_use]
pub fn parse_duration_minutes(duration: &str) -> u32 {
    match duration.trim().split_once(':') {
        Some((hours, minutes)) if !minutes.contains(':') => {
            let hours: u32 = hours.trim().parse().unwrap_or(0);
            let minutes: u32 = minutes.trim().parse().unwrap_or(0);
            hours * 60 + minutes
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn normalizer() -> TemporalNormalizer {
        TemporalNormalizer::default()
    }

    #[test]
    fn test_epoch_sentinel() {
        let ts = normalizer()
            .normalize("/Date(1700000000000)/", None)
            .expect("epoch sentinel should parse");
        assert_eq!(ts.encoding, SourceEncoding::EpochSentinel);
        assert_eq!(ts.instant.to_rfc3339(), "2023-11-14T19:13:20-03:00");
        assert_eq!(ts.raw, "/Date(1700000000000)/");
    }

    #[test]
    fn test_epoch_sentinel_with_offset_suffix() {
        let ts = normalizer()
            .normalize("/Date(1700000000000-0300)/", None)
            .expect("offset suffix is ignored");
        assert_eq!(ts.instant.hour(), 19);
    }

    #[test]
    fn test_iso_date_only() {
        let ts = normalizer().normalize("2024-05-01", None).unwrap();
        assert_eq!(ts.encoding, SourceEncoding::Iso8601);
        assert_eq!((ts.instant.year(), ts.instant.month(), ts.instant.day()), (2024, 5, 1));
        assert_eq!(ts.instant.offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn test_iso_with_offset_is_converted() {
        let ts = normalizer()
            .normalize("2024-05-01T12:00:00Z", None)
            .unwrap();
        assert_eq!(ts.instant.hour(), 9);
        assert_eq!(ts.date_string(), "2024-05-01");
    }

    #[test]
    fn test_day_month_year() {
        let ts = normalizer().normalize("01/05/2024", None).unwrap();
        assert_eq!(ts.encoding, SourceEncoding::DayMonthYear);
        assert_eq!((ts.instant.year(), ts.instant.month(), ts.instant.day()), (2024, 5, 1));

        let with_time = normalizer().normalize("01/05/2024 14:30:00", None).unwrap();
        assert_eq!((with_time.instant.hour(), with_time.instant.minute()), (14, 30));
    }

    #[test]
    fn test_all_encodings_agree_on_calendar_day() {
        let n = normalizer();
        let iso = n.normalize("2024-05-01", None).unwrap();
        let local = n.normalize("01/05/2024", None).unwrap();
        assert_eq!(iso.instant, local.instant);
    }

    #[test]
    fn test_generic_fallback() {
        let ts = normalizer()
            .normalize("Wed, 01 May 2024 12:00:00 +0000", None)
            .unwrap();
        assert_eq!(ts.encoding, SourceEncoding::Generic);
        assert_eq!(ts.instant.hour(), 9);
    }

    #[test]
    fn test_failure_carries_raw_instead_of_now() {
        let err = normalizer().normalize("not a date", None).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::Unparseable {
                raw: "not a date".to_string()
            }
        );
        assert_eq!(normalizer().normalize("   ", None), Err(NormalizationError::Empty));
    }

    #[test]
    fn test_invalid_calendar_date_is_a_failure() {
        assert!(normalizer().normalize("31/02/2024", None).is_err());
    }

    #[test]
    fn test_hint_overrides_detection() {
        let ts = normalizer()
            .normalize("2024-05-01", Some(SourceEncoding::Iso8601))
            .unwrap();
        assert_eq!(ts.encoding, SourceEncoding::Iso8601);
    }

    #[test]
    fn test_date_conversions() {
        assert_eq!(iso_date_to_portal("2024-05-01").unwrap(), "01/05/2024");
        assert_eq!(portal_date_to_iso("01/05/2024").unwrap(), "2024-05-01");
        assert!(iso_date_to_portal("01/05/2024").is_err());

        let (start, end) = portal_day_bounds("2024-05-01").unwrap();
        assert_eq!(start, "01/05/2024 00:00:00");
        assert_eq!(end, "01/05/2024 23:59:59");
    }

    #[test]
    fn test_parse_duration_minutes() {
        assert_eq!(parse_duration_minutes("1:30"), 90);
        assert_eq!(parse_duration_minutes("0:45"), 45);
        assert_eq!(parse_duration_minutes(""), 0);
        assert_eq!(parse_duration_minutes("90"), 0);
        assert_eq!(parse_duration_minutes("1:xx"), 60);
    }
}
