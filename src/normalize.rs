// Shared normalization for the source adapters: timestamps, ids, links and
// the recency window.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use reqwest::Url;
use serde_json::Value;

use crate::error::ExtractError;

/// A listing is recent iff `now - posted_at <= window`.
/// Future timestamps (clock skew) have a negative age and are admitted.
pub fn is_recent(posted_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(posted_at) <= window
}

/// Normalize a source timestamp to UTC with seconds resolution.
///
/// Accepts epoch seconds (number or numeric string), RFC 3339 / ISO-8601
/// with `Z` or an offset, ISO-8601 without a zone (read as UTC) and
/// date-only `YYYY-MM-DD` strings (midnight UTC).
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, ExtractError> {
    match value {
        Value::Number(n) => {
            let secs = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| ExtractError::Timestamp(n.to_string()))?;
            from_epoch(secs, &n.to_string())
        }
        Value::String(s) => parse_timestamp_str(s),
        other => Err(ExtractError::Timestamp(other.to_string())),
    }
}

fn parse_timestamp_str(raw: &str) -> Result<DateTime<Utc>, ExtractError> {
    let s = raw.trim();

    if let Ok(secs) = s.parse::<i64>() {
        return from_epoch(secs, raw);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(truncate(dt.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(truncate(Utc.from_utc_datetime(&naive)));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(Utc.from_utc_datetime(&midnight));
    }

    Err(ExtractError::Timestamp(raw.to_string()))
}

fn from_epoch(secs: i64, raw: &str) -> Result<DateTime<Utc>, ExtractError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| ExtractError::Timestamp(raw.to_string()))
}

fn truncate(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}

/// Native ids arrive as numbers or strings depending on the source.
pub fn id_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-empty trimmed string field.
pub fn str_value<'a>(raw: &'a Value, key: &'static str) -> Option<&'a str> {
    raw.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Lowercase and collapse whitespace, for identity hashing.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a (possibly relative) link against the source's base URL.
pub fn resolve_link(base: &str, link: &str) -> Result<String, ExtractError> {
    let base = Url::parse(base).map_err(|_| ExtractError::Link(base.to_string()))?;
    base.join(link)
        .map(String::from)
        .map_err(|_| ExtractError::Link(link.to_string()))
}
