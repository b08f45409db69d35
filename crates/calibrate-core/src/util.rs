//! Text and timestamp helpers shared by the store, queue and config code.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};

/// Longest excerpt of user input echoed back in an error message
const ERROR_EXCERPT_CHARS: usize = 120;

/// Trimmed text, or `None` for a missing or blank value.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// Bounded excerpt of `value` for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(ERROR_EXCERPT_CHARS).collect()
}

/// Current UTC time at microsecond precision, the resolution record versions are stored at.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Next record version strictly after `previous`.
///
/// Two writes within the same microsecond still produce distinct versions.
pub fn next_version(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_micros();
    let floor = previous.trunc_subsecs(6) + Duration::microseconds(1);
    now.max(floor)
}

/// Stable textual form of a timestamp, used for stored version columns.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`format_timestamp`] (or any RFC 3339 value).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
