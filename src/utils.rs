/// Utility functions for formatting and configuration parsing
use std::fmt::Display;
use std::str::FromStr;
use time::{format_description, OffsetDateTime};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Parse an optional setting, falling back to `default` when it is unset
///
/// An empty value counts as unset. A value that does not parse is an error
/// naming the variable.
pub fn parse_setting<T, F>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => value
            .parse()
            .map_err(|e| format!("{} has invalid value '{}': {}", key, value, e)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn formats_day_first() {
        let dt = datetime!(2024-03-07 09:05:01 UTC);
        assert_eq!(format_datetime(&dt), "07.03.2024 - 09:05:01");
    }

    #[test]
    fn parse_setting_uses_default_when_unset_or_blank() {
        let lookup = |key: &str| (key == "BLANK").then(|| "  ".to_string());
        assert_eq!(parse_setting(&lookup, "UNSET", 7u64), Ok(7));
        assert_eq!(parse_setting(&lookup, "BLANK", 7u64), Ok(7));
    }

    #[test]
    fn parse_setting_reports_bad_values() {
        let lookup = |_: &str| Some("soon".to_string());
        let err = parse_setting(&lookup, "HEARTBEAT_SECS", 10u64).unwrap_err();
        assert!(err.starts_with("HEARTBEAT_SECS has invalid value 'soon'"));
    }
}
