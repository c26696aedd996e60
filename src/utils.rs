/// Formatting helpers for log output
use time::{format_description, OffsetDateTime};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]")
        .expect("Failed to create format description");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Render an HHMM-encoded clock value ("0800" decodes to 800) as "08:00".
pub fn format_hhmm(encoded: i64) -> String {
    format!("{:02}:{:02}", encoded / 100, encoded % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_datetime_is_day_first() {
        let dt = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(format_datetime(&dt), "14.11.2023 - 22:13:20");
    }

    #[test]
    fn test_format_hhmm_pads_both_halves() {
        assert_eq!(format_hhmm(800), "08:00");
        assert_eq!(format_hhmm(1830), "18:30");
        assert_eq!(format_hhmm(5), "00:05");
        assert_eq!(format_hhmm(0), "00:00");
    }
}
