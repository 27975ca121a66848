/// Wall-clock helpers used for key creation timestamps.
///
/// Timestamps are always UTC and taken from `chrono::Utc::now()`.

/// Returns the current Unix timestamp in milliseconds.
///
/// Key handles record creation time at millisecond resolution so that
/// keys generated back to back still order deterministically.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Formats a millisecond timestamp as RFC 3339 for display.
///
/// Returns `None` if the timestamp is out of chrono's representable range.
pub fn format_millis(millis: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_millis_is_reasonable() {
        let ms = now_timestamp_millis();
        // Should be after 2024-01-01 (1704067200000)
        assert!(ms > 1_704_067_200_000, "Timestamp {} is too old", ms);
        // Should be before 2100-01-01 (4102444800000)
        assert!(ms < 4_102_444_800_000, "Timestamp {} is too far in future", ms);
    }

    #[test]
    fn test_format_millis() {
        let formatted = format_millis(1_704_067_200_000).unwrap();
        assert!(formatted.starts_with("2024-01-01T00:00:00"));
    }
}
