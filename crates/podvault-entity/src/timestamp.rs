//! Conversion between `DateTime<Utc>` and the persisted integer form.
//!
//! Timestamps are stored as milliseconds since the Unix epoch so that SQL
//! comparisons (`visible_after <= ?`) are plain integer comparisons.

use chrono::{DateTime, Utc};

/// Encode a timestamp for storage.
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Decode a stored timestamp.
pub fn from_millis(millis: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| sqlx::Error::Decode(format!("timestamp out of range: {millis}").into()))
}

/// Decode an optional stored timestamp.
pub fn from_millis_opt(millis: Option<i64>) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    millis.map(from_millis).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_roundtrip_keeps_ordering() {
        let a = DateTime::from_timestamp(1_700_000_000, 1_000_000).unwrap();
        let b = DateTime::from_timestamp(1_700_000_000, 2_000_000).unwrap();
        assert!(to_millis(a) < to_millis(b));
        assert_eq!(from_millis(to_millis(a)).unwrap(), a);
    }

    #[test]
    fn test_out_of_range_is_decode_error() {
        assert!(from_millis(i64::MAX).is_err());
        assert_eq!(from_millis_opt(None).unwrap(), None);
    }
}
