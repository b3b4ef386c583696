//! Timestamp utilities
//!
//! All persisted timestamps are epoch milliseconds (UTC).

use chrono::{DateTime, TimeZone, Utc};

/// Current UTC time as epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert epoch milliseconds back to a UTC timestamp
///
/// Returns `None` for values outside chrono's representable range.
pub fn ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_ms_is_recent() {
        let ms = now_ms();
        // After 2020-01-01, before 2100-01-01
        assert!(ms > 1_577_836_800_000);
        assert!(ms < 4_102_444_800_000);
    }

    #[tokio::test]
    async fn test_now_ms_advances() {
        let t1 = now_ms();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let t2 = now_ms();
        assert!(t2 > t1);
    }

    #[test]
    fn test_ms_to_datetime_roundtrips_now() {
        let t = Utc::now();
        let back = ms_to_datetime(t.timestamp_millis()).unwrap();
        assert_eq!(back.timestamp_millis(), t.timestamp_millis());
    }

    #[test]
    fn test_ms_to_datetime_epoch() {
        let epoch = ms_to_datetime(0).unwrap();
        assert_eq!(epoch.timestamp(), 0);
    }
}
