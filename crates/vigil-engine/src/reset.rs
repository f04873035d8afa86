use chrono::{DateTime, Days, Timelike, Utc};
use vigil_types::UserRecord;

/// Hour of day (UTC) at which accrued watch time expires.
pub const DEFAULT_RESET_HOUR_UTC: u32 = 4;

/// The most recent occurrence of the configured reset hour at or before
/// `now`: today's occurrence, or yesterday's if `now` is still earlier in
/// the day than the hour.
pub fn reset_boundary(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let date = if now.hour() < hour {
        now.date_naive() - Days::new(1)
    } else {
        now.date_naive()
    };
    date.and_hms_opt(hour, 0, 0)
        .expect("reset hour must be in 0..24")
        .and_utc()
}

/// A record is stale when its last write predates the current boundary.
/// Keyed on `last_active`, not `last_reset`: a record active yesterday but
/// never reset today is corrected on first observation today.
pub fn is_stale(last_active_ms: i64, now: DateTime<Utc>, hour: u32) -> bool {
    last_active_ms < reset_boundary(now, hour).timestamp_millis()
}

/// The correction for a stale record: watch time zeroed, both timestamps
/// refreshed, the limit preserved.
pub fn corrected(record: &UserRecord, now: DateTime<Utc>) -> UserRecord {
    let now_ms = now.timestamp_millis();
    UserRecord {
        username: record.username.clone(),
        watch_time: 0,
        last_active: now_ms,
        time_limit: record.time_limit,
        last_reset: Some(now_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_boundary_before_and_after_hour() {
        // Before 04:00 the boundary is yesterday's occurrence.
        let early = utc(2024, 3, 10, 2, 30);
        assert_eq!(reset_boundary(early, 4), utc(2024, 3, 9, 4, 0));

        // At or after 04:00 it is today's.
        let late = utc(2024, 3, 10, 4, 0);
        assert_eq!(reset_boundary(late, 4), utc(2024, 3, 10, 4, 0));
        let evening = utc(2024, 3, 10, 23, 0);
        assert_eq!(reset_boundary(evening, 4), utc(2024, 3, 10, 4, 0));
    }

    #[test]
    fn test_staleness_across_the_boundary() {
        // Active 03:59, observed 04:01 the same day: stale.
        let last = utc(2024, 3, 10, 3, 59).timestamp_millis();
        assert!(is_stale(last, utc(2024, 3, 10, 4, 1), 4));

        // Active 04:01, observed 23:00 the same day: not stale.
        let last = utc(2024, 3, 10, 4, 1).timestamp_millis();
        assert!(!is_stale(last, utc(2024, 3, 10, 23, 0), 4));

        // Exactly at the boundary is not stale (strictly earlier only).
        let last = utc(2024, 3, 10, 4, 0).timestamp_millis();
        assert!(!is_stale(last, utc(2024, 3, 10, 12, 0), 4));
    }

    #[test]
    fn test_staleness_spans_midnight() {
        // Active yesterday evening, observed at 01:00 today (before the
        // 04:00 boundary): yesterday's boundary already passed, not stale.
        let last = utc(2024, 3, 9, 22, 0).timestamp_millis();
        assert!(!is_stale(last, utc(2024, 3, 10, 1, 0), 4));

        // Active two days ago: stale even before today's boundary.
        let last = utc(2024, 3, 8, 22, 0).timestamp_millis();
        assert!(is_stale(last, utc(2024, 3, 10, 1, 0), 4));
    }

    #[test]
    fn test_correction_is_idempotent() {
        let now = utc(2024, 3, 10, 4, 5);
        let record = UserRecord {
            username: "mika".to_string(),
            watch_time: 1800,
            last_active: utc(2024, 3, 9, 21, 0).timestamp_millis(),
            time_limit: Some(30),
            last_reset: None,
        };

        let once = corrected(&record, now);
        assert_eq!(once.watch_time, 0);
        assert_eq!(once.last_active, now.timestamp_millis());
        assert_eq!(once.last_reset, Some(now.timestamp_millis()));
        assert_eq!(once.time_limit, Some(30));

        let twice = corrected(&once, now);
        assert_eq!(twice, once);
    }
}
