use vigil_types::UserRecord;

/// Seconds left before the limit, or `None` when the record is unlimited.
/// Negative when accrual has already passed the limit.
pub fn remaining_secs(record: &UserRecord) -> Option<i64> {
    record
        .time_limit
        .map(|minutes| i64::from(minutes) * 60 - record.watch_time as i64)
}

/// Reaching the limit exactly counts as blocked. Unlimited records are
/// never blocked, whatever their accrued time.
pub fn is_blocked(record: &UserRecord) -> bool {
    remaining_secs(record).is_some_and(|r| r <= 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(watch_time: u64, time_limit: Option<u32>) -> UserRecord {
        UserRecord {
            username: "mika".to_string(),
            watch_time,
            last_active: 0,
            time_limit,
            last_reset: None,
        }
    }

    #[test]
    fn test_blocked_at_exact_boundary() {
        // 10 minutes = 600 seconds.
        assert_eq!(remaining_secs(&record(600, Some(10))), Some(0));
        assert!(is_blocked(&record(600, Some(10))));

        assert_eq!(remaining_secs(&record(599, Some(10))), Some(1));
        assert!(!is_blocked(&record(599, Some(10))));

        assert!(is_blocked(&record(601, Some(10))));
    }

    #[test]
    fn test_unlimited_is_never_blocked() {
        assert_eq!(remaining_secs(&record(0, None)), None);
        assert!(!is_blocked(&record(0, None)));
        assert!(!is_blocked(&record(u64::MAX / 2, None)));
    }
}
