use chrono::{DateTime, Utc};
use vigil_types::UserRecord;

use crate::{access, reset};

/// Seconds added per tick; also the tick period.
pub const DEFAULT_TICK_SECS: u64 = 30;

/// Timing knobs for one accrual engine. Both values are configuration:
/// the original product shipped with conflicting constants across
/// revisions, so nothing here is hardcoded.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub tick_secs: u64,
    pub reset_hour_utc: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
            reset_hour_utc: reset::DEFAULT_RESET_HOUR_UTC,
        }
    }
}

/// Accrual state. There is no transition back to `Idle` in normal
/// operation; connection teardown is the only exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching,
}

/// What an observed store update requires of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The record passed the reset check and replaced the local view.
    Current,
    /// The record predates the reset boundary. The caller must write this
    /// correction to the store; the local view stays as it was until the
    /// confirmed write echoes back through the subscription, so a stale
    /// in-flight increment can never race the correction on this client.
    Stale(UserRecord),
}

/// Per-connection watch-time accounting.
///
/// The engine is a plain state machine; the owning connection task drives
/// it from its timer and its store subscription, which serializes
/// corrections and accruals for the record on a single task. Every write
/// the engine produces round-trips the whole record.
pub struct AccrualEngine {
    config: EngineConfig,
    state: WatchState,
    record: UserRecord,
}

impl AccrualEngine {
    pub fn new(record: UserRecord, config: EngineConfig) -> Self {
        Self {
            config,
            state: WatchState::Idle,
            record,
        }
    }

    /// Latest record view accepted by `observe`.
    pub fn record(&self) -> &UserRecord {
        &self.record
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn blocked(&self) -> bool {
        access::is_blocked(&self.record)
    }

    /// Whether periodic ticks should fire: the session is watching and the
    /// limit has not been reached. Blocking is enforced here, not in any
    /// UI layer.
    pub fn ticking(&self) -> bool {
        self.state == WatchState::Watching && !self.blocked()
    }

    /// `Idle -> Watching` on the first accepted video. Returns true if the
    /// transition happened; opening further videos changes nothing.
    pub fn start_watching(&mut self) -> bool {
        if self.state == WatchState::Watching {
            return false;
        }
        self.state = WatchState::Watching;
        true
    }

    /// The next accrual write, or `None` when ticks are suppressed.
    ///
    /// Adds the fixed tick increment to the latest known total — never the
    /// wall-clock delta since the last tick, so drift and timer throttling
    /// cannot inflate the count. The local view is not touched here; it
    /// catches up when the write echoes back through the subscription, and
    /// a failed write is simply retried by the next tick.
    pub fn tick(&self, now: DateTime<Utc>) -> Option<UserRecord> {
        if !self.ticking() {
            return None;
        }
        let mut next = self.record.clone();
        next.watch_time += self.config.tick_secs;
        next.last_active = now.timestamp_millis();
        Some(next)
    }

    /// Store-subscription entry point: run the daily reset check, then
    /// replace the local view. Stale records are handed back for a
    /// correction write instead of being trusted.
    pub fn observe(&mut self, record: UserRecord, now: DateTime<Utc>) -> Observation {
        if reset::is_stale(record.last_active, now, self.config.reset_hour_utc) {
            return Observation::Stale(reset::corrected(&record, now));
        }
        self.record = record;
        Observation::Current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> EngineConfig {
        EngineConfig {
            tick_secs: 30,
            reset_hour_utc: 4,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn record(watch_time: u64, time_limit: Option<u32>, now: DateTime<Utc>) -> UserRecord {
        UserRecord {
            username: "mika".to_string(),
            watch_time,
            last_active: now.timestamp_millis(),
            time_limit,
            last_reset: None,
        }
    }

    #[test]
    fn test_idle_engine_never_ticks() {
        let now = noon();
        let engine = AccrualEngine::new(record(0, None, now), config());
        assert_eq!(engine.state(), WatchState::Idle);
        assert!(!engine.ticking());
        assert!(engine.tick(now).is_none());
    }

    #[test]
    fn test_start_watching_transitions_once() {
        let now = noon();
        let mut engine = AccrualEngine::new(record(0, None, now), config());
        assert!(engine.start_watching());
        assert_eq!(engine.state(), WatchState::Watching);
        // Opening another video is not a second transition.
        assert!(!engine.start_watching());
    }

    #[test]
    fn test_monotonic_accrual_across_ticks() {
        let now = noon();
        let mut engine = AccrualEngine::new(record(120, None, now), config());
        engine.start_watching();

        // Each tick writes, and the confirmed write echoes back into the view.
        for _ in 0..5 {
            let next = engine.tick(now).unwrap();
            assert_eq!(engine.observe(next, now), Observation::Current);
        }
        assert_eq!(engine.record().watch_time, 120 + 5 * 30);
    }

    #[test]
    fn test_increment_is_fixed_not_wall_clock() {
        let now = noon();
        let mut engine = AccrualEngine::new(record(0, None, now), config());
        engine.start_watching();

        let first = engine.tick(now).unwrap();
        engine.observe(first, now);

        // Ten minutes of wall clock between ticks still adds one increment.
        let later = now + chrono::Duration::minutes(10);
        let second = engine.tick(later).unwrap();
        assert_eq!(second.watch_time, 60);
        assert_eq!(second.last_active, later.timestamp_millis());
    }

    #[test]
    fn test_ticks_stop_at_the_limit() {
        let now = noon();
        // One-minute limit, 30 seconds already accrued.
        let mut engine = AccrualEngine::new(record(30, Some(1), now), config());
        engine.start_watching();
        assert!(engine.ticking());

        let next = engine.tick(now).unwrap();
        assert_eq!(next.watch_time, 60);
        engine.observe(next, now);

        // Exactly at the boundary counts as blocked; no further writes.
        assert!(engine.blocked());
        assert!(!engine.ticking());
        assert!(engine.tick(now).is_none());
    }

    #[test]
    fn test_admin_reset_resumes_ticking() {
        let now = noon();
        let mut engine = AccrualEngine::new(record(60, Some(1), now), config());
        engine.start_watching();
        assert!(!engine.ticking());

        // An admin zeroed the watch time; the updated record arrives over
        // the subscription and accrual picks back up.
        engine.observe(record(0, Some(1), now), now);
        assert!(engine.ticking());
    }

    #[test]
    fn test_stale_observation_requests_correction() {
        let now = noon();
        let yesterday = now - chrono::Duration::days(1);
        let mut engine = AccrualEngine::new(record(0, None, now), config());

        let stale = UserRecord {
            username: "mika".to_string(),
            watch_time: 1800,
            last_active: yesterday.timestamp_millis(),
            time_limit: Some(30),
            last_reset: None,
        };
        let obs = engine.observe(stale, now);
        let Observation::Stale(correction) = obs else {
            panic!("expected a correction, got {:?}", obs);
        };
        assert_eq!(correction.watch_time, 0);
        assert_eq!(correction.time_limit, Some(30));
        assert_eq!(correction.last_reset, Some(now.timestamp_millis()));

        // No optimistic bypass: the view is untouched until the write
        // comes back confirmed.
        assert_eq!(engine.record().watch_time, 0);
        assert_eq!(engine.record().time_limit, None);
        assert_eq!(engine.observe(correction.clone(), now), Observation::Current);
        assert_eq!(engine.record(), &correction);
    }
}
