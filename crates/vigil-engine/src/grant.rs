use chrono::{DateTime, Duration, Utc};

/// A time-limited elevated-access grant earned via the shared secret.
/// Lives only in the connection that earned it; dropped on teardown,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevatedGrant {
    verified_at: DateTime<Utc>,
    ttl: Duration,
}

impl ElevatedGrant {
    pub fn new(now: DateTime<Utc>, ttl_secs: u64) -> Self {
        Self {
            verified_at: now,
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.verified_at + self.ttl
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Whole seconds until expiry; zero once expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at() - now).num_seconds().max(0) as u64
    }
}
