use serde::{Deserialize, Serialize};

/// One watch-time record per username, owned by the store.
///
/// The record is always written whole (last-write-wins); the only
/// field-scoped writes are admin control's limit/reset paths. Readers must
/// tolerate absent optional fields — older records may predate `last_reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    /// Seconds accrued since the last reset. Never negative; only a reset
    /// path may decrease it.
    pub watch_time: u64,
    /// Epoch milliseconds of the last write.
    pub last_active: i64,
    /// Daily limit in minutes. `None` means unlimited.
    #[serde(default)]
    pub time_limit: Option<u32>,
    /// Epoch milliseconds of the last policy reset, if any.
    #[serde(default)]
    pub last_reset: Option<i64>,
}

impl UserRecord {
    /// A fresh record for a username seen for the first time.
    pub fn fresh(username: &str, now_ms: i64) -> Self {
        Self {
            username: username.to_string(),
            watch_time: 0,
            last_active: now_ms,
            time_limit: None,
            last_reset: None,
        }
    }
}

/// Resolved identity role. Administrators bypass accrual and blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Standard,
    Administrator,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Administrator)
    }
}
