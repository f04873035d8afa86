/// Database row types — these map directly to SQLite rows.
/// Distinct from the vigil-types API models to keep the DB layer independent.
use vigil_types::UserRecord;

pub struct UserRow {
    pub username: String,
    pub watch_time: i64,
    pub last_active: i64,
    pub time_limit: Option<i64>,
    pub last_reset: Option<i64>,
}

impl UserRow {
    pub fn into_record(self) -> UserRecord {
        UserRecord {
            username: self.username,
            watch_time: self.watch_time.max(0) as u64,
            last_active: self.last_active,
            time_limit: self.time_limit.map(|m| m.max(0) as u32),
            last_reset: self.last_reset,
        }
    }
}
