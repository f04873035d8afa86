use crate::Database;
use crate::models::UserRow;
use anyhow::Result;
use rusqlite::Connection;
use vigil_types::UserRecord;

impl Database {
    pub fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT username, watch_time, last_active, time_limit, last_reset
                 FROM users ORDER BY username",
            )?;
            let rows = stmt
                .query_map([], row_to_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Whole-row write. Replaces every field of the record — last write wins.
    /// Callers round-trip fields they do not intend to change; an omitted
    /// field here would be silently cleared for all readers.
    pub fn upsert_user(&self, record: &UserRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, watch_time, last_active, time_limit, last_reset)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(username) DO UPDATE SET
                     watch_time = excluded.watch_time,
                     last_active = excluded.last_active,
                     time_limit = excluded.time_limit,
                     last_reset = excluded.last_reset",
                rusqlite::params![
                    record.username,
                    record.watch_time as i64,
                    record.last_active,
                    record.time_limit.map(|m| m as i64),
                    record.last_reset,
                ],
            )?;
            Ok(())
        })
    }

    /// Insert a fresh record unless one already exists.
    /// Returns true if a row was created.
    pub fn insert_user_if_absent(&self, username: &str, now_ms: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO users (username, watch_time, last_active)
                 VALUES (?1, 0, ?2)",
                rusqlite::params![username, now_ms],
            )?;
            Ok(changed > 0)
        })
    }

    /// Overwrite the limit path only. Returns false if no such record.
    pub fn set_time_limit(&self, username: &str, minutes: u32) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET time_limit = ?2 WHERE username = ?1",
                rusqlite::params![username, minutes as i64],
            )?;
            Ok(changed > 0)
        })
    }

    /// Zero the watch-time path only. `last_active` and `last_reset` are
    /// left untouched so an admin reset stays distinguishable from a
    /// policy reset. Returns false if no such record.
    pub fn reset_watch_time(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET watch_time = 0 WHERE username = ?1",
                rusqlite::params![username],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT username, watch_time, last_active, time_limit, last_reset
         FROM users WHERE username = ?1",
    )?;

    let row = stmt.query_row([username], row_to_user).optional()?;

    Ok(row)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        username: row.get(0)?,
        watch_time: row.get(1)?,
        last_active: row.get(2)?,
        time_limit: row.get(3)?,
        last_reset: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(username: &str) -> UserRecord {
        UserRecord {
            username: username.to_string(),
            watch_time: 120,
            last_active: 1_700_000_000_000,
            time_limit: Some(30),
            last_reset: Some(1_699_900_000_000),
        }
    }

    #[test]
    fn test_upsert_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let rec = record("mika");

        db.upsert_user(&rec).unwrap();
        let got = db.get_user("mika").unwrap().unwrap().into_record();
        assert_eq!(got, rec);

        // Whole-row replace: a second write with fewer set fields clears them.
        let mut bare = rec.clone();
        bare.time_limit = None;
        bare.last_reset = None;
        db.upsert_user(&bare).unwrap();
        let got = db.get_user("mika").unwrap().unwrap().into_record();
        assert_eq!(got.time_limit, None);
        assert_eq!(got.last_reset, None);
    }

    #[test]
    fn test_insert_if_absent_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_user_if_absent("mika", 1000).unwrap());
        // Existing record is left alone.
        db.upsert_user(&record("mika")).unwrap();
        assert!(!db.insert_user_if_absent("mika", 2000).unwrap());
        let got = db.get_user("mika").unwrap().unwrap();
        assert_eq!(got.watch_time, 120);
    }

    #[test]
    fn test_reset_touches_only_watch_time() {
        let db = Database::open_in_memory().unwrap();
        let rec = record("mika");
        db.upsert_user(&rec).unwrap();

        assert!(db.reset_watch_time("mika").unwrap());
        let got = db.get_user("mika").unwrap().unwrap().into_record();
        assert_eq!(got.watch_time, 0);
        assert_eq!(got.last_active, rec.last_active);
        assert_eq!(got.time_limit, rec.time_limit);
        assert_eq!(got.last_reset, rec.last_reset);
    }

    #[test]
    fn test_field_writes_on_missing_record() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.set_time_limit("nobody", 10).unwrap());
        assert!(!db.reset_watch_time("nobody").unwrap());
    }
}
