use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use vigil_types::UserRecord;

use crate::Database;

/// Fan-out notification for every confirmed write.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    RecordChanged(UserRecord),
}

/// The shared watch-time store: durable records plus a live-update
/// subscription.
///
/// Writes are last-write-wins per record with no compare-and-swap, so two
/// connections ticking the same record close together can each read the same
/// base value and the later write overwrites rather than compounds the
/// earlier one. That lost increment is accepted: this is an enforcement
/// tool, not a billing ledger.
///
/// Subscribers read a snapshot (`get_record`/`list_records`) first, then
/// receive a `StoreEvent` for every subsequent confirmed write.
#[derive(Clone)]
pub struct WatchStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    db: Database,
    updates: broadcast::Sender<StoreEvent>,
}

impl WatchStore {
    pub fn new(db: Database) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(StoreInner { db, updates }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.updates.subscribe()
    }

    pub fn get_record(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .inner
            .db
            .get_user(username)?
            .map(|row| row.into_record()))
    }

    pub fn list_records(&self) -> Result<Vec<UserRecord>> {
        Ok(self
            .inner
            .db
            .list_users()?
            .into_iter()
            .map(|row| row.into_record())
            .collect())
    }

    /// Fetch the record for `username`, creating a fresh one on first
    /// observed activity. A record that has never existed is initialized,
    /// never treated as stale.
    pub fn load_or_init(&self, username: &str, now_ms: i64) -> Result<UserRecord> {
        let created = self.inner.db.insert_user_if_absent(username, now_ms)?;
        let record = self
            .inner
            .db
            .get_user(username)?
            .map(|row| row.into_record())
            .ok_or_else(|| anyhow::anyhow!("record vanished after init: {}", username))?;
        if created {
            self.notify(record.clone());
        }
        Ok(record)
    }

    /// Whole-record write, last-write-wins. Used by accrual ticks and
    /// reset-policy corrections; both round-trip every field.
    pub fn put_record(&self, record: &UserRecord) -> Result<()> {
        self.inner.db.upsert_user(record)?;
        self.notify(record.clone());
        Ok(())
    }

    /// Admin control: overwrite the limit path for one record.
    /// Returns the updated record, or `None` if it does not exist.
    pub fn set_time_limit(&self, username: &str, minutes: u32) -> Result<Option<UserRecord>> {
        if !self.inner.db.set_time_limit(username, minutes)? {
            return Ok(None);
        }
        self.reread(username)
    }

    /// Admin control: zero the watch-time path for one record, leaving
    /// `last_active`/`last_reset` alone. Returns the updated record, or
    /// `None` if it does not exist.
    pub fn reset_watch_time(&self, username: &str) -> Result<Option<UserRecord>> {
        if !self.inner.db.reset_watch_time(username)? {
            return Ok(None);
        }
        self.reread(username)
    }

    fn reread(&self, username: &str) -> Result<Option<UserRecord>> {
        let record = self
            .inner
            .db
            .get_user(username)?
            .map(|row| row.into_record());
        if let Some(ref rec) = record {
            self.notify(rec.clone());
        }
        Ok(record)
    }

    fn notify(&self, record: UserRecord) {
        // No receivers is fine — nobody is subscribed yet.
        let _ = self.inner.updates.send(StoreEvent::RecordChanged(record));
    }
}
