//! In-memory online-session registry.

use super::{
    clock::{Clock, SystemClock, from_nanos, to_nanos},
    errors::{SessionError, SessionResult},
    models::OnlineInfo,
};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::{
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Tracks who is logged in from where
///
/// Implementations must be safe to share between threads; every call is
/// synchronous and short.
pub trait SessionStore: Send + Sync {
    /// Open a session, or return the live one for the same username and address
    fn login(&self, username: &str, address: &str, api_key: Option<&str>) -> SessionResult<Uuid>;

    /// Heartbeat
    ///
    /// The timestamp is refreshed even when the session had already expired;
    /// the caller then gets [`SessionError::Expired`] and should re-authenticate.
    fn update_now(&self, uuid: Uuid, api_key: Option<&str>) -> SessionResult<()>;

    fn get_by_session_id(&self, uuid: Uuid) -> Option<OnlineInfo>;

    /// Live sessions, oldest first
    fn list(&self) -> Vec<OnlineInfo>;

    fn count(&self) -> usize;

    fn logout_by_session_id(&self, uuid: Uuid);

    /// Remove every session of `username`
    fn logout_by_username(&self, username: &str);

    /// Fails with [`SessionError::Conflict`] when `username` is online only from
    /// other addresses
    fn is_online_exists(&self, username: &str, address: &str) -> SessionResult<()>;

    /// Remove expired sessions, returning how many were removed
    fn delete_expired(&self) -> usize;

    /// Restore sessions from the snapshot file
    fn load(&self) -> SessionResult<()>;

    /// Write all sessions to the snapshot file
    fn store(&self) -> SessionResult<()>;
}

/// Session registry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum gap between heartbeats; `None` or zero disables expiry
    pub ttl: Option<Duration>,
    /// JSON snapshot used by `load`/`store`
    pub snapshot_path: Option<PathBuf>,
    /// Shared secret required from callers of `login` and `update_now`
    pub api_key: Option<String>,
}

impl SessionConfig {
    fn ttl_nanos(&self) -> Option<i64> {
        self.ttl
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX))
    }
}

#[derive(Debug)]
struct Entry {
    uuid: Uuid,
    username: String,
    address: String,
    created_at: DateTime<Utc>,
    /// Nanoseconds since the epoch, written without the map lock
    updated_at: AtomicI64,
}

impl Entry {
    fn new(uuid: Uuid, username: &str, address: &str, created_at: DateTime<Utc>, updated_at: i64) -> Self {
        Self {
            uuid,
            username: username.to_string(),
            address: address.to_string(),
            created_at,
            updated_at: AtomicI64::new(updated_at),
        }
    }

    fn updated_at(&self) -> i64 {
        self.updated_at.load(Ordering::Acquire)
    }

    fn info(&self) -> OnlineInfo {
        OnlineInfo {
            uuid: self.uuid,
            username: self.username.clone(),
            address: self.address.clone(),
            created_at: self.created_at,
            updated_at: from_nanos(self.updated_at()),
        }
    }
}

/// Single-process [`SessionStore`]
///
/// Locking is two-tier:
/// - the `RwLock` around the map guards structure: insert, remove and full
///   scans take it;
/// - each entry's `updated_at` is an atomic, so a heartbeat only needs the
///   read lock long enough to clone the entry's `Arc`.
///
/// Sweeps collect candidates under the read lock and delete under the write
/// lock, re-checking each candidate since a heartbeat may have landed in
/// between.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Entry>>>,
    config: SessionConfig,
    ttl_nanos: Option<i64>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl_nanos: config.ttl_nanos(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn check_api_key(&self, given: Option<&str>) -> SessionResult<()> {
        let Some(expected) = self.config.api_key.as_deref() else {
            return Ok(());
        };
        let given = given.unwrap_or_default();
        if bool::from(expected.as_bytes().ct_eq(given.as_bytes())) {
            Ok(())
        } else {
            Err(SessionError::InvalidApiKey)
        }
    }

    fn is_expired(&self, entry: &Entry, now: i64) -> bool {
        self.ttl_nanos
            .is_some_and(|ttl| now.saturating_sub(entry.updated_at()) > ttl)
    }

    // A panic while holding the lock cannot leave an entry half-written, so a
    // poisoned map is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Arc<Entry>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Arc<Entry>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn find_live(
        &self,
        sessions: &HashMap<Uuid, Arc<Entry>>,
        username: &str,
        address: &str,
        now: i64,
    ) -> Option<Uuid> {
        sessions
            .values()
            .find(|e| e.username == username && e.address == address && !self.is_expired(e, now))
            .map(|e| e.uuid)
    }
}

impl SessionStore for MemorySessionStore {
    fn login(&self, username: &str, address: &str, api_key: Option<&str>) -> SessionResult<Uuid> {
        self.check_api_key(api_key)?;

        let now = self.clock.now_nanos();
        if let Some(uuid) = self.find_live(&self.read(), username, address, now) {
            return Ok(uuid);
        }

        let mut sessions = self.write();
        if let Some(uuid) = self.find_live(&sessions, username, address, now) {
            return Ok(uuid);
        }

        let uuid = Uuid::new_v4();
        let entry = Entry::new(uuid, username, address, from_nanos(now), now);
        sessions.insert(uuid, Arc::new(entry));
        info!("session {uuid} opened for {username} from {address}");
        Ok(uuid)
    }

    fn update_now(&self, uuid: Uuid, api_key: Option<&str>) -> SessionResult<()> {
        self.check_api_key(api_key)?;

        let entry = self
            .read()
            .get(&uuid)
            .cloned()
            .ok_or(SessionError::NotFound)?;

        let now = self.clock.now_nanos();
        // fetch_max keeps updated_at monotonic under racing heartbeats
        let previous = entry.updated_at.fetch_max(now, Ordering::AcqRel);
        match self.ttl_nanos {
            Some(ttl) if now.saturating_sub(previous) > ttl => {
                debug!("heartbeat for expired session {uuid}");
                Err(SessionError::Expired)
            }
            _ => Ok(()),
        }
    }

    fn get_by_session_id(&self, uuid: Uuid) -> Option<OnlineInfo> {
        self.read().get(&uuid).map(|entry| entry.info())
    }

    fn list(&self) -> Vec<OnlineInfo> {
        self.delete_expired();
        let mut sessions: Vec<OnlineInfo> = self.read().values().map(|e| e.info()).collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.uuid.cmp(&b.uuid)));
        sessions
    }

    fn count(&self) -> usize {
        self.delete_expired();
        self.read().len()
    }

    fn logout_by_session_id(&self, uuid: Uuid) {
        if let Some(entry) = self.write().remove(&uuid) {
            info!("session {uuid} of {} closed", entry.username);
        }
    }

    fn logout_by_username(&self, username: &str) {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.username != username);
        let removed = before - sessions.len();
        if removed > 0 {
            info!("{removed} session(s) of {username} closed");
        }
    }

    fn is_online_exists(&self, username: &str, address: &str) -> SessionResult<()> {
        self.delete_expired();

        let sessions = self.read();
        let mut elsewhere = Vec::new();
        for entry in sessions.values().filter(|e| e.username == username) {
            if entry.address == address {
                return Ok(());
            }
            elsewhere.push(entry.info());
        }

        if elsewhere.is_empty() {
            Ok(())
        } else {
            elsewhere.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Err(SessionError::Conflict {
                sessions: elsewhere,
            })
        }
    }

    fn delete_expired(&self) -> usize {
        if self.ttl_nanos.is_none() {
            return 0;
        }

        let now = self.clock.now_nanos();
        let candidates: Vec<Uuid> = self
            .read()
            .values()
            .filter(|entry| self.is_expired(entry, now))
            .map(|entry| entry.uuid)
            .collect();
        if candidates.is_empty() {
            return 0;
        }

        let mut sessions = self.write();
        let mut removed = 0;
        for uuid in candidates {
            let still_expired = sessions
                .get(&uuid)
                .is_some_and(|entry| self.is_expired(entry, now));
            if still_expired {
                sessions.remove(&uuid);
                removed += 1;
            }
        }
        debug!("removed {removed} expired session(s)");
        removed
    }

    fn load(&self) -> SessionResult<()> {
        let Some(path) = &self.config.snapshot_path else {
            return Ok(());
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(());
        }

        let records: Vec<OnlineInfo> = serde_json::from_str(&content)?;
        let count = records.len();
        let mut sessions = self.write();
        for record in records {
            let updated_at = to_nanos(record.updated_at.max(record.created_at));
            let entry = Entry::new(
                record.uuid,
                &record.username,
                &record.address,
                record.created_at,
                updated_at,
            );
            sessions.insert(record.uuid, Arc::new(entry));
        }
        info!("loaded {count} session(s) from {}", path.display());
        Ok(())
    }

    fn store(&self) -> SessionResult<()> {
        let Some(path) = &self.config.snapshot_path else {
            return Ok(());
        };

        let records: Vec<OnlineInfo> = self.read().values().map(|e| e.info()).collect();
        let json = serde_json::to_string_pretty(&records)?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        info!("stored {} session(s) to {}", records.len(), path.display());
        Ok(())
    }
}
