//! Consecutive-failure tracking and account lock storage.

use crate::{
    auth::{AuthError, AuthResult},
    session::{Clock, SystemClock},
};
use async_trait::async_trait;
use log::debug;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

/// Per-username tally of consecutive authentication failures
#[async_trait]
pub trait FailCounter: Send + Sync {
    /// Current count; zero for unknown users
    async fn count(&self, username: &str) -> AuthResult<u32>;

    /// Add one failure and return the new count
    async fn increment(&self, username: &str) -> AuthResult<u32>;

    /// Zero the count
    async fn reset(&self, username: &str) -> AuthResult<()>;
}

/// Storage able to check and set account locks
///
/// Used by plugins that run before any credential is loaded.
#[async_trait]
pub trait LockStore: Send + Sync {
    async fn is_locked(&self, username: &str) -> AuthResult<bool>;

    /// Lock `username`, returning whether a lock took effect
    ///
    /// `Ok(false)` means the store has no record to lock, e.g. a directory
    /// user that was never provisioned.
    async fn lock(&self, username: &str) -> AuthResult<bool>;
}

/// How long [`MemoryFailCounter`] remembers a failure by default
pub const DEFAULT_FAIL_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy)]
struct Tally {
    count: u32,
    /// Nanoseconds since the epoch
    last_failure: i64,
}

#[derive(Debug, Default)]
struct Tallies {
    by_user: HashMap<String, Tally>,
    next_prune: i64,
}

/// In-memory fail counter guarded by a mutex
///
/// A tally is forgotten once its last failure is older than the window, so
/// usernames that fail a few times and never come back do not accumulate.
/// Stale tallies are pruned at most once per window, on increment.
#[derive(Debug)]
pub struct MemoryFailCounter {
    tallies: Mutex<Tallies>,
    window_nanos: i64,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryFailCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFailCounter {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_FAIL_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            tallies: Mutex::new(Tallies::default()),
            window_nanos: i64::try_from(window.as_nanos()).unwrap_or(i64::MAX),
            clock,
        }
    }

    /// Number of usernames with a tally, stale or not
    pub fn len(&self) -> usize {
        self.tallies().map(|t| t.by_user.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tallies(&self) -> AuthResult<MutexGuard<'_, Tallies>> {
        self.tallies
            .lock()
            .map_err(|_| AuthError::Storage("fail counter lock poisoned".to_string()))
    }

    fn is_stale(&self, tally: &Tally, now: i64) -> bool {
        now.saturating_sub(tally.last_failure) > self.window_nanos
    }
}

#[async_trait]
impl FailCounter for MemoryFailCounter {
    async fn count(&self, username: &str) -> AuthResult<u32> {
        let now = self.clock.now_nanos();
        Ok(self
            .tallies()?
            .by_user
            .get(username)
            .filter(|tally| !self.is_stale(tally, now))
            .map_or(0, |tally| tally.count))
    }

    async fn increment(&self, username: &str) -> AuthResult<u32> {
        let now = self.clock.now_nanos();
        let mut tallies = self.tallies()?;

        if now >= tallies.next_prune {
            let before = tallies.by_user.len();
            tallies.by_user.retain(|_, tally| !self.is_stale(tally, now));
            let pruned = before - tallies.by_user.len();
            if pruned > 0 {
                debug!("forgot {pruned} stale failure tally(s)");
            }
            tallies.next_prune = now.saturating_add(self.window_nanos);
        }

        let tally = tallies.by_user.entry(username.to_string()).or_insert(Tally {
            count: 0,
            last_failure: now,
        });
        if self.is_stale(tally, now) {
            tally.count = 0;
        }
        tally.count = tally.count.saturating_add(1);
        tally.last_failure = now;
        Ok(tally.count)
    }

    async fn reset(&self, username: &str) -> AuthResult<()> {
        self.tallies()?.by_user.remove(username);
        Ok(())
    }
}
