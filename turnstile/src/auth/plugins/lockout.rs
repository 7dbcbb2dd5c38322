//! Consecutive-failure lockout.

use crate::{
    auth::{
        context::AttemptContext,
        errors::{AuthError, AuthResult},
        models::Phase,
        pipeline::{Hooks, PhaseHook, Plugin},
    },
    security::{FailCounter, LockStore},
};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

/// Default number of consecutive failures before an account is locked
pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 3;

/// Lockout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutConfig {
    /// Consecutive failures that trigger a lock; zero disables lockout
    pub threshold: u32,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOCKOUT_THRESHOLD,
        }
    }
}

/// Counts consecutive failures and locks the account at the threshold
///
/// Registered in two phases:
/// - **BeforeLoad**: a count already at the threshold locks the account and
///   fails the attempt before any password is checked.
/// - **AfterAuthed**: success clears the count, failure increments it and
///   locks the account as soon as the threshold is reached.
///
/// A successful lock clears the count, so the next attempt is rejected by the
/// lock check instead.
pub struct Lockout {
    counter: Arc<dyn FailCounter>,
    locks: Arc<dyn LockStore>,
    config: LockoutConfig,
}

impl Lockout {
    pub fn new(counter: Arc<dyn FailCounter>, locks: Arc<dyn LockStore>, config: LockoutConfig) -> Self {
        Self {
            counter,
            locks,
            config,
        }
    }

    fn enabled(&self) -> bool {
        self.config.threshold > 0
    }

    /// Lock the account and clear its count
    ///
    /// Returns `false` when no lock took effect; the count is then kept so the
    /// next attempt is still refused in BeforeLoad.
    async fn lock_account(&self, key: &str) -> AuthResult<bool> {
        match self.locks.lock(key).await {
            Ok(true) => {
                info!("{key} locked after {} failures", self.config.threshold);
                self.counter.reset(key).await?;
                Ok(true)
            }
            Ok(false) => {
                warn!("{key} reached {} failures with no account to lock", self.config.threshold);
                Ok(false)
            }
            Err(e) => {
                warn!("failed to lock {key}: {e}");
                Ok(false)
            }
        }
    }

    async fn before_load(&self, ctx: &mut AttemptContext) -> AuthResult<()> {
        let key = ctx.username().to_string();
        ctx.set_fail_key(key.clone());
        let count = self.counter.count(&key).await?;
        ctx.set_fail_count(count);

        if count >= self.config.threshold {
            if self.lock_account(&key).await? {
                ctx.set_fail_count(0);
            }
            return Err(AuthError::TooManyFailures { count });
        }
        Ok(())
    }

    async fn after_authed(&self, ctx: &mut AttemptContext) -> AuthResult<()> {
        // Plugins may rewrite the username mid-attempt; count against the
        // name that was checked in BeforeLoad
        let key = ctx.fail_key().unwrap_or(ctx.username()).to_string();
        if ctx.result().ok {
            self.counter.reset(&key).await?;
            ctx.set_fail_count(0);
            return Ok(());
        }

        let count = self.counter.increment(&key).await?;
        ctx.set_fail_count(count);
        debug!("{key} failed attempt {count}/{}", self.config.threshold);

        if count >= self.config.threshold && self.lock_account(&key).await? {
            ctx.set_fail_count(0);
        }
        Ok(())
    }
}

#[async_trait]
impl PhaseHook for Lockout {
    async fn run(&self, ctx: &mut AttemptContext) -> AuthResult<()> {
        if !self.enabled() {
            return Ok(());
        }
        match ctx.phase() {
            Phase::BeforeLoad => self.before_load(ctx).await,
            Phase::AfterAuthed => self.after_authed(ctx).await,
            _ => Ok(()),
        }
    }
}

impl Plugin for Lockout {
    fn name(&self) -> &'static str {
        "lockout"
    }

    fn install(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.on_before_load(self.clone());
        hooks.on_after_authed(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{LoginRequest, MemoryAccounts, test_support::account},
        security::MemoryFailCounter,
    };

    struct BrokenLocks;

    #[async_trait]
    impl LockStore for BrokenLocks {
        async fn is_locked(&self, _username: &str) -> AuthResult<bool> {
            Ok(false)
        }

        async fn lock(&self, _username: &str) -> AuthResult<bool> {
            Err(AuthError::Storage("read-only".to_string()))
        }
    }

    fn ctx_in(phase: Phase, ok: bool) -> AttemptContext {
        let mut ctx = AttemptContext::new(LoginRequest::new("alice", "pw", "10.0.0.1"));
        ctx.enter(phase);
        ctx.result_mut().ok = ok;
        ctx
    }

    #[tokio::test]
    async fn test_failures_lock_at_threshold() {
        let counter = Arc::new(MemoryFailCounter::new());
        let accounts = Arc::new(MemoryAccounts::from_accounts([account("alice", "pw")]));
        let lockout = Lockout::new(counter.clone(), accounts.clone(), LockoutConfig::default());

        for expected in 1..=2 {
            let mut ctx = ctx_in(Phase::AfterAuthed, false);
            lockout.run(&mut ctx).await.unwrap();
            assert_eq!(ctx.fail_count(), expected);
        }
        assert!(!accounts.is_locked("alice").await.unwrap());

        let mut ctx = ctx_in(Phase::AfterAuthed, false);
        lockout.run(&mut ctx).await.unwrap();
        assert!(accounts.is_locked("alice").await.unwrap());
        assert_eq!(counter.count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_success_resets_count() {
        let counter = Arc::new(MemoryFailCounter::new());
        counter.increment("alice").await.unwrap();
        counter.increment("alice").await.unwrap();
        let lockout = Lockout::new(
            counter.clone(),
            Arc::new(MemoryAccounts::new()),
            LockoutConfig::default(),
        );

        let mut ctx = ctx_in(Phase::AfterAuthed, true);
        lockout.run(&mut ctx).await.unwrap();
        assert_eq!(counter.count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_before_load_rejects_at_threshold() {
        let counter = Arc::new(MemoryFailCounter::new());
        for _ in 0..3 {
            counter.increment("alice").await.unwrap();
        }
        let accounts = Arc::new(MemoryAccounts::from_accounts([account("alice", "pw")]));
        let lockout = Lockout::new(counter.clone(), accounts.clone(), LockoutConfig::default());

        let mut ctx = ctx_in(Phase::BeforeLoad, false);
        let err = lockout.run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::TooManyFailures { count: 3 }));
        assert!(accounts.is_locked("alice").await.unwrap());
        assert_eq!(counter.count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_lock_keeps_count() {
        let counter = Arc::new(MemoryFailCounter::new());
        for _ in 0..3 {
            counter.increment("alice").await.unwrap();
        }
        let lockout = Lockout::new(counter.clone(), Arc::new(BrokenLocks), LockoutConfig::default());

        let mut ctx = ctx_in(Phase::BeforeLoad, false);
        assert!(matches!(
            lockout.run(&mut ctx).await,
            Err(AuthError::TooManyFailures { count: 3 })
        ));
        assert_eq!(counter.count("alice").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_account_stays_refused() {
        let counter = Arc::new(MemoryFailCounter::new());
        let lockout = Lockout::new(
            counter.clone(),
            Arc::new(MemoryAccounts::new()),
            LockoutConfig::default(),
        );

        for expected in 1..=3 {
            let mut ctx = ctx_in(Phase::AfterAuthed, false);
            lockout.run(&mut ctx).await.unwrap();
            assert_eq!(ctx.fail_count(), expected);
        }
        assert_eq!(counter.count("alice").await.unwrap(), 3);

        for _ in 0..2 {
            let mut ctx = ctx_in(Phase::BeforeLoad, false);
            assert!(matches!(
                lockout.run(&mut ctx).await,
                Err(AuthError::TooManyFailures { count: 3 })
            ));
        }
        assert_eq!(counter.count("alice").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_success_resets_name_seen_before_load() {
        let counter = Arc::new(MemoryFailCounter::new());
        counter.increment("Alice").await.unwrap();
        counter.increment("Alice").await.unwrap();
        let lockout = Lockout::new(
            counter.clone(),
            Arc::new(MemoryAccounts::new()),
            LockoutConfig::default(),
        );

        let mut ctx = AttemptContext::new(LoginRequest::new("Alice", "pw", "10.0.0.1"));
        lockout.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.fail_count(), 2);

        ctx.lowercase_username();
        ctx.enter(Phase::AfterAuthed);
        ctx.result_mut().ok = true;
        lockout.run(&mut ctx).await.unwrap();

        assert_eq!(counter.count("Alice").await.unwrap(), 0);
        assert_eq!(ctx.fail_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_threshold_disables() {
        let counter = Arc::new(MemoryFailCounter::new());
        let lockout = Lockout::new(
            counter.clone(),
            Arc::new(MemoryAccounts::new()),
            LockoutConfig { threshold: 0 },
        );

        let mut ctx = ctx_in(Phase::AfterAuthed, false);
        lockout.run(&mut ctx).await.unwrap();
        assert_eq!(counter.count("alice").await.unwrap(), 0);
    }
}
