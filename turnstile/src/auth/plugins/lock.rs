//! Locked-account checks.

use crate::{
    auth::{
        context::AttemptContext,
        errors::{AuthError, AuthResult},
        pipeline::{Hooks, PhaseHook, Plugin},
    },
    security::LockStore,
};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// Rejects locked accounts by asking the lock storage, before any credential is loaded
pub struct StoreLockCheck {
    store: Arc<dyn LockStore>,
}

impl StoreLockCheck {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PhaseHook for StoreLockCheck {
    async fn run(&self, ctx: &mut AttemptContext) -> AuthResult<()> {
        if self.store.is_locked(ctx.username()).await? {
            debug!("{} rejected: locked in storage", ctx.username());
            return Err(AuthError::AccountLocked);
        }
        Ok(())
    }
}

impl Plugin for StoreLockCheck {
    fn name(&self) -> &'static str {
        "store_lock"
    }

    fn install(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.on_before_load(self);
    }
}

/// Rejects credentials that report themselves locked
#[derive(Debug, Default, Clone, Copy)]
pub struct CapabilityLockCheck;

#[async_trait]
impl PhaseHook for CapabilityLockCheck {
    async fn run(&self, ctx: &mut AttemptContext) -> AuthResult<()> {
        let locked = ctx
            .credential()
            .and_then(|c| c.as_lock())
            .is_some_and(|lock| lock.is_locked());
        if locked {
            return Err(AuthError::AccountLocked);
        }
        Ok(())
    }
}

impl Plugin for CapabilityLockCheck {
    fn name(&self) -> &'static str {
        "capability_lock"
    }

    fn install(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.on_before_auth(self);
    }
}
