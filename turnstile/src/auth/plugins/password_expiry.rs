//! Password-expiry warning.

use crate::auth::{
    context::AttemptContext,
    errors::AuthResult,
    pipeline::{Hooks, PhaseHook, Plugin},
};
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;

/// Flags `password_expired` on successful logins whose password is older than the interval
///
/// Never fails the attempt; the caller decides whether to force a change.
#[derive(Debug, Clone, Copy)]
pub struct PasswordExpiry {
    interval: Duration,
}

impl PasswordExpiry {
    /// A zero or negative interval disables the check
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn days(days: i64) -> Self {
        Self::new(Duration::days(days))
    }
}

#[async_trait]
impl PhaseHook for PasswordExpiry {
    async fn run(&self, ctx: &mut AttemptContext) -> AuthResult<()> {
        if !ctx.result().ok || self.interval <= Duration::zero() {
            return Ok(());
        }
        let expired = ctx
            .credential()
            .and_then(|c| c.as_password_expiry())
            .is_some_and(|checker| checker.is_password_expired(self.interval));
        if expired {
            ctx.result_mut().password_expired = true;
        }
        Ok(())
    }
}

impl Plugin for PasswordExpiry {
    fn name(&self) -> &'static str {
        "password_expiry"
    }

    fn install(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.on_after_authed(self);
    }
}
