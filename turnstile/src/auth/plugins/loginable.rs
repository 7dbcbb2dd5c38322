//! Disabled-account check.

use crate::auth::{
    context::AttemptContext,
    errors::{AuthError, AuthResult},
    pipeline::{Hooks, PhaseHook, Plugin},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Rejects credentials that report they may not log in
#[derive(Debug, Default, Clone, Copy)]
pub struct LoginableCheck;

#[async_trait]
impl PhaseHook for LoginableCheck {
    async fn run(&self, ctx: &mut AttemptContext) -> AuthResult<()> {
        let refused = ctx
            .credential()
            .and_then(|c| c.as_loginable())
            .is_some_and(|l| !l.loginable());
        if refused {
            return Err(AuthError::UserDisabled);
        }
        Ok(())
    }
}

impl Plugin for LoginableCheck {
    fn name(&self) -> &'static str {
        "loginable"
    }

    fn install(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.on_before_auth(self);
    }
}
