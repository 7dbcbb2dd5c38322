//! Login-type restriction for API-only accounts.

use crate::auth::{
    capabilities::{SOURCE_API, source_of},
    context::AttemptContext,
    errors::{AuthError, AuthResult},
    models::LoginType,
    pipeline::{Hooks, PhaseHook, Plugin},
};
use async_trait::async_trait;
use std::sync::Arc;

/// API-only accounts may only log in with a token
#[derive(Debug, Default, Clone, Copy)]
pub struct LoginTypeRestriction;

#[async_trait]
impl PhaseHook for LoginTypeRestriction {
    async fn run(&self, ctx: &mut AttemptContext) -> AuthResult<()> {
        let api_only = ctx
            .credential()
            .and_then(source_of)
            .is_some_and(|source| source == SOURCE_API);
        if api_only && ctx.request().login_type != LoginType::Token {
            return Err(AuthError::LoginTypeNotAllowed);
        }
        Ok(())
    }
}

impl Plugin for LoginTypeRestriction {
    fn name(&self) -> &'static str {
        "login_type"
    }

    fn install(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.on_before_auth(self);
    }
}
