//! Local password check delegated to the credential.

use crate::auth::{
    context::AttemptContext,
    pipeline::{CheckOutcome, Checker, Hooks, Plugin},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Lets a credential that implements
/// [`Authenticator`](crate::auth::capabilities::Authenticator) judge the password
///
/// Always the first checker of every pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalAuthenticator;

#[async_trait]
impl Checker for LocalAuthenticator {
    async fn check(&self, ctx: &mut AttemptContext) -> CheckOutcome {
        match ctx.credential().and_then(|c| c.as_authenticator()) {
            Some(authenticator) => authenticator.authenticate(ctx.request()),
            None => CheckOutcome::NotApplicable,
        }
    }
}

impl Plugin for LocalAuthenticator {
    fn name(&self) -> &'static str {
        "local"
    }

    fn install(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.on_authenticating(self);
    }
}
