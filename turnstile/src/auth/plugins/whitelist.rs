//! Ingress address whitelist.

use crate::{
    auth::{
        context::AttemptContext,
        errors::{AuthError, AuthResult},
        pipeline::{Hooks, PhaseHook, Plugin},
    },
    security::{IpRange, is_loopback, normalize_ip},
};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// Restricts logins to the address ranges the credential lists
///
/// Loopback requests are always allowed. A loaded credential that cannot
/// report its ranges is a configuration error.
#[derive(Debug, Default, Clone, Copy)]
pub struct Whitelist;

#[async_trait]
impl PhaseHook for Whitelist {
    async fn run(&self, ctx: &mut AttemptContext) -> AuthResult<()> {
        let address = ctx.request().address.as_str();
        if is_loopback(address) {
            return Ok(());
        }
        let Some(credential) = ctx.credential() else {
            return Ok(());
        };
        let whitelist = credential
            .as_whitelist()
            .ok_or(AuthError::WhitelistUnsupported)?;

        let ranges = whitelist.ingress_address_ranges()?;
        if ranges.is_empty() {
            return Ok(());
        }

        let ip = normalize_ip(address).ok_or_else(|| AuthError::InvalidAddress(address.to_string()))?;
        if IpRange::any_contains(&ranges, ip) {
            return Ok(());
        }

        debug!("{} blocked from {ip}", ctx.username());
        Err(AuthError::IpBlocked {
            address: ip.to_string(),
        })
    }
}

impl Plugin for Whitelist {
    fn name(&self) -> &'static str {
        "whitelist"
    }

    fn install(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.on_before_auth(self);
    }
}
