//! Narrow capabilities a loaded credential may offer to plugins.
//!
//! A plugin asks the credential for a capability through one of the `as_*`
//! probes on [`Credential`]. A `None` answer means the credential does not take
//! part in that plugin; whether that is a no-op or a configuration error is up
//! to the plugin.

use super::{
    errors::AuthResult,
    models::LoginRequest,
    pipeline::CheckOutcome,
};
use crate::security::IpRange;
use chrono::Duration;
use std::fmt;

/// Source tag of a locally stored account
pub const SOURCE_LOCAL: &str = "local";

/// Source tag of an account backed by a directory server
pub const SOURCE_LDAP: &str = "ldap";

/// Source tag of an API-only account
pub const SOURCE_API: &str = "api";

pub trait HasLock {
    fn is_locked(&self) -> bool;
}

pub trait HasSource {
    fn source(&self) -> &str;
}

pub trait HasWhitelist {
    /// Address ranges the account may log in from; empty means unrestricted
    fn ingress_address_ranges(&self) -> AuthResult<Vec<IpRange>>;
}

pub trait HasRoles {
    fn role_names(&self) -> Vec<String>;
}

/// Credential that can judge a password itself
pub trait Authenticator {
    fn authenticate(&self, request: &LoginRequest) -> CheckOutcome;
}

pub trait PasswordExpiredChecker {
    fn is_password_expired(&self, interval: Duration) -> bool;
}

pub trait CanLoginable {
    fn loginable(&self) -> bool;
}

/// A loaded credential
///
/// Implementors override the probes for the capabilities they actually have,
/// usually as `Some(self)`.
pub trait Credential: fmt::Debug + Send + Sync {
    fn as_lock(&self) -> Option<&dyn HasLock> {
        None
    }

    fn as_source(&self) -> Option<&dyn HasSource> {
        None
    }

    fn as_whitelist(&self) -> Option<&dyn HasWhitelist> {
        None
    }

    fn as_roles(&self) -> Option<&dyn HasRoles> {
        None
    }

    fn as_authenticator(&self) -> Option<&dyn Authenticator> {
        None
    }

    fn as_password_expiry(&self) -> Option<&dyn PasswordExpiredChecker> {
        None
    }

    fn as_loginable(&self) -> Option<&dyn CanLoginable> {
        None
    }
}

/// Source tag of a credential, if it carries one
pub fn source_of(credential: &dyn Credential) -> Option<&str> {
    credential.as_source().map(HasSource::source)
}
