//! Authentication error types.

use crate::session::{OnlineInfo, SessionError};
use thiserror::Error;

/// Authentication errors
///
/// Variants fall into four groups that callers usually map differently:
/// soft failures ([`AuthError::InvalidCredentials`]), policy rejections,
/// external-service failures ([`AuthError::Directory`], [`AuthError::Storage`])
/// and session-registry errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong username or password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Account is locked
    #[error("Account is locked")]
    AccountLocked,

    /// Too many consecutive failures
    #[error("Too many failed login attempts ({count}), account locked")]
    TooManyFailures { count: u32 },

    /// Remote address is not whitelisted for the account
    #[error("Address {address} is not allowed to log in")]
    IpBlocked { address: String },

    /// Remote address or configured range could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Credential has no ingress address list
    #[error("Credential does not support address whitelisting")]
    WhitelistUnsupported,

    /// Account may only log in with a token
    #[error("Login type not allowed for this account")]
    LoginTypeNotAllowed,

    /// Account is disabled
    #[error("User is not allowed to log in")]
    UserDisabled,

    /// Directory user lacks the required role
    #[error("User does not hold required role {role}")]
    RoleRequired { role: String },

    /// Directory server error
    #[error("Directory service error: {0}")]
    Directory(String),

    /// Backing storage error (fail counter, lock store, credential lookup)
    #[error("Storage error: {0}")]
    Storage(String),

    /// User already has live sessions from other addresses
    #[error("User is already online from {} other session(s)", sessions.len())]
    AlreadyOnline { sessions: Vec<OnlineInfo> },

    /// Session registry error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl AuthError {
    /// Whether this is a policy decision rather than an infrastructure failure
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::AccountLocked
                | AuthError::TooManyFailures { .. }
                | AuthError::IpBlocked { .. }
                | AuthError::LoginTypeNotAllowed
                | AuthError::UserDisabled
                | AuthError::RoleRequired { .. }
        )
    }

    /// Whether the failure came from an external service the caller may retry
    pub fn is_external(&self) -> bool {
        matches!(self, AuthError::Directory(_) | AuthError::Storage(_))
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Directory and storage errors are sanitized so that server addresses and
    /// backend details never reach the client.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Directory(_) => "Directory service unavailable".to_string(),
            AuthError::Storage(_) | AuthError::InvalidAddress(_) => {
                "Internal server error".to_string()
            }
            AuthError::WhitelistUnsupported => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
