//! Session registry error types.

use super::models::OnlineInfo;
use thiserror::Error;

/// Session registry errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session with the given id
    #[error("Session not found")]
    NotFound,

    /// Last heartbeat is older than the session TTL
    #[error("Session expired")]
    Expired,

    /// User is online from other addresses
    #[error("User is online from {} other address(es)", sessions.len())]
    Conflict { sessions: Vec<OnlineInfo> },

    /// Caller-supplied key does not match the configured one
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Snapshot file could not be read or written
    #[error("Session snapshot I/O error: {0}")]
    Snapshot(#[from] std::io::Error),

    /// Snapshot file is not valid JSON
    #[error("Session snapshot format error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for session registry operations
pub type SessionResult<T> = Result<T, SessionError>;
