//! # Turnstile
//!
//! Login handling for multi-user back offices: a pluggable authentication
//! pipeline and an online-session registry.
//!
//! ## Architecture
//!
//! An attempt runs through six phases, each with its own ordered hook list:
//!
//! - **BeforeLoad**: fail-count and stored-lock checks
//! - **Loading**: credential lookup
//! - **AfterLoaded**
//! - **BeforeAuth**: whitelist, login type, lock and loginable checks
//! - **Authenticating**: local password check, then directory bind
//! - **AfterAuthed**: fail-count bookkeeping, password-expiry flag
//!
//! Successful logins are recorded in a [`session::SessionStore`], which
//! answers "who is online from where", takes heartbeats and expires idle
//! sessions.
//!
//! ## Core Modules
//!
//! - [`auth`]: pipeline, plugins, capability traits, login service
//! - [`security`]: fail counter, lock storage, address ranges
//! - [`session`]: online-session registry

/// Authentication pipeline and plugins.
pub mod auth;
pub use auth::{AttemptContext, AuthError, AuthResult, LoginRequest, LoginResult, LoginService, Pipeline};

/// Fail counting, lock storage and address ranges.
pub mod security;

/// Online-session registry.
pub mod session;
pub use session::{MemorySessionStore, SessionConfig, SessionError, SessionStore};
