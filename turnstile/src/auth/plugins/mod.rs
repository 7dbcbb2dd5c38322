//! Compiled-in authentication plugins.
//!
//! Plugins run in the order they are handed to the
//! [`PipelineBuilder`](super::PipelineBuilder), within each phase.
//! A typical assembly:
//!
//! ```text
//! StoreLockCheck, Lockout          BeforeLoad
//! Whitelist, LoginTypeRestriction,
//! CapabilityLockCheck, LoginableCheck  BeforeAuth
//! LocalAuthenticator, DirectoryAuthenticator  Authenticating
//! Lockout, PasswordExpiry          AfterAuthed
//! ```

mod directory;
mod local;
mod lock;
mod lockout;
mod login_type;
mod loginable;
mod password_expiry;
mod whitelist;

pub use directory::DirectoryAuthenticator;
pub use local::LocalAuthenticator;
pub use lock::{CapabilityLockCheck, StoreLockCheck};
pub use lockout::{DEFAULT_LOCKOUT_THRESHOLD, Lockout, LockoutConfig};
pub use login_type::LoginTypeRestriction;
pub use loginable::LoginableCheck;
pub use password_expiry::PasswordExpiry;
pub use whitelist::Whitelist;
