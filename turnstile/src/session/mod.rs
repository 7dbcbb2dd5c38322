//! Online-session registry.
//!
//! Tracks which users are logged in from which address, refreshed by
//! heartbeats and expired after a configurable TTL.
//!
//! ## Example
//!
//! ```
//! use turnstile::session::{MemorySessionStore, SessionConfig, SessionError, SessionStore};
//!
//! let store = MemorySessionStore::new(SessionConfig::default());
//! let id = store.login("alice", "10.0.0.5", None).unwrap();
//! assert_eq!(store.login("alice", "10.0.0.5", None).unwrap(), id);
//!
//! store.update_now(id, None).unwrap();
//! assert!(matches!(
//!     store.is_online_exists("alice", "192.168.1.1"),
//!     Err(SessionError::Conflict { .. })
//! ));
//! ```

pub mod clock;
pub mod empty;
pub mod errors;
pub mod models;
pub mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use empty::EmptySessionStore;
pub use errors::{SessionError, SessionResult};
pub use models::OnlineInfo;
pub use registry::{MemorySessionStore, SessionConfig, SessionStore};
