//! Security primitives shared by the authentication plugins.
//!
//! - Consecutive-failure counting with pluggable storage
//! - Lock storage consulted before a credential is loaded
//! - Address ranges for ingress whitelists
//!
//! ## Example
//!
//! ```
//! use turnstile::security::{FailCounter, IpRange, MemoryFailCounter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let counter = MemoryFailCounter::new();
//!     assert_eq!(counter.increment("alice").await?, 1);
//!
//!     let office: IpRange = "10.0.0.0/8".parse()?;
//!     assert!(office.contains("10.0.0.5".parse()?));
//!     Ok(())
//! }
//! ```

pub mod ip_range;
pub mod lockout;

pub use ip_range::{IpRange, is_loopback, normalize_ip};
pub use lockout::{DEFAULT_FAIL_WINDOW, FailCounter, LockStore, MemoryFailCounter};
