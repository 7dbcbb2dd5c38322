//! Pluggable authentication pipeline.
//!
//! An attempt flows through a [`Pipeline`] assembled from compiled-in
//! [`plugins`]; each plugin probes the loaded [`Credential`] for the
//! capabilities it needs and ignores credentials that lack them.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use turnstile::auth::{
//!     Account, AttemptContext, LoginRequest, MemoryAccounts, Pipeline,
//!     plugins::{Lockout, LockoutConfig, StoreLockCheck, Whitelist},
//! };
//! use turnstile::security::MemoryFailCounter;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let accounts = Arc::new(MemoryAccounts::from_accounts([Account::new("1", "alice", "s3cret")?]));
//! let pipeline = Pipeline::builder()
//!     .loader(accounts.clone())
//!     .plugin(Arc::new(StoreLockCheck::new(accounts.clone())))
//!     .plugin(Arc::new(Lockout::new(
//!         Arc::new(MemoryFailCounter::new()),
//!         accounts,
//!         LockoutConfig::default(),
//!     )))
//!     .plugin(Arc::new(Whitelist))
//!     .build();
//!
//! let mut ctx = AttemptContext::new(LoginRequest::new("alice", "s3cret", "10.0.0.5"));
//! pipeline.auth(&mut ctx).await?;
//! assert!(ctx.result().ok);
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod capabilities;
pub mod context;
pub mod directory;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod plugins;
pub mod service;

#[cfg(test)]
mod test_support;

pub use account::{Account, MemoryAccounts};
pub use capabilities::{
    Authenticator, CanLoginable, Credential, HasLock, HasRoles, HasSource, HasWhitelist,
    PasswordExpiredChecker, SOURCE_API, SOURCE_LDAP, SOURCE_LOCAL, source_of,
};
pub use context::AttemptContext;
pub use directory::{
    DirectoryClient, DirectoryConfig, DirectoryConnection, DirectoryCredential, DirectoryEntry,
    DirectoryError, LdapClient,
};
pub use errors::{AuthError, AuthResult};
pub use models::{LoginRequest, LoginResult, LoginType, Phase, parse_flag};
pub use pipeline::{
    CheckOutcome, Checker, ErrorTranslator, Hooks, Loaded, Loader, PhaseHook, Pipeline,
    PipelineBuilder, Plugin,
};
pub use service::LoginService;
