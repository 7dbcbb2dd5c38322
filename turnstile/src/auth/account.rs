//! Reference account record and in-memory account store.
//!
//! Real deployments load credentials from their own persistence through a
//! [`Loader`]; [`MemoryAccounts`] backs tests and the standalone daemon.

use super::{
    capabilities::{
        Authenticator, CanLoginable, Credential, HasLock, HasRoles, HasSource, HasWhitelist,
        PasswordExpiredChecker, SOURCE_LOCAL,
    },
    context::AttemptContext,
    errors::{AuthError, AuthResult},
    models::LoginRequest,
    pipeline::{CheckOutcome, Loaded, Loader},
};
use crate::security::{IpRange, LockStore};
use argon2::{
    Argon2, Params,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Account record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    /// Argon2 PHC string, empty for accounts without a local password
    #[serde(default)]
    pub password_hash: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Whitelist entries, empty for unrestricted
    #[serde(default)]
    pub ingress_ranges: Vec<String>,
    #[serde(default = "Utc::now")]
    pub password_changed_at: DateTime<Utc>,
}

fn default_source() -> String {
    SOURCE_LOCAL.to_string()
}

impl Account {
    /// Create a local account, hashing the password with default Argon2id parameters
    pub fn new(id: impl Into<String>, username: impl Into<String>, password: &str) -> AuthResult<Self> {
        Ok(Self::with_hash(id, username, Self::hash_password(password)?))
    }

    /// Create a local account from an existing password hash
    pub fn with_hash(
        id: impl Into<String>,
        username: impl Into<String>,
        password_hash: String,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password_hash,
            source: SOURCE_LOCAL.to_string(),
            locked: false,
            disabled: false,
            roles: Vec::new(),
            ingress_ranges: Vec::new(),
            password_changed_at: Utc::now(),
        }
    }

    /// Hash password with Argon2id
    pub fn hash_password(password: &str) -> AuthResult<String> {
        hash_with(Argon2::default(), password)
    }

    /// Hash password with explicit Argon2id cost parameters
    pub fn hash_password_with(password: &str, params: Params) -> AuthResult<String> {
        hash_with(
            Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
            password,
        )
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_ingress_ranges(mut self, ranges: &[&str]) -> Self {
        self.ingress_ranges = ranges.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_password_changed_at(mut self, at: DateTime<Utc>) -> Self {
        self.password_changed_at = at;
        self
    }
}

fn hash_with(argon2: Argon2<'_>, password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Storage(format!("password hashing failed: {e}")))?
        .to_string())
}

impl HasLock for Account {
    fn is_locked(&self) -> bool {
        self.locked
    }
}

impl HasSource for Account {
    fn source(&self) -> &str {
        &self.source
    }
}

impl HasWhitelist for Account {
    fn ingress_address_ranges(&self) -> AuthResult<Vec<IpRange>> {
        self.ingress_ranges
            .iter()
            .map(|range| range.parse().map_err(AuthError::InvalidAddress))
            .collect()
    }
}

impl HasRoles for Account {
    fn role_names(&self) -> Vec<String> {
        self.roles.clone()
    }
}

impl Authenticator for Account {
    fn authenticate(&self, request: &LoginRequest) -> CheckOutcome {
        // No local password; another checker has to vouch for the user
        if self.password_hash.is_empty() {
            return CheckOutcome::NotApplicable;
        }
        let parsed = match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                return CheckOutcome::HardError(AuthError::Storage(format!(
                    "unreadable password hash for {}: {e}",
                    self.username
                )));
            }
        };

        match Argon2::default().verify_password(request.password.as_bytes(), &parsed) {
            Ok(()) => CheckOutcome::Matched,
            Err(_) => CheckOutcome::Rejected,
        }
    }
}

impl PasswordExpiredChecker for Account {
    fn is_password_expired(&self, interval: Duration) -> bool {
        Utc::now() - self.password_changed_at > interval
    }
}

impl CanLoginable for Account {
    fn loginable(&self) -> bool {
        !self.disabled
    }
}

impl Credential for Account {
    fn as_lock(&self) -> Option<&dyn HasLock> {
        Some(self)
    }

    fn as_source(&self) -> Option<&dyn HasSource> {
        Some(self)
    }

    fn as_whitelist(&self) -> Option<&dyn HasWhitelist> {
        Some(self)
    }

    fn as_roles(&self) -> Option<&dyn HasRoles> {
        Some(self)
    }

    fn as_authenticator(&self) -> Option<&dyn Authenticator> {
        Some(self)
    }

    fn as_password_expiry(&self) -> Option<&dyn PasswordExpiredChecker> {
        Some(self)
    }

    fn as_loginable(&self) -> Option<&dyn CanLoginable> {
        Some(self)
    }
}

/// Accounts keyed by username
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.write() {
            map.extend(accounts.into_iter().map(|a| (a.username.clone(), a)));
        }
        store
    }

    /// Insert or replace an account
    pub fn insert(&self, account: Account) -> AuthResult<()> {
        self.write()?.insert(account.username.clone(), account);
        Ok(())
    }

    pub fn get(&self, username: &str) -> AuthResult<Option<Account>> {
        Ok(self.read()?.get(username).cloned())
    }

    pub fn unlock(&self, username: &str) -> AuthResult<()> {
        if let Some(account) = self.write()?.get_mut(username) {
            account.locked = false;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> AuthResult<RwLockReadGuard<'_, HashMap<String, Account>>> {
        self.accounts
            .read()
            .map_err(|_| AuthError::Storage("account store lock poisoned".to_string()))
    }

    fn write(&self) -> AuthResult<RwLockWriteGuard<'_, HashMap<String, Account>>> {
        self.accounts
            .write()
            .map_err(|_| AuthError::Storage("account store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Loader for MemoryAccounts {
    async fn load(&self, ctx: &AttemptContext) -> AuthResult<Option<Loaded>> {
        Ok(self
            .get(ctx.username())?
            .map(|account| Loaded::new(account.id.clone(), Box::new(account))))
    }
}

#[async_trait]
impl LockStore for MemoryAccounts {
    async fn is_locked(&self, username: &str) -> AuthResult<bool> {
        Ok(self.read()?.get(username).is_some_and(|a| a.locked))
    }

    async fn lock(&self, username: &str) -> AuthResult<bool> {
        match self.write()?.get_mut(username) {
            Some(account) => {
                account.locked = true;
                info!("account {username} locked");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
