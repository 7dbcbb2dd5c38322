//! Helpers shared by the unit tests of the auth plugins.

use super::{Account, AttemptContext, LoginRequest};
use argon2::Params;

/// Hash with minimal Argon2 cost so tests stay fast
pub(crate) fn fast_hash(password: &str) -> String {
    let params = Params::new(1024, 1, 1, None).unwrap();
    Account::hash_password_with(password, params).unwrap()
}

pub(crate) fn account(username: &str, password: &str) -> Account {
    Account::with_hash(format!("id-{username}"), username, fast_hash(password))
}

/// Context with `account` already loaded, as after the Loading phase
pub(crate) fn loaded_ctx(account: Account, password: &str, address: &str) -> AttemptContext {
    let mut ctx = AttemptContext::new(LoginRequest::new(account.username.clone(), password, address));
    ctx.set_credential(Some(account.id.clone()), Box::new(account));
    ctx
}
