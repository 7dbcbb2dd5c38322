//! Assembly of the account store, pipeline and session registry from configuration.

use crate::{config::ServerConfig, metrics};
use anyhow::Context;
use log::{debug, info};
use std::{fs, path::Path, sync::Arc, time::Duration};
use turnstile::{
    auth::{
        Account, LdapClient, LoginService, MemoryAccounts, Pipeline,
        pipeline::Plugin,
        plugins::{
            CapabilityLockCheck, DirectoryAuthenticator, Lockout, LoginTypeRestriction,
            LoginableCheck, PasswordExpiry, StoreLockCheck, Whitelist,
        },
    },
    security::MemoryFailCounter,
    session::{EmptySessionStore, MemorySessionStore, SessionStore},
};

/// Load accounts from a JSON array of account records
///
/// No file means an empty store; only directory users can then log in.
pub fn load_accounts(path: Option<&Path>) -> anyhow::Result<MemoryAccounts> {
    let Some(path) = path else {
        return Ok(MemoryAccounts::new());
    };

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read accounts file {}", path.display()))?;
    let accounts: Vec<Account> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid accounts file {}", path.display()))?;

    info!("Loaded {} account(s) from {}", accounts.len(), path.display());
    Ok(MemoryAccounts::from_accounts(accounts))
}

/// Build the pipeline in the standard plugin order
pub fn build_pipeline(config: &ServerConfig, accounts: Arc<MemoryAccounts>) -> Pipeline {
    let mut plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(StoreLockCheck::new(accounts.clone()))];

    if config.lockout.threshold > 0 {
        plugins.push(Arc::new(Lockout::new(
            Arc::new(MemoryFailCounter::with_window(config.lockout_window)),
            accounts.clone(),
            config.lockout,
        )));
    }

    plugins.push(Arc::new(Whitelist));
    plugins.push(Arc::new(LoginTypeRestriction));
    plugins.push(Arc::new(CapabilityLockCheck));
    plugins.push(Arc::new(LoginableCheck));

    if let Some(directory) = &config.directory {
        let client = Arc::new(LdapClient::new(directory));
        plugins.push(Arc::new(DirectoryAuthenticator::new(directory.clone(), client)));
    }

    if config.password_expiry_days > 0 {
        plugins.push(Arc::new(PasswordExpiry::days(config.password_expiry_days)));
    }

    let pipeline = Pipeline::new(accounts, plugins);
    info!("Pipeline plugins: {}", pipeline.plugin_names().join(", "));
    pipeline
}

/// Build the session registry, restoring the snapshot if one is configured
pub fn build_sessions(config: &ServerConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    if !config.sessions.tracking {
        info!("Session tracking disabled");
        return Ok(Arc::new(EmptySessionStore));
    }

    let store = MemorySessionStore::new(config.sessions.registry.clone());
    store.load().context("Failed to load session snapshot")?;
    metrics::online_sessions(store.count());
    Ok(Arc::new(store))
}

pub fn build_service(config: &ServerConfig, accounts: Arc<MemoryAccounts>) -> anyhow::Result<LoginService> {
    let pipeline = build_pipeline(config, accounts);
    let sessions = build_sessions(config)?;

    let service = LoginService::new(pipeline, sessions);
    Ok(match &config.sessions.registry.api_key {
        Some(key) => service.with_api_key(key.clone()),
        None => service,
    })
}

/// Remove expired sessions once and publish the counts
pub fn sweep_once(sessions: &dyn SessionStore) -> usize {
    let removed = sessions.delete_expired();
    metrics::sessions_expired_total(removed);
    metrics::online_sessions(sessions.count());
    if removed > 0 {
        info!("Expired {removed} session(s)");
    } else {
        debug!("Sweep found no expired sessions");
    }
    removed
}

/// Sweep forever at `period`; the first sweep runs immediately
pub async fn run_sweeper(sessions: Arc<dyn SessionStore>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        sweep_once(sessions.as_ref());
    }
}
