//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::{net::SocketAddr, path::PathBuf, time::Duration};
use turnstile::{
    auth::{DirectoryConfig, directory::USERNAME_PLACEHOLDER, plugins::LockoutConfig},
    security::DEFAULT_FAIL_WINDOW,
    session::SessionConfig,
};

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// JSON file with the accounts to serve
    pub accounts_file: Option<PathBuf>,
    /// Lockout configuration
    pub lockout: LockoutConfig,
    /// How long a failed attempt counts toward the lockout threshold
    pub lockout_window: Duration,
    /// Password age that flags a login as expired; zero disables
    pub password_expiry_days: i64,
    /// Session registry configuration
    pub sessions: SessionSettings,
    /// Directory server, when enabled
    pub directory: Option<DirectoryConfig>,
    /// Prometheus exporter bind address
    pub metrics_bind: Option<SocketAddr>,
}

/// Session registry configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Whether sessions are tracked at all
    pub tracking: bool,
    /// Period of the background expiry sweep
    pub sweep_interval: Duration,
    /// Registry settings
    pub registry: SessionConfig,
}

/// Values given on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub accounts_file: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
    pub metrics_bind: Option<SocketAddr>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from CLI args
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        let accounts_file = overrides
            .accounts_file
            .or_else(|| env_path("ACCOUNTS_FILE"));

        let metrics_bind = match overrides.metrics_bind {
            Some(addr) => Some(addr),
            None => match non_empty_env("METRICS_BIND") {
                Some(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("'{value}' is not an IP:PORT address"),
                })?),
                None => None,
            },
        };

        let ttl_secs: u64 = parse_env_or("SESSION_TTL_SECS", 0);
        let sessions = SessionSettings {
            tracking: parse_env_or("SESSION_TRACKING", true),
            sweep_interval: Duration::from_secs(parse_env_or("SESSION_SWEEP_INTERVAL_SECS", 60)),
            registry: SessionConfig {
                ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
                snapshot_path: overrides
                    .snapshot_path
                    .or_else(|| env_path("SESSION_SNAPSHOT_PATH")),
                api_key: non_empty_env("SESSION_API_KEY"),
            },
        };

        let directory = if parse_env_or("LDAP_ENABLED", false) {
            Some(directory_from_env()?)
        } else {
            None
        };

        Ok(ServerConfig {
            accounts_file,
            lockout: LockoutConfig {
                threshold: parse_env_or("LOCKOUT_THRESHOLD", LockoutConfig::default().threshold),
            },
            lockout_window: Duration::from_secs(parse_env_or(
                "LOCKOUT_WINDOW_SECS",
                DEFAULT_FAIL_WINDOW.as_secs(),
            )),
            password_expiry_days: parse_env_or("PASSWORD_EXPIRY_DAYS", 0),
            sessions,
            directory,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.password_expiry_days < 0 {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_EXPIRY_DAYS".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        if self.lockout_window.is_zero() {
            return Err(ConfigError::Invalid {
                var: "LOCKOUT_WINDOW_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.sessions.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "SESSION_SWEEP_INTERVAL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if let Some(directory) = &self.directory {
            if !directory.user_format.contains(USERNAME_PLACEHOLDER) {
                return Err(ConfigError::Invalid {
                    var: "LDAP_USER_FORMAT".to_string(),
                    reason: format!("Must contain {USERNAME_PLACEHOLDER}"),
                });
            }

            if !directory.filter.contains(USERNAME_PLACEHOLDER) {
                return Err(ConfigError::Invalid {
                    var: "LDAP_FILTER".to_string(),
                    reason: format!("Must contain {USERNAME_PLACEHOLDER}"),
                });
            }

            if directory.connect_timeout.is_zero() {
                return Err(ConfigError::Invalid {
                    var: "LDAP_CONNECT_TIMEOUT_SECS".to_string(),
                    reason: "Must be greater than 0".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn directory_from_env() -> Result<DirectoryConfig, ConfigError> {
    let defaults = DirectoryConfig::default();

    let base_dn = non_empty_env("LDAP_BASE_DN").ok_or_else(|| ConfigError::MissingRequired {
        var: "LDAP_BASE_DN".to_string(),
        hint: "Set to the search base, e.g. ou=people,dc=example,dc=com".to_string(),
    })?;

    let default_roles = non_empty_env("LDAP_DEFAULT_ROLES")
        .map(|roles| {
            roles
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or(defaults.default_roles);

    Ok(DirectoryConfig {
        address: non_empty_env("LDAP_ADDRESS").unwrap_or(defaults.address),
        tls: parse_env_or("LDAP_TLS", defaults.tls),
        base_dn,
        filter: non_empty_env("LDAP_FILTER").unwrap_or(defaults.filter),
        user_format: non_empty_env("LDAP_USER_FORMAT").unwrap_or(defaults.user_format),
        role_attribute: non_empty_env("LDAP_ROLE_ATTRIBUTE").unwrap_or(defaults.role_attribute),
        default_roles,
        required_role: non_empty_env("LDAP_REQUIRED_ROLE"),
        connect_timeout: Duration::from_secs(parse_env_or(
            "LDAP_CONNECT_TIMEOUT_SECS",
            defaults.connect_timeout.as_secs(),
        )),
    })
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    non_empty_env(key).map(PathBuf::from)
}
