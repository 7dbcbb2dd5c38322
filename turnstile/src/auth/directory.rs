//! Directory-service (LDAP) client.
//!
//! The directory plugin talks to the server through [`DirectoryClient`] so it
//! can be exercised without a network; [`LdapClient`] is the `ldap3`
//! implementation used in production.

use super::capabilities::{Credential, HasRoles, HasSource, SOURCE_LDAP};
use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, Scope, SearchEntry, dn_escape, ldap_escape};
use log::warn;
use std::{collections::HashMap, time::Duration};
use thiserror::Error;

/// Placeholder replaced by the username in [`DirectoryConfig::user_format`] and
/// [`DirectoryConfig::filter`]
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Directory client errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("bind failed: {0}")]
    Bind(String),

    #[error("search failed: {0}")]
    Search(String),
}

/// Directory server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// `host:port` or a full `ldap://`/`ldaps://` URL
    pub address: String,
    /// Use `ldaps://` when the address has no scheme
    pub tls: bool,
    pub base_dn: String,
    /// Search filter for the user entry
    pub filter: String,
    /// Bind name pattern, e.g. `uid={username},ou=people,dc=example,dc=com`
    pub user_format: String,
    /// Attribute holding role or group values
    pub role_attribute: String,
    /// Roles granted to every provisioned user
    pub default_roles: Vec<String>,
    /// Role a user must hold to log in
    pub required_role: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:389".to_string(),
            tls: false,
            base_dn: String::new(),
            filter: "(&(objectClass=person)(uid={username}))".to_string(),
            user_format: USERNAME_PLACEHOLDER.to_string(),
            role_attribute: "memberOf".to_string(),
            default_roles: Vec::new(),
            required_role: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl DirectoryConfig {
    pub fn url(&self) -> String {
        if self.address.contains("://") {
            return self.address.clone();
        }
        let scheme = if self.tls { "ldaps" } else { "ldap" };
        format!("{scheme}://{}", self.address)
    }

    /// Bind name for `username`; DN patterns get the value DN-escaped
    pub fn bind_name(&self, username: &str) -> String {
        let value = if self.user_format.contains('=') {
            dn_escape(username)
        } else {
            username.into()
        };
        self.user_format.replace(USERNAME_PLACEHOLDER, &value)
    }

    /// Search filter for `username`, filter-escaped
    pub fn user_filter(&self, username: &str) -> String {
        self.filter
            .replace(USERNAME_PLACEHOLDER, &ldap_escape(username))
    }
}

/// A search result entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

/// Opens connections to a directory server
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Connect, giving up after `timeout` when one is given
    async fn connect(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn DirectoryConnection>, DirectoryError>;
}

/// An open directory connection
#[async_trait]
pub trait DirectoryConnection: Send {
    async fn simple_bind(&mut self, name: &str, password: &str) -> Result<(), DirectoryError>;

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    async fn unbind(&mut self);
}

/// `ldap3` backed client
#[derive(Debug, Clone)]
pub struct LdapClient {
    url: String,
    connect_timeout: Duration,
}

impl LdapClient {
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            url: config.url(),
            connect_timeout: config.connect_timeout,
        }
    }
}

#[async_trait]
impl DirectoryClient for LdapClient {
    async fn connect(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        let timeout = timeout.map_or(self.connect_timeout, |t| t.min(self.connect_timeout));
        let settings = LdapConnSettings::new().set_conn_timeout(timeout);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(|e| DirectoryError::Connect(e.to_string()))?;

        let url = self.url.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("directory connection to {url} failed: {e}");
            }
        });

        Ok(Box::new(LdapConnection { ldap }))
    }
}

struct LdapConnection {
    ldap: ldap3::Ldap,
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    async fn simple_bind(&mut self, name: &str, password: &str) -> Result<(), DirectoryError> {
        self.ldap
            .simple_bind(name, password)
            .await
            .and_then(|result| result.success())
            .map(|_| ())
            .map_err(|e| DirectoryError::Bind(e.to_string()))
    }

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let (entries, _) = self
            .ldap
            .search(base, Scope::Subtree, filter, attributes.to_vec())
            .await
            .and_then(|result| result.success())
            .map_err(|e| DirectoryError::Search(e.to_string()))?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let entry = SearchEntry::construct(entry);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs,
                }
            })
            .collect())
    }

    async fn unbind(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            warn!("directory unbind failed: {e}");
        }
    }
}

/// Reduce a group DN such as `cn=admins,ou=groups,dc=example,dc=com` to `admins`
///
/// Plain values are returned unchanged.
pub fn role_name(value: &str) -> String {
    let first = value.split(',').next().unwrap_or(value);
    match first.split_once('=') {
        Some((_, name)) => name.trim().to_string(),
        None => value.trim().to_string(),
    }
}

/// Provisional credential built for a user first seen in the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCredential {
    pub username: String,
    pub roles: Vec<String>,
}

impl HasSource for DirectoryCredential {
    fn source(&self) -> &str {
        SOURCE_LDAP
    }
}

impl HasRoles for DirectoryCredential {
    fn role_names(&self) -> Vec<String> {
        self.roles.clone()
    }
}

impl Credential for DirectoryCredential {
    fn as_source(&self) -> Option<&dyn HasSource> {
        Some(self)
    }

    fn as_roles(&self) -> Option<&dyn HasRoles> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url() {
        let mut config = DirectoryConfig::default();
        assert_eq!(config.url(), "ldap://127.0.0.1:389");

        config.tls = true;
        config.address = "ldap.example.com:636".to_string();
        assert_eq!(config.url(), "ldaps://ldap.example.com:636");

        config.address = "ldap://override:389".to_string();
        assert_eq!(config.url(), "ldap://override:389");
    }

    #[test]
    fn test_bind_name_escapes_dn_values() {
        let config = DirectoryConfig {
            user_format: "uid={username},ou=people,dc=example,dc=com".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.bind_name("alice"),
            "uid=alice,ou=people,dc=example,dc=com"
        );
        assert!(config.bind_name("a,b").starts_with("uid=a\\2cb,"));

        let upn = DirectoryConfig {
            user_format: "{username}@corp.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(upn.bind_name("alice"), "alice@corp.example.com");
    }

    #[test]
    fn test_user_filter_escapes() {
        let config = DirectoryConfig::default();
        assert_eq!(
            config.user_filter("alice"),
            "(&(objectClass=person)(uid=alice))"
        );
        assert!(!config.user_filter("*)(uid=*").contains("*)(uid=*"));
    }

    #[test]
    fn test_role_name() {
        assert_eq!(role_name("cn=admins,ou=groups,dc=example,dc=com"), "admins");
        assert_eq!(role_name("operators"), "operators");
    }
}
