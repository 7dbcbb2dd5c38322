//! Directory-service (LDAP) authentication with first-login provisioning.

use crate::auth::{
    capabilities::{SOURCE_LDAP, source_of},
    context::AttemptContext,
    directory::{
        DirectoryClient, DirectoryConfig, DirectoryConnection, DirectoryCredential,
        DirectoryError, role_name,
    },
    errors::AuthError,
    pipeline::{CheckOutcome, Checker, Hooks, Plugin},
};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Nothing loaded; a successful bind provisions the user
    FirstContact,
    /// Loaded credential without a source tag
    Existing,
    /// Loaded credential tagged as a directory account
    Known,
}

impl Mode {
    /// Directory failures abort only for accounts that live in the directory
    fn strict(self) -> bool {
        self == Mode::Known
    }
}

/// Verifies passwords with a bind against the directory server
///
/// Users seen for the first time are provisioned: the attempt is flagged
/// `is_new_user` and a [`DirectoryCredential`] with the discovered roles is
/// placed on the context for the caller to persist.
pub struct DirectoryAuthenticator {
    config: DirectoryConfig,
    client: Arc<dyn DirectoryClient>,
}

impl DirectoryAuthenticator {
    pub fn new(config: DirectoryConfig, client: Arc<dyn DirectoryClient>) -> Self {
        Self { config, client }
    }

    /// Configured connect timeout, shortened to whatever the deadline leaves
    fn connect_timeout(&self, deadline: Option<Instant>) -> Duration {
        match deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(self.config.connect_timeout),
            None => self.config.connect_timeout,
        }
    }

    fn tolerate(&self, mode: Mode, username: &str, err: DirectoryError) -> CheckOutcome {
        if mode.strict() {
            return CheckOutcome::HardError(AuthError::Directory(err.to_string()));
        }
        debug!("directory skipped for {username}: {err}");
        CheckOutcome::NotApplicable
    }

    async fn roles(
        &self,
        conn: &mut dyn DirectoryConnection,
        username: &str,
    ) -> Result<Vec<String>, DirectoryError> {
        let filter = self.config.user_filter(username);
        let attribute = self.config.role_attribute.as_str();
        let entries = conn
            .search(&self.config.base_dn, &filter, &[attribute])
            .await?;

        // Groups in different OUs may share a first RDN; keep the first one seen
        let mut seen = HashSet::new();
        let roles = entries
            .iter()
            .filter_map(|entry| entry.attributes.get(attribute))
            .flatten()
            .map(|value| role_name(value))
            .filter(|role| !role.is_empty() && seen.insert(role.clone()))
            .collect();
        Ok(roles)
    }

    async fn authenticate(
        &self,
        conn: &mut dyn DirectoryConnection,
        ctx: &mut AttemptContext,
        mode: Mode,
    ) -> CheckOutcome {
        let username = ctx.username().to_string();
        let bind_name = self.config.bind_name(&username);
        if let Err(e) = conn.simple_bind(&bind_name, &ctx.request().password).await {
            return self.tolerate(mode, &username, e);
        }

        let required = self.config.required_role.as_deref();
        if mode != Mode::FirstContact && required.is_none() {
            return CheckOutcome::Matched;
        }

        let roles = match self.roles(conn, &username).await {
            Ok(roles) => roles,
            Err(e) if required.is_some() => {
                return CheckOutcome::HardError(AuthError::Directory(e.to_string()));
            }
            Err(e) => {
                warn!("role lookup for {username} failed: {e}");
                Vec::new()
            }
        };

        if let Some(required) = required {
            if !roles.iter().any(|role| role.eq_ignore_ascii_case(required)) {
                return CheckOutcome::HardError(AuthError::RoleRequired {
                    role: required.to_string(),
                });
            }
        }

        if mode == Mode::FirstContact {
            let mut roles = roles;
            for role in &self.config.default_roles {
                if !roles.contains(role) {
                    roles.push(role.clone());
                }
            }

            ctx.lowercase_username();
            ctx.result_mut().is_new_user = true;
            info!("provisioning directory user {}", ctx.username());
            let credential = DirectoryCredential {
                username: ctx.username().to_string(),
                roles,
            };
            ctx.set_credential(None, Box::new(credential));
        }

        CheckOutcome::Matched
    }
}

#[async_trait]
impl Checker for DirectoryAuthenticator {
    async fn check(&self, ctx: &mut AttemptContext) -> CheckOutcome {
        let mode = match ctx.credential() {
            None => Mode::FirstContact,
            Some(credential) => match source_of(credential) {
                Some(SOURCE_LDAP) => Mode::Known,
                Some(_) => return CheckOutcome::NotApplicable,
                None => Mode::Existing,
            },
        };

        // An empty password turns a simple bind into an anonymous one
        if ctx.request().password.is_empty() {
            return if mode.strict() {
                CheckOutcome::Rejected
            } else {
                CheckOutcome::NotApplicable
            };
        }

        let timeout = self.connect_timeout(ctx.deadline());
        let mut conn = match self.client.connect(Some(timeout)).await {
            Ok(conn) => conn,
            Err(e) => return self.tolerate(mode, ctx.username(), e),
        };

        let outcome = self.authenticate(conn.as_mut(), ctx, mode).await;
        conn.unbind().await;
        outcome
    }
}

impl Plugin for DirectoryAuthenticator {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn install(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.on_authenticating(self);
    }
}
