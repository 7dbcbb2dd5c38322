//! Integration tests for the authentication pipeline.
//!
//! Assembles the full plugin set the way the daemon does and walks through
//! lockout, whitelist, login-type and directory scenarios.

use argon2::Params;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, time::Duration};
use turnstile::{
    auth::{
        Account, AttemptContext, AuthError, DirectoryClient, DirectoryConfig,
        DirectoryConnection, DirectoryEntry, DirectoryError, ErrorTranslator, LoginRequest,
        LoginType, MemoryAccounts, Pipeline, SOURCE_API, SOURCE_LDAP,
        plugins::{
            CapabilityLockCheck, DirectoryAuthenticator, Lockout, LockoutConfig, LoginTypeRestriction,
            LoginableCheck, PasswordExpiry, StoreLockCheck, Whitelist,
        },
    },
    security::{FailCounter, MemoryFailCounter},
};

fn hash(password: &str) -> String {
    let params = Params::new(1024, 1, 1, None).unwrap();
    Account::hash_password_with(password, params).unwrap()
}

fn account(username: &str, password: &str) -> Account {
    Account::with_hash(format!("id-{username}"), username, hash(password))
}

struct Fixture {
    accounts: Arc<MemoryAccounts>,
    counter: Arc<MemoryFailCounter>,
    pipeline: Pipeline,
}

fn fixture(accounts: Vec<Account>, directory: Option<Arc<dyn DirectoryClient>>) -> Fixture {
    let accounts = Arc::new(MemoryAccounts::from_accounts(accounts));
    let counter = Arc::new(MemoryFailCounter::new());

    let mut builder = Pipeline::builder()
        .loader(accounts.clone())
        .plugin(Arc::new(StoreLockCheck::new(accounts.clone())))
        .plugin(Arc::new(Lockout::new(
            counter.clone(),
            accounts.clone(),
            LockoutConfig { threshold: 3 },
        )))
        .plugin(Arc::new(Whitelist))
        .plugin(Arc::new(LoginTypeRestriction))
        .plugin(Arc::new(CapabilityLockCheck))
        .plugin(Arc::new(LoginableCheck))
        .plugin(Arc::new(PasswordExpiry::days(90)));
    if let Some(client) = directory {
        builder = builder.plugin(Arc::new(DirectoryAuthenticator::new(
            DirectoryConfig {
                user_format: "uid={username},ou=people,dc=example,dc=com".to_string(),
                default_roles: vec!["staff".to_string()],
                ..Default::default()
            },
            client,
        )));
    }

    Fixture {
        accounts,
        counter,
        pipeline: builder.build(),
    }
}

async fn attempt(pipeline: &Pipeline, request: LoginRequest) -> (Result<(), AuthError>, AttemptContext) {
    let mut ctx = AttemptContext::new(request);
    let result = pipeline.auth(&mut ctx).await;
    (result, ctx)
}

#[tokio::test]
async fn test_alice_locked_after_three_failures() {
    let fixture = fixture(vec![account("alice", "wonderland")], None);

    for expected in 1..=3 {
        let (result, ctx) = attempt(
            &fixture.pipeline,
            LoginRequest::new("alice", "looking-glass", "10.0.0.5"),
        )
        .await;
        assert!(result.is_ok(), "attempt {expected} should only be rejected");
        assert!(!ctx.result().ok);
        if expected < 3 {
            assert_eq!(ctx.fail_count(), expected);
            assert_eq!(fixture.counter.count("alice").await.unwrap(), expected);
        }
    }

    // Third failure locked the account and cleared the count
    assert!(fixture.accounts.get("alice").unwrap().unwrap().locked);
    assert_eq!(fixture.counter.count("alice").await.unwrap(), 0);

    let (result, ctx) = attempt(
        &fixture.pipeline,
        LoginRequest::new("alice", "wonderland", "10.0.0.5"),
    )
    .await;
    assert!(matches!(result, Err(AuthError::AccountLocked)));
    assert!(!ctx.has_credential(), "rejected before loading");
}

#[tokio::test]
async fn test_success_resets_fail_count() {
    let fixture = fixture(vec![account("alice", "wonderland")], None);

    for _ in 0..2 {
        attempt(&fixture.pipeline, LoginRequest::new("alice", "nope", "10.0.0.5"))
            .await
            .0
            .unwrap();
    }
    assert_eq!(fixture.counter.count("alice").await.unwrap(), 2);

    let (result, ctx) = attempt(
        &fixture.pipeline,
        LoginRequest::new("alice", "wonderland", "10.0.0.5"),
    )
    .await;
    result.unwrap();
    assert!(ctx.result().ok);
    assert_eq!(fixture.counter.count("alice").await.unwrap(), 0);
}

#[tokio::test]
async fn test_whitelist_scenario() {
    let fixture = fixture(
        vec![account("bob", "builder").with_ingress_ranges(&["10.0.0.0/8"])],
        None,
    );

    let (result, ctx) = attempt(&fixture.pipeline, LoginRequest::new("bob", "builder", "10.0.0.5")).await;
    result.unwrap();
    assert!(ctx.result().ok);

    let (result, _) = attempt(&fixture.pipeline, LoginRequest::new("bob", "builder", "8.8.8.8")).await;
    match result {
        Err(AuthError::IpBlocked { address }) => assert_eq!(address, "8.8.8.8"),
        other => panic!("expected IpBlocked, got {other:?}"),
    }

    let (result, ctx) = attempt(&fixture.pipeline, LoginRequest::new("bob", "builder", "127.0.0.1")).await;
    result.unwrap();
    assert!(ctx.result().ok);
}

#[tokio::test]
async fn test_api_account_needs_token_login() {
    let fixture = fixture(vec![account("svc", "key").with_source(SOURCE_API)], None);

    let (result, _) = attempt(&fixture.pipeline, LoginRequest::new("svc", "key", "10.0.0.5")).await;
    assert!(matches!(result, Err(AuthError::LoginTypeNotAllowed)));

    let request = LoginRequest::new("svc", "key", "10.0.0.5").with_login_type(LoginType::Token);
    let (result, ctx) = attempt(&fixture.pipeline, request).await;
    result.unwrap();
    assert!(ctx.result().ok);
}

#[tokio::test]
async fn test_disabled_account() {
    let mut disabled = account("carol", "pw");
    disabled.disabled = true;
    let fixture = fixture(vec![disabled], None);

    let (result, _) = attempt(&fixture.pipeline, LoginRequest::new("carol", "pw", "10.0.0.5")).await;
    assert!(matches!(result, Err(AuthError::UserDisabled)));
}

#[tokio::test]
async fn test_expired_password_is_flagged_not_rejected() {
    let old = account("dave", "pw").with_password_changed_at(chrono::Utc::now() - chrono::Duration::days(120));
    let fixture = fixture(vec![old], None);

    let (result, ctx) = attempt(&fixture.pipeline, LoginRequest::new("dave", "pw", "10.0.0.5")).await;
    result.unwrap();
    assert!(ctx.result().ok);
    assert!(ctx.result().password_expired);
}

/// Directory with fixed users, keyed by bind name
#[derive(Default)]
struct FakeDirectory {
    down: bool,
    users: HashMap<String, (String, Vec<String>)>,
}

struct FakeConnection {
    users: HashMap<String, (String, Vec<String>)>,
    bound: Option<String>,
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn connect(
        &self,
        _timeout: Option<Duration>,
    ) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        if self.down {
            return Err(DirectoryError::Connect("connection refused".to_string()));
        }
        Ok(Box::new(FakeConnection {
            users: self.users.clone(),
            bound: None,
        }))
    }
}

#[async_trait]
impl DirectoryConnection for FakeConnection {
    async fn simple_bind(&mut self, name: &str, password: &str) -> Result<(), DirectoryError> {
        match self.users.get(name) {
            Some((expected, _)) if expected == password => {
                self.bound = Some(name.to_string());
                Ok(())
            }
            _ => Err(DirectoryError::Bind("invalidCredentials".to_string())),
        }
    }

    async fn search(
        &mut self,
        _base: &str,
        _filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let groups = self
            .bound
            .as_ref()
            .and_then(|name| self.users.get(name))
            .map(|(_, groups)| groups.clone())
            .unwrap_or_default();
        let mut entry = DirectoryEntry::default();
        entry.attributes.insert(attributes[0].to_string(), groups);
        Ok(vec![entry])
    }

    async fn unbind(&mut self) {}
}

fn directory_with(users: &[(&str, &str, &[&str])]) -> Arc<dyn DirectoryClient> {
    let users = users
        .iter()
        .map(|(uid, password, groups)| {
            (
                format!("uid={uid},ou=people,dc=example,dc=com"),
                (
                    password.to_string(),
                    groups.iter().map(|g| g.to_string()).collect(),
                ),
            )
        })
        .collect();
    Arc::new(FakeDirectory { down: false, users })
}

#[tokio::test]
async fn test_directory_first_login_provisions() {
    let directory = directory_with(&[("erin", "ldap-pw", &["cn=ops,ou=groups,dc=example,dc=com"])]);
    let fixture = fixture(Vec::new(), Some(directory));

    let (result, ctx) = attempt(&fixture.pipeline, LoginRequest::new("erin", "ldap-pw", "10.0.0.5")).await;
    result.unwrap();
    assert!(ctx.result().ok);
    assert!(ctx.result().is_new_user);

    let credential = ctx.credential().unwrap();
    assert_eq!(credential.as_source().unwrap().source(), SOURCE_LDAP);
    assert_eq!(credential.as_roles().unwrap().role_names(), vec!["ops", "staff"]);
}

#[tokio::test]
async fn test_local_password_wins_over_directory() {
    let directory = directory_with(&[("frank", "ldap-pw", &[])]);
    let fixture = fixture(vec![account("frank", "local-pw")], Some(directory));

    let (result, ctx) = attempt(&fixture.pipeline, LoginRequest::new("frank", "local-pw", "10.0.0.5")).await;
    result.unwrap();
    assert!(ctx.result().ok);

    // Local checker rejects first; the directory is never asked
    let (result, ctx) = attempt(&fixture.pipeline, LoginRequest::new("frank", "ldap-pw", "10.0.0.5")).await;
    result.unwrap();
    assert!(!ctx.result().ok);
}

#[tokio::test]
async fn test_directory_outage() {
    let down: Arc<dyn DirectoryClient> = Arc::new(FakeDirectory {
        down: true,
        ..Default::default()
    });

    // Directory-sourced accounts without a local hash rely on the bind
    let known = Account::with_hash("id-gina", "gina", String::new()).with_source(SOURCE_LDAP);
    let fixture = fixture(vec![known], Some(down.clone()));

    let (result, _) = attempt(&fixture.pipeline, LoginRequest::new("newcomer", "pw", "10.0.0.5")).await;
    result.unwrap();

    let (result, _) = attempt(&fixture.pipeline, LoginRequest::new("gina", "pw", "10.0.0.5")).await;
    let err = result.unwrap_err();
    assert!(matches!(err, AuthError::Directory(_)));
    assert!(err.is_external());
}

#[tokio::test]
async fn test_unprovisioned_directory_user_locked_out() {
    let directory = directory_with(&[("carol", "ldap-pw", &[])]);
    let fixture = fixture(Vec::new(), Some(directory));

    for _ in 0..3 {
        let (result, ctx) = attempt(&fixture.pipeline, LoginRequest::new("carol", "guess", "10.0.0.5")).await;
        result.unwrap();
        assert!(!ctx.result().ok);
    }
    assert_eq!(fixture.counter.count("carol").await.unwrap(), 3);

    // Nothing to lock in the account store, so the count itself refuses the attempt
    let (result, ctx) = attempt(&fixture.pipeline, LoginRequest::new("carol", "ldap-pw", "10.0.0.5")).await;
    assert!(matches!(result, Err(AuthError::TooManyFailures { count: 3 })));
    assert!(!ctx.result().ok);
}

#[tokio::test]
async fn test_mixed_case_first_login_resets_fail_count() {
    let directory = directory_with(&[("Carol", "ldap-pw", &[])]);
    let fixture = fixture(Vec::new(), Some(directory));

    for _ in 0..2 {
        attempt(&fixture.pipeline, LoginRequest::new("Carol", "guess", "10.0.0.5"))
            .await
            .0
            .unwrap();
    }
    assert_eq!(fixture.counter.count("Carol").await.unwrap(), 2);

    let (result, ctx) = attempt(&fixture.pipeline, LoginRequest::new("Carol", "ldap-pw", "10.0.0.5")).await;
    result.unwrap();
    assert!(ctx.result().ok);
    assert!(ctx.result().is_new_user);
    assert_eq!(ctx.username(), "carol");
    assert_eq!(fixture.counter.count("Carol").await.unwrap(), 0);
    assert_eq!(fixture.counter.count("carol").await.unwrap(), 0);
}

struct Sanitize;

impl ErrorTranslator for Sanitize {
    fn translate(&self, _ctx: &AttemptContext, err: AuthError) -> AuthError {
        match err {
            AuthError::Directory(_) => AuthError::Directory("unavailable".to_string()),
            other => other,
        }
    }
}

#[tokio::test]
async fn test_error_translator_sees_policy_errors() {
    let accounts = Arc::new(MemoryAccounts::from_accounts([
        account("hank", "pw").with_ingress_ranges(&["192.168.0.0/16"])
    ]));
    let pipeline = Pipeline::builder()
        .loader(accounts)
        .plugin(Arc::new(Whitelist))
        .error_handler(Arc::new(Sanitize))
        .build();

    let (result, _) = attempt(&pipeline, LoginRequest::new("hank", "pw", "10.0.0.5")).await;
    let err = result.unwrap_err();
    assert!(err.is_policy_rejection());
    assert_eq!(pipeline.plugin_names(), &["local", "whitelist"]);
}
