//! Authentication data models.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use uuid::Uuid;

/// How the client proves its identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginType {
    /// Interactive username/password login
    #[default]
    None,
    /// API token login
    Token,
}

impl FromStr for LoginType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(LoginType::None),
            "token" => Ok(LoginType::Token),
            other => Err(format!("unknown login type: {other}")),
        }
    }
}

impl fmt::Display for LoginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginType::None => write!(f, "none"),
            LoginType::Token => write!(f, "token"),
        }
    }
}

/// Parse a loosely typed form flag such as a checkbox value
///
/// ```
/// use turnstile::auth::parse_flag;
///
/// assert!(parse_flag("on"));
/// assert!(parse_flag("Checked"));
/// assert!(!parse_flag(""));
/// assert!(!parse_flag("off"));
/// ```
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "checked" | "yes" | "1"
    )
}

/// User login request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Target application, opaque to the pipeline
    pub service: String,
    pub force_login: bool,
    pub captcha_key: String,
    pub captcha_value: String,
    pub address: String,
    pub login_type: LoginType,
}

impl LoginRequest {
    /// Create a password login request from a remote address
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Set the force-login flag from its raw form value
    pub fn with_force_login(mut self, raw: &str) -> Self {
        self.force_login = parse_flag(raw);
        self
    }

    pub fn with_login_type(mut self, login_type: LoginType) -> Self {
        self.login_type = login_type;
        self
    }

    pub fn with_captcha(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.captcha_key = key.into();
        self.captcha_value = value.into();
        self
    }
}

/// Outcome of an authentication attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginResult {
    pub ok: bool,
    pub session_id: Option<Uuid>,
    /// Credential was provisioned during this attempt
    pub is_new_user: bool,
    pub password_expired: bool,
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
}

/// Pipeline phase, in execution order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    #[default]
    BeforeLoad,
    Loading,
    AfterLoaded,
    BeforeAuth,
    Authenticating,
    AfterAuthed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::BeforeLoad => write!(f, "before_load"),
            Phase::Loading => write!(f, "loading"),
            Phase::AfterLoaded => write!(f, "after_loaded"),
            Phase::BeforeAuth => write!(f, "before_auth"),
            Phase::Authenticating => write!(f, "authenticating"),
            Phase::AfterAuthed => write!(f, "after_authed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_type_parse() {
        assert_eq!("".parse::<LoginType>().unwrap(), LoginType::None);
        assert_eq!("TOKEN".parse::<LoginType>().unwrap(), LoginType::Token);
        assert!("oauth".parse::<LoginType>().is_err());
    }

    #[test]
    fn test_force_login_flag() {
        let request = LoginRequest::new("bob", "pw", "10.0.0.1").with_force_login("true");
        assert!(request.force_login);

        let request = LoginRequest::new("bob", "pw", "10.0.0.1").with_force_login("nope");
        assert!(!request.force_login);
    }

    #[test]
    fn test_phase_order() {
        assert!(Phase::BeforeLoad < Phase::Loading);
        assert!(Phase::Loading < Phase::AfterLoaded);
        assert!(Phase::AfterLoaded < Phase::BeforeAuth);
        assert!(Phase::BeforeAuth < Phase::Authenticating);
        assert!(Phase::Authenticating < Phase::AfterAuthed);
    }

    #[test]
    fn test_login_result_serializes_session_id() {
        let mut result = LoginResult {
            ok: true,
            ..Default::default()
        };
        result.session_id = Some(Uuid::nil());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["session_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["ok"], true);
    }
}
