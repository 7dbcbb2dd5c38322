//! Per-attempt authentication state.

use super::{
    capabilities::Credential,
    models::{LoginRequest, LoginResult, Phase},
};
use tokio::time::Instant;

/// Mutable record threaded through one authentication attempt
///
/// Created by the caller, handed to [`Pipeline::auth`](super::Pipeline::auth)
/// and dropped once the caller has read the result.
#[derive(Debug)]
pub struct AttemptContext {
    request: LoginRequest,
    result: LoginResult,
    phase: Phase,
    user_id: Option<String>,
    credential: Option<Box<dyn Credential>>,
    fail_count: u32,
    fail_key: Option<String>,
    deadline: Option<Instant>,
}

impl AttemptContext {
    pub fn new(request: LoginRequest) -> Self {
        Self {
            request,
            result: LoginResult::default(),
            phase: Phase::BeforeLoad,
            user_id: None,
            credential: None,
            fail_count: 0,
            fail_key: None,
            deadline: None,
        }
    }

    /// Attach a deadline for network calls made on behalf of this attempt
    ///
    /// The pipeline never checks it between phases; only plugins doing I/O
    /// narrow their timeouts with it.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn request(&self) -> &LoginRequest {
        &self.request
    }

    pub fn username(&self) -> &str {
        &self.request.username
    }

    /// Normalize the username to lowercase
    pub fn lowercase_username(&mut self) {
        self.request.username = self.request.username.to_lowercase();
    }

    pub fn result(&self) -> &LoginResult {
        &self.result
    }

    pub fn result_mut(&mut self) -> &mut LoginResult {
        &mut self.result
    }

    pub fn into_result(self) -> LoginResult {
        self.result
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        debug_assert!(phase >= self.phase, "phase {phase} re-entered after {}", self.phase);
        self.phase = phase;
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn credential(&self) -> Option<&dyn Credential> {
        self.credential.as_deref()
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Replace the loaded credential
    pub fn set_credential(&mut self, user_id: Option<String>, credential: Box<dyn Credential>) {
        self.user_id = user_id;
        self.credential = Some(credential);
    }

    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    pub fn set_fail_count(&mut self, count: u32) {
        self.fail_count = count;
    }

    /// Name the failure count was read under, fixed before any plugin can
    /// rewrite the username
    pub fn fail_key(&self) -> Option<&str> {
        self.fail_key.as_deref()
    }

    pub fn set_fail_key(&mut self, key: impl Into<String>) {
        self.fail_key = Some(key.into());
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
