//! Login front door combining the pipeline with the session registry.

use super::{
    context::AttemptContext,
    errors::{AuthError, AuthResult},
    models::{LoginRequest, LoginResult},
    pipeline::Pipeline,
};
use crate::session::{SessionError, SessionStore};
use log::info;
use serde_json::json;
use std::sync::Arc;

/// Runs the pipeline and opens a session on success
pub struct LoginService {
    pipeline: Pipeline,
    sessions: Arc<dyn SessionStore>,
    api_key: Option<String>,
}

impl LoginService {
    pub fn new(pipeline: Pipeline, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            pipeline,
            sessions,
            api_key: None,
        }
    }

    /// Key passed to the session registry on login
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Authenticate and open (or reuse) a session
    ///
    /// # Arguments
    ///
    /// * `request` - Login request
    ///
    /// # Returns
    ///
    /// * `AuthResult<LoginResult>` - Result with `session_id` set and the
    ///   credential's roles under `data["roles"]`
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] when no checker accepted the password
    /// - [`AuthError::AlreadyOnline`] when the user is online from another
    ///   address and `force_login` is not set
    /// - any error the pipeline or registry returned
    pub async fn login(&self, request: LoginRequest) -> AuthResult<LoginResult> {
        self.login_with(AttemptContext::new(request)).await
    }

    /// Like [`login`](Self::login) with a caller-built context, e.g. one carrying a deadline
    pub async fn login_with(&self, mut ctx: AttemptContext) -> AuthResult<LoginResult> {
        self.pipeline.auth(&mut ctx).await?;
        if !ctx.result().ok {
            return Err(AuthError::InvalidCredentials);
        }

        let username = ctx.username().to_string();
        let address = ctx.request().address.clone();

        if !ctx.request().force_login {
            match self.sessions.is_online_exists(&username, &address) {
                Ok(()) => {}
                Err(SessionError::Conflict { sessions }) => {
                    return Err(AuthError::AlreadyOnline { sessions });
                }
                Err(e) => return Err(e.into()),
            }
        }

        let session_id = self
            .sessions
            .login(&username, &address, self.api_key.as_deref())?;

        let roles = ctx
            .credential()
            .and_then(|c| c.as_roles())
            .map(|r| r.role_names())
            .unwrap_or_default();
        let user_id = ctx.user_id().map(str::to_string);

        let mut result = ctx.into_result();
        result.session_id = Some(session_id);
        result.data.insert("roles".to_string(), json!(roles));
        if let Some(user_id) = user_id {
            result.data.insert("user_id".to_string(), json!(user_id));
        }

        info!("{username} logged in from {address}, session {session_id}");
        Ok(result)
    }
}
