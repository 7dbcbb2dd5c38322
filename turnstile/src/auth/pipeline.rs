//! Authentication pipeline.
//!
//! A [`Pipeline`] runs an [`AttemptContext`] through six phases:
//!
//! 1. **BeforeLoad**: checks that need only the request (fail counter, stored locks)
//! 2. **Loading**: loaders look up the credential; the first hit wins
//! 3. **AfterLoaded**
//! 4. **BeforeAuth**: checks against the loaded credential (whitelist, login type)
//! 5. **Authenticating**: checkers judge the password
//! 6. **AfterAuthed**: bookkeeping that must see ordinary wrong-password attempts
//!
//! Any hook error aborts the run after passing through the error translators.
//! A [`CheckOutcome::Rejected`] verdict is not an error: it stops the checkers
//! but still lets AfterAuthed run, which is how the fail counter observes wrong
//! passwords. A [`CheckOutcome::HardError`] skips AfterAuthed entirely.

use super::{
    capabilities::Credential,
    context::AttemptContext,
    errors::{AuthError, AuthResult},
    models::Phase,
    plugins::LocalAuthenticator,
};
use async_trait::async_trait;
use log::debug;
use std::{fmt, sync::Arc};

/// Verdict of an Authenticating-phase checker
#[derive(Debug)]
pub enum CheckOutcome {
    /// Credentials verified
    Matched,
    /// Checker does not apply to this credential
    NotApplicable,
    /// Checker applies and the credentials are wrong
    Rejected,
    /// Checker could not reach a verdict; aborts the attempt
    HardError(AuthError),
}

impl CheckOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, CheckOutcome::Matched)
    }
}

/// Credential produced by a loader
#[derive(Debug)]
pub struct Loaded {
    pub user_id: Option<String>,
    pub credential: Box<dyn Credential>,
}

impl Loaded {
    pub fn new(user_id: impl Into<String>, credential: Box<dyn Credential>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            credential,
        }
    }
}

/// Hook for the BeforeLoad, AfterLoaded, BeforeAuth and AfterAuthed phases
///
/// A hook registered in several phases can branch on [`AttemptContext::phase`].
#[async_trait]
pub trait PhaseHook: Send + Sync {
    async fn run(&self, ctx: &mut AttemptContext) -> AuthResult<()>;
}

/// Credential lookup
///
/// `Ok(None)` means "not found" and is not fatal.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, ctx: &AttemptContext) -> AuthResult<Option<Loaded>>;
}

/// Authenticating-phase checker
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, ctx: &mut AttemptContext) -> CheckOutcome;
}

/// Rewrites an error on its way out of the pipeline
pub trait ErrorTranslator: Send + Sync {
    fn translate(&self, ctx: &AttemptContext, err: AuthError) -> AuthError;
}

/// A compiled-in unit that registers hooks at construction time
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn install(self: Arc<Self>, hooks: &mut Hooks);
}

/// Hook lists, writable only while a pipeline is being built
#[derive(Default)]
pub struct Hooks {
    before_load: Vec<Arc<dyn PhaseHook>>,
    loaders: Vec<Arc<dyn Loader>>,
    after_loaded: Vec<Arc<dyn PhaseHook>>,
    before_auth: Vec<Arc<dyn PhaseHook>>,
    checkers: Vec<Arc<dyn Checker>>,
    after_authed: Vec<Arc<dyn PhaseHook>>,
    error_handlers: Vec<Arc<dyn ErrorTranslator>>,
}

impl Hooks {
    pub fn on_before_load(&mut self, hook: Arc<dyn PhaseHook>) {
        self.before_load.push(hook);
    }

    pub fn on_loading(&mut self, loader: Arc<dyn Loader>) {
        self.loaders.push(loader);
    }

    pub fn on_after_loaded(&mut self, hook: Arc<dyn PhaseHook>) {
        self.after_loaded.push(hook);
    }

    pub fn on_before_auth(&mut self, hook: Arc<dyn PhaseHook>) {
        self.before_auth.push(hook);
    }

    pub fn on_authenticating(&mut self, checker: Arc<dyn Checker>) {
        self.checkers.push(checker);
    }

    pub fn on_after_authed(&mut self, hook: Arc<dyn PhaseHook>) {
        self.after_authed.push(hook);
    }

    pub fn on_error(&mut self, handler: Arc<dyn ErrorTranslator>) {
        self.error_handlers.push(handler);
    }
}

/// Builds a [`Pipeline`]
///
/// The local authenticator is always the first checker, ahead of every
/// plugin, so plain password checks win over directory lookups.
pub struct PipelineBuilder {
    hooks: Hooks,
    plugins: Vec<&'static str>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            hooks: Hooks::default(),
            plugins: Vec::new(),
        };
        builder = builder.plugin(Arc::new(LocalAuthenticator));
        builder
    }

    /// Append a credential loader
    pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.hooks.on_loading(loader);
        self
    }

    /// Let a plugin register its hooks
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin.name());
        plugin.install(&mut self.hooks);
        self
    }

    pub fn plugins(self, plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) -> Self {
        plugins.into_iter().fold(self, PipelineBuilder::plugin)
    }

    pub fn error_handler(mut self, handler: Arc<dyn ErrorTranslator>) -> Self {
        self.hooks.on_error(handler);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            hooks: self.hooks,
            plugins: self.plugins,
        }
    }
}

/// Frozen authentication pipeline
pub struct Pipeline {
    hooks: Hooks,
    plugins: Vec<&'static str>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("plugins", &self.plugins)
            .field("loaders", &self.hooks.loaders.len())
            .field("checkers", &self.hooks.checkers.len())
            .finish()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Build a pipeline from one loader and an ordered plugin list
    pub fn new(loader: Arc<dyn Loader>, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self::builder().loader(loader).plugins(plugins).build()
    }

    /// Names of the installed plugins in registration order
    pub fn plugin_names(&self) -> &[&'static str] {
        &self.plugins
    }

    /// Run one authentication attempt
    ///
    /// Returns `Ok(())` when every phase completed; the verdict is then in
    /// `ctx.result().ok`, which stays `false` unless a checker matched.
    ///
    /// # Errors
    ///
    /// The first hook error or checker hard error, after translation.
    pub async fn auth(&self, ctx: &mut AttemptContext) -> AuthResult<()> {
        self.run_hooks(Phase::BeforeLoad, &self.hooks.before_load, ctx)
            .await?;

        ctx.enter(Phase::Loading);
        for loader in &self.hooks.loaders {
            match loader.load(ctx).await {
                Ok(Some(loaded)) => {
                    debug!("credential loaded for {}", ctx.username());
                    ctx.set_credential(loaded.user_id, loaded.credential);
                    break;
                }
                Ok(None) => {}
                Err(err) => return Err(self.fail(ctx, err)),
            }
        }

        self.run_hooks(Phase::AfterLoaded, &self.hooks.after_loaded, ctx)
            .await?;
        self.run_hooks(Phase::BeforeAuth, &self.hooks.before_auth, ctx)
            .await?;

        ctx.enter(Phase::Authenticating);
        for checker in &self.hooks.checkers {
            match checker.check(ctx).await {
                CheckOutcome::Matched => {
                    ctx.result_mut().ok = true;
                    break;
                }
                CheckOutcome::Rejected => {
                    ctx.result_mut().ok = false;
                    break;
                }
                CheckOutcome::NotApplicable => {}
                CheckOutcome::HardError(err) => return Err(self.fail(ctx, err)),
            }
        }
        debug!("{} authenticated: {}", ctx.username(), ctx.result().ok);

        self.run_hooks(Phase::AfterAuthed, &self.hooks.after_authed, ctx)
            .await
    }

    async fn run_hooks(
        &self,
        phase: Phase,
        hooks: &[Arc<dyn PhaseHook>],
        ctx: &mut AttemptContext,
    ) -> AuthResult<()> {
        ctx.enter(phase);
        for hook in hooks {
            if let Err(err) = hook.run(ctx).await {
                return Err(self.fail(ctx, err));
            }
        }
        Ok(())
    }

    fn fail(&self, ctx: &AttemptContext, err: AuthError) -> AuthError {
        debug!(
            "authentication of {} aborted in {}: {}",
            ctx.username(),
            ctx.phase(),
            err
        );
        self.hooks
            .error_handlers
            .iter()
            .fold(err, |err, handler| handler.translate(ctx, err))
    }
}
