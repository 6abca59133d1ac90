//! Session authenticator runtime.
//!
//! Wraps [`AuthModel`] with the injected provider and UI collaborators. Each
//! operation marks the model before the provider call is issued, applies the
//! result when it returns, then runs the resulting effects outside the lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::effects::AuthEffect;
use super::error::AuthError;
use super::state::{AuthState, Credentials, Notice, OtpFlow, Route};
use super::task::{TaskId, TaskKind};
use super::update::{AuthEvent, AuthModel, Outcome};
use crate::providers::{
    AuthProvider, OAuthProvider, OAuthRedirect, ProviderResult, Session, SignUpRequest,
};

/// Moves the user between screens.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);

    /// Hands a URL to the system browser.
    fn open_url(&self, url: &str);
}

/// Shows transient banners.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

struct Inner<P> {
    provider: P,
    model: Mutex<AuthModel>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl<P> Inner<P> {
    fn model(&self) -> MutexGuard<'_, AuthModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self, effects: Vec<AuthEffect>) {
        for effect in effects {
            match effect {
                AuthEffect::Notify(notice) => self.notifier.notify(&notice),
                AuthEffect::Navigate(route) => self.navigator.navigate(route),
                AuthEffect::OpenUrl { url } => self.navigator.open_url(&url),
            }
        }
    }

    fn apply(&self, event: AuthEvent) {
        let effects = self.model().update(event, Instant::now());
        self.run(effects);
    }
}

/// Owns the authentication state for the lifetime of the process.
///
/// Cloning is cheap; clones share the same state.
pub struct Authenticator<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for Authenticator<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: AuthProvider> Authenticator<P> {
    pub fn new(
        provider: P,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        otp_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                model: Mutex::new(AuthModel::new(otp_timeout)),
                navigator,
                notifier,
            }),
        }
    }

    pub fn state(&self) -> AuthState {
        self.inner.model().state().clone()
    }

    pub fn otp_flow(&self) -> OtpFlow {
        self.inner.model().otp().clone()
    }

    pub fn provider(&self) -> &P {
        &self.inner.provider
    }

    /// Resolves `Unknown` from the provider's stored session.
    ///
    /// Provider errors resolve to `Unauthenticated`. Calling this again after
    /// the state is known just returns the current state.
    pub async fn probe_initial_session(&self) -> AuthState {
        let Some(task) = self.inner.model().begin_probe() else {
            return self.state();
        };
        let session = match self.inner.provider.get_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "session probe failed");
                None
            }
        };
        self.finish(task, Outcome::Probe(session));
        self.state()
    }

    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let task = self.start(&Credentials::EmailPassword {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let result = self.inner.provider.sign_in_with_password(email, password).await;
        self.finish_session(task, require_session(result, TaskKind::Password))
    }

    /// Registers an account. Returns the session when the backend signs the
    /// user in straight away, `None` when email confirmation is pending.
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<Option<Session>, AuthError> {
        let task = self.start(&Credentials::SignUp {
            email: request.email.clone(),
            password: request.password.clone(),
            name: request.name.clone(),
            dob: request.dob,
        })?;
        match self.inner.provider.sign_up(request).await {
            Ok(Some(session)) => self.finish_session(task, Ok(session)).map(Some),
            Ok(None) => {
                self.finish(task, Outcome::Registered);
                Ok(None)
            }
            Err(err) => Err(self.fail(task, AuthError::from_provider(err, TaskKind::SignUp))),
        }
    }

    /// Sends a code by SMS. Calling again while a code is outstanding resends it.
    pub async fn request_phone_otp(&self, phone: &str) -> Result<(), AuthError> {
        let task = self.start(&Credentials::PhoneOtpRequest {
            phone: phone.to_string(),
        })?;
        match self.inner.provider.sign_in_with_otp(phone).await {
            Ok(()) => {
                self.finish(
                    task,
                    Outcome::OtpSent {
                        phone: phone.to_string(),
                    },
                );
                Ok(())
            }
            Err(err) => Err(self.fail(task, AuthError::from_provider(err, TaskKind::OtpRequest))),
        }
    }

    /// Fails without contacting the provider unless a code was sent to `phone`.
    pub async fn verify_phone_otp(&self, phone: &str, code: &str) -> Result<Session, AuthError> {
        let task = self.start(&Credentials::PhoneOtpVerify {
            phone: phone.to_string(),
            code: code.to_string(),
        })?;
        let result = self.inner.provider.verify_otp(phone, code).await;
        self.finish_session(task, require_session(result, TaskKind::OtpVerify))
    }

    /// Starts a redirect-based sign-in and opens the provider's page.
    ///
    /// Never authenticates directly; the session arrives as a pushed
    /// `SIGNED_IN` event.
    pub async fn login_with_oauth(
        &self,
        provider: OAuthProvider,
    ) -> Result<OAuthRedirect, AuthError> {
        let task = self.start(&Credentials::OAuthProvider { provider })?;
        match self.inner.provider.sign_in_with_oauth(provider).await {
            Ok(redirect) => {
                self.finish(task, Outcome::OAuthStarted(redirect.clone()));
                Ok(redirect)
            }
            Err(err) => Err(self.fail(
                task,
                AuthError::from_provider(err, TaskKind::OAuth(provider)),
            )),
        }
    }

    /// Clears local state before the provider is contacted.
    ///
    /// A provider failure is reported as a notice and returned, but never
    /// restores the signed-in state.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.inner.apply(AuthEvent::SignOutRequested);
        let result = self
            .inner
            .provider
            .sign_out()
            .await
            .map_err(|err| AuthError::from_provider(err, TaskKind::SignOut));
        self.inner.apply(AuthEvent::SignOutFinished(result.clone()));
        result
    }

    /// Listens for provider session events until the returned handle is
    /// released.
    ///
    /// `on_change` runs once per distinct state transition. Must be called
    /// from within a Tokio runtime.
    pub fn subscribe_to_session_changes<F>(&self, on_change: F) -> SessionSubscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        let mut events = self.inner.provider.on_auth_state_change();
        let token = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let cancelled = token.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    event = events.recv() => event,
                };
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session listener fell behind");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let (effects, changed) = {
                    let mut model = inner.model();
                    // Release takes the model lock, so nothing applies after it.
                    if cancelled.is_cancelled() {
                        break;
                    }
                    let before = model.state().clone();
                    let effects = model.update(AuthEvent::Session(event), Instant::now());
                    let after = model.state();
                    let changed = (!before.same_phase(after)).then(|| after.clone());
                    (effects, changed)
                };
                if cancelled.is_cancelled() {
                    break;
                }
                inner.run(effects);
                if let Some(state) = changed {
                    on_change(&state);
                }
            }
            debug!("session listener stopped");
        });

        let inner = Arc::clone(&self.inner);
        SessionSubscription {
            release: Some(Box::new(move || {
                let _model = inner.model();
                token.cancel();
            })),
        }
    }

    fn start(&self, credentials: &Credentials) -> Result<TaskId, AuthError> {
        self.inner.model().begin(credentials, Instant::now())
    }

    fn finish(&self, task: TaskId, outcome: Outcome) {
        self.inner.apply(AuthEvent::Completed { task, outcome });
    }

    fn fail(&self, task: TaskId, err: AuthError) -> AuthError {
        self.finish(task, Outcome::Failed(err.clone()));
        err
    }

    fn finish_session(
        &self,
        task: TaskId,
        result: Result<Session, AuthError>,
    ) -> Result<Session, AuthError> {
        match result {
            Ok(session) => {
                self.finish(task, Outcome::SignedIn(session.clone()));
                Ok(session)
            }
            Err(err) => Err(self.fail(task, err)),
        }
    }
}

fn require_session(
    result: ProviderResult<Option<Session>>,
    kind: TaskKind,
) -> Result<Session, AuthError> {
    match result {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(AuthError::missing_session(kind)),
        Err(err) => Err(AuthError::from_provider(err, kind)),
    }
}

/// Live session-change listener.
///
/// Released exactly once, by [`SessionSubscription::unsubscribe`] or on drop.
#[must_use = "dropping the subscription stops listening"]
pub struct SessionSubscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SessionSubscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            debug!("session listener released");
        }
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
