//! Auth reducer.
//!
//! `AuthModel` owns the state machine. Submissions go through [`AuthModel::begin`],
//! and every provider result or pushed session event goes through
//! [`AuthModel::update`], which mutates the model and returns the effects the
//! runtime should perform. No I/O happens here.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::effects::AuthEffect;
use super::error::AuthError;
use super::state::{AuthState, Credentials, Notice, OtpFlow, Route};
use super::task::{TaskId, TaskKind, TaskSeq, TaskState};
use crate::providers::{OAuthProvider, OAuthRedirect, Session, SessionEvent};

const REGISTERED_MESSAGE: &str =
    "Registration successful! Please check your email to confirm your account.";
const OTP_EXPIRED_MESSAGE: &str = "The verification code has expired. Request a new one.";

/// Result of a finished provider call.
#[derive(Debug)]
pub enum Outcome {
    Probe(Option<Session>),
    SignedIn(Session),
    Registered,
    OtpSent { phone: String },
    OAuthStarted(OAuthRedirect),
    Failed(AuthError),
}

#[derive(Debug)]
pub enum AuthEvent {
    Completed { task: TaskId, outcome: Outcome },
    Session(SessionEvent),
    SignOutRequested,
    SignOutFinished(Result<(), AuthError>),
}

#[derive(Debug)]
pub struct AuthModel {
    state: AuthState,
    otp: OtpFlow,
    seq: TaskSeq,
    task: TaskState,
    otp_timeout: Option<Duration>,
    pending_oauth: Option<OAuthProvider>,
}

impl AuthModel {
    pub fn new(otp_timeout: Option<Duration>) -> Self {
        Self {
            state: AuthState::Unknown,
            otp: OtpFlow::NotSent,
            seq: TaskSeq::default(),
            task: TaskState::default(),
            otp_timeout,
            pending_oauth: None,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn otp(&self) -> &OtpFlow {
        &self.otp
    }

    pub fn is_busy(&self) -> bool {
        self.task.is_running()
    }

    /// Starts the initial session probe. Only runs once, while still `Unknown`.
    pub fn begin_probe(&mut self) -> Option<TaskId> {
        if self.state != AuthState::Unknown || self.task.is_running() {
            return None;
        }
        let id = self.seq.next_id();
        self.task.on_started(id, TaskKind::Probe);
        Some(id)
    }

    /// Accepts a submission and moves to `Authenticating`.
    ///
    /// Rejections and validation failures leave the model untouched, except an
    /// elapsed OTP which is marked `Expired`.
    pub fn begin(&mut self, credentials: &Credentials, now: Instant) -> Result<TaskId, AuthError> {
        if !self.state.accepts_submission() {
            debug!(
                state = self.state.name(),
                kind = credentials.kind(),
                "submission rejected"
            );
            return Err(AuthError::Rejected {
                state: self.state.name(),
            });
        }
        validate(credentials)?;

        let kind = match credentials {
            Credentials::EmailPassword { .. } => TaskKind::Password,
            Credentials::SignUp { .. } => TaskKind::SignUp,
            Credentials::PhoneOtpRequest { .. } => TaskKind::OtpRequest,
            Credentials::PhoneOtpVerify { phone, .. } => {
                self.check_otp(phone, now)?;
                TaskKind::OtpVerify
            }
            Credentials::OAuthProvider { provider } => TaskKind::OAuth(*provider),
        };

        let id = self.seq.next_id();
        self.task.on_started(id, kind);
        self.state = AuthState::Authenticating;
        debug!(task = id.0, kind = kind.name(), "submission started");
        Ok(id)
    }

    pub fn update(&mut self, event: AuthEvent, now: Instant) -> Vec<AuthEffect> {
        match event {
            AuthEvent::Completed { task, outcome } => self.complete(task, outcome, now),
            AuthEvent::Session(event) => self.on_session_event(event),
            AuthEvent::SignOutRequested => self.sign_out(),
            AuthEvent::SignOutFinished(Ok(())) => {
                vec![AuthEffect::Notify(Notice::success(
                    "Success",
                    "Logged out successfully",
                ))]
            }
            AuthEvent::SignOutFinished(Err(err)) => {
                vec![AuthEffect::Notify(Notice::error(err.to_string()))]
            }
        }
    }

    fn check_otp(&mut self, phone: &str, now: Instant) -> Result<(), AuthError> {
        let (sent_to, sent_at) = match &self.otp {
            OtpFlow::Sent { phone, sent_at } => (phone.clone(), *sent_at),
            OtpFlow::Expired { .. } => {
                return Err(AuthError::Precondition(OTP_EXPIRED_MESSAGE.to_string()));
            }
            OtpFlow::NotSent | OtpFlow::Verified { .. } => {
                return Err(AuthError::Precondition(
                    "Request a verification code first.".to_string(),
                ));
            }
        };

        if sent_to != phone {
            return Err(AuthError::Precondition(format!(
                "No verification code was sent to {phone}."
            )));
        }
        if let Some(ttl) = self.otp_timeout
            && now.saturating_duration_since(sent_at) >= ttl
        {
            info!(ttl_secs = ttl.as_secs(), "verification code expired");
            self.otp = OtpFlow::Expired { phone: sent_to };
            return Err(AuthError::Precondition(OTP_EXPIRED_MESSAGE.to_string()));
        }
        Ok(())
    }

    fn complete(&mut self, task: TaskId, outcome: Outcome, now: Instant) -> Vec<AuthEffect> {
        let Some(kind) = self.task.finish_if_active(task) else {
            debug!(task = task.0, "dropping superseded result");
            return Vec::new();
        };

        match outcome {
            Outcome::Probe(Some(session)) => {
                info!(user = session.user_id(), "restored session");
                self.state = AuthState::Authenticated(session);
                vec![AuthEffect::Navigate(Route::Chat)]
            }
            Outcome::Probe(None) => {
                self.state = AuthState::Unauthenticated;
                vec![AuthEffect::Navigate(Route::Login)]
            }
            Outcome::SignedIn(session) => {
                let verified = match (kind, self.otp.phone()) {
                    (TaskKind::OtpVerify, Some(phone)) => Some(phone.to_string()),
                    _ => None,
                };
                self.otp = verified.map_or(OtpFlow::NotSent, |phone| OtpFlow::Verified { phone });
                self.pending_oauth = None;
                self.signed_in(session, None)
            }
            Outcome::Registered => {
                self.state = AuthState::Unauthenticated;
                vec![AuthEffect::Notify(Notice::success(
                    "Success",
                    REGISTERED_MESSAGE,
                ))]
            }
            Outcome::OtpSent { phone } => {
                self.state = AuthState::Unauthenticated;
                let message = format!("We sent a verification code to {phone}.");
                self.otp = OtpFlow::Sent {
                    phone,
                    sent_at: now,
                };
                vec![AuthEffect::Notify(Notice::info("Code sent", message))]
            }
            Outcome::OAuthStarted(redirect) => {
                self.state = AuthState::Unauthenticated;
                self.pending_oauth = Some(redirect.provider);
                vec![
                    AuthEffect::OpenUrl { url: redirect.url },
                    AuthEffect::Notify(Notice::info(
                        format!("Continue with {}", redirect.provider.display_name()),
                        "Finish signing in in your browser.",
                    )),
                ]
            }
            Outcome::Failed(err) => {
                let message = err.to_string();
                debug!(kind = kind.name(), error = %message, "submission failed");
                self.state = AuthState::Failed(message.clone());
                vec![AuthEffect::Notify(Notice::error(message))]
            }
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) -> Vec<AuthEffect> {
        debug!(event = event.name(), state = self.state.name(), "session event");
        match event {
            SessionEvent::InitialSession(session) if self.state == AuthState::Unknown => {
                self.task.clear();
                let restored = session.is_some();
                self.state = session.map_or(AuthState::Unauthenticated, AuthState::Authenticated);
                let route = if restored { Route::Chat } else { Route::Login };
                vec![AuthEffect::Navigate(route)]
            }
            SessionEvent::InitialSession(Some(session)) | SessionEvent::SignedIn(session) => {
                self.external_sign_in(session)
            }
            SessionEvent::InitialSession(None) => Vec::new(),
            SessionEvent::TokenRefreshed(session) => {
                match &self.state {
                    AuthState::Authenticated(current) if current.same_identity(&session) => {
                        self.state = AuthState::Authenticated(session);
                    }
                    _ => debug!("ignoring token refresh outside the current session"),
                }
                Vec::new()
            }
            SessionEvent::SignedOut => {
                if !self.state.is_authenticated() {
                    return Vec::new();
                }
                self.reset();
                vec![
                    AuthEffect::Notify(Notice::info("Signed out", "You have been signed out.")),
                    AuthEffect::Navigate(Route::Login),
                ]
            }
        }
    }

    fn external_sign_in(&mut self, session: Session) -> Vec<AuthEffect> {
        if let AuthState::Authenticated(current) = &self.state
            && current.same_identity(&session)
        {
            debug!(user = session.user_id(), "duplicate sign-in suppressed");
            self.state = AuthState::Authenticated(session);
            return Vec::new();
        }

        let active = self.task.active_kind();
        if let Some(kind) = active {
            debug!(kind = kind.name(), "pushed sign-in supersedes in-flight task");
        }
        self.task.clear();
        // The provider may publish the session before the verify call returns.
        let verified = match (active, self.otp.phone()) {
            (Some(TaskKind::OtpVerify), Some(phone)) => Some(phone.to_string()),
            _ => None,
        };
        self.otp = verified.map_or(OtpFlow::NotSent, |phone| OtpFlow::Verified { phone });
        let via = self.pending_oauth.take();
        self.signed_in(session, via)
    }

    fn signed_in(&mut self, session: Session, via: Option<OAuthProvider>) -> Vec<AuthEffect> {
        info!(user = session.user_id(), "signed in");
        self.state = AuthState::Authenticated(session);
        let message = match via {
            Some(provider) => format!("Logged in with {}.", provider.display_name()),
            None => "You are now logged in.".to_string(),
        };
        vec![
            AuthEffect::Notify(Notice::success("Login Successful", message)),
            AuthEffect::Navigate(Route::Chat),
        ]
    }

    fn sign_out(&mut self) -> Vec<AuthEffect> {
        if let Some(kind) = self.task.active_kind() {
            debug!(kind = kind.name(), "sign-out supersedes in-flight task");
        }
        info!(from = self.state.name(), "signed out locally");
        self.reset();
        vec![AuthEffect::Navigate(Route::Login)]
    }

    fn reset(&mut self) {
        self.task.clear();
        self.state = AuthState::Unauthenticated;
        self.otp = OtpFlow::NotSent;
        self.pending_oauth = None;
    }
}

fn validate(credentials: &Credentials) -> Result<(), AuthError> {
    let missing = match credentials {
        Credentials::EmailPassword { email, password } => (email.trim().is_empty()
            || password.is_empty())
        .then_some("Email and password are required."),
        Credentials::SignUp {
            email,
            password,
            name,
            ..
        } => {
            if email.trim().is_empty() || password.is_empty() {
                Some("Email and password are required.")
            } else {
                name.trim().is_empty().then_some("Name is required.")
            }
        }
        Credentials::PhoneOtpRequest { phone } => {
            phone.trim().is_empty().then_some("Phone number is required.")
        }
        Credentials::PhoneOtpVerify { phone, code } => (phone.trim().is_empty()
            || code.trim().is_empty())
        .then_some("Phone number and verification code are required."),
        Credentials::OAuthProvider { .. } => None,
    };
    match missing {
        Some(message) => Err(AuthError::Validation(message.to_string())),
        None => Ok(()),
    }
}
