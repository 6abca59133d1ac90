//! Authentication state types.

use std::fmt;

use chrono::NaiveDate;
use tokio::time::Instant;

use crate::providers::{OAuthProvider, Session};

/// What the user submitted.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    EmailPassword { email: String, password: String },
    PhoneOtpRequest { phone: String },
    PhoneOtpVerify { phone: String, code: String },
    OAuthProvider { provider: OAuthProvider },
    SignUp {
        email: String,
        password: String,
        name: String,
        dob: Option<NaiveDate>,
    },
}

impl Credentials {
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::EmailPassword { .. } => "email_password",
            Credentials::PhoneOtpRequest { .. } => "phone_otp_request",
            Credentials::PhoneOtpVerify { .. } => "phone_otp_verify",
            Credentials::OAuthProvider { .. } => "oauth",
            Credentials::SignUp { .. } => "sign_up",
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::EmailPassword { email, .. } => f
                .debug_struct(self.kind())
                .field("email", email)
                .finish_non_exhaustive(),
            Credentials::SignUp {
                email, name, dob, ..
            } => f
                .debug_struct(self.kind())
                .field("email", email)
                .field("name", name)
                .field("dob", dob)
                .finish_non_exhaustive(),
            Credentials::PhoneOtpRequest { phone } => {
                f.debug_struct(self.kind()).field("phone", phone).finish()
            }
            Credentials::PhoneOtpVerify { phone, .. } => f
                .debug_struct(self.kind())
                .field("phone", phone)
                .finish_non_exhaustive(),
            Credentials::OAuthProvider { provider } => f
                .debug_struct(self.kind())
                .field("provider", provider)
                .finish(),
        }
    }
}

/// The single authoritative authentication state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Initial session probe has not resolved yet.
    #[default]
    Unknown,
    Unauthenticated,
    /// A submission is in flight.
    Authenticating,
    Authenticated(Session),
    /// Last submission failed; the message is shown to the user.
    Failed(String),
}

impl AuthState {
    pub fn name(&self) -> &'static str {
        match self {
            AuthState::Unknown => "unknown",
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated(_) => "authenticated",
            AuthState::Failed(_) => "failed",
        }
    }

    /// New credentials are only accepted in these states.
    pub fn accepts_submission(&self) -> bool {
        matches!(self, AuthState::Unauthenticated | AuthState::Failed(_))
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AuthState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// True when `other` is the same phase for the same identity.
    ///
    /// A refreshed token is not a distinct transition.
    pub fn same_phase(&self, other: &AuthState) -> bool {
        match (self, other) {
            (AuthState::Authenticated(a), AuthState::Authenticated(b)) => a.same_identity(b),
            (AuthState::Failed(a), AuthState::Failed(b)) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

/// Phone one-time-password progress.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OtpFlow {
    #[default]
    NotSent,
    Sent { phone: String, sent_at: Instant },
    Verified { phone: String },
    Expired { phone: String },
}

impl OtpFlow {
    pub fn name(&self) -> &'static str {
        match self {
            OtpFlow::NotSent => "not_sent",
            OtpFlow::Sent { .. } => "sent",
            OtpFlow::Verified { .. } => "verified",
            OtpFlow::Expired { .. } => "expired",
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, OtpFlow::Sent { .. })
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            OtpFlow::NotSent => None,
            OtpFlow::Sent { phone, .. }
            | OtpFlow::Verified { phone }
            | OtpFlow::Expired { phone } => Some(phone),
        }
    }
}

/// Screens the authenticator sends the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Chat,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Login => "login",
            Route::Chat => "chat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Transient banner shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Error".to_string(),
            message: message.into(),
        }
    }
}
