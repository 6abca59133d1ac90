//! Session and event types shared by providers and the authenticator.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::oauth::mask_token;

/// Seconds before the real expiry at which a session is treated as expired.
const EXPIRY_MARGIN_SECS: u64 = 30;

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// The authenticated user behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl User {
    /// Email, phone or id, whichever is the most readable.
    pub fn display_name(&self) -> &str {
        self.email
            .as_deref()
            .or(self.phone.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Token bundle issued by the auth provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry timestamp in seconds since epoch
    pub expires_at: u64,
    pub user: User,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        now_secs().saturating_add(EXPIRY_MARGIN_SECS) >= self.expires_at
    }

    /// Two sessions share an identity when they belong to the same user.
    ///
    /// Refreshed tokens keep the identity.
    pub fn same_identity(&self, other: &Session) -> bool {
        self.user.id == other.user.id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &mask_token(&self.access_token))
            .field("refresh_token", &"***")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Session change pushed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session found (or not) when the provider starts up.
    InitialSession(Option<Session>),
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::InitialSession(_) => "INITIAL_SESSION",
            SessionEvent::SignedIn(_) => "SIGNED_IN",
            SessionEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
            SessionEvent::SignedOut => "SIGNED_OUT",
        }
    }
}

/// Third-party identity providers offered on the login screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
    Github,
    Figma,
}

impl OAuthProvider {
    /// Identifier used by the auth API.
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
            OAuthProvider::Figma => "figma",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::Github => "GitHub",
            OAuthProvider::Figma => "Figma",
        }
    }

    pub fn all() -> &'static [OAuthProvider] {
        &[
            OAuthProvider::Google,
            OAuthProvider::Github,
            OAuthProvider::Figma,
        ]
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|provider| provider.as_str() == wanted)
            .ok_or_else(|| {
                format!("unknown OAuth provider '{s}' (expected google, github or figma)")
            })
    }
}

/// Authorization URL the user must visit to finish an OAuth sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthRedirect {
    pub provider: OAuthProvider,
    pub url: String,
}

/// Registration details collected by the sign-up form.
#[derive(Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub dob: Option<NaiveDate>,
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("dob", &self.dob)
            .finish_non_exhaustive()
    }
}
