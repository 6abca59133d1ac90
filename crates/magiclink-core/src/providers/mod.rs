//! Auth provider abstraction and the Supabase implementation.
//!
//! The authenticator only talks to [`AuthProvider`]; the concrete client is
//! injected at construction so tests can substitute a fake.

use std::future::Future;

use tokio::sync::broadcast;

pub mod oauth;
pub mod store;
pub mod supabase;
pub mod types;

pub use types::{OAuthProvider, OAuthRedirect, Session, SessionEvent, SignUpRequest, User};

/// Failure reported by (or while talking to) the auth provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with an error; `message` is shown verbatim.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The request never produced a usable response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local session storage failed.
    #[error("session storage failed: {0}")]
    Storage(String),

    /// Anything else that should not happen.
    #[error("{0}")]
    Unexpected(String),
}

impl ProviderError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Operations the authenticator needs from a backend auth service.
///
/// Implementations emit [`SessionEvent`]s on the channel returned by
/// [`AuthProvider::on_auth_state_change`] whenever the stored session changes.
pub trait AuthProvider: Send + Sync + 'static {
    /// Password grant. `Ok(None)` means the provider accepted the request but
    /// issued no session.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = ProviderResult<Option<Session>>> + Send;

    /// Registers a new account. Returns a session only when the project
    /// auto-confirms sign-ups.
    fn sign_up(
        &self,
        request: &SignUpRequest,
    ) -> impl Future<Output = ProviderResult<Option<Session>>> + Send;

    /// Sends a one-time code by SMS.
    fn sign_in_with_otp(&self, phone: &str) -> impl Future<Output = ProviderResult<()>> + Send;

    fn verify_otp(
        &self,
        phone: &str,
        token: &str,
    ) -> impl Future<Output = ProviderResult<Option<Session>>> + Send;

    /// Prepares a redirect-based sign-in. The session arrives later as a
    /// [`SessionEvent::SignedIn`].
    fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
    ) -> impl Future<Output = ProviderResult<OAuthRedirect>> + Send;

    /// Completes a redirect-based sign-in with the code from the callback.
    fn exchange_code_for_session(
        &self,
        code: &str,
    ) -> impl Future<Output = ProviderResult<Session>> + Send;

    fn sign_out(&self) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Current valid session, refreshing an expired one when possible.
    fn get_session(&self) -> impl Future<Output = ProviderResult<Option<Session>>> + Send;

    fn on_auth_state_change(&self) -> broadcast::Receiver<SessionEvent>;
}
