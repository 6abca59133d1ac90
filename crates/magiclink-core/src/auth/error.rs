//! Errors surfaced by authenticator operations.

use crate::providers::ProviderError;

use super::task::TaskKind;

/// Every authenticator operation fails with one of these; none are fatal and
/// the user may always resubmit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// A submission arrived while the state did not accept one.
    #[error("Cannot submit while {state}")]
    Rejected { state: &'static str },

    /// A required field was empty.
    #[error("{0}")]
    Validation(String),

    /// The operation's precondition does not hold (e.g. no code was sent).
    #[error("{0}")]
    Precondition(String),

    /// The provider refused the request; its message is passed through.
    #[error("{0}")]
    Provider(String),

    /// Something unexpected went wrong during the call.
    #[error("{0}")]
    Unknown(String),
}

impl AuthError {
    /// Maps a provider failure for an operation of `kind`.
    pub fn from_provider(err: ProviderError, kind: TaskKind) -> Self {
        match err {
            ProviderError::Api { message, .. } => AuthError::Provider(message),
            other => {
                tracing::warn!(task = kind.name(), error = %other, "auth provider call failed");
                AuthError::Unknown(kind.failure_message())
            }
        }
    }

    /// The provider returned neither a session nor an error.
    pub fn missing_session(kind: TaskKind) -> Self {
        tracing::warn!(task = kind.name(), "provider returned no session");
        AuthError::Unknown(kind.failure_message())
    }
}
