//! Session authenticator: state machine, reducer and async runtime.

mod authenticator;
mod effects;
mod error;
mod state;
mod task;
mod update;

pub use authenticator::{Authenticator, Navigator, Notifier, SessionSubscription};
pub use effects::AuthEffect;
pub use error::AuthError;
pub use state::{AuthState, Credentials, Notice, NoticeLevel, OtpFlow, Route};
pub use task::{TaskId, TaskKind};
pub use update::{AuthEvent, AuthModel, Outcome};
