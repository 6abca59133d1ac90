//! Auth effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! They represent UI side effects only (no state mutation), so the reducer
//! stays pure: it mutates the model and returns effects, never performs I/O.

use super::state::{Notice, Route};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEffect {
    /// Show a transient success/info/error banner.
    Notify(Notice),

    /// Move the user to another screen.
    Navigate(Route),

    /// Open a URL in the system browser (OAuth handoff).
    OpenUrl { url: String },
}
