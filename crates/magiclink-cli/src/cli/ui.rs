//! Terminal rendering of authenticator notices and navigation.

use magiclink_core::auth::{Navigator, Notice, NoticeLevel, Notifier, Route};
use tracing::{debug, warn};

/// Set to skip launching a browser (tests, headless machines).
pub const NO_BROWSER_ENV: &str = "MAGICLINK_NO_BROWSER";

pub struct TerminalUi {
    open_browser: bool,
}

impl TerminalUi {
    pub fn from_env() -> Self {
        Self {
            open_browser: std::env::var_os(NO_BROWSER_ENV).is_none(),
        }
    }
}

impl Notifier for TerminalUi {
    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Success => println!("✓ {}: {}", notice.title, notice.message),
            NoticeLevel::Info => println!("{}: {}", notice.title, notice.message),
            // Failures reach the terminal through the command result.
            NoticeLevel::Error => debug!(message = %notice.message, "error notice"),
        }
    }
}

impl Navigator for TerminalUi {
    fn navigate(&self, route: Route) {
        debug!(route = route.as_str(), "navigate");
    }

    fn open_url(&self, url: &str) {
        println!("Continue in your browser:");
        println!("  {url}");
        if self.open_browser
            && let Err(err) = open::that(url)
        {
            warn!(error = %err, "failed to open browser");
        }
    }
}
