//! Configuration management for magiclink.
//!
//! Loads configuration from ${MAGICLINK_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the Supabase project URL.
pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
/// Environment variable overriding the Supabase anon key.
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

/// Path where the local OAuth listener receives the provider redirect.
pub const OAUTH_CALLBACK_PATH: &str = "/auth/callback";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Authentication flow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Localhost port for the OAuth redirect listener.
    pub redirect_port: u16,
    /// Lifetime of a sent phone verification code (unbounded when unset).
    pub otp_timeout_secs: Option<u64>,
    /// How long the terminal waits for an OAuth redirect.
    pub oauth_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            redirect_port: 53682,
            otp_timeout_secs: None,
            oauth_timeout_secs: 120,
        }
    }
}

/// Checkout collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Name of the edge function that creates checkout sessions.
    pub function: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            function: "create-stripe-session".to_string(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Supabase project URL
    pub supabase_url: Option<String>,
    /// Supabase public anon key
    pub supabase_anon_key: Option<String>,
    pub auth: AuthConfig,
    pub checkout: CheckoutConfig,
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default template to `path`.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Supabase URL, preferring the environment over the config file.
    pub fn supabase_url(&self) -> Option<String> {
        resolve_setting(
            std::env::var(SUPABASE_URL_ENV).ok(),
            self.supabase_url.as_deref(),
        )
        .map(|url| url.trim_end_matches('/').to_string())
    }

    /// Supabase anon key, preferring the environment over the config file.
    pub fn supabase_anon_key(&self) -> Option<String> {
        resolve_setting(
            std::env::var(SUPABASE_ANON_KEY_ENV).ok(),
            self.supabase_anon_key.as_deref(),
        )
    }

    /// Redirect URL handed to the OAuth provider.
    pub fn redirect_url(&self) -> String {
        format!(
            "http://localhost:{}{OAUTH_CALLBACK_PATH}",
            self.auth.redirect_port
        )
    }

    pub fn otp_timeout(&self) -> Option<Duration> {
        self.auth.otp_timeout_secs.map(Duration::from_secs)
    }

    pub fn oauth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.oauth_timeout_secs)
    }
}

fn resolve_setting(env: Option<String>, file: Option<&str>) -> Option<String> {
    env.filter(|value| !value.trim().is_empty())
        .or_else(|| file.map(str::to_string))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub mod paths {
    //! Path resolution for magiclink configuration and data directories.
    //!
    //! MAGICLINK_HOME resolution order:
    //! 1. MAGICLINK_HOME environment variable (if set)
    //! 2. ~/.config/magiclink (default)

    use std::path::PathBuf;

    /// Returns the magiclink home directory.
    pub fn magiclink_home() -> PathBuf {
        if let Ok(home) = std::env::var("MAGICLINK_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".magiclink"),
            |h| h.join(".config").join("magiclink"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        magiclink_home().join("config.toml")
    }

    /// Returns the path to the persisted session.
    pub fn session_path() -> PathBuf {
        magiclink_home().join("session.json")
    }

    /// Returns the log directory.
    pub fn logs_dir() -> PathBuf {
        magiclink_home().join("logs")
    }
}
