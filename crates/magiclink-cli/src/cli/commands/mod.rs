//! CLI command handlers.

use std::sync::Arc;

use anyhow::Result;
use magiclink_core::auth::Authenticator;
use magiclink_core::config::Config;
use magiclink_core::providers::store::SessionStore;
use magiclink_core::providers::supabase::SupabaseClient;

use super::ui::TerminalUi;

pub mod auth;
pub mod config;
pub mod subscribe;

pub type CliAuthenticator = Authenticator<SupabaseClient>;

/// Authenticator over the configured Supabase project and the stored session.
pub fn authenticator(config: &Config) -> Result<CliAuthenticator> {
    let client = SupabaseClient::from_config(config, SessionStore::default_location())?;
    let ui = Arc::new(TerminalUi::from_env());
    Ok(Authenticator::new(
        client,
        Arc::<TerminalUi>::clone(&ui),
        ui,
        config.otp_timeout(),
    ))
}
