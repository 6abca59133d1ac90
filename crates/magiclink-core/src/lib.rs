//! Core magiclink library (authenticator, Supabase provider, checkout, config).

pub mod auth;
pub mod checkout;
pub mod config;
pub mod logging;
pub mod providers;
