//! Auth command handlers.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use magiclink_core::auth::{AuthError, AuthState};
use magiclink_core::config::Config;
use magiclink_core::providers::oauth::mask_token;
use magiclink_core::providers::{AuthProvider, OAuthProvider, Session, SignUpRequest};
use tokio::sync::mpsc;

use super::{CliAuthenticator, authenticator};
use crate::cli::callback;

/// How long to wait for the pushed sign-in after the code exchange.
const SIGNED_IN_EVENT_TIMEOUT: Duration = Duration::from_secs(10);

fn print_signed_in(session: &Session) {
    println!("Signed in as {}", session.user.display_name());
}

fn format_expiry(expires_at: u64) -> String {
    i64::try_from(expires_at)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map_or_else(|| "unknown".to_string(), |at| at.to_rfc3339())
}

/// Resolves the stored session; `None` when someone is already signed in.
async fn signed_out_authenticator(config: &Config) -> Result<Option<CliAuthenticator>> {
    let auth = authenticator(config)?;
    if let AuthState::Authenticated(session) = auth.probe_initial_session().await {
        println!(
            "Already signed in as {}. Run `magiclink logout` to switch accounts.",
            session.user.display_name()
        );
        return Ok(None);
    }
    Ok(Some(auth))
}

/// Reads one line on a blocking thread; `None` at end of input.
async fn read_stdin_line() -> Result<Option<String>> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        Ok::<_, io::Error>((read > 0).then_some(line))
    })
    .await
    .context("stdin reader stopped")?
    .context("Failed to read from stdin")
}

pub async fn status(config: &Config) -> Result<()> {
    let auth = authenticator(config)?;
    match auth.probe_initial_session().await {
        AuthState::Authenticated(session) => {
            print_signed_in(&session);
            println!("  User ID: {}", session.user_id());
            println!("  Token:   {}", mask_token(&session.access_token));
            println!("  Expires: {}", format_expiry(session.expires_at));
        }
        _ => println!("Not signed in."),
    }
    Ok(())
}

pub async fn login_email(config: &Config, email: &str, password: &str) -> Result<()> {
    let Some(auth) = signed_out_authenticator(config).await? else {
        return Ok(());
    };
    let session = auth.login_with_password(email, password).await?;
    print_signed_in(&session);
    Ok(())
}

pub async fn signup(config: &Config, request: &SignUpRequest) -> Result<()> {
    let Some(auth) = signed_out_authenticator(config).await? else {
        return Ok(());
    };
    if let Some(session) = auth.sign_up(request).await? {
        print_signed_in(&session);
    }
    Ok(())
}

pub async fn login_phone(config: &Config, phone: &str) -> Result<()> {
    let Some(auth) = signed_out_authenticator(config).await? else {
        return Ok(());
    };
    auth.request_phone_otp(phone).await?;

    loop {
        print!("Verification code (or \"resend\"): ");
        io::stdout().flush()?;

        let Some(line) = read_stdin_line().await? else {
            bail!("No verification code entered");
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("resend") {
            if let Err(err) = auth.request_phone_otp(phone).await {
                eprintln!("{err}");
            }
            continue;
        }

        match auth.verify_phone_otp(phone, input).await {
            Ok(session) => {
                print_signed_in(&session);
                return Ok(());
            }
            Err(err @ AuthError::Precondition(_)) => {
                eprintln!("{err} Type \"resend\" for a new code.");
            }
            Err(err) => eprintln!("{err}"),
        }
    }
}

pub async fn login_oauth(config: &Config, provider: OAuthProvider) -> Result<()> {
    let Some(auth) = signed_out_authenticator(config).await? else {
        return Ok(());
    };
    let listener = callback::bind(config.auth.redirect_port).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = auth.subscribe_to_session_changes(move |state| {
        let _ = tx.send(state.clone());
    });

    auth.login_with_oauth(provider).await?;
    println!("Waiting for {} to redirect back...", provider.display_name());
    let code = callback::wait_for_code(listener, config.oauth_timeout()).await?;

    auth.provider()
        .exchange_code_for_session(&code)
        .await
        .with_context(|| format!("complete {} sign-in", provider.display_name()))?;

    let signed_in = tokio::time::timeout(SIGNED_IN_EVENT_TIMEOUT, async {
        while let Some(state) = rx.recv().await {
            if let AuthState::Authenticated(session) = state {
                return Some(session);
            }
        }
        None
    })
    .await
    .ok()
    .flatten();
    subscription.unsubscribe();

    match signed_in {
        Some(session) => {
            print_signed_in(&session);
            Ok(())
        }
        None => bail!("Sign-in did not complete. Run `magiclink status` to check."),
    }
}

pub async fn logout(config: &Config) -> Result<()> {
    let auth = authenticator(config)?;
    if !auth.probe_initial_session().await.is_authenticated() {
        println!("Not signed in (no stored session).");
        return Ok(());
    }
    auth.sign_out().await?;
    println!(
        "  Session removed from: {}",
        auth.provider().store().path().display()
    );
    Ok(())
}
