//! Supabase (GoTrue) auth client.
//!
//! Talks to `<project>/auth/v1` with the project's anon key, persists the
//! session through [`SessionStore`] and fans session changes out on a
//! broadcast channel.

mod types;

use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use reqwest::RequestBuilder;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use self::types::{TokenResponse, error_message};
use super::oauth::generate_pkce;
use super::store::SessionStore;
use super::{
    AuthProvider, OAuthProvider, OAuthRedirect, ProviderError, ProviderResult, Session,
    SessionEvent, SignUpRequest,
};
use crate::config::{Config, SUPABASE_ANON_KEY_ENV, SUPABASE_URL_ENV, paths};

/// Buffered session events per subscriber.
const EVENT_CAPACITY: usize = 16;

fn storage_error(err: &anyhow::Error) -> ProviderError {
    ProviderError::Storage(format!("{err:#}"))
}

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    redirect_url: String,
    store: SessionStore,
    /// PKCE verifier of the OAuth sign-in in progress.
    pending_verifier: Mutex<Option<String>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SupabaseClient {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        redirect_url: impl Into<String>,
        store: SessionStore,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            redirect_url: redirect_url.into(),
            store,
            pending_verifier: Mutex::new(None),
            events,
        }
    }

    /// Builds a client from the resolved configuration.
    ///
    /// # Errors
    /// Returns an error if the project URL or anon key is missing or invalid.
    pub fn from_config(config: &Config, store: SessionStore) -> anyhow::Result<Self> {
        let (Some(url), Some(anon_key)) = (config.supabase_url(), config.supabase_anon_key())
        else {
            anyhow::bail!(
                "Missing Supabase URL or anon key. Set {SUPABASE_URL_ENV} and {SUPABASE_ANON_KEY_ENV}, or add supabase_url and supabase_anon_key to {}",
                paths::config_path().display()
            );
        };
        url::Url::parse(&url).with_context(|| format!("Invalid Supabase URL '{url}'"))?;
        Ok(Self::new(url, anon_key, config.redirect_url(), store))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.base_url)
    }

    fn post(&self, path: &str, bearer: &str) -> RequestBuilder {
        self.http
            .post(self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(request: RequestBuilder) -> ProviderResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status: status.as_u16(),
            message: error_message(status.as_u16(), &body),
        })
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> ProviderResult<Session> {
        let request = self
            .post("/token", &self.anon_key)
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let token: TokenResponse = Self::send(request).await?.json().await?;
        Ok(token.into())
    }

    fn persist(&self, session: &Session) -> ProviderResult<()> {
        self.store.save(session).map_err(|e| storage_error(&e))
    }

    fn emit(&self, event: SessionEvent) {
        debug!(event = event.name(), "auth state change");
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn signed_in(&self, session: Session) -> ProviderResult<Session> {
        self.persist(&session)?;
        info!(user_id = session.user_id(), "signed in");
        self.emit(SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    fn clear_store(&self) {
        if let Err(err) = self.store.clear() {
            warn!(error = %format!("{err:#}"), "failed to remove stored session");
        }
    }

    fn lock_verifier(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.pending_verifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuthProvider for SupabaseClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> ProviderResult<Option<Session>> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        self.signed_in(session).map(Some)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> ProviderResult<Option<Session>> {
        let body = json!({
            "email": request.email,
            "password": request.password,
            "data": {
                "name": request.name,
                "dob": request.dob.map(|d| d.to_string()),
            },
        });
        let value: serde_json::Value = Self::send(self.post("/signup", &self.anon_key).json(&body))
            .await?
            .json()
            .await?;

        // Without auto-confirm the API answers with the bare user.
        if value.get("access_token").is_none() {
            info!("sign-up accepted, awaiting email confirmation");
            return Ok(None);
        }
        let token: TokenResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Unexpected(format!("Malformed sign-up response: {e}")))?;
        self.signed_in(token.into()).map(Some)
    }

    async fn sign_in_with_otp(&self, phone: &str) -> ProviderResult<()> {
        let body = json!({ "phone": phone, "create_user": true, "channel": "sms" });
        Self::send(self.post("/otp", &self.anon_key).json(&body)).await?;
        info!("verification code sent");
        Ok(())
    }

    async fn verify_otp(&self, phone: &str, token: &str) -> ProviderResult<Option<Session>> {
        let body = json!({ "type": "sms", "phone": phone, "token": token });
        let token: TokenResponse = Self::send(self.post("/verify", &self.anon_key).json(&body))
            .await?
            .json()
            .await?;
        self.signed_in(token.into()).map(Some)
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> ProviderResult<OAuthRedirect> {
        let mut url = url::Url::parse(&self.endpoint("/authorize"))
            .map_err(|e| ProviderError::Unexpected(format!("Invalid authorize URL: {e}")))?;
        let pkce = generate_pkce();
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", &self.redirect_url)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "s256");

        *self.lock_verifier() = Some(pkce.verifier);
        debug!(provider = provider.as_str(), "oauth flow started");
        Ok(OAuthRedirect {
            provider,
            url: url.into(),
        })
    }

    async fn exchange_code_for_session(&self, code: &str) -> ProviderResult<Session> {
        let verifier = self.lock_verifier().take().ok_or_else(|| {
            ProviderError::Unexpected("No OAuth sign-in is in progress".to_string())
        })?;
        let session = self
            .token_grant(
                "pkce",
                json!({ "auth_code": code, "code_verifier": verifier }),
            )
            .await?;
        self.signed_in(session)
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        let stored = self.store.load().unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "unreadable stored session");
            None
        });
        self.store.clear().map_err(|e| storage_error(&e))?;
        let Some(session) = stored else {
            return Ok(());
        };
        self.emit(SessionEvent::SignedOut);

        let request = self
            .post("/logout", &session.access_token)
            .query(&[("scope", "global")]);
        match Self::send(request).await {
            // The token was already revoked or expired; nothing left to invalidate.
            Ok(_) | Err(ProviderError::Api { status: 401 | 403 | 404, .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn get_session(&self) -> ProviderResult<Option<Session>> {
        let Some(session) = self.store.load().map_err(|e| storage_error(&e))? else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        debug!("stored session expired, refreshing");
        let refreshed = self
            .token_grant(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token }),
            )
            .await;
        match refreshed {
            Ok(fresh) => {
                self.persist(&fresh)?;
                self.emit(SessionEvent::TokenRefreshed(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(ProviderError::Api { status, message }) => {
                warn!(status, %message, "refresh rejected, clearing session");
                self.clear_store();
                self.emit(SessionEvent::SignedOut);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
