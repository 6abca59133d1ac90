//! Subscription plans and checkout sessions.
//!
//! Checkout is delegated to a Supabase edge function that creates a Stripe
//! checkout session for `{priceId, userId}` and answers with its URL.

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::providers::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanFeature {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub id: &'static str,
    pub name: &'static str,
    /// Whole dollars per interval.
    pub price: u32,
    pub interval: &'static str,
    /// Stripe price identifier.
    pub price_id: &'static str,
    pub features: &'static [PlanFeature],
}

impl Plan {
    pub fn price_label(&self) -> String {
        format!("${}/{}", self.price, self.interval)
    }
}

pub const PLANS: &[Plan] = &[
    Plan {
        id: "basic",
        name: "Basic Plan",
        price: 10,
        interval: "month",
        price_id: "price_basic_monthly",
        features: &[
            PlanFeature {
                name: "Unlimited Access",
                description: "Access to all basic features",
            },
            PlanFeature {
                name: "Priority Support",
                description: "24/7 email support",
            },
            PlanFeature {
                name: "Basic Analytics",
                description: "Track your basic metrics",
            },
        ],
    },
    Plan {
        id: "pro",
        name: "Pro Plan",
        price: 20,
        interval: "month",
        price_id: "price_pro_monthly",
        features: &[
            PlanFeature {
                name: "Advanced Features",
                description: "Access to all pro features",
            },
            PlanFeature {
                name: "Dedicated Support",
                description: "24/7 priority phone & email support",
            },
            PlanFeature {
                name: "Advanced Analytics",
                description: "Detailed metrics and insights",
            },
        ],
    },
];

pub fn find_plan(id: &str) -> Option<&'static Plan> {
    let id = id.trim();
    PLANS.iter().find(|plan| plan.id.eq_ignore_ascii_case(id))
}

#[derive(Debug, Default, Deserialize)]
struct CheckoutResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "sessionUrl")]
    session_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct CheckoutClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    function: String,
}

impl CheckoutClient {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            function: function.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let (Some(url), Some(anon_key)) = (config.supabase_url(), config.supabase_anon_key())
        else {
            bail!("Missing Supabase URL or anon key; checkout is unavailable");
        };
        Ok(Self::new(url, anon_key, &config.checkout.function))
    }

    /// Creates a checkout session for `plan` and returns the redirect URL.
    ///
    /// # Errors
    /// Fails without a request when there is no session, and when the
    /// function errors or answers without a URL.
    pub async fn create_checkout_session(
        &self,
        session: Option<&Session>,
        plan: &Plan,
    ) -> Result<String> {
        let Some(session) = session else {
            bail!("Please login to subscribe");
        };

        let endpoint = format!("{}/functions/v1/{}", self.base_url, self.function);
        let response = self
            .http
            .post(&endpoint)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .json(&json!({
                "priceId": plan.price_id,
                "userId": session.user_id(),
                "quantity": 1,
            }))
            .send()
            .await
            .with_context(|| format!("Failed to reach {endpoint}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read checkout response")?;
        let parsed: CheckoutResponse = serde_json::from_str(&body).unwrap_or_default();

        if let Some(error) = parsed.error.filter(|e| !e.trim().is_empty()) {
            bail!(error);
        }
        if !status.is_success() {
            bail!("Checkout failed (HTTP {})", status.as_u16());
        }

        let url = parsed
            .url
            .or(parsed.session_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow!("Failed to create Stripe session"))?;
        info!(plan = plan.id, "checkout session created");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::providers::User;

    fn session() -> Session {
        Session {
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: u64::MAX,
            user: User {
                id: "user-1".to_string(),
                email: Some("a@b.com".to_string()),
                phone: None,
            },
        }
    }

    fn pro() -> &'static Plan {
        find_plan("pro").unwrap()
    }

    #[test]
    fn test_catalog() {
        assert_eq!(PLANS.len(), 2);
        assert_eq!(find_plan("BASIC").map(|p| p.price), Some(10));
        assert_eq!(pro().price_label(), "$20/month");
        assert!(find_plan("enterprise").is_none());
    }

    #[tokio::test]
    async fn test_requires_session() {
        let client = CheckoutClient::new("http://127.0.0.1:9", "anon", "create-stripe-session");
        let err = client.create_checkout_session(None, pro()).await.unwrap_err();
        assert_eq!(err.to_string(), "Please login to subscribe");
    }

    #[tokio::test]
    async fn test_returns_checkout_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/create-stripe-session"))
            .and(header("authorization", "Bearer access-1"))
            .and(header("apikey", "anon"))
            .and(body_partial_json(json!({
                "priceId": "price_pro_monthly",
                "userId": "user-1",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "url": "https://checkout.stripe.com/c/pay/cs_1" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = CheckoutClient::new(server.uri(), "anon", "create-stripe-session");
        let url = client
            .create_checkout_session(Some(&session()), pro())
            .await
            .unwrap();
        assert_eq!(url, "https://checkout.stripe.com/c/pay/cs_1");
    }

    #[tokio::test]
    async fn test_accepts_session_url_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "sessionUrl": "https://checkout.example/s" })),
            )
            .mount(&server)
            .await;

        let client = CheckoutClient::new(server.uri(), "anon", "create-stripe-session");
        let url = client
            .create_checkout_session(Some(&session()), pro())
            .await
            .unwrap();
        assert_eq!(url, "https://checkout.example/s");
    }

    #[tokio::test]
    async fn test_function_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "error": "No such price" })),
            )
            .mount(&server)
            .await;

        let client = CheckoutClient::new(server.uri(), "anon", "create-stripe-session");
        let err = client
            .create_checkout_session(Some(&session()), pro())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No such price");
    }

    #[tokio::test]
    async fn test_missing_url_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = CheckoutClient::new(server.uri(), "anon", "create-stripe-session");
        let err = client
            .create_checkout_session(Some(&session()), pro())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to create Stripe session");
    }
}
