//! Stripe API client.
//!
//! Implements the `BillingProvider` port over Stripe's REST API: the
//! subscription lookup the reconciler needs, plus hosted checkout and
//! billing portal sessions.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key).with_base_url("http://localhost:12111");
//! let client = StripeBillingClient::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::ports::{
    BillingProvider, CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentErrorCode,
    PortalSession, ProviderSubscription,
};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    request_timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (stripe-mock, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Stripe implementation of `BillingProvider`.
pub struct StripeBillingClient {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeBillingClient {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PaymentError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn subscription_url(&self, subscription_id: &str) -> String {
        format!(
            "{}/v1/subscriptions/{}",
            self.config.api_base_url, subscription_id
        )
    }

    /// POSTs a form to the Stripe API and decodes the JSON response.
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .post(format!("{}{}", self.config.api_base_url, path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(path, status = %status, "Stripe request failed");
            return Err(error_for_status(status, error_text));
        }

        response.json().await.map_err(invalid_response)
    }
}

/// Stripe's error envelope: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn error_for_status(status: reqwest::StatusCode, body: String) -> PaymentError {
    let code = match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            PaymentErrorCode::AuthenticationError
        }
        reqwest::StatusCode::TOO_MANY_REQUESTS => PaymentErrorCode::RateLimited,
        _ => PaymentErrorCode::ProviderError,
    };

    match serde_json::from_str::<StripeErrorEnvelope>(&body) {
        Ok(envelope) => {
            let message = envelope.error.message.unwrap_or(body);
            let error =
                PaymentError::new(code, format!("Stripe API error ({}): {}", status, message));
            match envelope.error.code {
                Some(provider_code) => error.with_provider_code(provider_code),
                None => error,
            }
        }
        Err(_) => PaymentError::new(code, format!("Stripe API error ({}): {}", status, body)),
    }
}

fn invalid_response(e: reqwest::Error) -> PaymentError {
    PaymentError::new(
        PaymentErrorCode::InvalidResponse,
        format!("Failed to parse Stripe response: {}", e),
    )
}

/// Form parameters for `POST /v1/checkout/sessions`.
fn checkout_params(request: CreateCheckoutRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("mode", "subscription".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        ("line_items[0][price]", request.price_id),
        ("line_items[0][quantity]", "1".to_string()),
        ("allow_promotion_codes", "true".to_string()),
        ("success_url", request.success_url),
        ("cancel_url", request.cancel_url),
        ("metadata[userId]", request.user_id.to_string()),
    ];
    if let Some(email) = request.email {
        params.push(("metadata[email]", email.clone()));
        params.push(("customer_email", email));
    }
    params
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
    expires_at: Option<i64>,
}

#[async_trait]
impl BillingProvider for StripeBillingClient {
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        let response = self
            .http_client
            .get(self.subscription_url(subscription_id))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                subscription_id,
                status = %status,
                "Stripe subscription lookup failed"
            );
            return Err(error_for_status(status, error_text));
        }

        let subscription: ProviderSubscription = response.json().await.map_err(invalid_response)?;

        Ok(Some(subscription))
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let session: SessionResponse = self
            .post_form("/v1/checkout/sessions", &checkout_params(request))
            .await?;

        let url = session.url.ok_or_else(|| {
            PaymentError::new(
                PaymentErrorCode::InvalidResponse,
                "Checkout session has no URL",
            )
        })?;

        tracing::info!(session_id = %session.id, "Stripe checkout session created");
        Ok(CheckoutSession {
            id: session.id,
            url,
            expires_at: session.expires_at,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let params = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];
        let session: SessionResponse = self
            .post_form("/v1/billing_portal/sessions", &params)
            .await?;

        let url = session.url.ok_or_else(|| {
            PaymentError::new(PaymentErrorCode::InvalidResponse, "Portal session has no URL")
        })?;

        Ok(PortalSession {
            id: session.id,
            url,
        })
    }
}
