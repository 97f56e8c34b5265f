//! Payment configuration

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::billing::{PriceTierTable, DEFAULT_TOLERANCE_SECS};
use crate::domain::foundation::RetryPolicy;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key
    #[serde(default)]
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    #[serde(default)]
    pub stripe_webhook_secret: String,

    /// Stripe API base URL (override for stripe-mock)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Web app base URL; checkout and portal redirects return here
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Price-to-tier table, `price_id=tier` pairs separated by commas
    #[serde(default)]
    pub price_tiers: String,

    /// Lookups made while waiting for a subscription after checkout
    #[serde(default = "default_checkout_poll_attempts")]
    pub checkout_poll_attempts: u32,

    /// Delay between those lookups, in milliseconds
    #[serde(default = "default_checkout_poll_delay_ms")]
    pub checkout_poll_delay_ms: u64,

    /// Maximum age of a signed webhook timestamp, in seconds
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    pub fn api_key(&self) -> SecretString {
        SecretString::new(self.stripe_api_key.clone())
    }

    pub fn webhook_secret(&self) -> SecretString {
        SecretString::new(self.stripe_webhook_secret.clone())
    }

    /// Parsed price table.
    pub fn price_tier_table(&self) -> Result<PriceTierTable, ValidationError> {
        PriceTierTable::parse(&self.price_tiers)
            .map_err(|e| ValidationError::InvalidPriceTiers(e.to_string()))
    }

    /// Poll used by the checkout reconciler.
    pub fn checkout_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.checkout_poll_attempts,
            Duration::from_millis(self.checkout_poll_delay_ms),
        )
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_WEBHOOK_SECRET"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") && !self.stripe_api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if !self.api_base_url.starts_with("https://") && !self.api_base_url.starts_with("http://") {
            return Err(ValidationError::InvalidApiBaseUrl);
        }
        if !self.frontend_url.starts_with("https://") && !self.frontend_url.starts_with("http://") {
            return Err(ValidationError::InvalidFrontendUrl);
        }
        if self.checkout_poll_attempts == 0 {
            return Err(ValidationError::InvalidPollAttempts);
        }
        if self.signature_tolerance_secs <= 0 {
            return Err(ValidationError::InvalidSignatureTolerance);
        }
        self.price_tier_table()?;

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            api_base_url: default_api_base_url(),
            frontend_url: default_frontend_url(),
            price_tiers: String::new(),
            checkout_poll_attempts: default_checkout_poll_attempts(),
            checkout_poll_delay_ms: default_checkout_poll_delay_ms(),
            signature_tolerance_secs: default_signature_tolerance(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_checkout_poll_attempts() -> u32 {
    5
}

fn default_checkout_poll_delay_ms() -> u64 {
    1000
}

fn default_signature_tolerance() -> i64 {
    DEFAULT_TOLERANCE_SECS
}
