//! BillingProvider port - Access to the payment provider's API.
//!
//! The reconciler only reads from the provider: webhook payloads can be
//! partial, so the authoritative subscription is fetched when the price
//! matters. The user-facing endpoints create hosted checkout and billing
//! portal sessions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::StripeSubscription;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};

/// Subscription as returned by the provider API.
pub type ProviderSubscription = StripeSubscription;

/// Port for payment provider operations.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Fetch a subscription by provider ID. `None` if the provider has no
    /// such subscription.
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError>;

    /// Create a hosted checkout session for a new subscription.
    ///
    /// The session metadata carries `userId`, which is how later webhooks
    /// find their way back to the user.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Create a billing portal session for subscription management.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError>;
}

/// Request to create a checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Gateway subject of the paying user.
    pub user_id: UserId,

    /// Customer email for pre-fill.
    pub email: Option<String>,

    /// Recurring price to subscribe to.
    pub price_id: String,

    /// URL to redirect after successful checkout.
    pub success_url: String,

    /// URL to redirect after canceled checkout.
    pub cancel_url: String,
}

/// Checkout session for payment completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID.
    pub id: String,

    /// URL for customer to complete checkout.
    pub url: String,

    /// When the session expires (Unix timestamp).
    pub expires_at: Option<i64>,
}

/// Portal session for subscription management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSession {
    /// Provider's session ID.
    pub id: String,

    /// URL for customer to access portal.
    pub url: String,
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    pub code: PaymentErrorCode,

    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::AuthenticationError, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let mut domain = DomainError::new(ErrorCode::ExternalServiceError, err.message)
            .with_detail("payment_error", err.code.to_string());
        if let Some(provider_code) = err.provider_code {
            domain = domain.with_detail("provider_code", provider_code);
        }
        domain
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    NetworkError,
    AuthenticationError,
    RateLimited,
    InvalidResponse,
    ProviderError,
}

impl PaymentErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::RateLimited
                | PaymentErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::RateLimited => "rate_limited",
            PaymentErrorCode::InvalidResponse => "invalid_response",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}
