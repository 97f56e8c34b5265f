//! Hosted provider sessions: checkout for new subscriptions, billing portal
//! for existing ones.

use std::sync::Arc;

use crate::domain::billing::{BillingSnapshot, PlanResolver, SubscriptionStatus};
use crate::domain::foundation::{DomainError, ErrorCode, UserId, ValidationError};
use crate::ports::{
    BillingProvider, CheckoutSession, CreateCheckoutRequest, PaymentError, PortalSession,
    SubscriptionRepository,
};

/// Placeholder Stripe substitutes with the real session id on redirect.
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionCommand {
    pub user_id: UserId,
    pub email: Option<String>,
    pub price_id: String,
}

/// Starts a hosted checkout for the calling user.
pub struct CreateCheckoutSessionHandler {
    provider: Arc<dyn BillingProvider>,
    resolver: Arc<PlanResolver>,
    frontend_url: String,
}

impl CreateCheckoutSessionHandler {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        resolver: Arc<PlanResolver>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            resolver,
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutSessionCommand,
    ) -> Result<CheckoutSession, DomainError> {
        let price_id = cmd.price_id.trim();
        if price_id.is_empty() {
            return Err(ValidationError::empty_field("price_id").into());
        }
        if !price_id.starts_with("price_") {
            return Err(ValidationError::invalid_format("price_id", "expected a price_ id").into());
        }

        let expected_tier = self.resolver.resolve(&BillingSnapshot::new(
            SubscriptionStatus::Active,
            Some(price_id.to_string()),
            None,
        ));
        tracing::info!(
            user_id = %cmd.user_id,
            price_id,
            expected_tier = %expected_tier,
            "Creating checkout session"
        );

        let request = CreateCheckoutRequest {
            user_id: cmd.user_id,
            email: cmd.email,
            price_id: price_id.to_string(),
            success_url: format!(
                "{}/success?session_id={}",
                self.frontend_url, SESSION_ID_PLACEHOLDER
            ),
            cancel_url: format!("{}/cancel", self.frontend_url),
        };

        self.provider
            .create_checkout_session(request)
            .await
            .map_err(provider_failure)
    }
}

#[derive(Debug, Clone)]
pub struct OpenBillingPortalCommand {
    pub user_id: UserId,
}

/// Opens the provider's billing portal for the user's customer account.
pub struct OpenBillingPortalHandler {
    repository: Arc<dyn SubscriptionRepository>,
    provider: Arc<dyn BillingProvider>,
    return_url: String,
}

impl OpenBillingPortalHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        provider: Arc<dyn BillingProvider>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            provider,
            return_url: return_url.into(),
        }
    }

    pub async fn handle(
        &self,
        cmd: OpenBillingPortalCommand,
    ) -> Result<PortalSession, DomainError> {
        let customer_id = self
            .repository
            .find_by_user(&cmd.user_id)
            .await?
            .and_then(|record| record.customer_id)
            .ok_or_else(|| {
                DomainError::new(ErrorCode::NotFound, "No billing account for this user")
            })?;

        self.provider
            .create_portal_session(&customer_id, &self.return_url)
            .await
            .map_err(provider_failure)
    }
}

fn provider_failure(err: PaymentError) -> DomainError {
    tracing::error!(
        error = %err,
        retryable = err.is_retryable(),
        "Payment provider request failed"
    );
    err.into()
}
