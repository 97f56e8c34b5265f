//! Checkout completion reconciler.
//!
//! `checkout.session.completed` can be delivered before the
//! `customer.subscription.created` that creates the record it refers to.
//! The record is polled for with a bounded [`RetryPolicy`]; if it never
//! shows up the event is acknowledged and the later subscription event
//! creates the record on its own.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::{malformed_object, rejected_transition};
use crate::domain::billing::{
    PlanResolver, PriceDetails, StripeCheckoutSession, StripeEvent, StripeEventType, WebhookError,
    WebhookEventHandler,
};
use crate::domain::foundation::{poll_until_found, RetryPolicy};
use crate::ports::{BillingProvider, SubscriptionRepository};

pub struct CheckoutCompletedHandler {
    repository: Arc<dyn SubscriptionRepository>,
    provider: Arc<dyn BillingProvider>,
    resolver: Arc<PlanResolver>,
    retry_policy: RetryPolicy,
}

impl CheckoutCompletedHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        provider: Arc<dyn BillingProvider>,
        resolver: Arc<PlanResolver>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            repository,
            provider,
            resolver,
            retry_policy,
        }
    }

    /// Authoritative price from the provider, or `None` to keep the stored one.
    async fn provider_price(&self, subscription_id: &str) -> Option<PriceDetails> {
        match self.provider.retrieve_subscription(subscription_id).await {
            Ok(Some(subscription)) => Some(subscription.price_details()),
            Ok(None) => {
                tracing::warn!(
                    subscription_id,
                    "Subscription unknown to provider, using stored price"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    subscription_id,
                    error = %e,
                    "Provider lookup failed, using stored price"
                );
                None
            }
        }
    }
}

#[async_trait]
impl WebhookEventHandler for CheckoutCompletedHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::CheckoutSessionCompleted]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let session: StripeCheckoutSession =
            event.deserialize_object().map_err(malformed_object)?;

        let Some(subscription_id) = session.subscription.as_deref() else {
            return Err(WebhookError::Ignored(format!(
                "checkout session {} has no subscription",
                session.id
            )));
        };
        if !session.is_paid() {
            return Err(WebhookError::Ignored(format!(
                "checkout session {} is not paid",
                session.id
            )));
        }

        let repository = &self.repository;
        let found = poll_until_found(&self.retry_policy, move || {
            repository.find_by_provider_id(subscription_id)
        })
        .await?;

        let Some(mut record) = found else {
            tracing::warn!(
                subscription_id,
                session_id = %session.id,
                event_id = %event.id,
                attempts = self.retry_policy.max_attempts,
                "Subscription record never appeared for completed checkout"
            );
            return Err(WebhookError::LookupExhausted {
                subscription_id: subscription_id.to_string(),
                attempts: self.retry_policy.max_attempts,
            });
        };

        let price = self.provider_price(subscription_id).await;
        let changed = record
            .activate_from_checkout(&session, price, &self.resolver, Utc::now())
            .map_err(|e| rejected_transition(subscription_id, e))?;

        if changed {
            self.repository.update(&record).await?;
            tracing::info!(
                subscription_id,
                session_id = %session.id,
                plan_tier = %record.plan_tier,
                "Subscription activated from checkout"
            );
        }
        Ok(())
    }
}
