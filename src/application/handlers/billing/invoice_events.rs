//! Invoice reconcilers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::{malformed_object, rejected_transition};
use crate::domain::billing::{
    InvoiceRecord, PlanResolver, StripeEvent, StripeEventType, StripeInvoice, SubscriptionStatus,
    WebhookError, WebhookEventHandler,
};
use crate::ports::{InvoiceRepository, SaveResult, SubscriptionRepository};

/// Appends a paid invoice to the billing history.
///
/// The invoice is stored even when no subscription record exists yet; it
/// then carries no user.
pub struct InvoicePaidHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    invoices: Arc<dyn InvoiceRepository>,
}

impl InvoicePaidHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        invoices: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self {
            subscriptions,
            invoices,
        }
    }
}

#[async_trait]
impl WebhookEventHandler for InvoicePaidHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::InvoicePaymentSucceeded]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let invoice: StripeInvoice = event.deserialize_object().map_err(malformed_object)?;

        let user_id = match invoice.subscription.as_deref() {
            Some(subscription_id) => {
                let record = self.subscriptions.find_by_provider_id(subscription_id).await?;
                if record.is_none() {
                    tracing::debug!(
                        invoice_id = %invoice.id,
                        subscription_id,
                        "Invoice for unknown subscription, storing without user"
                    );
                }
                record.and_then(|r| r.user_id)
            }
            None => None,
        };

        let record = InvoiceRecord::from_provider(&invoice, user_id, Utc::now());
        match self.invoices.insert(&record).await? {
            SaveResult::Inserted => tracing::info!(
                invoice_id = %invoice.id,
                amount_paid = invoice.amount_paid,
                "Invoice recorded"
            ),
            SaveResult::AlreadyExists => {
                tracing::debug!(invoice_id = %invoice.id, "Invoice already recorded")
            }
        }
        Ok(())
    }
}

/// Moves the subscription to `past_due` after a failed payment.
pub struct InvoiceFailedHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    resolver: Arc<PlanResolver>,
}

impl InvoiceFailedHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        resolver: Arc<PlanResolver>,
    ) -> Self {
        Self {
            subscriptions,
            resolver,
        }
    }
}

#[async_trait]
impl WebhookEventHandler for InvoiceFailedHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::InvoicePaymentFailed]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let invoice: StripeInvoice = event.deserialize_object().map_err(malformed_object)?;

        let Some(subscription_id) = invoice.subscription.as_deref() else {
            return Err(WebhookError::Ignored(format!(
                "invoice {} has no subscription",
                invoice.id
            )));
        };
        let Some(mut record) = self.subscriptions.find_by_provider_id(subscription_id).await? else {
            return Err(WebhookError::Ignored(format!(
                "no subscription record for {}",
                subscription_id
            )));
        };

        let changed = record
            .transition_status(SubscriptionStatus::PastDue, &self.resolver, Utc::now())
            .map_err(|e| rejected_transition(subscription_id, e))?;

        if changed {
            self.subscriptions.update(&record).await?;
            tracing::info!(
                subscription_id,
                invoice_id = %invoice.id,
                "Subscription marked past due"
            );
        }
        Ok(())
    }
}
