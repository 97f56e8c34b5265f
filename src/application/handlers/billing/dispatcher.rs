//! Routes verified events to the billing reconcilers.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    CheckoutCompletedHandler, InvoiceFailedHandler, InvoicePaidHandler,
    SubscriptionDeletedHandler, SubscriptionSyncHandler,
};
use crate::domain::billing::{
    PlanResolver, StripeEventType, WebhookDispatcher, WebhookEventHandler,
};
use crate::domain::foundation::RetryPolicy;
use crate::ports::{BillingProvider, InvoiceRepository, SubscriptionRepository};

/// Event-type keyed handler registry. A later registration for the same
/// type replaces the earlier one.
#[derive(Default)]
pub struct BillingWebhookDispatcher {
    handlers: HashMap<StripeEventType, Arc<dyn WebhookEventHandler>>,
}

impl BillingWebhookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every type it reports in `handles()`.
    pub fn register(mut self, handler: Arc<dyn WebhookEventHandler>) -> Self {
        for event_type in handler.handles() {
            self.handlers.insert(event_type, Arc::clone(&handler));
        }
        self
    }

    /// Dispatcher with every reconciler wired to the given ports.
    pub fn with_reconcilers(
        subscriptions: Arc<dyn SubscriptionRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        provider: Arc<dyn BillingProvider>,
        resolver: Arc<PlanResolver>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self::new()
            .register(Arc::new(SubscriptionSyncHandler::new(
                subscriptions.clone(),
                resolver.clone(),
            )))
            .register(Arc::new(SubscriptionDeletedHandler::new(
                subscriptions.clone(),
                resolver.clone(),
            )))
            .register(Arc::new(CheckoutCompletedHandler::new(
                subscriptions.clone(),
                provider,
                resolver.clone(),
                retry_policy,
            )))
            .register(Arc::new(InvoicePaidHandler::new(subscriptions.clone(), invoices)))
            .register(Arc::new(InvoiceFailedHandler::new(subscriptions, resolver)))
    }

    pub fn handled_types(&self) -> Vec<StripeEventType> {
        self.handlers.keys().copied().collect()
    }
}

impl WebhookDispatcher for BillingWebhookDispatcher {
    fn get_handler(&self, event_type: &StripeEventType) -> Option<&dyn WebhookEventHandler> {
        self.handlers.get(event_type).map(|h| h.as_ref())
    }
}
