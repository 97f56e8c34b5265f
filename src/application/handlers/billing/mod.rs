//! Billing handlers.
//!
//! ## Commands
//! - Receiving payment webhooks (verify, audit, reconcile)
//! - Resyncing stored plan tiers
//! - Pruning the webhook audit log
//! - Creating checkout and billing portal sessions
//!
//! ## Reconcilers
//! One [`WebhookEventHandler`](crate::domain::billing::WebhookEventHandler)
//! per concern, routed by [`BillingWebhookDispatcher`].
//!
//! ## Queries
//! - Current subscription of a user
//! - Permissions granted to a user
//! - Whether a user has an active subscription

mod billing_sessions;
mod checkout_completed;
mod dispatcher;
mod get_subscription;
mod handle_payment_webhook;
mod invoice_events;
mod prune_webhook_events;
mod resync_plan_tiers;
mod subscription_sync;

#[cfg(test)]
mod test_support;

use crate::domain::billing::WebhookError;
use crate::domain::foundation::ValidationError;

// Commands
pub use billing_sessions::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, OpenBillingPortalCommand,
    OpenBillingPortalHandler,
};
pub use handle_payment_webhook::{HandlePaymentWebhookCommand, HandlePaymentWebhookHandler};
pub use prune_webhook_events::{
    PruneWebhookEventsCommand, PruneWebhookEventsHandler, PruneWebhookEventsResult,
};
pub use resync_plan_tiers::{PlanTierChange, ResyncPlanTiersHandler, ResyncPlanTiersResult};

// Reconcilers
pub use checkout_completed::CheckoutCompletedHandler;
pub use dispatcher::BillingWebhookDispatcher;
pub use invoice_events::{InvoiceFailedHandler, InvoicePaidHandler};
pub use subscription_sync::{SubscriptionDeletedHandler, SubscriptionSyncHandler};

// Queries
pub use get_subscription::{
    GetPermissionsHandler, GetSubscriptionHandler, GetSubscriptionQuery,
    GetSubscriptionStatusHandler, SubscriptionStatusSummary, UserPermissions,
};

/// An event asked for a status change the state machine refuses.
///
/// Acknowledged rather than failed: redelivery would be refused the same way.
fn rejected_transition(provider_subscription_id: &str, err: ValidationError) -> WebhookError {
    tracing::warn!(
        subscription_id = provider_subscription_id,
        error = %err,
        "Refusing subscription status transition"
    );
    WebhookError::Ignored(format!(
        "subscription {}: {}",
        provider_subscription_id, err
    ))
}

fn malformed_object(err: serde_json::Error) -> WebhookError {
    WebhookError::MalformedPayload(format!("event object: {}", err))
}
