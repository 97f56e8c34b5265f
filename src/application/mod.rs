//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Webhook reconcilers write; subscription queries read.

pub mod handlers;

pub use handlers::billing::{
    BillingWebhookDispatcher, CreateCheckoutSessionCommand, CreateCheckoutSessionHandler,
    GetPermissionsHandler, GetSubscriptionHandler, GetSubscriptionQuery,
    GetSubscriptionStatusHandler, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
    OpenBillingPortalCommand, OpenBillingPortalHandler, PruneWebhookEventsCommand,
    PruneWebhookEventsHandler, ResyncPlanTiersHandler, SubscriptionStatusSummary,
    UserPermissions,
};
