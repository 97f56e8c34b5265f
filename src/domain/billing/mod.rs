//! Billing domain - Subscriptions, plan tiers and payment webhooks.
//!
//! # Plan Tiers
//!
//! | Tier  | Granted when                                   |
//! |-------|------------------------------------------------|
//! | Free  | No subscription, or subscription not `active`  |
//! | Basic | Active, resolved to basic by the price         |
//! | Pro   | Active, resolved to pro by the price           |
//!
//! The tier is derived by [`PlanResolver`] and re-derived on every change.
//!
//! # Webhooks
//!
//! [`StripeWebhookVerifier`] authenticates deliveries, [`WebhookProcessor`]
//! audits and dispatches them to [`WebhookEventHandler`]s.

mod invoice;
mod plan_permissions;
mod plan_resolver;
mod plan_tier;
mod status;
mod stripe_event;
mod stripe_objects;
mod subscription;
mod webhook_errors;
mod webhook_processor;
mod webhook_verifier;

pub use invoice::InvoiceRecord;
pub use plan_permissions::{AiModelAccess, PlanPermissions};
pub use plan_resolver::{
    resolve_plan_tier, BillingSnapshot, PlanResolver, PriceTierTable, PRO_AMOUNT_THRESHOLD,
};
pub use plan_tier::PlanTier;
pub use status::SubscriptionStatus;
pub use stripe_event::{StripeEvent, StripeEventData, StripeEventType};
pub use stripe_objects::{
    from_unix, PriceDetails, StripeCancellationDetails, StripeCheckoutSession, StripeInvoice,
    StripePlan, StripePrice, StripePriceRecurring, StripeSubscription, StripeSubscriptionItem,
    StripeSubscriptionItems, USER_ID_METADATA_KEY,
};
pub use subscription::SubscriptionRecord;
pub use webhook_errors::WebhookError;
pub use webhook_processor::{
    WebhookDispatcher, WebhookEventHandler, WebhookProcessor, WebhookReceipt,
};
pub use webhook_verifier::{SignatureHeader, StripeWebhookVerifier, DEFAULT_TOLERANCE_SECS};

#[cfg(test)]
pub use stripe_event::StripeEventBuilder;
#[cfg(test)]
pub use webhook_verifier::compute_test_signature;
