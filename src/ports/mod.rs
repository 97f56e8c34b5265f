//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SubscriptionRepository` - Local mirror of provider subscriptions
//! - `InvoiceRepository` - Billing history
//! - `WebhookEventRepository` - Webhook audit log
//!
//! ## External Service Ports
//!
//! - `BillingProvider` - Payment provider lookups, checkout and portal sessions

mod billing_provider;
mod invoice_repository;
mod subscription_repository;
mod webhook_event_repository;

pub use billing_provider::{
    BillingProvider, CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentErrorCode,
    PortalSession, ProviderSubscription,
};
pub use invoice_repository::InvoiceRepository;
pub use subscription_repository::SubscriptionRepository;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};
