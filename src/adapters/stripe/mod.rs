//! Stripe adapter.
//!
//! - [`StripeBillingClient`]: `BillingProvider` over the Stripe REST API
//! - [`MockBillingProvider`]: in-process provider for tests and local runs
//!
//! Webhook signature verification lives in the domain
//! (`domain::billing::StripeWebhookVerifier`) since it is pure computation.

mod mock_billing_provider;
mod stripe_adapter;

pub use mock_billing_provider::MockBillingProvider;
pub use stripe_adapter::{StripeBillingClient, StripeConfig};
