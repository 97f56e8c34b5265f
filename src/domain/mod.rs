//! Domain layer - Pure business logic with no infrastructure dependencies.
//!
//! - `foundation` - Shared identifiers, errors, state machine, retry-poll
//! - `billing` - Subscriptions, plan tiers, payment webhooks

pub mod billing;
pub mod foundation;
