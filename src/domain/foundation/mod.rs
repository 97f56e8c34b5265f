//! Foundation module - Shared domain primitives.
//!
//! Identifiers, error vocabulary, the state machine contract and the
//! bounded retry-poll used across the billing domain.

mod errors;
mod ids;
mod retry;
mod state_machine;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{SubscriptionId, UserId};
pub use retry::{poll_until_found, RetryPolicy};
pub use state_machine::StateMachine;
