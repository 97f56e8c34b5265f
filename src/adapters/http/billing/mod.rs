//! HTTP adapter for billing endpoints.
//!
//! - `POST /webhooks/payments` - Receive payment provider events
//! - `GET /health` - Liveness
//! - `GET /api/subscription` - Current user's subscription
//! - `GET /api/subscription/permissions` - Current user's permissions
//! - `POST /api/admin/subscriptions/resync-plan-tiers` - Recompute plan tiers
//! - `POST /api/admin/webhook-events/prune` - Webhook audit retention

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{AuthenticatedUser, BillingApiError, BillingAppState};
pub use routes::billing_router;
