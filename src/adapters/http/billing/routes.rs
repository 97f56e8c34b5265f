//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    create_checkout_session, get_permissions, get_subscription, get_subscription_status,
    handle_payment_webhook, health, open_billing_portal, prune_webhook_events, resync_plan_tiers,
    BillingAppState,
};

/// User endpoints, identified by the gateway's `X-User-Id` header.
///
/// - `GET /` - Current subscription
/// - `GET /permissions` - Current permissions
/// - `GET /status` - `{has_active_subscription}`
pub fn subscription_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/", get(get_subscription))
        .route("/permissions", get(get_permissions))
        .route("/status", get(get_subscription_status))
}

/// Hosted provider sessions for the signed-in user.
///
/// - `POST /api/checkout-sessions` - Start a checkout for `{price_id}`
/// - `POST /api/billing-portal` - Open the billing portal
pub fn session_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/api/checkout-sessions", post(create_checkout_session))
        .route("/api/billing-portal", post(open_billing_portal))
}

/// Admin endpoints, guarded by `X-Admin-Token`.
///
/// - `POST /subscriptions/resync-plan-tiers`
/// - `POST /webhook-events/prune`
pub fn admin_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/subscriptions/resync-plan-tiers", post(resync_plan_tiers))
        .route("/webhook-events/prune", post(prune_webhook_events))
}

/// Webhook endpoints. No user auth, the signature is verified instead.
///
/// - `POST /payments`
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/payments", post(handle_payment_webhook))
}

/// Complete billing router.
///
/// ```ignore
/// let app = billing_router().with_state(state);
/// ```
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/webhooks", webhook_routes())
        .nest("/api/subscription", subscription_routes())
        .merge(session_routes())
        .nest("/api/admin", admin_routes())
}
