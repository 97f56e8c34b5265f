//! HTTP DTOs (Data Transfer Objects) for billing endpoints.
//!
//! These types define the JSON request/response structure for the billing API.

use serde::{Deserialize, Serialize};

use crate::application::{SubscriptionStatusSummary, UserPermissions};
use crate::domain::billing::{
    PlanPermissions, PlanTier, SubscriptionRecord, SubscriptionStatus, WebhookReceipt,
};
use crate::ports::{CheckoutSession, PortalSession};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to prune the webhook audit log.
#[derive(Debug, Clone, Deserialize)]
pub struct PruneWebhookEventsRequest {
    #[serde(default = "default_retention_days")]
    pub older_than_days: i64,
}

fn default_retention_days() -> i64 {
    30
}

/// Request to start a hosted checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckoutSessionRequest {
    pub price_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Acknowledgment returned to the payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    /// The event had been delivered before.
    pub duplicate: bool,
}

impl From<WebhookReceipt> for WebhookAckResponse {
    fn from(receipt: WebhookReceipt) -> Self {
        Self {
            received: true,
            duplicate: receipt.duplicate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Response for the current user's subscription.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    /// `null` when the user never subscribed.
    pub subscription: Option<SubscriptionView>,
}

/// Subscription details exposed to the user.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub subscription_id: String,
    pub status: SubscriptionStatus,
    pub plan_tier: PlanTier,
    pub price_id: Option<String>,
    /// Price in minor currency units.
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub interval: Option<String>,
    /// End of current billing period (RFC 3339).
    pub current_period_end: Option<String>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<String>,
}

impl From<SubscriptionRecord> for SubscriptionView {
    fn from(record: SubscriptionRecord) -> Self {
        Self {
            subscription_id: record.provider_subscription_id,
            status: record.status,
            plan_tier: record.plan_tier,
            price_id: record.price_id,
            amount: record.amount,
            currency: record.currency,
            interval: record.interval,
            current_period_end: record.current_period_end.map(|t| t.to_rfc3339()),
            cancel_at_period_end: record.cancel_at_period_end,
            canceled_at: record.canceled_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response for the current user's permissions.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionsResponse {
    pub plan_tier: PlanTier,
    pub status: Option<SubscriptionStatus>,
    pub permissions: PlanPermissions,
}

impl From<UserPermissions> for PermissionsResponse {
    fn from(result: UserPermissions) -> Self {
        Self {
            plan_tier: result.plan_tier,
            status: result.status,
            permissions: result.permissions,
        }
    }
}

/// Response for `GET /api/subscription/status`.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatusResponse {
    pub has_active_subscription: bool,
}

impl From<SubscriptionStatusSummary> for SubscriptionStatusResponse {
    fn from(summary: SubscriptionStatusSummary) -> Self {
        Self {
            has_active_subscription: summary.has_active_subscription,
        }
    }
}

/// Hosted checkout the client redirects to.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub url: String,
    pub expires_at: Option<i64>,
}

impl From<CheckoutSession> for CheckoutSessionResponse {
    fn from(session: CheckoutSession) -> Self {
        Self {
            session_id: session.id,
            url: session.url,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortalSessionResponse {
    pub url: String,
}

impl From<PortalSession> for PortalSessionResponse {
    fn from(session: PortalSession) -> Self {
        Self { url: session.url }
    }
}

/// Error envelope: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
