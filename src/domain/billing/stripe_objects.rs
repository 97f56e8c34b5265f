//! Stripe API objects as they arrive in webhook payloads and API responses.
//!
//! Fields are lenient: anything the reconciler can live without is optional,
//! so a provider-side addition or omission does not turn into a 400.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{BillingSnapshot, SubscriptionStatus};
use crate::domain::foundation::UserId;

/// Metadata key the checkout flow uses to carry the identity-provider subject.
pub const USER_ID_METADATA_KEY: &str = "userId";

/// Converts a Unix timestamp to UTC.
pub fn from_unix(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}

fn user_id_from_metadata(metadata: &HashMap<String, String>) -> Option<UserId> {
    metadata
        .get(USER_ID_METADATA_KEY)
        .or_else(|| metadata.get("user_id"))
        .and_then(|raw| UserId::new(raw.as_str()).ok())
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscription
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    #[serde(default)]
    pub customer: Option<String>,

    pub status: String,

    #[serde(default)]
    pub current_period_start: Option<i64>,

    #[serde(default)]
    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    #[serde(default)]
    pub canceled_at: Option<i64>,

    #[serde(default)]
    pub ended_at: Option<i64>,

    #[serde(default)]
    pub start_date: Option<i64>,

    #[serde(default)]
    pub cancellation_details: Option<StripeCancellationDetails>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    #[serde(default)]
    pub items: StripeSubscriptionItems,

    /// Legacy single-plan field, still sent on older API versions.
    #[serde(default)]
    pub plan: Option<StripePlan>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeCancellationDetails {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Subscription items container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeSubscriptionItems {
    #[serde(default)]
    pub data: Vec<StripeSubscriptionItem>,
}

/// Single subscription item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscriptionItem {
    #[serde(default)]
    pub id: Option<String>,
    pub price: StripePrice,
}

/// Stripe Price object (embedded in subscription items).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePrice {
    pub id: String,

    #[serde(default)]
    pub product: Option<String>,

    /// Unit amount in minor units.
    #[serde(default)]
    pub unit_amount: Option<i64>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub recurring: Option<StripePriceRecurring>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePriceRecurring {
    /// Billing interval (day, week, month, year).
    pub interval: String,
}

/// Legacy plan object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePlan {
    pub id: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
}

/// Price attributes extracted from either the items list or the legacy plan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PriceDetails {
    pub price_id: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub interval: Option<String>,
}

impl StripeSubscription {
    pub fn subscription_status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_provider_str(&self.status)
    }

    /// Price of the first item, falling back to the legacy `plan`.
    pub fn price_details(&self) -> PriceDetails {
        if let Some(item) = self.items.data.first() {
            return PriceDetails {
                price_id: Some(item.price.id.clone()),
                amount: item.price.unit_amount,
                currency: item.price.currency.clone(),
                interval: item.price.recurring.as_ref().map(|r| r.interval.clone()),
            };
        }

        match &self.plan {
            Some(plan) => PriceDetails {
                price_id: Some(plan.id.clone()),
                amount: plan.amount,
                currency: plan.currency.clone(),
                interval: plan.interval.clone(),
            },
            None => PriceDetails::default(),
        }
    }

    pub fn billing_snapshot(&self) -> BillingSnapshot {
        let price = self.price_details();
        BillingSnapshot::new(self.subscription_status(), price.price_id, price.amount)
    }

    pub fn user_id(&self) -> Option<UserId> {
        user_id_from_metadata(&self.metadata)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout Session
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    #[serde(default)]
    pub customer: Option<String>,

    /// Subscription ID if checkout created a subscription.
    #[serde(default)]
    pub subscription: Option<String>,

    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    pub fn user_id(&self) -> Option<UserId> {
        user_id_from_metadata(&self.metadata)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Invoice
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    #[serde(default)]
    pub subscription: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub amount_paid: i64,

    #[serde(default)]
    pub amount_due: i64,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub created: Option<i64>,
}
