//! Subscription aggregate.
//!
//! One record per provider subscription id. Every mutation goes through the
//! status state machine and ends by re-deriving `plan_tier`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stripe_objects::{from_unix, PriceDetails, StripeCheckoutSession, StripeSubscription};
use super::{BillingSnapshot, PlanPermissions, PlanResolver, PlanTier, SubscriptionStatus};
use crate::domain::foundation::{StateMachine, SubscriptionId, UserId, ValidationError};

/// Local mirror of a provider subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: SubscriptionId,
    pub provider_subscription_id: String,
    /// Absent until the checkout metadata has been reconciled.
    pub user_id: Option<UserId>,
    pub customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub plan_tier: PlanTier,
    pub price_id: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub interval: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancellation_comment: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Builds a new record from a provider subscription (insert path).
    pub fn from_provider(
        subscription: &StripeSubscription,
        resolver: &PlanResolver,
        now: DateTime<Utc>,
    ) -> Self {
        let price = subscription.price_details();
        let status = subscription.subscription_status();
        let plan_tier = resolver.resolve(&BillingSnapshot::new(
            status,
            price.price_id.clone(),
            price.amount,
        ));
        let cancellation = subscription.cancellation_details.clone().unwrap_or_default();

        Self {
            id: SubscriptionId::new(),
            provider_subscription_id: subscription.id.clone(),
            user_id: subscription.user_id(),
            customer_id: subscription.customer.clone(),
            status,
            plan_tier,
            price_id: price.price_id,
            amount: price.amount,
            currency: price.currency,
            interval: price.interval,
            current_period_start: subscription.current_period_start.and_then(from_unix),
            current_period_end: subscription.current_period_end.and_then(from_unix),
            cancel_at_period_end: subscription.cancel_at_period_end,
            canceled_at: subscription.canceled_at.and_then(from_unix),
            cancellation_reason: cancellation.reason,
            cancellation_comment: cancellation.comment,
            started_at: subscription.start_date.and_then(from_unix),
            ended_at: subscription.ended_at.and_then(from_unix),
            metadata: subscription.metadata.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Patches the record from a newer provider payload.
    ///
    /// The existing `user_id` is kept when the payload carries none. Returns
    /// whether anything changed; `updated_at` only moves when it did.
    pub fn apply_provider_update(
        &mut self,
        subscription: &StripeSubscription,
        resolver: &PlanResolver,
        now: DateTime<Utc>,
    ) -> Result<bool, ValidationError> {
        let status = self.status.transition_to(subscription.subscription_status())?;
        let before = self.clone();

        let price = subscription.price_details();
        let cancellation = subscription.cancellation_details.clone().unwrap_or_default();

        self.status = status;
        self.apply_price(price);
        self.current_period_start = subscription.current_period_start.and_then(from_unix);
        self.current_period_end = subscription.current_period_end.and_then(from_unix);
        self.cancel_at_period_end = subscription.cancel_at_period_end;
        self.canceled_at = subscription.canceled_at.and_then(from_unix);
        self.cancellation_reason = cancellation.reason;
        self.cancellation_comment = cancellation.comment;
        self.ended_at = subscription.ended_at.and_then(from_unix);
        if let Some(started) = subscription.start_date.and_then(from_unix) {
            self.started_at = Some(started);
        }
        if subscription.customer.is_some() {
            self.customer_id = subscription.customer.clone();
        }
        if let Some(user_id) = subscription.user_id() {
            self.user_id = Some(user_id);
        }
        if !subscription.metadata.is_empty() {
            self.metadata = subscription.metadata.clone();
        }

        self.refresh_plan_tier(resolver);
        Ok(self.touch_if_changed(&before, now))
    }

    /// Records the provider's final status for a deleted subscription.
    pub fn close_from_provider(
        &mut self,
        subscription: &StripeSubscription,
        resolver: &PlanResolver,
        now: DateTime<Utc>,
    ) -> Result<bool, ValidationError> {
        let status = self.status.transition_to(subscription.subscription_status())?;
        let before = self.clone();

        self.status = status;
        if let Some(ended) = subscription.ended_at.and_then(from_unix) {
            self.ended_at = Some(ended);
        }
        if let Some(canceled) = subscription.canceled_at.and_then(from_unix) {
            self.canceled_at = Some(canceled);
        }

        self.refresh_plan_tier(resolver);
        Ok(self.touch_if_changed(&before, now))
    }

    /// Moves to `target` if the state machine allows it.
    pub fn transition_status(
        &mut self,
        target: SubscriptionStatus,
        resolver: &PlanResolver,
        now: DateTime<Utc>,
    ) -> Result<bool, ValidationError> {
        let status = self.status.transition_to(target)?;
        let before = self.clone();

        self.status = status;
        self.refresh_plan_tier(resolver);
        Ok(self.touch_if_changed(&before, now))
    }

    /// Marks the subscription active after a paid checkout.
    ///
    /// `provider_price` is the authoritative price fetched from the provider;
    /// when it is `None` the stored price is used to derive the tier.
    pub fn activate_from_checkout(
        &mut self,
        session: &StripeCheckoutSession,
        provider_price: Option<PriceDetails>,
        resolver: &PlanResolver,
        now: DateTime<Utc>,
    ) -> Result<bool, ValidationError> {
        let status = self.status.transition_to(SubscriptionStatus::Active)?;
        let before = self.clone();

        self.status = status;
        if let Some(price) = provider_price {
            self.apply_price(price);
        }
        if !session.metadata.is_empty() {
            self.metadata = session.metadata.clone();
        }
        if let Some(user_id) = session.user_id() {
            self.user_id = Some(user_id);
        }
        if self.customer_id.is_none() {
            self.customer_id = session.customer.clone();
        }

        self.refresh_plan_tier(resolver);
        Ok(self.touch_if_changed(&before, now))
    }

    /// Re-derives `plan_tier` from the stored billing attributes.
    ///
    /// Returns the previous tier when it was wrong.
    pub fn refresh_plan_tier(&mut self, resolver: &PlanResolver) -> Option<PlanTier> {
        let resolved = resolver.resolve(&self.billing_snapshot());
        if resolved == self.plan_tier {
            return None;
        }
        let previous = self.plan_tier;
        self.plan_tier = resolved;
        Some(previous)
    }

    pub fn billing_snapshot(&self) -> BillingSnapshot {
        BillingSnapshot::new(self.status, self.price_id.clone(), self.amount)
    }

    /// Permissions currently granted by this subscription.
    pub fn permissions(&self) -> PlanPermissions {
        if self.status.is_active() {
            PlanPermissions::for_tier(self.plan_tier)
        } else {
            PlanPermissions::for_tier(PlanTier::Free)
        }
    }

    fn apply_price(&mut self, price: PriceDetails) {
        if price.price_id.is_some() {
            self.price_id = price.price_id;
        }
        if price.amount.is_some() {
            self.amount = price.amount;
        }
        if price.currency.is_some() {
            self.currency = price.currency;
        }
        if price.interval.is_some() {
            self.interval = price.interval;
        }
    }

    fn touch_if_changed(&mut self, before: &Self, now: DateTime<Utc>) -> bool {
        let changed = self != before;
        if changed {
            self.updated_at = now;
        }
        changed
    }
}
