//! Subscription lifecycle reconcilers.
//!
//! `customer.subscription.created` and `.updated` share one upsert path keyed
//! on the provider subscription id; `.deleted` closes the record in place.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{malformed_object, rejected_transition};
use crate::domain::billing::{
    PlanResolver, StripeEvent, StripeEventType, StripeSubscription, SubscriptionRecord,
    WebhookError, WebhookEventHandler,
};
use crate::ports::{SaveResult, SubscriptionRepository};

/// Upserts the local record from a subscription payload.
pub struct SubscriptionSyncHandler {
    repository: Arc<dyn SubscriptionRepository>,
    resolver: Arc<PlanResolver>,
}

impl SubscriptionSyncHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>, resolver: Arc<PlanResolver>) -> Self {
        Self {
            repository,
            resolver,
        }
    }

    /// Insert-or-patch keyed on `subscription.id`.
    pub async fn sync(&self, subscription: &StripeSubscription) -> Result<(), WebhookError> {
        let now = Utc::now();

        if let Some(existing) = self.repository.find_by_provider_id(&subscription.id).await? {
            return self.patch(existing, subscription, now).await;
        }

        let record = SubscriptionRecord::from_provider(subscription, &self.resolver, now);
        match self.repository.insert(&record).await? {
            SaveResult::Inserted => {
                tracing::info!(
                    subscription_id = %subscription.id,
                    status = %record.status,
                    plan_tier = %record.plan_tier,
                    "Subscription record created"
                );
                Ok(())
            }
            SaveResult::AlreadyExists => {
                // A concurrent delivery inserted between our read and write.
                let existing = self
                    .repository
                    .find_by_provider_id(&subscription.id)
                    .await?
                    .ok_or_else(|| {
                        WebhookError::Store(format!(
                            "subscription {} reported as existing but not found",
                            subscription.id
                        ))
                    })?;
                self.patch(existing, subscription, now).await
            }
        }
    }

    async fn patch(
        &self,
        mut record: SubscriptionRecord,
        subscription: &StripeSubscription,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let previous_tier = record.plan_tier;
        let changed = record
            .apply_provider_update(subscription, &self.resolver, now)
            .map_err(|e| rejected_transition(&subscription.id, e))?;

        if !changed {
            tracing::debug!(subscription_id = %subscription.id, "Subscription already up to date");
            return Ok(());
        }

        self.repository.update(&record).await?;
        tracing::info!(
            subscription_id = %subscription.id,
            status = %record.status,
            previous_tier = %previous_tier,
            plan_tier = %record.plan_tier,
            "Subscription record updated"
        );
        Ok(())
    }
}

#[async_trait]
impl WebhookEventHandler for SubscriptionSyncHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![
            StripeEventType::CustomerSubscriptionCreated,
            StripeEventType::CustomerSubscriptionUpdated,
        ]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let subscription: StripeSubscription =
            event.deserialize_object().map_err(malformed_object)?;
        self.sync(&subscription).await
    }
}

/// Records the provider's terminal status. The row is kept.
pub struct SubscriptionDeletedHandler {
    repository: Arc<dyn SubscriptionRepository>,
    resolver: Arc<PlanResolver>,
}

impl SubscriptionDeletedHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>, resolver: Arc<PlanResolver>) -> Self {
        Self {
            repository,
            resolver,
        }
    }
}

#[async_trait]
impl WebhookEventHandler for SubscriptionDeletedHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::CustomerSubscriptionDeleted]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let subscription: StripeSubscription =
            event.deserialize_object().map_err(malformed_object)?;

        let Some(mut record) = self.repository.find_by_provider_id(&subscription.id).await? else {
            return Err(WebhookError::Ignored(format!(
                "no subscription record for {}",
                subscription.id
            )));
        };

        let changed = record
            .close_from_provider(&subscription, &self.resolver, Utc::now())
            .map_err(|e| rejected_transition(&subscription.id, e))?;

        if changed {
            self.repository.update(&record).await?;
            tracing::info!(
                subscription_id = %subscription.id,
                status = %record.status,
                "Subscription closed"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionRepository;
    use crate::domain::billing::{PlanTier, SubscriptionStatus};

    fn setup() -> (Arc<InMemorySubscriptionRepository>, SubscriptionSyncHandler) {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let handler = SubscriptionSyncHandler::new(repo.clone(), Arc::new(PlanResolver::default()));
        (repo, handler)
    }

    #[tokio::test]
    async fn created_event_inserts_record_with_resolved_tier() {
        let (repo, handler) = setup();
        let evt = event(
            "evt_1",
            "customer.subscription.created",
            subscription_object("sub_1", "active", PRO_PRICE, 2999),
        );

        handler.handle(&evt).await.unwrap();

        let stored = repo.find_by_provider_id("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.plan_tier, PlanTier::Pro);
        assert_eq!(stored.user_id.unwrap().as_str(), "user_1");
    }

    #[tokio::test]
    async fn same_update_twice_yields_single_unchanged_record() {
        let (repo, handler) = setup();
        let evt = event(
            "evt_1",
            "customer.subscription.updated",
            subscription_object("sub_1", "active", BASIC_PRICE, 999),
        );

        handler.handle(&evt).await.unwrap();
        let first = repo.find_by_provider_id("sub_1").await.unwrap().unwrap();
        handler.handle(&evt).await.unwrap();
        let second = repo.find_by_provider_id("sub_1").await.unwrap().unwrap();

        assert_eq!(repo.len().await, 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn update_keeps_user_when_payload_has_none() {
        let (repo, handler) = setup();
        handler
            .handle(&event(
                "evt_1",
                "customer.subscription.created",
                subscription_object("sub_1", "active", BASIC_PRICE, 999),
            ))
            .await
            .unwrap();

        let mut object = subscription_object("sub_1", "past_due", BASIC_PRICE, 999);
        object["metadata"] = serde_json::json!({});
        handler
            .handle(&event("evt_2", "customer.subscription.updated", object))
            .await
            .unwrap();

        let stored = repo.find_by_provider_id("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::PastDue);
        assert_eq!(stored.plan_tier, PlanTier::Free);
        assert_eq!(stored.user_id.unwrap().as_str(), "user_1");
    }

    #[tokio::test]
    async fn price_change_recomputes_tier() {
        let (repo, handler) = setup();
        handler
            .handle(&event(
                "evt_1",
                "customer.subscription.created",
                subscription_object("sub_1", "active", BASIC_PRICE, 999),
            ))
            .await
            .unwrap();

        handler
            .handle(&event(
                "evt_2",
                "customer.subscription.updated",
                subscription_object("sub_1", "active", PRO_PRICE, 2999),
            ))
            .await
            .unwrap();

        let stored = repo.find_by_provider_id("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.plan_tier, PlanTier::Pro);
        assert_eq!(stored.price_id.as_deref(), Some(PRO_PRICE));
    }

    #[tokio::test]
    async fn canceled_subscription_is_not_reactivated() {
        let (repo, handler) = setup();
        handler
            .handle(&event(
                "evt_1",
                "customer.subscription.created",
                subscription_object("sub_1", "canceled", BASIC_PRICE, 999),
            ))
            .await
            .unwrap();

        let result = handler
            .handle(&event(
                "evt_2",
                "customer.subscription.updated",
                subscription_object("sub_1", "active", BASIC_PRICE, 999),
            ))
            .await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
        let stored = repo.find_by_provider_id("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn store_outage_is_retryable_error() {
        let (repo, handler) = setup();
        repo.set_unavailable(true);

        let err = handler
            .handle(&event(
                "evt_1",
                "customer.subscription.created",
                subscription_object("sub_1", "active", BASIC_PRICE, 999),
            ))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_object_is_rejected() {
        let (_, handler) = setup();
        let err = handler
            .handle(&event(
                "evt_1",
                "customer.subscription.created",
                serde_json::json!({"id": "sub_1"}),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn deleted_event_marks_record_canceled() {
        let (repo, sync) = setup();
        sync.handle(&event(
            "evt_1",
            "customer.subscription.created",
            subscription_object("sub_1", "active", PRO_PRICE, 2999),
        ))
        .await
        .unwrap();
        let deleted =
            SubscriptionDeletedHandler::new(repo.clone(), Arc::new(PlanResolver::default()));

        let mut object = subscription_object("sub_1", "canceled", PRO_PRICE, 2999);
        object["ended_at"] = serde_json::json!(1706745600);
        deleted
            .handle(&event("evt_2", "customer.subscription.deleted", object))
            .await
            .unwrap();

        let stored = repo.find_by_provider_id("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Canceled);
        assert_eq!(stored.plan_tier, PlanTier::Free);
        assert!(stored.ended_at.is_some());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn deleted_event_without_record_is_ignored() {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let deleted =
            SubscriptionDeletedHandler::new(repo.clone(), Arc::new(PlanResolver::default()));

        let result = deleted
            .handle(&event(
                "evt_1",
                "customer.subscription.deleted",
                subscription_object("sub_missing", "canceled", PRO_PRICE, 2999),
            ))
            .await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
        assert!(repo.is_empty().await);
    }
}
