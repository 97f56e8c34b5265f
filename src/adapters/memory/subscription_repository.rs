//! In-memory SubscriptionRepository.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::billing::{SubscriptionRecord, SubscriptionStatus};
use crate::domain::foundation::{DomainError, ErrorCode, StateMachine, UserId};
use crate::ports::{SaveResult, SubscriptionRepository};

/// Subscriptions keyed by provider subscription id.
///
/// Does not persist across restarts. `set_unavailable` makes every call
/// fail, to exercise store-outage paths.
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    records: RwLock<HashMap<String, SubscriptionRecord>>,
    unavailable: AtomicBool,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::database("subscription store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.check_available()?;
        Ok(self.records.read().await.get(provider_subscription_id).cloned())
    }

    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.user_id.as_ref() == Some(user_id))
            .max_by_key(|r| (r.status.is_active(), r.updated_at))
            .cloned())
    }

    async fn insert(&self, record: &SubscriptionRecord) -> Result<SaveResult, DomainError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        if records.contains_key(&record.provider_subscription_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(record.provider_subscription_id.clone(), record.clone());
        Ok(SaveResult::Inserted)
    }

    async fn update(&self, record: &SubscriptionRecord) -> Result<(), DomainError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        match records.get_mut(&record.provider_subscription_id) {
            Some(existing) if existing.status.is_terminal() && existing.status != record.status => {
                Err(DomainError::new(
                    ErrorCode::InvalidStateTransition,
                    "Subscription is already closed",
                )
                .with_detail("provider_subscription_id", record.provider_subscription_id.clone())
                .with_detail("stored_status", existing.status.as_str()))
            }
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(DomainError::new(ErrorCode::NotFound, "Subscription not found")),
        }
    }

    async fn list_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<SubscriptionRecord>, DomainError> {
        self.check_available()?;
        let records = self.records.read().await;
        let mut matching: Vec<_> = records
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{PlanResolver, StripeSubscription};
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn record(sub_id: &str, status: &str, user: &str) -> SubscriptionRecord {
        let sub: StripeSubscription = serde_json::from_value(json!({
            "id": sub_id, "status": status, "metadata": {"userId": user}
        }))
        .unwrap();
        SubscriptionRecord::from_provider(&sub, &PlanResolver::default(), Utc::now())
    }

    #[tokio::test]
    async fn insert_twice_reports_already_exists() {
        let repo = InMemorySubscriptionRepository::new();
        let rec = record("sub_1", "active", "user_1");

        assert_eq!(repo.insert(&rec).await.unwrap(), SaveResult::Inserted);
        assert_eq!(repo.insert(&rec).await.unwrap(), SaveResult::AlreadyExists);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let repo = InMemorySubscriptionRepository::new();
        let err = repo.update(&record("sub_x", "active", "u")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn stale_update_cannot_reopen_closed_subscription() {
        let repo = InMemorySubscriptionRepository::new();
        let stale = record("sub_1", "active", "user_1");
        repo.insert(&stale).await.unwrap();
        let mut closed = stale.clone();
        closed.status = SubscriptionStatus::Canceled;
        repo.update(&closed).await.unwrap();

        let mut past_due = stale;
        past_due.status = SubscriptionStatus::PastDue;
        let err = repo.update(&past_due).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        let stored = repo.find_by_provider_id("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn closed_subscription_accepts_same_status_rewrite() {
        let repo = InMemorySubscriptionRepository::new();
        let mut closed = record("sub_1", "canceled", "user_1");
        repo.insert(&closed).await.unwrap();

        closed.cancellation_reason = Some("too_expensive".to_string());
        repo.update(&closed).await.unwrap();

        let stored = repo.find_by_provider_id("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.cancellation_reason.as_deref(), Some("too_expensive"));
    }

    #[tokio::test]
    async fn find_by_user_prefers_active_subscription() {
        let repo = InMemorySubscriptionRepository::new();
        let active = record("sub_old", "active", "user_1");
        let mut canceled = record("sub_new", "canceled", "user_1");
        canceled.updated_at = active.updated_at + Duration::hours(1);
        repo.insert(&active).await.unwrap();
        repo.insert(&canceled).await.unwrap();

        let found = repo
            .find_by_user(&UserId::new("user_1").unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.provider_subscription_id, "sub_old");
    }

    #[tokio::test]
    async fn list_by_status_filters() {
        let repo = InMemorySubscriptionRepository::new();
        repo.insert(&record("sub_1", "active", "a")).await.unwrap();
        repo.insert(&record("sub_2", "past_due", "b")).await.unwrap();

        let active = repo.list_by_status(SubscriptionStatus::Active).await.unwrap();

        assert_eq!(active.len(), 1);
        assert_eq!(active[0].provider_subscription_id, "sub_1");
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let repo = InMemorySubscriptionRepository::new();
        repo.set_unavailable(true);

        let err = repo.find_by_provider_id("sub_1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
