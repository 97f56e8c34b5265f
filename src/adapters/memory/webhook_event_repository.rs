//! In-memory WebhookEventRepository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome};

/// Audit log keyed by `(event_type, event_id)`.
#[derive(Default)]
pub struct InMemoryWebhookEventRepository {
    records: RwLock<HashMap<(String, String), WebhookEventRecord>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.event_id == event_id)
            .min_by_key(|r| r.received_at)
            .cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        let key = (record.event_type.clone(), record.event_id.clone());
        if records.contains_key(&key) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(key, record);
        Ok(SaveResult::Inserted)
    }

    async fn mark_outcome(
        &self,
        event_type: &str,
        event_id: &str,
        outcome: WebhookOutcome,
        error_message: Option<String>,
    ) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&(event_type.to_string(), event_id.to_string())) {
            record.outcome = outcome;
            record.error_message = error_message;
            record.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.received_at >= timestamp);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str) -> WebhookEventRecord {
        WebhookEventRecord::received(id, "invoice.payment_failed", serde_json::json!({"id": id}))
    }

    #[tokio::test]
    async fn same_key_is_saved_once() {
        let repo = InMemoryWebhookEventRepository::new();

        assert_eq!(repo.save(record("evt_1")).await.unwrap(), SaveResult::Inserted);
        assert_eq!(repo.save(record("evt_1")).await.unwrap(), SaveResult::AlreadyExists);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn mark_outcome_updates_record() {
        let repo = InMemoryWebhookEventRepository::new();
        repo.save(record("evt_1")).await.unwrap();

        repo.mark_outcome(
            "invoice.payment_failed",
            "evt_1",
            WebhookOutcome::Ignored,
            Some("no subscription".to_string()),
        )
        .await
        .unwrap();

        let stored = repo.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(stored.outcome, WebhookOutcome::Ignored);
        assert!(stored.processed_at.is_some());
    }

    #[tokio::test]
    async fn delete_before_prunes_old_records() {
        let repo = InMemoryWebhookEventRepository::new();
        let mut old = record("evt_old");
        old.received_at = Utc::now() - Duration::days(40);
        repo.save(old).await.unwrap();
        repo.save(record("evt_new")).await.unwrap();

        let deleted = repo.delete_before(Utc::now() - Duration::days(30)).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(repo.find_by_event_id("evt_old").await.unwrap().is_none());
        assert!(repo.find_by_event_id("evt_new").await.unwrap().is_some());
    }
}
