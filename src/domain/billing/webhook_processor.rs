//! Webhook processor - Audit, dispatch, record.
//!
//! ## Flow
//!
//! 1. Store the raw event in the audit log (a duplicate key is tolerated)
//! 2. Dispatch to the handler registered for the event type
//! 3. Record the outcome (`success`, `ignored` or `failed`) on the audit row
//!
//! Duplicates are reconciled again rather than skipped: a first delivery
//! may have failed half-way, and every handler is idempotent.

use std::sync::Arc;

use async_trait::async_trait;

use super::{StripeEvent, StripeEventType, WebhookError};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome};

/// Handler for a specific type of Stripe webhook event.
#[async_trait]
pub trait WebhookEventHandler: Send + Sync {
    /// Returns the event type(s) this handler processes.
    fn handles(&self) -> Vec<StripeEventType>;

    /// Handles the webhook event.
    ///
    /// Returns `Err(WebhookError::Ignored(_))` if the event should be
    /// acknowledged but was not applied.
    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError>;
}

/// Routes events to handlers by type.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    /// Find a handler for the given event type.
    fn get_handler(&self, event_type: &StripeEventType) -> Option<&dyn WebhookEventHandler>;

    /// Dispatch an event to its handler. Unhandled types are ignored.
    async fn dispatch(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let event_type = event.parsed_type();
        match self.get_handler(&event_type) {
            Some(handler) => handler.handle(event).await,
            None => {
                tracing::debug!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "No handler for webhook event type"
                );
                Err(WebhookError::Ignored(format!(
                    "unhandled event type: {}",
                    event.event_type
                )))
            }
        }
    }
}

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookReceipt {
    pub event_id: String,
    pub event_type: String,
    /// The audit log already held this event.
    pub duplicate: bool,
    pub outcome: WebhookOutcome,
}

/// Processes verified webhook events.
pub struct WebhookProcessor {
    repository: Arc<dyn WebhookEventRepository>,
    dispatcher: Arc<dyn WebhookDispatcher>,
}

impl WebhookProcessor {
    pub fn new(
        repository: Arc<dyn WebhookEventRepository>,
        dispatcher: Arc<dyn WebhookDispatcher>,
    ) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    /// Audits, dispatches and records a verified event.
    ///
    /// `raw_payload` is the body exactly as received; it is what the audit
    /// log keeps.
    ///
    /// # Errors
    ///
    /// Only errors the provider should see: store failures (including the
    /// initial audit write) and handler failures that are not acknowledged.
    pub async fn process(
        &self,
        event: &StripeEvent,
        raw_payload: &[u8],
    ) -> Result<WebhookReceipt, WebhookError> {
        let payload: serde_json::Value = serde_json::from_slice(raw_payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let saved = self
            .repository
            .save(WebhookEventRecord::received(&event.id, &event.event_type, payload))
            .await?;
        let duplicate = saved == SaveResult::AlreadyExists;
        if duplicate {
            tracing::info!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Duplicate webhook delivery, reconciling again"
            );
        }

        let result = self.dispatcher.dispatch(event).await;

        let (outcome, error_message) = match &result {
            Ok(()) => (WebhookOutcome::Success, None),
            Err(e) if e.is_acknowledged() => (WebhookOutcome::Ignored, Some(e.to_string())),
            Err(e) => (WebhookOutcome::Failed, Some(e.to_string())),
        };

        if let Err(e) = self
            .repository
            .mark_outcome(&event.event_type, &event.id, outcome, error_message)
            .await
        {
            tracing::warn!(
                event_id = %event.id,
                error = %e,
                "Failed to record webhook outcome"
            );
        }

        let receipt = WebhookReceipt {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            duplicate,
            outcome,
        };

        match result {
            Ok(()) => Ok(receipt),
            Err(e) if e.is_acknowledged() => {
                tracing::info!(
                    event_id = %event.id,
                    reason = %e,
                    "Webhook acknowledged without changes"
                );
                Ok(receipt)
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %e,
                    "Webhook reconciliation failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::StripeEventBuilder;
    use crate::domain::foundation::DomainError;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::RwLock;

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    #[derive(Default)]
    struct MockWebhookRepository {
        records: RwLock<HashMap<(String, String), WebhookEventRecord>>,
        fail_saves: bool,
    }

    impl MockWebhookRepository {
        fn failing() -> Self {
            Self {
                fail_saves: true,
                ..Default::default()
            }
        }

        async fn outcome_of(&self, event_id: &str) -> Option<WebhookOutcome> {
            self.records
                .read()
                .await
                .values()
                .find(|r| r.event_id == event_id)
                .map(|r| r.outcome)
        }

        async fn len(&self) -> usize {
            self.records.read().await.len()
        }
    }

    #[async_trait]
    impl WebhookEventRepository for MockWebhookRepository {
        async fn find_by_event_id(
            &self,
            event_id: &str,
        ) -> Result<Option<WebhookEventRecord>, DomainError> {
            let records = self.records.read().await;
            Ok(records.values().find(|r| r.event_id == event_id).cloned())
        }

        async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
            if self.fail_saves {
                return Err(DomainError::database("connection refused"));
            }
            let mut records = self.records.write().await;
            let key = (record.event_type.clone(), record.event_id.clone());
            if records.contains_key(&key) {
                Ok(SaveResult::AlreadyExists)
            } else {
                records.insert(key, record);
                Ok(SaveResult::Inserted)
            }
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

    enum Behaviour {
        Succeed,
        Ignore,
        Fail,
    }

    struct MockHandler {
        handles_types: Vec<StripeEventType>,
        call_count: AtomicU32,
        behaviour: Behaviour,
    }

    impl MockHandler {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                handles_types: vec![StripeEventType::CustomerSubscriptionCreated],
                call_count: AtomicU32::new(0),
                behaviour,
            }
        }

        fn call_count(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WebhookEventHandler for MockHandler {
        fn handles(&self) -> Vec<StripeEventType> {
            self.handles_types.clone()
        }

        async fn handle(&self, _event: &StripeEvent) -> Result<(), WebhookError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Ignore => Err(WebhookError::Ignored("not applicable".to_string())),
                Behaviour::Fail => Err(WebhookError::Store("simulated failure".to_string())),
            }
        }
    }

    struct SingleHandlerDispatcher {
        handler: Arc<MockHandler>,
    }

    #[async_trait]
    impl WebhookDispatcher for SingleHandlerDispatcher {
        fn get_handler(&self, event_type: &StripeEventType) -> Option<&dyn WebhookEventHandler> {
            if self.handler.handles_types.contains(event_type) {
                Some(self.handler.as_ref())
            } else {
                None
            }
        }
    }

    fn setup(
        behaviour: Behaviour,
    ) -> (WebhookProcessor, Arc<MockWebhookRepository>, Arc<MockHandler>) {
        let repo = Arc::new(MockWebhookRepository::default());
        let handler = Arc::new(MockHandler::new(behaviour));
        let dispatcher = Arc::new(SingleHandlerDispatcher {
            handler: handler.clone(),
        });
        (WebhookProcessor::new(repo.clone(), dispatcher), repo, handler)
    }

    fn event(id: &str, event_type: &str) -> (StripeEvent, Vec<u8>) {
        let event = StripeEventBuilder::new().id(id).event_type(event_type).build();
        let raw = serde_json::to_vec(&event).unwrap();
        (event, raw)
    }

    // ══════════════════════════════════════════════════════════════
    // Processing
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn new_event_is_audited_then_processed() {
        let (processor, repo, handler) = setup(Behaviour::Succeed);
        let (event, raw) = event("evt_new", "customer.subscription.created");

        let receipt = processor.process(&event, &raw).await.unwrap();

        assert!(!receipt.duplicate);
        assert_eq!(receipt.outcome, WebhookOutcome::Success);
        assert_eq!(handler.call_count(), 1);
        assert_eq!(repo.outcome_of("evt_new").await, Some(WebhookOutcome::Success));
    }

    #[tokio::test]
    async fn duplicate_event_is_reconciled_again() {
        let (processor, repo, handler) = setup(Behaviour::Succeed);
        let (event, raw) = event("evt_dup", "customer.subscription.created");

        processor.process(&event, &raw).await.unwrap();
        let receipt = processor.process(&event, &raw).await.unwrap();

        assert!(receipt.duplicate);
        assert_eq!(handler.call_count(), 2);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged() {
        let (processor, repo, handler) = setup(Behaviour::Succeed);
        let (event, raw) = event("evt_unknown", "customer.created");

        let receipt = processor.process(&event, &raw).await.unwrap();

        assert_eq!(receipt.outcome, WebhookOutcome::Ignored);
        assert_eq!(handler.call_count(), 0);
        assert_eq!(repo.outcome_of("evt_unknown").await, Some(WebhookOutcome::Ignored));
    }

    #[tokio::test]
    async fn ignored_event_is_acknowledged() {
        let (processor, _repo, _handler) = setup(Behaviour::Ignore);
        let (event, raw) = event("evt_ignored", "customer.subscription.created");

        let receipt = processor.process(&event, &raw).await.unwrap();

        assert_eq!(receipt.outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn handler_failure_is_returned_and_recorded() {
        let (processor, repo, _handler) = setup(Behaviour::Fail);
        let (event, raw) = event("evt_fail", "customer.subscription.created");

        let result = processor.process(&event, &raw).await;

        assert!(matches!(result, Err(WebhookError::Store(_))));
        assert_eq!(repo.outcome_of("evt_fail").await, Some(WebhookOutcome::Failed));
    }

    #[tokio::test]
    async fn audit_failure_prevents_dispatch() {
        let repo = Arc::new(MockWebhookRepository::failing());
        let handler = Arc::new(MockHandler::new(Behaviour::Succeed));
        let dispatcher = Arc::new(SingleHandlerDispatcher {
            handler: handler.clone(),
        });
        let processor = WebhookProcessor::new(repo, dispatcher);
        let (event, raw) = event("evt_x", "customer.subscription.created");

        let result = processor.process(&event, &raw).await;

        assert!(matches!(result, Err(WebhookError::Store(_))));
        assert_eq!(handler.call_count(), 0);
    }

    #[tokio::test]
    async fn dispatcher_finds_only_registered_types() {
        let handler = Arc::new(MockHandler::new(Behaviour::Succeed));
        let dispatcher = SingleHandlerDispatcher { handler };

        assert!(dispatcher
            .get_handler(&StripeEventType::CustomerSubscriptionCreated)
            .is_some());
        assert!(dispatcher
            .get_handler(&StripeEventType::InvoicePaymentFailed)
            .is_none());
    }
}
