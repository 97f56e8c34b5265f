//! WebhookEventRepository port - Audit log of received payment webhooks.
//!
//! Every verified event is stored before any reconciliation side effect, so
//! a delivery can be replayed or inspected independently of the provider.
//!
//! ## Duplicate Deliveries
//!
//! The provider redelivers on timeouts and 5xx responses. A second save of
//! the same `(event_type, event_id)` reports `AlreadyExists` instead of
//! failing, and reconciliation runs again (it is idempotent).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ValidationError};

/// Processing outcome recorded on an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    /// Stored, not yet reconciled.
    Received,
    Success,
    Ignored,
    Failed,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Received => "received",
            WebhookOutcome::Success => "success",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Failed => "failed",
        }
    }
}

impl std::str::FromStr for WebhookOutcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(WebhookOutcome::Received),
            "success" => Ok(WebhookOutcome::Success),
            "ignored" => Ok(WebhookOutcome::Ignored),
            "failed" => Ok(WebhookOutcome::Failed),
            other => Err(ValidationError::invalid_format(
                "outcome",
                format!("unknown webhook outcome '{}'", other),
            )),
        }
    }
}

/// Audit row for one webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEventRecord {
    /// Provider event ID (evt_xxx format).
    pub event_id: String,

    /// Provider event type (e.g., "checkout.session.completed").
    pub event_type: String,

    pub received_at: DateTime<Utc>,

    pub outcome: WebhookOutcome,

    /// Reason for `ignored`, error for `failed`.
    pub error_message: Option<String>,

    pub processed_at: Option<DateTime<Utc>>,

    /// Raw event payload.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    /// Creates a freshly received record.
    pub fn received(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            received_at: Utc::now(),
            outcome: WebhookOutcome::Received,
            error_message: None,
            processed_at: None,
            payload,
        }
    }
}

/// Result of an insert keyed on a unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this key).
    Inserted,
    /// A record with the same key already exists.
    AlreadyExists,
}

/// Port for the webhook audit log.
///
/// Implementations key rows on `(event_type, event_id)` and rely on the
/// store's unique constraint for concurrent duplicate deliveries.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Find a stored event by its provider event ID.
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Insert the record, or report `AlreadyExists` for a duplicate key.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Record how processing ended. Overwrites the previous outcome.
    async fn mark_outcome(
        &self,
        event_type: &str,
        event_id: &str,
        outcome: WebhookOutcome,
        error_message: Option<String>,
    ) -> Result<(), DomainError>;

    /// Delete records received before `timestamp`. Returns the count deleted.
    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError>;
}
