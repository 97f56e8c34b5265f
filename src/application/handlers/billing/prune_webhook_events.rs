//! PruneWebhookEventsHandler - Retention for the webhook audit log.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::domain::foundation::{DomainError, ValidationError};
use crate::ports::WebhookEventRepository;

/// Shortest retention accepted, so a typo cannot wipe recent history.
pub const MIN_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct PruneWebhookEventsCommand {
    /// Delete events received more than this many days ago.
    pub older_than_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneWebhookEventsResult {
    pub deleted: u64,
}

pub struct PruneWebhookEventsHandler {
    repository: Arc<dyn WebhookEventRepository>,
}

impl PruneWebhookEventsHandler {
    pub fn new(repository: Arc<dyn WebhookEventRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(
        &self,
        cmd: PruneWebhookEventsCommand,
    ) -> Result<PruneWebhookEventsResult, DomainError> {
        if cmd.older_than_days < MIN_RETENTION_DAYS {
            return Err(ValidationError::invalid_format(
                "older_than_days",
                format!("must be at least {}", MIN_RETENTION_DAYS),
            )
            .into());
        }

        let cutoff = Duration::try_days(cmd.older_than_days)
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
            .ok_or_else(|| {
                ValidationError::invalid_format("older_than_days", "beyond the supported range")
            })?;
        let deleted = self.repository.delete_before(cutoff).await?;

        tracing::info!(deleted, cutoff = %cutoff, "Pruned webhook audit log");
        Ok(PruneWebhookEventsResult { deleted })
    }
}
