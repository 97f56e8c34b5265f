//! PostgreSQL implementation of WebhookEventRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome};

/// Webhook audit log in the `webhook_events` table.
pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    event_type: String,
    provider_event_id: String,
    received_at: DateTime<Utc>,
    outcome: String,
    error_message: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    payload: serde_json::Value,
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        let outcome: WebhookOutcome = row.outcome.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid outcome: {}", e))
        })?;

        Ok(WebhookEventRecord {
            event_id: row.provider_event_id,
            event_type: row.event_type,
            received_at: row.received_at,
            outcome,
            error_message: row.error_message,
            processed_at: row.processed_at,
            payload: row.payload,
        })
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT event_type, provider_event_id, received_at, outcome,
                   error_message, processed_at, payload
            FROM webhook_events
            WHERE provider_event_id = $1
            ORDER BY received_at
            LIMIT 1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find webhook event: {}", e)))?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (
                event_type, provider_event_id, received_at, outcome,
                error_message, processed_at, payload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (event_type, provider_event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_type)
        .bind(&record.event_id)
        .bind(record.received_at)
        .bind(record.outcome.as_str())
        .bind(&record.error_message)
        .bind(record.processed_at)
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save webhook event: {}", e)))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
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
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET outcome = $3, error_message = $4, processed_at = NOW()
            WHERE event_type = $1 AND provider_event_id = $2
            "#,
        )
        .bind(event_type)
        .bind(event_id)
        .bind(outcome.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to record webhook outcome: {}", e)))?;

        Ok(())
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM webhook_events WHERE received_at < $1")
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to prune webhook events: {}", e)))?;

        Ok(result.rows_affected())
    }
}
