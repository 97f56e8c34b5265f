//! PostgreSQL implementation of SubscriptionRepository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{PlanTier, SubscriptionRecord, SubscriptionStatus};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, UserId};
use crate::ports::{SaveResult, SubscriptionRepository};

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explains an UPDATE that touched no row: the row is missing, or it
    /// is closed and the write would change its status.
    async fn refused_update(
        &self,
        provider_subscription_id: &str,
    ) -> Result<DomainError, DomainError> {
        let stored: Option<String> = sqlx::query_scalar(
            "SELECT status FROM subscriptions WHERE provider_subscription_id = $1",
        )
        .bind(provider_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("read subscription status", e))?;

        let err = match stored {
            Some(status) => DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Subscription is already closed",
            )
            .with_detail("stored_status", status),
            None => DomainError::new(ErrorCode::NotFound, "Subscription not found"),
        };
        Ok(err.with_detail("provider_subscription_id", provider_subscription_id.to_string()))
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, provider_subscription_id, user_id, customer_id, status, plan_tier,
           price_id, amount, currency, billing_interval,
           current_period_start, current_period_end, cancel_at_period_end,
           canceled_at, cancellation_reason, cancellation_comment,
           started_at, ended_at, metadata, created_at, updated_at
    FROM subscriptions
"#;

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    provider_subscription_id: String,
    user_id: Option<String>,
    customer_id: Option<String>,
    status: String,
    plan_tier: String,
    price_id: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
    billing_interval: Option<String>,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    canceled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    cancellation_comment: Option<String>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    metadata: Json<HashMap<String, String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let plan_tier: PlanTier = row.plan_tier.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid plan_tier: {}", e))
        })?;
        let user_id = row.user_id.map(UserId::new).transpose().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
        })?;

        Ok(SubscriptionRecord {
            id: SubscriptionId::from_uuid(row.id),
            provider_subscription_id: row.provider_subscription_id,
            user_id,
            customer_id: row.customer_id,
            status: SubscriptionStatus::from_provider_str(&row.status),
            plan_tier,
            price_id: row.price_id,
            amount: row.amount,
            currency: row.currency,
            interval: row.billing_interval,
            current_period_start: row.current_period_start,
            current_period_end: row.current_period_end,
            cancel_at_period_end: row.cancel_at_period_end,
            canceled_at: row.canceled_at,
            cancellation_reason: row.cancellation_reason,
            cancellation_comment: row.cancellation_comment,
            started_at: row.started_at,
            ended_at: row.ended_at,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", action, e))
        .with_detail("table", "subscriptions")
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE provider_subscription_id = $1", SELECT_COLUMNS))
                .bind(provider_subscription_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("find subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 ORDER BY (status = 'active') DESC, updated_at DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find subscription by user", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn insert(&self, record: &SubscriptionRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, provider_subscription_id, user_id, customer_id, status, plan_tier,
                price_id, amount, currency, billing_interval,
                current_period_start, current_period_end, cancel_at_period_end,
                canceled_at, cancellation_reason, cancellation_comment,
                started_at, ended_at, metadata, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                      $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            ON CONFLICT (provider_subscription_id) DO NOTHING
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.provider_subscription_id)
        .bind(record.user_id.as_ref().map(UserId::as_str))
        .bind(&record.customer_id)
        .bind(record.status.as_str())
        .bind(record.plan_tier.as_str())
        .bind(&record.price_id)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(&record.interval)
        .bind(record.current_period_start)
        .bind(record.current_period_end)
        .bind(record.cancel_at_period_end)
        .bind(record.canceled_at)
        .bind(&record.cancellation_reason)
        .bind(&record.cancellation_comment)
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(Json(&record.metadata))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert subscription", e))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn update(&self, record: &SubscriptionRecord) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                user_id = $2,
                customer_id = $3,
                status = $4,
                plan_tier = $5,
                price_id = $6,
                amount = $7,
                currency = $8,
                billing_interval = $9,
                current_period_start = $10,
                current_period_end = $11,
                cancel_at_period_end = $12,
                canceled_at = $13,
                cancellation_reason = $14,
                cancellation_comment = $15,
                started_at = $16,
                ended_at = $17,
                metadata = $18,
                updated_at = $19
            WHERE provider_subscription_id = $1
              AND (status NOT IN ('canceled', 'incomplete_expired') OR status = $4)
            "#,
        )
        .bind(&record.provider_subscription_id)
        .bind(record.user_id.as_ref().map(UserId::as_str))
        .bind(&record.customer_id)
        .bind(record.status.as_str())
        .bind(record.plan_tier.as_str())
        .bind(&record.price_id)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(&record.interval)
        .bind(record.current_period_start)
        .bind(record.current_period_end)
        .bind(record.cancel_at_period_end)
        .bind(record.canceled_at)
        .bind(&record.cancellation_reason)
        .bind(&record.cancellation_comment)
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(Json(&record.metadata))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update subscription", e))?;

        if result.rows_affected() == 0 {
            return Err(self.refused_update(&record.provider_subscription_id).await?);
        }

        Ok(())
    }

    async fn list_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<SubscriptionRecord>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE status = $1 ORDER BY created_at",
            SELECT_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list subscriptions", e))?;

        rows.into_iter().map(SubscriptionRecord::try_from).collect()
    }
}
