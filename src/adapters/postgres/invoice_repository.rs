//! PostgreSQL implementation of InvoiceRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::InvoiceRecord;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{InvoiceRepository, SaveResult};

pub struct PostgresInvoiceRepository {
    pool: PgPool,
}

impl PostgresInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    invoice_id: String,
    subscription_id: Option<String>,
    amount_paid: i64,
    amount_due: i64,
    currency: Option<String>,
    status: Option<String>,
    customer_email: Option<String>,
    user_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for InvoiceRecord {
    type Error = DomainError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let user_id = row.user_id.map(UserId::new).transpose().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
        })?;

        Ok(InvoiceRecord {
            id: row.id,
            invoice_id: row.invoice_id,
            subscription_id: row.subscription_id,
            amount_paid: row.amount_paid,
            amount_due: row.amount_due,
            currency: row.currency,
            status: row.status,
            customer_email: row.customer_email,
            user_id,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl InvoiceRepository for PostgresInvoiceRepository {
    async fn insert(&self, record: &InvoiceRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_id, subscription_id, amount_paid, amount_due,
                currency, status, customer_email, user_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (invoice_id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(&record.invoice_id)
        .bind(&record.subscription_id)
        .bind(record.amount_paid)
        .bind(record.amount_due)
        .bind(&record.currency)
        .bind(&record.status)
        .bind(&record.customer_email)
        .bind(record.user_id.as_ref().map(UserId::as_str))
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert invoice: {}", e)))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn list_by_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Vec<InvoiceRecord>, DomainError> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT id, invoice_id, subscription_id, amount_paid, amount_due,
                   currency, status, customer_email, user_id, created_at
            FROM invoices
            WHERE subscription_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(provider_subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list invoices: {}", e)))?;

        rows.into_iter().map(InvoiceRecord::try_from).collect()
    }
}
