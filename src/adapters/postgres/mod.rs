//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresSubscriptionRepository` - `subscriptions` table
//! - `PostgresInvoiceRepository` - `invoices` table
//! - `PostgresWebhookEventRepository` - `webhook_events` audit log
//!
//! Schema lives in `migrations/` and is applied with [`run_migrations`].

mod invoice_repository;
mod subscription_repository;
mod webhook_event_repository;

pub use invoice_repository::PostgresInvoiceRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;

use sqlx::PgPool;

/// Applies the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
