//! InvoiceRepository port - Billing history.

use async_trait::async_trait;

use super::SaveResult;
use crate::domain::billing::InvoiceRecord;
use crate::domain::foundation::DomainError;

/// Append-only store for [`InvoiceRecord`]s, unique on `invoice_id`.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Insert an invoice. A redelivered invoice reports `AlreadyExists`.
    async fn insert(&self, record: &InvoiceRecord) -> Result<SaveResult, DomainError>;

    /// Invoices for a provider subscription, oldest first.
    async fn list_by_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Vec<InvoiceRecord>, DomainError>;
}
