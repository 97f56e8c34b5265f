//! In-memory InvoiceRepository.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::billing::InvoiceRecord;
use crate::domain::foundation::DomainError;
use crate::ports::{InvoiceRepository, SaveResult};

#[derive(Default)]
pub struct InMemoryInvoiceRepository {
    records: RwLock<Vec<InvoiceRecord>>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored invoice, in insertion order.
    pub async fn all(&self) -> Vec<InvoiceRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn insert(&self, record: &InvoiceRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.invoice_id == record.invoice_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.push(record.clone());
        Ok(SaveResult::Inserted)
    }

    async fn list_by_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Vec<InvoiceRecord>, DomainError> {
        let records = self.records.read().await;
        let mut matching: Vec<_> = records
            .iter()
            .filter(|r| r.subscription_id.as_deref() == Some(provider_subscription_id))
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }
}
