//! In-memory adapters.
//!
//! Thread-safe via `tokio::sync::RwLock`. Used by tests and by the `memory`
//! storage backend for local development; nothing survives a restart.

mod invoice_repository;
mod subscription_repository;
mod webhook_event_repository;

pub use invoice_repository::InMemoryInvoiceRepository;
pub use subscription_repository::InMemorySubscriptionRepository;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
