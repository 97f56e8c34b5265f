//! SubscriptionRepository port - Persistence for subscription records.

use async_trait::async_trait;

use super::SaveResult;
use crate::domain::billing::{SubscriptionRecord, SubscriptionStatus};
use crate::domain::foundation::{DomainError, UserId};

/// Store for [`SubscriptionRecord`]s, unique on `provider_subscription_id`.
///
/// Each call is a single-key read or write; no cross-row transactions are
/// needed by the reconciler.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find the record mirroring a provider subscription.
    async fn find_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Find the subscription that currently represents a user.
    ///
    /// An active subscription wins over others; ties go to the most
    /// recently updated record.
    async fn find_by_user(&self, user_id: &UserId)
        -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Insert a new record.
    ///
    /// Returns `AlreadyExists` when another writer created a record for the
    /// same provider subscription first.
    async fn insert(&self, record: &SubscriptionRecord) -> Result<SaveResult, DomainError>;

    /// Overwrite an existing record.
    ///
    /// # Errors
    ///
    /// `NotFound` if no record has this `provider_subscription_id`.
    /// `InvalidStateTransition` if the stored record is closed (`canceled`
    /// or `incomplete_expired`) and `record` carries a different status.
    /// The check happens at write time, so a stale read cannot reopen a
    /// subscription closed by a concurrent delivery.
    async fn update(&self, record: &SubscriptionRecord) -> Result<(), DomainError>;

    /// All records currently in `status`.
    async fn list_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<SubscriptionRecord>, DomainError>;
}
