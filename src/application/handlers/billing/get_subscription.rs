//! Subscription queries for the signed-in user.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{PlanPermissions, PlanTier, SubscriptionRecord, SubscriptionStatus};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::SubscriptionRepository;

#[derive(Debug, Clone)]
pub struct GetSubscriptionQuery {
    pub user_id: UserId,
}

/// Returns the subscription currently representing a user, if any.
pub struct GetSubscriptionHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl GetSubscriptionHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionQuery,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.repository.find_by_user(&query.user_id).await
    }
}

/// What a user may do right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPermissions {
    pub plan_tier: PlanTier,
    /// `None` when the user never subscribed.
    pub status: Option<SubscriptionStatus>,
    pub permissions: PlanPermissions,
}

/// Resolves permissions; users without an active subscription get `free`.
pub struct GetPermissionsHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl GetPermissionsHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionQuery,
    ) -> Result<UserPermissions, DomainError> {
        let record = self.repository.find_by_user(&query.user_id).await?;

        let permissions = record
            .as_ref()
            .map(SubscriptionRecord::permissions)
            .unwrap_or_else(|| PlanPermissions::for_tier(PlanTier::Free));

        Ok(UserPermissions {
            plan_tier: permissions.tier,
            status: record.map(|r| r.status),
            permissions,
        })
    }
}

/// Whether a user currently holds an active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatusSummary {
    pub has_active_subscription: bool,
}

pub struct GetSubscriptionStatusHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl GetSubscriptionStatusHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionQuery,
    ) -> Result<SubscriptionStatusSummary, DomainError> {
        let record = self.repository.find_by_user(&query.user_id).await?;
        Ok(SubscriptionStatusSummary {
            has_active_subscription: record
                .is_some_and(|r| r.status == SubscriptionStatus::Active),
        })
    }
}
