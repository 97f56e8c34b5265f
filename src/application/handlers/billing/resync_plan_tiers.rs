//! ResyncPlanTiersHandler - Re-derives stored plan tiers.
//!
//! Run after the price table changes: every active subscription gets its
//! tier recomputed from the stored price, and wrong tiers are rewritten.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::domain::billing::{PlanResolver, PlanTier, SubscriptionStatus};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::SubscriptionRepository;

/// One corrected record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanTierChange {
    pub provider_subscription_id: String,
    pub user_id: Option<UserId>,
    pub price_id: Option<String>,
    pub from: PlanTier,
    pub to: PlanTier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResyncPlanTiersResult {
    pub checked: usize,
    pub fixed: usize,
    pub changes: Vec<PlanTierChange>,
}

pub struct ResyncPlanTiersHandler {
    repository: Arc<dyn SubscriptionRepository>,
    resolver: Arc<PlanResolver>,
}

impl ResyncPlanTiersHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>, resolver: Arc<PlanResolver>) -> Self {
        Self {
            repository,
            resolver,
        }
    }

    pub async fn handle(&self) -> Result<ResyncPlanTiersResult, DomainError> {
        let active = self
            .repository
            .list_by_status(SubscriptionStatus::Active)
            .await?;

        let mut result = ResyncPlanTiersResult {
            checked: active.len(),
            ..Default::default()
        };

        for mut record in active {
            let Some(previous) = record.refresh_plan_tier(&self.resolver) else {
                continue;
            };
            record.updated_at = Utc::now();
            self.repository.update(&record).await?;

            tracing::info!(
                subscription_id = %record.provider_subscription_id,
                from = %previous,
                to = %record.plan_tier,
                "Plan tier corrected"
            );
            result.changes.push(PlanTierChange {
                provider_subscription_id: record.provider_subscription_id,
                user_id: record.user_id,
                price_id: record.price_id,
                from: previous,
                to: record.plan_tier,
            });
        }

        result.fixed = result.changes.len();
        tracing::info!(
            checked = result.checked,
            fixed = result.fixed,
            "Plan tier resync finished"
        );
        Ok(result)
    }
}
