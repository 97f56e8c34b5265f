//! Plan resolution from billing data.
//!
//! `plan_tier` is never trusted from storage; it is re-derived from
//! `(status, price_id, amount)` every time a subscription changes.

use std::collections::HashMap;

use super::{PlanTier, SubscriptionStatus};
use crate::domain::foundation::ValidationError;

/// Amounts at or above this many minor units resolve to `pro`.
pub const PRO_AMOUNT_THRESHOLD: i64 = 1999;

/// Known provider price identifiers and the tier each one sells.
///
/// Loaded from configuration so each environment can carry its own
/// dashboard identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTierTable {
    entries: HashMap<String, PlanTier>,
}

impl PriceTierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_price(mut self, price_id: impl Into<String>, tier: PlanTier) -> Self {
        self.entries.insert(price_id.into(), tier);
        self
    }

    /// Parses `price_a=basic,price_b=pro`. Blank input yields an empty table.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let mut table = Self::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (price_id, tier) = pair.split_once('=').ok_or_else(|| {
                ValidationError::invalid_format(
                    "price_tiers",
                    format!("expected 'price_id=tier', got '{}'", pair),
                )
            })?;
            let price_id = price_id.trim();
            if price_id.is_empty() {
                return Err(ValidationError::empty_field("price_tiers.price_id"));
            }
            table.entries.insert(price_id.to_string(), tier.parse()?);
        }
        Ok(table)
    }

    pub fn get(&self, price_id: &str) -> Option<PlanTier> {
        self.entries.get(price_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The billing attributes plan resolution depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingSnapshot {
    pub status: SubscriptionStatus,
    pub price_id: Option<String>,
    /// Price in minor currency units.
    pub amount: Option<i64>,
}

impl BillingSnapshot {
    pub fn new(status: SubscriptionStatus, price_id: Option<String>, amount: Option<i64>) -> Self {
        Self {
            status,
            price_id,
            amount,
        }
    }
}

/// Resolves plan tiers against an injected price table.
#[derive(Debug, Clone, Default)]
pub struct PlanResolver {
    table: PriceTierTable,
}

impl PlanResolver {
    pub fn new(table: PriceTierTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PriceTierTable {
        &self.table
    }

    pub fn resolve(&self, snapshot: &BillingSnapshot) -> PlanTier {
        resolve_plan_tier(&self.table, snapshot)
    }
}

/// Maps a billing snapshot to a plan tier. First match wins:
///
/// 1. not `active` -> `free`
/// 2. price id in `table` -> mapped tier
/// 3. price id contains `basic` / `pro` (case-insensitive) -> that tier
/// 4. amount present -> `pro` from [`PRO_AMOUNT_THRESHOLD`], else `basic`
/// 5. `basic`
pub fn resolve_plan_tier(table: &PriceTierTable, snapshot: &BillingSnapshot) -> PlanTier {
    if !snapshot.status.is_active() {
        return PlanTier::Free;
    }

    if let Some(price_id) = snapshot.price_id.as_deref() {
        if let Some(tier) = table.get(price_id) {
            return tier;
        }

        let lowered = price_id.to_lowercase();
        if lowered.contains("basic") {
            return PlanTier::Basic;
        }
        if lowered.contains("pro") {
            return PlanTier::Pro;
        }
    }

    match snapshot.amount {
        Some(amount) if amount >= PRO_AMOUNT_THRESHOLD => PlanTier::Pro,
        Some(_) => PlanTier::Basic,
        None => PlanTier::Basic,
    }
}
