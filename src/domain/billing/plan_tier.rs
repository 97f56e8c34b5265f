//! Plan tier definitions.
//!
//! The local three-level classification derived from billing data. It is a
//! cache over the provider state and is never taken from the provider as-is.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// No paid subscription, or a subscription that is not active.
    Free,
    /// Entry paid plan.
    Basic,
    /// Full paid plan.
    Pro,
}

impl PlanTier {
    /// Returns true if this tier is a paid tier.
    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanTier::Free)
    }

    /// Lowercase identifier used in storage and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
        }
    }

    /// Returns the numeric rank of this tier for comparison.
    pub fn rank(&self) -> u8 {
        match self {
            PlanTier::Free => 0,
            PlanTier::Basic => 1,
            PlanTier::Pro => 2,
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(PlanTier::Free),
            "basic" => Ok(PlanTier::Basic),
            "pro" => Ok(PlanTier::Pro),
            other => Err(ValidationError::invalid_format(
                "plan_tier",
                format!("unknown tier '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_is_not_paid() {
        assert!(!PlanTier::Free.is_paid());
        assert!(PlanTier::Basic.is_paid());
        assert!(PlanTier::Pro.is_paid());
    }

    #[test]
    fn ranks_are_ordered() {
        assert!(PlanTier::Free.rank() < PlanTier::Basic.rank());
        assert!(PlanTier::Basic.rank() < PlanTier::Pro.rank());
    }

    #[test]
    fn tier_serializes_lowercase() {
        let json = serde_json::to_string(&PlanTier::Pro).unwrap();
        assert_eq!(json, "\"pro\"");
    }

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("Basic".parse::<PlanTier>().unwrap(), PlanTier::Basic);
        assert_eq!(" pro ".parse::<PlanTier>().unwrap(), PlanTier::Pro);
        assert!("gold".parse::<PlanTier>().is_err());
    }
}
