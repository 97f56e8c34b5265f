//! Subscription lifecycle status.
//!
//! Mirrors the payment provider's subscription statuses. Transitions are
//! validated through [`StateMachine`] so that a late or forged event cannot
//! revive a subscription that has already ended.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Provider-reported status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
    /// A status string this service does not recognise.
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    const ALL: [SubscriptionStatus; 9] = [
        SubscriptionStatus::Incomplete,
        SubscriptionStatus::IncompleteExpired,
        SubscriptionStatus::Trialing,
        SubscriptionStatus::Active,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Canceled,
        SubscriptionStatus::Unpaid,
        SubscriptionStatus::Paused,
        SubscriptionStatus::Unknown,
    ];

    /// Parses a provider status string. Never fails.
    pub fn from_provider_str(s: &str) -> Self {
        match s {
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "trialing" => SubscriptionStatus::Trialing,
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            "unpaid" => SubscriptionStatus::Unpaid,
            "paused" => SubscriptionStatus::Paused,
            _ => SubscriptionStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Unknown => "unknown",
        }
    }

    /// Only an active subscription grants a paid tier.
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self == target || self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            // Reactivation requires a new provider subscription.
            Canceled | IncompleteExpired => vec![],
            current => Self::ALL
                .iter()
                .copied()
                .filter(|s| s != current)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_provider_statuses() {
        assert_eq!(
            SubscriptionStatus::from_provider_str("past_due"),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_provider_str("incomplete_expired"),
            SubscriptionStatus::IncompleteExpired
        );
    }

    #[test]
    fn unrecognised_status_becomes_unknown() {
        assert_eq!(
            SubscriptionStatus::from_provider_str("on_hold"),
            SubscriptionStatus::Unknown
        );
        let parsed: SubscriptionStatus = serde_json::from_str("\"on_hold\"").unwrap();
        assert_eq!(parsed, SubscriptionStatus::Unknown);
    }

    #[test]
    fn as_str_round_trips_through_from_provider_str() {
        for status in SubscriptionStatus::ALL {
            assert_eq!(SubscriptionStatus::from_provider_str(status.as_str()), status);
        }
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&SubscriptionStatus::PastDue).unwrap();
        assert_eq!(json, "\"past_due\"");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // State Machine Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn active_can_become_past_due_and_back() {
        let status = SubscriptionStatus::Active;
        let past_due = status.transition_to(SubscriptionStatus::PastDue).unwrap();
        let active = past_due.transition_to(SubscriptionStatus::Active).unwrap();
        assert_eq!(active, SubscriptionStatus::Active);
    }

    #[test]
    fn active_can_be_canceled() {
        assert!(SubscriptionStatus::Active.can_transition_to(&SubscriptionStatus::Canceled));
    }

    #[test]
    fn canceled_is_terminal() {
        assert!(SubscriptionStatus::Canceled.is_terminal());
        assert!(SubscriptionStatus::IncompleteExpired.is_terminal());
        assert!(!SubscriptionStatus::PastDue.is_terminal());
    }

    #[test]
    fn canceled_cannot_be_reactivated() {
        let result = SubscriptionStatus::Canceled.transition_to(SubscriptionStatus::Active);
        assert!(result.is_err());
    }

    #[test]
    fn replaying_same_status_is_allowed_even_when_terminal() {
        assert!(SubscriptionStatus::Canceled.can_transition_to(&SubscriptionStatus::Canceled));
        assert!(SubscriptionStatus::Active.can_transition_to(&SubscriptionStatus::Active));
    }

    #[test]
    fn valid_transitions_excludes_self() {
        let transitions = SubscriptionStatus::Trialing.valid_transitions();
        assert!(!transitions.contains(&SubscriptionStatus::Trialing));
        assert_eq!(transitions.len(), SubscriptionStatus::ALL.len() - 1);
    }
}
