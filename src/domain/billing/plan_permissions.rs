//! Feature limits granted by each plan tier.

use super::PlanTier;
use serde::{Deserialize, Serialize};

/// Which AI model family a tier may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiModelAccess {
    Basic,
    Advanced,
}

/// Permissions and quotas for a plan tier.
///
/// Limits of `None` mean unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPermissions {
    pub tier: PlanTier,
    pub max_study_plans: Option<u32>,
    pub max_saved_items: Option<u32>,
    pub max_questions: Option<u32>,
    pub ai_model: AiModelAccess,
    pub unlimited_credits: bool,
    pub advanced_ai: bool,
    pub pdf_export: bool,
}

impl PlanPermissions {
    /// Get the permissions for a specific tier.
    ///
    /// | Tier  | Study plans | Saved items | Questions | AI model | Credits   | PDF |
    /// |-------|-------------|-------------|-----------|----------|-----------|-----|
    /// | Free  | 1           | 5           | 5         | basic    | metered   | No  |
    /// | Basic | 3           | 50          | 50        | basic    | unlimited | Yes |
    /// | Pro   | Unlimited   | Unlimited   | Unlimited | advanced | unlimited | Yes |
    pub fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => Self {
                tier,
                max_study_plans: Some(1),
                max_saved_items: Some(5),
                max_questions: Some(5),
                ai_model: AiModelAccess::Basic,
                unlimited_credits: false,
                advanced_ai: false,
                pdf_export: false,
            },
            PlanTier::Basic => Self {
                tier,
                max_study_plans: Some(3),
                max_saved_items: Some(50),
                max_questions: Some(50),
                ai_model: AiModelAccess::Basic,
                unlimited_credits: true,
                advanced_ai: false,
                pdf_export: true,
            },
            PlanTier::Pro => Self {
                tier,
                max_study_plans: None,
                max_saved_items: None,
                max_questions: None,
                ai_model: AiModelAccess::Advanced,
                unlimited_credits: true,
                advanced_ai: true,
                pdf_export: true,
            },
        }
    }

    pub fn study_plan_limit_reached(&self, current: u32) -> bool {
        limit_reached(self.max_study_plans, current)
    }

    pub fn saved_item_limit_reached(&self, current: u32) -> bool {
        limit_reached(self.max_saved_items, current)
    }

    pub fn question_limit_reached(&self, current: u32) -> bool {
        limit_reached(self.max_questions, current)
    }
}

fn limit_reached(max: Option<u32>, current: u32) -> bool {
    max.map(|max| current >= max).unwrap_or(false)
}
