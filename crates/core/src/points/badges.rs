use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Badge tiers, ordered from entry level upward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Special,
}

impl BadgeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
            Self::Special => "special",
        }
    }
}

/// Declarative badge condition, stored as JSON alongside each badge row.
///
/// Every present field must hold for the badge to be awarded. `min_points`
/// is checked against the lifetime total, and additionally against the
/// named category's points when `category` is also present. `action` and
/// `count` only constrain when both are present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BadgeCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_first_contribution: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

/// Contributor facts the criteria are evaluated against. Built by the
/// persistence layer from the contributor row plus two aggregates.
#[derive(Clone, Debug, Default)]
pub struct ContributorSnapshot {
    pub total_points: i64,
    pub current_streak: u32,
    pub is_first_timer: bool,
    /// Final points summed per action category.
    pub category_points: HashMap<String, i64>,
    /// Contribution count per action name.
    pub action_counts: HashMap<String, i64>,
}

impl BadgeCriteria {
    pub fn is_met(&self, snapshot: &ContributorSnapshot) -> bool {
        if let Some(min_points) = self.min_points {
            if snapshot.total_points < min_points {
                return false;
            }
        }

        if let Some(min_streak) = self.min_streak {
            if snapshot.current_streak < min_streak {
                return false;
            }
        }

        if self.is_first_contribution == Some(true) && !snapshot.is_first_timer {
            return false;
        }

        if let Some(category) = &self.category {
            let Some(points) = snapshot.category_points.get(category) else {
                return false;
            };
            if let Some(min_points) = self.min_points {
                if *points < min_points {
                    return false;
                }
            }
        }

        if let (Some(action), Some(count)) = (&self.action, self.count) {
            if snapshot.action_counts.get(action).copied().unwrap_or(0) < count {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::{BadgeCriteria, BadgeTier, ContributorSnapshot};

    fn snapshot() -> ContributorSnapshot {
        let mut snapshot = ContributorSnapshot {
            total_points: 120,
            current_streak: 6,
            is_first_timer: false,
            ..ContributorSnapshot::default()
        };
        snapshot.category_points.insert("review".to_string(), 45);
        snapshot.action_counts.insert("review_detailed".to_string(), 3);
        snapshot
    }

    #[test]
    fn min_points_gates_on_lifetime_total() {
        let earned = BadgeCriteria { min_points: Some(100), ..BadgeCriteria::default() };
        let unearned = BadgeCriteria { min_points: Some(500), ..BadgeCriteria::default() };

        assert!(earned.is_met(&snapshot()));
        assert!(!unearned.is_met(&snapshot()));
    }

    #[test]
    fn category_criteria_require_category_points() {
        let earned = BadgeCriteria {
            category: Some("review".to_string()),
            min_points: Some(40),
            ..BadgeCriteria::default()
        };
        let wrong_category = BadgeCriteria {
            category: Some("documentation".to_string()),
            min_points: Some(1),
            ..BadgeCriteria::default()
        };
        let too_few_in_category = BadgeCriteria {
            category: Some("review".to_string()),
            min_points: Some(60),
            ..BadgeCriteria::default()
        };

        assert!(earned.is_met(&snapshot()));
        assert!(!wrong_category.is_met(&snapshot()));
        assert!(!too_few_in_category.is_met(&snapshot()));
    }

    #[test]
    fn action_count_criteria_need_both_fields() {
        let earned = BadgeCriteria {
            action: Some("review_detailed".to_string()),
            count: Some(3),
            ..BadgeCriteria::default()
        };
        let unearned = BadgeCriteria {
            action: Some("review_detailed".to_string()),
            count: Some(10),
            ..BadgeCriteria::default()
        };
        let count_without_action =
            BadgeCriteria { count: Some(99), ..BadgeCriteria::default() };

        assert!(earned.is_met(&snapshot()));
        assert!(!unearned.is_met(&snapshot()));
        assert!(count_without_action.is_met(&snapshot()));
    }

    #[test]
    fn first_contribution_criterion_tracks_the_flag() {
        let criteria =
            BadgeCriteria { is_first_contribution: Some(true), ..BadgeCriteria::default() };

        let mut first_timer = snapshot();
        first_timer.is_first_timer = true;

        assert!(criteria.is_met(&first_timer));
        assert!(!criteria.is_met(&snapshot()));
    }

    #[test]
    fn streak_criterion_compares_current_streak() {
        let earned = BadgeCriteria { min_streak: Some(5), ..BadgeCriteria::default() };
        let unearned = BadgeCriteria { min_streak: Some(7), ..BadgeCriteria::default() };

        assert!(earned.is_met(&snapshot()));
        assert!(!unearned.is_met(&snapshot()));
    }

    #[test]
    fn criteria_round_trip_through_json() {
        let criteria = BadgeCriteria {
            category: Some("development".to_string()),
            min_points: Some(50),
            ..BadgeCriteria::default()
        };

        let json = serde_json::to_string(&criteria).unwrap();
        assert_eq!(json, r#"{"min_points":50,"category":"development"}"#);

        let decoded: BadgeCriteria = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, criteria);
    }

    #[test]
    fn tiers_order_from_bronze_upward() {
        assert!(BadgeTier::Bronze < BadgeTier::Silver);
        assert!(BadgeTier::Gold < BadgeTier::Platinum);
        assert_eq!(BadgeTier::Platinum.as_str(), "platinum");
    }
}
