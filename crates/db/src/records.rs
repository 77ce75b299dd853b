use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use attache_core::points::{BadgeCriteria, BadgeTier};

/// One row in `contributors`. Streak fields follow the daily streak rule;
/// `is_first_timer` flips off permanently after the first recorded award.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub id: i64,
    pub github_username: String,
    pub total_points: i64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub is_first_timer: bool,
    pub first_contribution_date: Option<DateTime<Utc>>,
    pub last_contribution_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionType {
    pub id: i64,
    pub action_name: String,
    pub description: String,
    pub category: String,
    pub base_points: i64,
}

/// One row in `contributions`, joined with the action's description and
/// category for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub id: i64,
    pub contributor_id: i64,
    pub action_type: String,
    pub points_earned: i64,
    pub multiplier: f64,
    pub final_points: i64,
    pub metadata: Option<serde_json::Value>,
    pub contribution_date: DateTime<Utc>,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// Insert payload for `contributions`. `points_earned` is the base before
/// the multiplier; `final_points` already includes flat bonuses.
#[derive(Clone, Debug)]
pub struct NewContribution {
    pub contributor_id: i64,
    pub action_type: String,
    pub points_earned: i64,
    pub multiplier: f64,
    pub final_points: i64,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub tier: BadgeTier,
    pub points_required: i64,
    pub criteria: Option<BadgeCriteria>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EarnedBadge {
    pub badge: Badge,
    pub awarded_date: DateTime<Utc>,
}

/// One leaderboard row: contributor standing plus earned badge count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub github_username: String,
    pub total_points: i64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub badge_count: i64,
}
