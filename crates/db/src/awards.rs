use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use attache_core::points::{AwardBreakdown, ContributorSnapshot, PointsCalculator, Priority};

use crate::records::NewContribution;
use crate::repositories::{
    ActionTypeRepository, BadgeRepository, ContributionRepository, ContributorRepository,
    RepositoryError, SqlActionTypeRepository, SqlBadgeRepository, SqlContributionRepository,
    SqlContributorRepository,
};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum AwardError {
    #[error("unknown action type `{0}`")]
    UnknownAction(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One award to record. Priority and speed adjustments apply only when the
/// caller supplies them; streak and first-timer bonuses always apply.
#[derive(Clone, Debug, Default)]
pub struct AwardRequest {
    pub github_username: String,
    pub action: String,
    pub priority: Option<Priority>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AwardOutcome {
    pub contribution_id: i64,
    pub contributor_id: i64,
    pub github_username: String,
    pub action: String,
    pub points_earned: i64,
    pub total_points: i64,
    pub current_streak: u32,
    pub new_badges: Vec<String>,
    pub breakdown: AwardBreakdown,
}

/// Records a contribution end to end: points calculation, the contribution
/// row, contributor totals and streak, then newly earned badges.
pub struct AwardService {
    contributors: SqlContributorRepository,
    contributions: SqlContributionRepository,
    action_types: SqlActionTypeRepository,
    badges: SqlBadgeRepository,
}

impl AwardService {
    pub fn new(pool: DbPool) -> Self {
        Self {
            contributors: SqlContributorRepository::new(pool.clone()),
            contributions: SqlContributionRepository::new(pool.clone()),
            action_types: SqlActionTypeRepository::new(pool.clone()),
            badges: SqlBadgeRepository::new(pool),
        }
    }

    pub async fn award(&self, request: AwardRequest) -> Result<AwardOutcome, AwardError> {
        self.award_on(request, Utc::now().date_naive()).await
    }

    /// Same as [`award`](Self::award) with an explicit contribution day,
    /// so streak behavior is testable without a real clock.
    pub async fn award_on(
        &self,
        request: AwardRequest,
        day: NaiveDate,
    ) -> Result<AwardOutcome, AwardError> {
        let contributor = self.contributors.get_or_create(&request.github_username).await?;
        let action = self
            .action_types
            .find(&request.action)
            .await?
            .ok_or_else(|| AwardError::UnknownAction(request.action.clone()))?;

        let mut calculator = PointsCalculator::new(action.base_points);
        if let Some(priority) = request.priority {
            calculator = calculator.apply_priority(priority);
        }
        if let (Some(created_at), Some(completed_at)) = (request.created_at, request.completed_at)
        {
            calculator = calculator.apply_speed_bonus(created_at, completed_at);
        }
        let breakdown = calculator.finish(contributor.current_streak, contributor.is_first_timer);

        let mut metadata = match request.metadata {
            Some(Value::Object(map)) => Value::Object(map),
            Some(other) => json!({ "context": other }),
            None => json!({}),
        };
        metadata["bonuses"] = Value::String(breakdown.bonus_summary());
        if let Some(priority) = request.priority {
            metadata["priority"] = Value::String(priority.as_str().to_string());
        }

        let contribution_id = self
            .contributions
            .insert(NewContribution {
                contributor_id: contributor.id,
                action_type: action.action_name.clone(),
                points_earned: breakdown.base_points,
                multiplier: breakdown.multiplier,
                final_points: breakdown.final_points,
                metadata: Some(metadata),
            })
            .await?;

        self.contributors.add_points(contributor.id, breakdown.final_points).await?;
        let current_streak =
            self.contributors.record_contribution_day(contributor.id, day).await?;

        // Badge criteria see the post-award totals, except the first-timer
        // flag which reflects this award (it is already cleared in the row).
        let updated = self
            .contributors
            .find_by_username(&request.github_username)
            .await?
            .ok_or_else(|| {
                RepositoryError::Decode(format!(
                    "contributor `{}` vanished after award",
                    request.github_username
                ))
            })?;
        let snapshot = ContributorSnapshot {
            total_points: updated.total_points,
            current_streak,
            is_first_timer: contributor.is_first_timer,
            category_points: self.contributions.category_points(contributor.id).await?,
            action_counts: self.contributions.action_counts(contributor.id).await?,
        };

        let held: Vec<i64> =
            self.badges.earned_by(contributor.id).await?.iter().map(|e| e.badge.id).collect();
        let mut new_badges = Vec::new();
        for badge in self.badges.list_all().await? {
            if held.contains(&badge.id) {
                continue;
            }
            let met = badge.criteria.as_ref().is_some_and(|c| c.is_met(&snapshot));
            if met && self.badges.award(contributor.id, badge.id).await? {
                new_badges.push(badge.name);
            }
        }

        Ok(AwardOutcome {
            contribution_id,
            contributor_id: contributor.id,
            github_username: updated.github_username,
            action: action.action_name,
            points_earned: breakdown.final_points,
            total_points: updated.total_points,
            current_streak,
            new_badges,
            breakdown,
        })
    }
}
