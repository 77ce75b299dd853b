use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::records::{
    ActionType, Badge, ContributionRecord, Contributor, EarnedBadge, LeaderboardEntry,
    NewContribution,
};

pub mod action_type;
pub mod badge;
pub mod contribution;
pub mod contributor;

pub use action_type::SqlActionTypeRepository;
pub use badge::SqlBadgeRepository;
pub use contribution::SqlContributionRepository;
pub use contributor::SqlContributorRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ContributorRepository: Send + Sync {
    async fn get_or_create(&self, github_username: &str) -> Result<Contributor, RepositoryError>;

    async fn find_by_username(
        &self,
        github_username: &str,
    ) -> Result<Option<Contributor>, RepositoryError>;

    async fn add_points(&self, contributor_id: i64, points: i64) -> Result<(), RepositoryError>;

    /// Applies the daily streak rule for a contribution made on `day` and
    /// clears the first-timer flag. Returns the new current streak.
    async fn record_contribution_day(
        &self,
        contributor_id: i64,
        day: NaiveDate,
    ) -> Result<u32, RepositoryError>;

    /// Top contributors by lifetime points, with earned badge counts.
    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, RepositoryError>;
}

#[async_trait]
pub trait ContributionRepository: Send + Sync {
    async fn insert(&self, contribution: NewContribution) -> Result<i64, RepositoryError>;

    async fn list_recent(
        &self,
        contributor_id: i64,
        limit: u32,
    ) -> Result<Vec<ContributionRecord>, RepositoryError>;

    /// Final points summed per action category.
    async fn category_points(
        &self,
        contributor_id: i64,
    ) -> Result<HashMap<String, i64>, RepositoryError>;

    /// Contribution count per action name.
    async fn action_counts(
        &self,
        contributor_id: i64,
    ) -> Result<HashMap<String, i64>, RepositoryError>;
}

#[async_trait]
pub trait ActionTypeRepository: Send + Sync {
    async fn find(&self, action_name: &str) -> Result<Option<ActionType>, RepositoryError>;
    async fn list(&self) -> Result<Vec<ActionType>, RepositoryError>;
}

#[async_trait]
pub trait BadgeRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Badge>, RepositoryError>;

    async fn earned_by(&self, contributor_id: i64) -> Result<Vec<EarnedBadge>, RepositoryError>;

    /// Awards the badge once. Returns false when the contributor already
    /// holds it.
    async fn award(&self, contributor_id: i64, badge_id: i64) -> Result<bool, RepositoryError>;
}
