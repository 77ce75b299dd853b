pub mod awards;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod records;
pub mod repositories;

pub use awards::{AwardError, AwardOutcome, AwardRequest, AwardService};
pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{ContributorSeedInfo, DemoSeedDataset, SeedResult, VerificationResult};
pub use repositories::{
    ActionTypeRepository, BadgeRepository, ContributionRepository, ContributorRepository,
    RepositoryError, SqlActionTypeRepository, SqlBadgeRepository, SqlContributionRepository,
    SqlContributorRepository,
};
