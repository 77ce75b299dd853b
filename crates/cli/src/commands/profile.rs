use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use attache_core::config::{AppConfig, LoadOptions};
use attache_core::points::BadgeTier;
use attache_db::{
    connect_with_settings, migrations, BadgeRepository, ContributionRepository,
    ContributorRepository, SqlBadgeRepository, SqlContributionRepository,
    SqlContributorRepository,
};

use crate::commands::CommandResult;

const RECENT_CONTRIBUTIONS: u32 = 5;

#[derive(Debug, Serialize)]
struct ProfileData {
    github_username: String,
    total_points: i64,
    current_streak: u32,
    longest_streak: u32,
    badges: Vec<ProfileBadge>,
    recent_contributions: Vec<ProfileContribution>,
}

#[derive(Debug, Serialize)]
struct ProfileBadge {
    name: String,
    tier: BadgeTier,
    awarded_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ProfileContribution {
    action: String,
    final_points: i64,
    contribution_date: DateTime<Utc>,
    description: Option<String>,
}

pub fn run(username: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "profile",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "profile",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let contributor = SqlContributorRepository::new(pool.clone())
            .find_by_username(username)
            .await
            .map_err(|error| ("profile_query", error.to_string(), 5u8))?
            .ok_or_else(|| {
                ("unknown_contributor", format!("no contributor named `{username}`"), 6u8)
            })?;

        let earned = SqlBadgeRepository::new(pool.clone())
            .earned_by(contributor.id)
            .await
            .map_err(|error| ("profile_query", error.to_string(), 5u8))?;
        let recent = SqlContributionRepository::new(pool.clone())
            .list_recent(contributor.id, RECENT_CONTRIBUTIONS)
            .await
            .map_err(|error| ("profile_query", error.to_string(), 5u8))?;

        pool.close().await;
        Ok::<_, (&'static str, String, u8)>((contributor, earned, recent))
    });

    match result {
        Ok((contributor, earned, recent)) => {
            let profile = ProfileData {
                github_username: contributor.github_username,
                total_points: contributor.total_points,
                current_streak: contributor.current_streak,
                longest_streak: contributor.longest_streak,
                badges: earned
                    .into_iter()
                    .map(|earned| ProfileBadge {
                        name: earned.badge.name,
                        tier: earned.badge.tier,
                        awarded_date: earned.awarded_date,
                    })
                    .collect(),
                recent_contributions: recent
                    .into_iter()
                    .map(|record| ProfileContribution {
                        action: record.action_type,
                        final_points: record.final_points,
                        contribution_date: record.contribution_date,
                        description: record.description,
                    })
                    .collect(),
            };
            let message = format!(
                "{}: {} points, streak {} (best {}), {} badges",
                profile.github_username,
                profile.total_points,
                profile.current_streak,
                profile.longest_streak,
                profile.badges.len()
            );
            let data = serde_json::to_value(&profile).unwrap_or(Value::Null);
            CommandResult::success_with_data("profile", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("profile", error_class, message, exit_code)
        }
    }
}
