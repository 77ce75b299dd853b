use serde_json::Value;

use attache_core::config::{AppConfig, LoadOptions};
use attache_db::{connect_with_settings, migrations, ContributorRepository, SqlContributorRepository};

use crate::commands::CommandResult;

const DEFAULT_LIMIT: u32 = 10;

pub fn run(limit: Option<u32>) -> CommandResult {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "leaderboard",
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
                "leaderboard",
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

        let entries = SqlContributorRepository::new(pool.clone())
            .leaderboard(limit)
            .await
            .map_err(|error| ("leaderboard_query", error.to_string(), 5u8))?;

        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(entries)
    });

    match result {
        Ok(entries) => {
            let message = if entries.is_empty() {
                "leaderboard is empty".to_string()
            } else {
                let rows: Vec<String> = entries
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| {
                        format!(
                            "  - {}. {}: {} points (streak {}, badges {})",
                            index + 1,
                            entry.github_username,
                            entry.total_points,
                            entry.current_streak,
                            entry.badge_count
                        )
                    })
                    .collect();
                format!("top {} contributors:\n{}", entries.len(), rows.join("\n"))
            };
            let data = serde_json::to_value(&entries).unwrap_or(Value::Null);
            CommandResult::success_with_data("leaderboard", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("leaderboard", error_class, message, exit_code)
        }
    }
}
