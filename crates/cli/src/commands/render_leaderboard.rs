use std::fs;

use chrono::Utc;
use tera::{Context, Tera};

use attache_core::config::{AppConfig, LoadOptions};
use attache_db::records::LeaderboardEntry;
use attache_db::{connect_with_settings, migrations, ContributorRepository, SqlContributorRepository};

use crate::commands::CommandResult;

const START_MARKER: &str = "<!-- LEADERBOARD_START -->";
const END_MARKER: &str = "<!-- LEADERBOARD_END -->";
const LEADERBOARD_TEMPLATE: &str = include_str!("../../../../templates/leaderboard.md.tera");
const DEFAULT_README: &str = "README.md";
const DEFAULT_LIMIT: u32 = 10;

pub fn run(readme: Option<&str>, limit: Option<u32>) -> CommandResult {
    let readme_path = readme.unwrap_or(DEFAULT_README);
    let limit = limit.unwrap_or(DEFAULT_LIMIT);

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "render-leaderboard",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let readme_text = match fs::read_to_string(readme_path) {
        Ok(text) => text,
        Err(error) => {
            return CommandResult::failure(
                "render-leaderboard",
                "readme_io",
                format!("could not read `{readme_path}`: {error}"),
                5,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "render-leaderboard",
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

    let entries = match result {
        Ok(entries) => entries,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("render-leaderboard", error_class, message, exit_code);
        }
    };

    let generated_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let rendered = match render_table(&entries, &generated_at) {
        Ok(rendered) => rendered,
        Err(error) => {
            return CommandResult::failure(
                "render-leaderboard",
                "template_render",
                error.to_string(),
                5,
            );
        }
    };

    let spliced = match splice_between_markers(&readme_text, &rendered) {
        Ok(spliced) => spliced,
        Err(message) => {
            return CommandResult::failure("render-leaderboard", "marker_missing", message, 6);
        }
    };

    if let Err(error) = fs::write(readme_path, spliced) {
        return CommandResult::failure(
            "render-leaderboard",
            "readme_io",
            format!("could not write `{readme_path}`: {error}"),
            5,
        );
    }

    CommandResult::success(
        "render-leaderboard",
        format!(
            "leaderboard with {} contributors rendered into `{}`",
            entries.len(),
            readme_path
        ),
    )
}

fn render_table(entries: &[LeaderboardEntry], generated_at: &str) -> Result<String, tera::Error> {
    let mut context = Context::new();
    context.insert("entries", entries);
    context.insert("generated_at", generated_at);
    Tera::one_off(LEADERBOARD_TEMPLATE, &context, false)
}

/// Replaces whatever sits between the two markers, keeping the markers in
/// place so the section can be rewritten again later.
fn splice_between_markers(readme: &str, rendered: &str) -> Result<String, String> {
    let start = readme
        .find(START_MARKER)
        .ok_or_else(|| format!("README is missing the `{START_MARKER}` marker"))?;
    let after_start = start + START_MARKER.len();
    let end = readme[after_start..]
        .find(END_MARKER)
        .map(|offset| after_start + offset)
        .ok_or_else(|| format!("README is missing the `{END_MARKER}` marker"))?;

    let mut spliced = String::with_capacity(readme.len() + rendered.len());
    spliced.push_str(&readme[..after_start]);
    spliced.push('\n');
    spliced.push_str(rendered.trim_end());
    spliced.push('\n');
    spliced.push_str(&readme[end..]);
    Ok(spliced)
}
