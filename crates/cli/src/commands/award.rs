use chrono::{DateTime, Utc};
use serde_json::Value;

use attache_core::config::{AppConfig, LoadOptions};
use attache_core::points::Priority;
use attache_db::{connect_with_settings, migrations, AwardError, AwardRequest, AwardService};

use crate::commands::CommandResult;

pub fn run(
    action: &str,
    username: &str,
    priority: Option<&str>,
    created_at: Option<&str>,
    completed_at: Option<&str>,
) -> CommandResult {
    let priority = match priority.map(str::parse::<Priority>).transpose() {
        Ok(priority) => priority,
        Err(error) => {
            return CommandResult::failure("award", "argument_validation", error.to_string(), 2);
        }
    };
    let created_at = match parse_timestamp("--created-at", created_at) {
        Ok(value) => value,
        Err(message) => {
            return CommandResult::failure("award", "argument_validation", message, 2);
        }
    };
    let completed_at = match parse_timestamp("--completed-at", completed_at) {
        Ok(value) => value,
        Err(message) => {
            return CommandResult::failure("award", "argument_validation", message, 2);
        }
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "award",
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
                "award",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let request = AwardRequest {
        github_username: username.to_string(),
        action: action.to_string(),
        priority,
        created_at,
        completed_at,
        metadata: None,
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

        let outcome =
            AwardService::new(pool.clone()).award(request).await.map_err(|error| match &error {
                AwardError::UnknownAction(_) => ("unknown_action", error.to_string(), 2u8),
                AwardError::Repository(_) => ("award_execution", error.to_string(), 5u8),
            })?;

        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(outcome)
    });

    match result {
        Ok(outcome) => {
            let mut message = format!(
                "awarded {} points to {} for {} (total {}, streak {})",
                outcome.points_earned,
                outcome.github_username,
                outcome.action,
                outcome.total_points,
                outcome.current_streak
            );
            if !outcome.new_badges.is_empty() {
                message.push_str(&format!("; new badges: {}", outcome.new_badges.join(", ")));
            }
            let data = serde_json::to_value(&outcome).unwrap_or(Value::Null);
            CommandResult::success_with_data("award", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("award", error_class, message, exit_code)
        }
    }
}

fn parse_timestamp(flag: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    let Some(raw) = value else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| Some(parsed.with_timezone(&Utc)))
        .map_err(|error| format!("{flag} expects an RFC 3339 timestamp, got `{raw}`: {error}"))
}

#[cfg(test)]
mod tests {
    use super::parse_timestamp;

    #[test]
    fn timestamps_parse_from_rfc3339_in_any_offset() {
        let parsed = parse_timestamp("--created-at", Some("2025-06-01T12:00:00+02:00"))
            .expect("timestamp should parse")
            .expect("value should be present");
        assert_eq!(parsed.to_rfc3339(), "2025-06-01T10:00:00+00:00");
    }

    #[test]
    fn absent_timestamps_stay_absent() {
        assert_eq!(parse_timestamp("--created-at", None), Ok(None));
    }

    #[test]
    fn malformed_timestamps_name_the_flag() {
        let error = parse_timestamp("--completed-at", Some("yesterday"))
            .expect_err("should reject non-RFC 3339 input");
        assert!(error.contains("--completed-at"));
        assert!(error.contains("`yesterday`"));
    }
}
