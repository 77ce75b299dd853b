pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "attache",
    about = "Attache operator CLI",
    long_about = "Operate Attache contribution awards, leaderboard rendering, migrations, config inspection, and smoke validation.",
    after_help = "Examples:\n  attache award --action pr_merged --username octocat\n  attache leaderboard --limit 5\n  attache doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Record a contribution and report points, streak, and newly earned badges")]
    Award {
        #[arg(long, help = "Action type name, for example pr_merged or bug_fixed")]
        action: String,
        #[arg(long, help = "GitHub username credited with the contribution")]
        username: String,
        #[arg(long, help = "Priority multiplier label (LOW|MEDIUM|HIGH|CRITICAL)")]
        priority: Option<String>,
        #[arg(
            long,
            value_name = "RFC3339",
            help = "When the work item was opened; with --completed-at enables the speed bonus"
        )]
        created_at: Option<String>,
        #[arg(
            long,
            value_name = "RFC3339",
            help = "When the work item was completed; with --created-at enables the speed bonus"
        )]
        completed_at: Option<String>,
    },
    #[command(about = "Show a contributor's points, streaks, badges, and recent contributions")]
    Profile {
        #[arg(long, help = "GitHub username to look up")]
        username: String,
    },
    #[command(about = "Show the top contributors ordered by total points")]
    Leaderboard {
        #[arg(long, help = "Maximum number of rows (default 10)")]
        limit: Option<u32>,
    },
    #[command(about = "Rewrite the leaderboard section of the README between its markers")]
    RenderLeaderboard {
        #[arg(long, help = "Path of the README to rewrite (default README.md)")]
        readme: Option<String>,
        #[arg(long, help = "Maximum number of rows (default 10)")]
        limit: Option<u32>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load deterministic demo fixtures for the leaderboard tables")]
    Seed,
    #[command(about = "Run end-to-end readiness checks with per-check timing details")]
    Smoke,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, agent credentials, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Award { action, username, priority, created_at, completed_at } => {
            commands::award::run(
                &action,
                &username,
                priority.as_deref(),
                created_at.as_deref(),
                completed_at.as_deref(),
            )
        }
        Command::Profile { username } => commands::profile::run(&username),
        Command::Leaderboard { limit } => commands::leaderboard::run(limit),
        Command::RenderLeaderboard { readme, limit } => {
            commands::render_leaderboard::run(readme.as_deref(), limit)
        }
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
