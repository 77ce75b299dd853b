mod bootstrap;
mod http;

use std::future::IntoFuture;
use std::time::Duration;

use anyhow::Result;
use attache_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use attache_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    // Now bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    let auth_mode =
        if app.config.server.bearer_token.is_some() { "authenticated" } else { "anonymous" };
    let state = http::ApiState {
        activity_router: app.activity_router.clone(),
        db_pool: app.db_pool.clone(),
        agent_id: app.config.agent.agent_id.clone(),
        bearer_token: app.config.server.bearer_token.clone(),
    };

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        auth_mode,
        "attache-server listening"
    );

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, http::router(state)).with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    });
    let mut server_task = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server_task => {
            result??;
            anyhow::bail!("server exited before a shutdown signal");
        }
        result = wait_for_shutdown() => result?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "shutdown signal received, draining connections"
    );
    let _ = shutdown_tx.send(true);

    // In-flight requests get the configured drain window, then we exit.
    let drain_window = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(drain_window, &mut server_task).await {
        Ok(result) => result??,
        Err(_) => {
            server_task.abort();
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                correlation_id = "shutdown",
                drain_secs = app.config.server.graceful_shutdown_secs,
                "connections still open after the drain window, exiting"
            );
        }
    }

    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "attache-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
