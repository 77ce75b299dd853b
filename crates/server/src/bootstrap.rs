use std::sync::Arc;

use attache_agent::{AgentAdapter, AgentError};
use attache_core::config::{AppConfig, ConfigError, LoadOptions};
use attache_db::{connect_with_settings, migrations, DbPool};
use attache_hosting::{default_router, ActivityRouter, MemoryConversationStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub activity_router: Arc<ActivityRouter>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("agent client initialization failed: {0}")]
    Agent(#[source] AgentError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let adapter = AgentAdapter::from_config(&config.agent).map_err(BootstrapError::Agent)?;
    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        provider = config.agent.provider.as_str(),
        model = %config.agent.model,
        agent_id = %config.agent.agent_id,
        "agent client initialized"
    );

    let store = Arc::new(MemoryConversationStore::default());
    let activity_router = Arc::new(default_router(store, Arc::new(adapter)));

    Ok(Application { config, db_pool, activity_router })
}
