use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub provider: AgentProvider,
    pub agent_id: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// MCP tool-server endpoints connected around each invocation.
    pub tool_servers: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    /// When set, `POST /api/messages` requires this bearer token.
    /// When absent the server runs in anonymous mode.
    pub bearer_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentProvider {
    Anthropic,
    OpenAi,
    Perplexity,
}

impl AgentProvider {
    /// Environment variable conventionally holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Perplexity => "PERPLEXITY_API_KEY",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Perplexity => "perplexity",
        }
    }

    /// API base used when `agent.base_url` is not configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Perplexity => "https://api.perplexity.ai",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub agent_provider: Option<AgentProvider>,
    pub agent_model: Option<String>,
    pub agent_api_key: Option<String>,
    pub bearer_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://attache.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            agent: AgentConfig {
                provider: AgentProvider::Anthropic,
                agent_id: "attache-agent".to_string(),
                model: "claude-sonnet-4-20250514".to_string(),
                api_key: None,
                base_url: None,
                system_prompt: None,
                max_tokens: 1024,
                timeout_secs: 60,
                max_retries: 2,
                tool_servers: Vec::new(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3978,
                graceful_shutdown_secs: 15,
                bearer_token: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for AgentProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "perplexity" => Ok(Self::Perplexity),
            other => Err(ConfigError::Validation(format!(
                "unsupported agent provider `{other}` (expected anthropic|openai|perplexity)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("attache.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(provider) = agent.provider {
                self.agent.provider = provider;
            }
            if let Some(agent_id) = agent.agent_id {
                self.agent.agent_id = agent_id;
            }
            if let Some(model) = agent.model {
                self.agent.model = model;
            }
            if let Some(api_key_value) = agent.api_key {
                self.agent.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = agent.base_url {
                self.agent.base_url = Some(base_url);
            }
            if let Some(system_prompt) = agent.system_prompt {
                self.agent.system_prompt = Some(system_prompt);
            }
            if let Some(max_tokens) = agent.max_tokens {
                self.agent.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = agent.timeout_secs {
                self.agent.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = agent.max_retries {
                self.agent.max_retries = max_retries;
            }
            if let Some(tool_servers) = agent.tool_servers {
                self.agent.tool_servers = tool_servers;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(bearer_token_value) = server.bearer_token {
                self.server.bearer_token = Some(secret_value(bearer_token_value));
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ATTACHE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ATTACHE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("ATTACHE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ATTACHE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ATTACHE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ATTACHE_AGENT_PROVIDER") {
            self.agent.provider = value.parse()?;
        }
        let agent_id = read_env("ATTACHE_AGENT_ID").or_else(|| read_env("AGENT_ID"));
        if let Some(value) = agent_id {
            self.agent.agent_id = value;
        }
        if let Some(value) = read_env("ATTACHE_AGENT_MODEL") {
            self.agent.model = value;
        }
        if let Some(value) = read_env("ATTACHE_AGENT_API_KEY") {
            self.agent.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ATTACHE_AGENT_BASE_URL") {
            self.agent.base_url = Some(value);
        }
        if let Some(value) = read_env("ATTACHE_AGENT_SYSTEM_PROMPT") {
            self.agent.system_prompt = Some(value);
        }
        if let Some(value) = read_env("ATTACHE_AGENT_MAX_TOKENS") {
            self.agent.max_tokens = parse_u32("ATTACHE_AGENT_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("ATTACHE_AGENT_TIMEOUT_SECS") {
            self.agent.timeout_secs = parse_u64("ATTACHE_AGENT_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ATTACHE_AGENT_MAX_RETRIES") {
            self.agent.max_retries = parse_u32("ATTACHE_AGENT_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("ATTACHE_AGENT_TOOL_SERVERS") {
            self.agent.tool_servers = value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect();
        }
        // Conventional provider variables fill the key when nothing more
        // specific was given.
        if self.agent.api_key.is_none() {
            if let Some(value) = read_env(self.agent.provider.api_key_env()) {
                self.agent.api_key = Some(secret_value(value));
            }
        }

        if let Some(value) = read_env("ATTACHE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("ATTACHE_SERVER_PORT").or_else(|| read_env("PORT"));
        if let Some(value) = port {
            self.server.port = parse_u16("PORT", &value)?;
        }
        if let Some(value) = read_env("ATTACHE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ATTACHE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        let bearer = read_env("ATTACHE_BEARER_TOKEN").or_else(|| read_env("BEARER_TOKEN"));
        if let Some(value) = bearer {
            self.server.bearer_token = Some(secret_value(value));
        }

        let log_level =
            read_env("ATTACHE_LOGGING_LEVEL").or_else(|| read_env("ATTACHE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ATTACHE_LOGGING_FORMAT").or_else(|| read_env("ATTACHE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(provider) = overrides.agent_provider {
            self.agent.provider = provider;
        }
        if let Some(model) = overrides.agent_model {
            self.agent.model = model;
        }
        if let Some(api_key) = overrides.agent_api_key {
            self.agent.api_key = Some(secret_value(api_key));
        }
        if let Some(bearer_token) = overrides.bearer_token {
            self.server.bearer_token = Some(secret_value(bearer_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    if let Some(from_env) = read_env("ATTACHE_CONFIG") {
        let path = PathBuf::from(from_env);
        return path.exists().then_some(path);
    }

    [PathBuf::from("attache.toml"), PathBuf::from("config/attache.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite:") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite:...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.timeout_secs == 0 || agent.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "agent.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if agent.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "agent.max_tokens must be greater than zero".to_string(),
        ));
    }

    if agent.model.trim().is_empty() {
        return Err(ConfigError::Validation("agent.model must not be empty".to_string()));
    }

    let missing = agent
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(format!(
            "agent.api_key is required for the `{}` provider. Set {} (or ATTACHE_AGENT_API_KEY)",
            agent.provider.as_str(),
            agent.provider.api_key_env(),
        )));
    }

    for server in &agent.tool_servers {
        if !server.starts_with("http://") && !server.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "agent.tool_servers entries must be http(s) URLs, got `{server}`"
            )));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if let Some(token) = &server.bearer_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.bearer_token must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    provider: Option<AgentProvider>,
    agent_id: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    system_prompt: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    tool_servers: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    bearer_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
