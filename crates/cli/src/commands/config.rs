use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use attache_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        field_source(
            "database.url",
            &["ATTACHE_DATABASE_URL"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        field_source(
            "database.max_connections",
            &["ATTACHE_DATABASE_MAX_CONNECTIONS"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        field_source(
            "database.timeout_secs",
            &["ATTACHE_DATABASE_TIMEOUT_SECS"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "agent.provider",
        config.agent.provider.as_str(),
        field_source(
            "agent.provider",
            &["ATTACHE_AGENT_PROVIDER"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "agent.agent_id",
        &config.agent.agent_id,
        field_source(
            "agent.agent_id",
            &["ATTACHE_AGENT_ID", "AGENT_ID"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "agent.model",
        &config.agent.model,
        field_source(
            "agent.model",
            &["ATTACHE_AGENT_MODEL"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "agent.base_url",
        config.agent.base_url.as_deref().unwrap_or("<unset>"),
        field_source(
            "agent.base_url",
            &["ATTACHE_AGENT_BASE_URL"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    let api_key = config
        .agent
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "agent.api_key",
        &api_key,
        field_source(
            "agent.api_key",
            &["ATTACHE_AGENT_API_KEY", config.agent.provider.api_key_env()],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    let tool_servers = if config.agent.tool_servers.is_empty() {
        "<none>".to_string()
    } else {
        config.agent.tool_servers.join(",")
    };
    lines.push(render_line(
        "agent.tool_servers",
        &tool_servers,
        field_source(
            "agent.tool_servers",
            &["ATTACHE_AGENT_TOOL_SERVERS"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        field_source(
            "server.bind_address",
            &["ATTACHE_SERVER_BIND_ADDRESS"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        field_source(
            "server.port",
            &["ATTACHE_SERVER_PORT", "PORT"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    let bearer_token = if config.server.bearer_token.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "server.bearer_token",
        bearer_token,
        field_source(
            "server.bearer_token",
            &["ATTACHE_BEARER_TOKEN", "BEARER_TOKEN"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source(
            "logging.level",
            &["ATTACHE_LOGGING_LEVEL", "ATTACHE_LOG_LEVEL"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        field_source(
            "logging.format",
            &["ATTACHE_LOGGING_FORMAT", "ATTACHE_LOG_FORMAT"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.join("\n")
}

/// Mirrors the loader's file resolution: explicit env path first, then the
/// two conventional locations.
fn detect_config_path() -> Option<PathBuf> {
    if let Some(from_env) = env::var_os("ATTACHE_CONFIG") {
        let path = PathBuf::from(from_env);
        if path.exists() {
            return Some(path);
        }
    }

    let root = PathBuf::from("attache.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/attache.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
