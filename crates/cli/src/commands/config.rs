use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use datachat_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// One rendered setting: dotted key, display value, env vars consulted (highest priority first).
struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Entry {
    Entry { key, value: value.into(), env_keys }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let entries = [
        entry("database.url", &config.database.url, &["DATACHAT_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["DATACHAT_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["DATACHAT_DATABASE_TIMEOUT_SECS"],
        ),
        entry("llm.provider", format!("{:?}", config.llm.provider), &["DATACHAT_LLM_PROVIDER"]),
        entry("llm.model", &config.llm.model, &["DATACHAT_LLM_MODEL", "MODEL_NAME"]),
        entry(
            "llm.base_url",
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
            &["DATACHAT_LLM_BASE_URL", "OLLAMA_BASE_URL"],
        ),
        entry("llm.api_key", api_key, &["DATACHAT_LLM_API_KEY"]),
        entry("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["DATACHAT_LLM_TIMEOUT_SECS"]),
        entry("llm.max_retries", config.llm.max_retries.to_string(), &["DATACHAT_LLM_MAX_RETRIES"]),
        entry("server.bind_address", &config.server.bind_address, &["DATACHAT_SERVER_BIND_ADDRESS"]),
        entry("server.port", config.server.port.to_string(), &["DATACHAT_SERVER_PORT"]),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["DATACHAT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry(
            "server.cors_allow_origins",
            config.server.cors_allow_origins.join(","),
            &["DATACHAT_SERVER_CORS_ALLOW_ORIGINS"],
        ),
        entry(
            "pipeline.fetch_limit",
            config.pipeline.fetch_limit.to_string(),
            &["DATACHAT_PIPELINE_FETCH_LIMIT"],
        ),
        entry(
            "pipeline.request_timeout_secs",
            config.pipeline.request_timeout_secs.to_string(),
            &["DATACHAT_PIPELINE_REQUEST_TIMEOUT_SECS"],
        ),
        entry(
            "pipeline.query_timeout_secs",
            config.pipeline.query_timeout_secs.to_string(),
            &["DATACHAT_PIPELINE_QUERY_TIMEOUT_SECS"],
        ),
        entry("memory.backend", format!("{:?}", config.memory.backend), &["DATACHAT_MEMORY_BACKEND"]),
        entry("logging.level", &config.logging.level, &["DATACHAT_LOGGING_LEVEL", "DATACHAT_LOG_LEVEL"]),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["DATACHAT_LOGGING_FORMAT", "DATACHAT_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.iter().map(|entry| {
        render_line(
            entry.key,
            &entry.value,
            field_source(
                entry.key,
                entry.env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        )
    }));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("datachat.toml"), PathBuf::from("config/datachat.toml")]
        .into_iter()
        .find(|path| path.exists())
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
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
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

/// Keeps a dash-delimited prefix such as `sk-` so operators can tell key kinds apart.
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
