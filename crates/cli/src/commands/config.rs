use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use shopwise_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    CommandResult { exit_code: 0, output: render(&config, config_file_path) }
}

pub fn render(config: &AppConfig, config_file_path: Option<PathBuf>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let line = |key: &str, value: &str, env_keys: &[&str]| {
        render_line(
            key,
            value,
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()),
        )
    };

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(line("llm.provider", config.llm.provider.as_str(), &["SHOPWISE_LLM_PROVIDER"]));
    lines.push(line("llm.model", &config.llm.model, &["SHOPWISE_LLM_MODEL"]));
    lines.push(line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        &["SHOPWISE_LLM_BASE_URL"],
    ));
    let api_key = match &config.llm.api_key {
        Some(key) => redact_token(key.expose_secret()),
        None => "<unset>".to_string(),
    };
    lines.push(line("llm.api_key", &api_key, &["SHOPWISE_LLM_API_KEY"]));
    lines.push(line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        &["SHOPWISE_LLM_TIMEOUT_SECS"],
    ));

    lines.push(line(
        "server.bind_address",
        &config.server.bind_address,
        &["SHOPWISE_SERVER_BIND_ADDRESS"],
    ));
    lines.push(line("server.port", &config.server.port.to_string(), &["SHOPWISE_SERVER_PORT"]));
    lines.push(line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        &["SHOPWISE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    ));

    lines.push(line(
        "search.source_timeout_ms",
        &config.search.source_timeout_ms.to_string(),
        &["SHOPWISE_SEARCH_SOURCE_TIMEOUT_MS"],
    ));
    lines.push(line(
        "search.limit_per_source",
        &config.search.limit_per_source.to_string(),
        &["SHOPWISE_SEARCH_LIMIT_PER_SOURCE"],
    ));
    lines.push(line(
        "search.demo_catalog",
        &config.search.demo_catalog.to_string(),
        &["SHOPWISE_SEARCH_DEMO_CATALOG"],
    ));
    let http_sources = if config.search.http_sources.is_empty() {
        "<none>".to_string()
    } else {
        config
            .search
            .http_sources
            .iter()
            .map(|source| format!("{}@{}", source.id, source.base_url))
            .collect::<Vec<_>>()
            .join(", ")
    };
    lines.push(line("search.http_sources", &http_sources, &[]));

    let weights = [
        ("ranking.cost", config.ranking.cost, "SHOPWISE_RANKING_COST"),
        ("ranking.delivery", config.ranking.delivery, "SHOPWISE_RANKING_DELIVERY"),
        ("ranking.preference", config.ranking.preference, "SHOPWISE_RANKING_PREFERENCE"),
        ("ranking.coherence", config.ranking.coherence, "SHOPWISE_RANKING_COHERENCE"),
    ];
    for (key, weight, env_key) in weights {
        lines.push(line(key, &weight.to_string(), &[env_key]));
    }

    lines.push(line(
        "completion.max_turns",
        &config.completion.max_turns.to_string(),
        &["SHOPWISE_COMPLETION_MAX_TURNS"],
    ));
    lines.push(line(
        "completion.sufficiency_threshold",
        &config.completion.sufficiency_threshold.to_string(),
        &["SHOPWISE_COMPLETION_SUFFICIENCY_THRESHOLD"],
    ));

    lines.push(line(
        "logging.level",
        &config.logging.level,
        &["SHOPWISE_LOGGING_LEVEL", "SHOPWISE_LOG_LEVEL"],
    ));
    lines.push(line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_lowercase(),
        &["SHOPWISE_LOGGING_FORMAT", "SHOPWISE_LOG_FORMAT"],
    ));

    lines.join("\n")
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
