use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::{
    CompletionPolicy, SufficiencyRule, DEFAULT_MAX_TURNS, DEFAULT_SUFFICIENCY_THRESHOLD,
};
use crate::domain::update::FieldName;
use crate::ranking::RankingWeights;

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["shopwise.toml", "config/shopwise.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub ranking: RankingWeights,
    pub completion: CompletionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub source_timeout_ms: u64,
    pub limit_per_source: usize,
    pub demo_catalog: bool,
    pub http_sources: Vec<HttpSourceConfig>,
}

impl SearchConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSourceConfig {
    pub id: String,
    pub base_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionConfig {
    pub max_turns: u32,
    pub sufficiency_threshold: u32,
    pub sufficiency_weights: BTreeMap<FieldName, u32>,
}

impl CompletionConfig {
    pub fn policy(&self) -> CompletionPolicy {
        CompletionPolicy::new(
            self.max_turns,
            SufficiencyRule {
                weights: self.sufficiency_weights.clone(),
                threshold: self.sufficiency_threshold,
            },
        )
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Rules,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
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
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub server_port: Option<u16>,
    pub demo_catalog: Option<bool>,
    pub max_turns: Option<u32>,
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
            llm: LlmConfig {
                provider: LlmProvider::Rules,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            search: SearchConfig {
                source_timeout_ms: 8_000,
                limit_per_source: 10,
                demo_catalog: true,
                http_sources: Vec::new(),
            },
            ranking: RankingWeights::default(),
            completion: CompletionConfig {
                max_turns: DEFAULT_MAX_TURNS,
                sufficiency_threshold: DEFAULT_SUFFICIENCY_THRESHOLD,
                sufficiency_weights: SufficiencyRule::default().weights,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rules" => Ok(Self::Rules),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected rules|openai|ollama)"
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
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
        }

        if let Some(search) = patch.search {
            if let Some(source_timeout_ms) = search.source_timeout_ms {
                self.search.source_timeout_ms = source_timeout_ms;
            }
            if let Some(limit_per_source) = search.limit_per_source {
                self.search.limit_per_source = limit_per_source;
            }
            if let Some(demo_catalog) = search.demo_catalog {
                self.search.demo_catalog = demo_catalog;
            }
            if let Some(http_sources) = search.http_sources {
                self.search.http_sources = http_sources;
            }
        }

        if let Some(ranking) = patch.ranking {
            if let Some(cost) = ranking.cost {
                self.ranking.cost = cost;
            }
            if let Some(delivery) = ranking.delivery {
                self.ranking.delivery = delivery;
            }
            if let Some(preference) = ranking.preference {
                self.ranking.preference = preference;
            }
            if let Some(coherence) = ranking.coherence {
                self.ranking.coherence = coherence;
            }
        }

        if let Some(completion) = patch.completion {
            if let Some(max_turns) = completion.max_turns {
                self.completion.max_turns = max_turns;
            }
            if let Some(sufficiency_threshold) = completion.sufficiency_threshold {
                self.completion.sufficiency_threshold = sufficiency_threshold;
            }
            if let Some(sufficiency_weights) = completion.sufficiency_weights {
                self.completion.sufficiency_weights = sufficiency_weights;
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
        if let Some(value) = read_env("SHOPWISE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SHOPWISE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SHOPWISE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SHOPWISE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SHOPWISE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SHOPWISE_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPWISE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SHOPWISE_SERVER_PORT") {
            self.server.port = parse_u16("SHOPWISE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SHOPWISE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPWISE_SEARCH_SOURCE_TIMEOUT_MS") {
            self.search.source_timeout_ms = parse_u64("SHOPWISE_SEARCH_SOURCE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_SEARCH_LIMIT_PER_SOURCE") {
            self.search.limit_per_source = parse_usize("SHOPWISE_SEARCH_LIMIT_PER_SOURCE", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_SEARCH_DEMO_CATALOG") {
            self.search.demo_catalog = parse_bool("SHOPWISE_SEARCH_DEMO_CATALOG", &value)?;
        }

        if let Some(value) = read_env("SHOPWISE_RANKING_COST") {
            self.ranking.cost = parse_f64("SHOPWISE_RANKING_COST", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_RANKING_DELIVERY") {
            self.ranking.delivery = parse_f64("SHOPWISE_RANKING_DELIVERY", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_RANKING_PREFERENCE") {
            self.ranking.preference = parse_f64("SHOPWISE_RANKING_PREFERENCE", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_RANKING_COHERENCE") {
            self.ranking.coherence = parse_f64("SHOPWISE_RANKING_COHERENCE", &value)?;
        }

        if let Some(value) = read_env("SHOPWISE_COMPLETION_MAX_TURNS") {
            self.completion.max_turns = parse_u32("SHOPWISE_COMPLETION_MAX_TURNS", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_COMPLETION_SUFFICIENCY_THRESHOLD") {
            self.completion.sufficiency_threshold =
                parse_u32("SHOPWISE_COMPLETION_SUFFICIENCY_THRESHOLD", &value)?;
        }

        let log_level =
            read_env("SHOPWISE_LOGGING_LEVEL").or_else(|| read_env("SHOPWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHOPWISE_LOGGING_FORMAT").or_else(|| read_env("SHOPWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(demo_catalog) = overrides.demo_catalog {
            self.search.demo_catalog = demo_catalog;
        }
        if let Some(max_turns) = overrides.max_turns {
            self.completion.max_turns = max_turns;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_search(&self.search)?;
        validate_ranking(&self.ranking)?;
        validate_completion(&self.completion)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file that [`AppConfig::load`] would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
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

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::Rules => {}
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for the ollama provider".to_string(),
                ));
            }
        }
    }

    if llm.provider != LlmProvider::Rules && llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(base_url) = &llm.base_url {
        validate_http_url("llm.base_url", base_url)?;
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    if search.source_timeout_ms == 0 || search.source_timeout_ms > 120_000 {
        return Err(ConfigError::Validation(
            "search.source_timeout_ms must be in range 1..=120000".to_string(),
        ));
    }

    if search.limit_per_source == 0 || search.limit_per_source > 100 {
        return Err(ConfigError::Validation(
            "search.limit_per_source must be in range 1..=100".to_string(),
        ));
    }

    if !search.demo_catalog && search.http_sources.is_empty() {
        return Err(ConfigError::Validation(
            "search needs at least one product source: enable search.demo_catalog or add \
             [[search.http_sources]]"
                .to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    for source in &search.http_sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "search.http_sources[].id must not be empty".to_string(),
            ));
        }
        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "search.http_sources contains duplicate id `{}`",
                source.id
            )));
        }
        validate_http_url("search.http_sources[].base_url", &source.base_url)?;
    }

    Ok(())
}

fn validate_ranking(ranking: &RankingWeights) -> Result<(), ConfigError> {
    let weights = [ranking.cost, ranking.delivery, ranking.preference, ranking.coherence];
    if weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
        return Err(ConfigError::Validation(
            "ranking weights must be finite and non-negative".to_string(),
        ));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(ConfigError::Validation(
            "ranking weights must not all be zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_completion(completion: &CompletionConfig) -> Result<(), ConfigError> {
    if completion.max_turns == 0 {
        return Err(ConfigError::Validation(
            "completion.max_turns must be greater than zero".to_string(),
        ));
    }
    if completion.sufficiency_threshold == 0 {
        return Err(ConfigError::Validation(
            "completion.sufficiency_threshold must be greater than zero".to_string(),
        ));
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

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    parse_env(key, value)
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    parse_env(key, value)
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    parse_env(key, value)
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    parse_env(key, value)
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    parse_env(key, value)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_env(key, value)
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    search: Option<SearchPatch>,
    ranking: Option<RankingPatch>,
    completion: Option<CompletionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    source_timeout_ms: Option<u64>,
    limit_per_source: Option<usize>,
    demo_catalog: Option<bool>,
    http_sources: Option<Vec<HttpSourceConfig>>,
}

#[derive(Debug, Default, Deserialize)]
struct RankingPatch {
    cost: Option<f64>,
    delivery: Option<f64>,
    preference: Option<f64>,
    coherence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionPatch {
    max_turns: Option<u32>,
    sufficiency_threshold: Option<u32>,
    sufficiency_weights: Option<BTreeMap<FieldName, u32>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
