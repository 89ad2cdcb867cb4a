use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::MAX_COLOUR_WEIGHT;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub embedding: EmbeddingConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub visual_model: String,
    pub text_model: String,
    pub image_base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct EngineConfig {
    pub diversity_cap: usize,
    pub max_outfits: usize,
    pub retrieval_tiers: Vec<usize>,
    pub colour_weight: f64,
    pub worker_concurrency: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub server_port: Option<u16>,
    pub embedding_base_url: Option<String>,
    pub worker_concurrency: Option<usize>,
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
                url: "sqlite://outfitter.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            embedding: EmbeddingConfig {
                base_url: "http://127.0.0.1:8500".to_string(),
                api_key: None,
                visual_model: "clip-ViT-B-32".to_string(),
                text_model: "all-MiniLM-L6-v2".to_string(),
                image_base_url: "http://127.0.0.1:9000/catalog".to_string(),
                timeout_secs: 30,
                max_retries: 3,
            },
            engine: EngineConfig {
                diversity_cap: crate::diversity::DEFAULT_DIVERSITY_CAP,
                max_outfits: crate::outfits::DEFAULT_MAX_OUTFITS,
                retrieval_tiers: crate::retrieval::DEFAULT_RETRIEVAL_TIERS.to_vec(),
                colour_weight: 0.0,
                worker_concurrency: 4,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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

/// Serializable view of the effective configuration with secrets masked.
#[derive(Debug, Serialize)]
pub struct RedactedConfig<'a> {
    pub database: &'a DatabaseConfig,
    pub server: &'a ServerConfig,
    pub embedding: RedactedEmbedding<'a>,
    pub engine: &'a EngineConfig,
    pub logging: &'a LoggingConfig,
}

#[derive(Debug, Serialize)]
pub struct RedactedEmbedding<'a> {
    pub base_url: &'a str,
    pub api_key: Option<&'static str>,
    pub visual_model: &'a str,
    pub text_model: &'a str,
    pub image_base_url: &'a str,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("outfitter.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn redacted(&self) -> RedactedConfig<'_> {
        RedactedConfig {
            database: &self.database,
            server: &self.server,
            embedding: RedactedEmbedding {
                base_url: &self.embedding.base_url,
                api_key: self.embedding.api_key.as_ref().map(|_| "<redacted>"),
                visual_model: &self.embedding.visual_model,
                text_model: &self.embedding.text_model,
                image_base_url: &self.embedding.image_base_url,
                timeout_secs: self.embedding.timeout_secs,
                max_retries: self.embedding.max_retries,
            },
            engine: &self.engine,
            logging: &self.logging,
        }
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

        if let Some(embedding) = patch.embedding {
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = base_url;
            }
            if let Some(api_key) = embedding.api_key {
                self.embedding.api_key = Some(secret_value(api_key));
            }
            if let Some(visual_model) = embedding.visual_model {
                self.embedding.visual_model = visual_model;
            }
            if let Some(text_model) = embedding.text_model {
                self.embedding.text_model = text_model;
            }
            if let Some(image_base_url) = embedding.image_base_url {
                self.embedding.image_base_url = image_base_url;
            }
            if let Some(timeout_secs) = embedding.timeout_secs {
                self.embedding.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = embedding.max_retries {
                self.embedding.max_retries = max_retries;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(diversity_cap) = engine.diversity_cap {
                self.engine.diversity_cap = diversity_cap;
            }
            if let Some(max_outfits) = engine.max_outfits {
                self.engine.max_outfits = max_outfits;
            }
            if let Some(retrieval_tiers) = engine.retrieval_tiers {
                self.engine.retrieval_tiers = retrieval_tiers;
            }
            if let Some(colour_weight) = engine.colour_weight {
                self.engine.colour_weight = colour_weight;
            }
            if let Some(worker_concurrency) = engine.worker_concurrency {
                self.engine.worker_concurrency = worker_concurrency;
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
        if let Some(value) = read_env("OUTFITTER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("OUTFITTER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_number("OUTFITTER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("OUTFITTER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_number("OUTFITTER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("OUTFITTER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("OUTFITTER_SERVER_PORT") {
            self.server.port = parse_number("OUTFITTER_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("OUTFITTER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_number("OUTFITTER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("OUTFITTER_EMBEDDING_BASE_URL") {
            self.embedding.base_url = value;
        }
        if let Some(value) = read_env("OUTFITTER_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("OUTFITTER_EMBEDDING_VISUAL_MODEL") {
            self.embedding.visual_model = value;
        }
        if let Some(value) = read_env("OUTFITTER_EMBEDDING_TEXT_MODEL") {
            self.embedding.text_model = value;
        }
        if let Some(value) = read_env("OUTFITTER_EMBEDDING_IMAGE_BASE_URL") {
            self.embedding.image_base_url = value;
        }
        if let Some(value) = read_env("OUTFITTER_EMBEDDING_TIMEOUT_SECS") {
            self.embedding.timeout_secs = parse_number("OUTFITTER_EMBEDDING_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("OUTFITTER_EMBEDDING_MAX_RETRIES") {
            self.embedding.max_retries = parse_number("OUTFITTER_EMBEDDING_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("OUTFITTER_ENGINE_DIVERSITY_CAP") {
            self.engine.diversity_cap = parse_number("OUTFITTER_ENGINE_DIVERSITY_CAP", &value)?;
        }
        if let Some(value) = read_env("OUTFITTER_ENGINE_MAX_OUTFITS") {
            self.engine.max_outfits = parse_number("OUTFITTER_ENGINE_MAX_OUTFITS", &value)?;
        }
        if let Some(value) = read_env("OUTFITTER_ENGINE_RETRIEVAL_TIERS") {
            self.engine.retrieval_tiers =
                parse_list("OUTFITTER_ENGINE_RETRIEVAL_TIERS", &value)?;
        }
        if let Some(value) = read_env("OUTFITTER_ENGINE_COLOUR_WEIGHT") {
            self.engine.colour_weight = parse_number("OUTFITTER_ENGINE_COLOUR_WEIGHT", &value)?;
        }
        if let Some(value) = read_env("OUTFITTER_ENGINE_WORKER_CONCURRENCY") {
            self.engine.worker_concurrency =
                parse_number("OUTFITTER_ENGINE_WORKER_CONCURRENCY", &value)?;
        }

        let log_level =
            read_env("OUTFITTER_LOGGING_LEVEL").or_else(|| read_env("OUTFITTER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("OUTFITTER_LOGGING_FORMAT").or_else(|| read_env("OUTFITTER_LOG_FORMAT"));
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
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(base_url) = overrides.embedding_base_url {
            self.embedding.base_url = base_url;
        }
        if let Some(worker_concurrency) = overrides.worker_concurrency {
            self.engine.worker_concurrency = worker_concurrency;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_embedding(&self.embedding)?;
        validate_engine(&self.engine)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("outfitter.toml"), PathBuf::from("config/outfitter.toml")]
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
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
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

fn validate_embedding(embedding: &EmbeddingConfig) -> Result<(), ConfigError> {
    for (key, url) in [
        ("embedding.base_url", &embedding.base_url),
        ("embedding.image_base_url", &embedding.image_base_url),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    if embedding.visual_model.trim().is_empty() || embedding.text_model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "embedding.visual_model and embedding.text_model are required".to_string(),
        ));
    }

    if embedding.timeout_secs == 0 || embedding.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "embedding.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let blank_key =
        embedding.api_key.as_ref().map(|key| key.expose_secret().trim().is_empty()).unwrap_or(false);
    if blank_key {
        return Err(ConfigError::Validation(
            "embedding.api_key must not be blank when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.diversity_cap == 0 {
        return Err(ConfigError::Validation(
            "engine.diversity_cap must be greater than zero".to_string(),
        ));
    }

    if engine.max_outfits == 0 {
        return Err(ConfigError::Validation(
            "engine.max_outfits must be greater than zero".to_string(),
        ));
    }

    if engine.retrieval_tiers.is_empty() || engine.retrieval_tiers.contains(&0) {
        return Err(ConfigError::Validation(
            "engine.retrieval_tiers must be a non-empty list of positive caps".to_string(),
        ));
    }

    if !(0.0..=MAX_COLOUR_WEIGHT).contains(&engine.colour_weight) {
        return Err(ConfigError::Validation(format!(
            "engine.colour_weight must be in range 0..={MAX_COLOUR_WEIGHT}"
        )));
    }

    if engine.worker_concurrency == 0 {
        return Err(ConfigError::Validation(
            "engine.worker_concurrency must be greater than zero".to_string(),
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_list(key: &str, value: &str) -> Result<Vec<usize>, ConfigError> {
    value.split(',').map(|item| parse_number(key, item)).collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    embedding: Option<EmbeddingPatch>,
    engine: Option<EnginePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    visual_model: Option<String>,
    text_model: Option<String>,
    image_base_url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    diversity_cap: Option<usize>,
    max_outfits: Option<usize>,
    retrieval_tiers: Option<Vec<usize>>,
    colour_weight: Option<f64>,
    worker_concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
