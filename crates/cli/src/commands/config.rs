use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use outfitter_core::config::{AppConfig, LoadOptions, RedactedConfig};
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

/// Config keys reported with their source, paired with the env variables that
/// can set them.
const TRACKED_KEYS: &[(&str, &[&str])] = &[
    ("database.url", &["OUTFITTER_DATABASE_URL"]),
    ("database.max_connections", &["OUTFITTER_DATABASE_MAX_CONNECTIONS"]),
    ("database.timeout_secs", &["OUTFITTER_DATABASE_TIMEOUT_SECS"]),
    ("server.bind_address", &["OUTFITTER_SERVER_BIND_ADDRESS"]),
    ("server.port", &["OUTFITTER_SERVER_PORT"]),
    ("server.graceful_shutdown_secs", &["OUTFITTER_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ("embedding.base_url", &["OUTFITTER_EMBEDDING_BASE_URL"]),
    ("embedding.api_key", &["OUTFITTER_EMBEDDING_API_KEY"]),
    ("embedding.visual_model", &["OUTFITTER_EMBEDDING_VISUAL_MODEL"]),
    ("embedding.text_model", &["OUTFITTER_EMBEDDING_TEXT_MODEL"]),
    ("embedding.image_base_url", &["OUTFITTER_EMBEDDING_IMAGE_BASE_URL"]),
    ("embedding.timeout_secs", &["OUTFITTER_EMBEDDING_TIMEOUT_SECS"]),
    ("embedding.max_retries", &["OUTFITTER_EMBEDDING_MAX_RETRIES"]),
    ("engine.diversity_cap", &["OUTFITTER_ENGINE_DIVERSITY_CAP"]),
    ("engine.max_outfits", &["OUTFITTER_ENGINE_MAX_OUTFITS"]),
    ("engine.retrieval_tiers", &["OUTFITTER_ENGINE_RETRIEVAL_TIERS"]),
    ("engine.colour_weight", &["OUTFITTER_ENGINE_COLOUR_WEIGHT"]),
    ("engine.worker_concurrency", &["OUTFITTER_ENGINE_WORKER_CONCURRENCY"]),
    ("logging.level", &["OUTFITTER_LOGGING_LEVEL", "OUTFITTER_LOG_LEVEL"]),
    ("logging.format", &["OUTFITTER_LOGGING_FORMAT", "OUTFITTER_LOG_FORMAT"]),
];

#[derive(Debug, Serialize)]
struct ConfigReport<'a> {
    config: RedactedConfig<'a>,
    sources: BTreeMap<&'static str, String>,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let sources = TRACKED_KEYS
        .iter()
        .map(|(key, env_keys)| {
            (*key, field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()))
        })
        .collect();

    CommandResult::success_with_data(
        "config",
        "effective config (source precedence: env > file > default)",
        &ConfigReport { config: config.redacted(), sources },
    )
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("outfitter.toml"), PathBuf::from("config/outfitter.toml")]
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
