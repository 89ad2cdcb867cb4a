pub mod config;
pub mod migrate;
pub mod recommend;
pub mod recompute;
pub mod seed;

use outfitter_core::config::{AppConfig, LoadOptions};
use outfitter_core::errors::ApplicationError;
use outfitter_db::{connect_with_config, migrations, DbPool};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// `(error_class, message, exit_code)` carried out of an async command body.
pub(crate) type Failure = (&'static str, String, u8);

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::ok(command, message.into(), None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        Self::ok(command, message.into(), serde_json::to_value(data).ok())
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::error(command, error_class, message.into(), exit_code, None)
    }

    pub fn failure_with_data(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: &impl Serialize,
    ) -> Self {
        Self::error(command, error_class, message.into(), exit_code, serde_json::to_value(data).ok())
    }

    fn ok(command: &str, message: String, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    fn error(
        command: &str,
        error_class: &str,
        message: String,
        exit_code: u8,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message,
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn from_failure(command: &str, (error_class, message, exit_code): Failure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads configuration and a current-thread runtime, or the failure to print.
pub(crate) fn prepare(command: &str) -> Result<(AppConfig, Runtime), CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    Ok((config, runtime))
}

/// Connects and applies pending migrations.
pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok(pool)
}

pub(crate) fn application_failure(error: &ApplicationError) -> Failure {
    match error {
        ApplicationError::NotFound(_) => ("not_found", error.to_string(), 7),
        ApplicationError::Domain(_) => ("domain", error.to_string(), 8),
        ApplicationError::Persistence(_) => ("persistence", error.to_string(), 4),
        ApplicationError::Integration(_) => ("integration", error.to_string(), 9),
        ApplicationError::Configuration(_) => ("config_validation", error.to_string(), 2),
    }
}

pub(crate) fn invalid_input(message: String) -> Failure {
    ("invalid_input", message, 8)
}

#[cfg(test)]
mod tests {
    use outfitter_core::errors::{ApplicationError, DomainError};
    use serde_json::Value;

    use super::{application_failure, CommandResult};

    #[test]
    fn payload_omits_data_when_absent() {
        let result = CommandResult::success("migrate", "applied pending migrations");
        let payload: Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(payload["status"], "ok");
        assert!(payload["error_class"].is_null());
        assert!(payload.get("data").is_none());
    }

    #[test]
    fn failure_payload_carries_class_code_and_data() {
        let result =
            CommandResult::failure_with_data("recompute", "recompute_partial", "1 failed", 9, &[1, 2]);
        assert_eq!(result.exit_code, 9);
        let payload: Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "recompute_partial");
        assert_eq!(payload["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn application_errors_map_to_stable_exit_codes() {
        assert_eq!(application_failure(&ApplicationError::NotFound("p".into())).2, 7);
        assert_eq!(application_failure(&DomainError::EmptyVector.into()).2, 8);
        assert_eq!(application_failure(&ApplicationError::Persistence("db".into())).0, "persistence");
    }
}
