pub mod config;
pub mod forecast;
pub mod migrate;
pub mod pricing;
pub mod recommend;
pub mod route;
pub mod seed;
pub mod segments;

use serde::Serialize;

use mercato_core::config::{EngineConfig, LoadOptions};
use mercato_db::{connect_from_config, DbPool, SqlCommerceStore};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<T: Serialize> {
    command: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome::<()> {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Success carrying a machine-readable payload under `data`.
    pub fn with_data<T: Serialize>(
        command: &str,
        message: impl Into<String>,
        data: T,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome::<()> {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload<T: Serialize>(payload: CommandOutcome<T>) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Failure carried through a command's async body: error class, message,
/// and process exit code.
pub(crate) type CommandFailure = (&'static str, String, u8);

pub(crate) fn load_config(command: &str) -> Result<EngineConfig, Box<CommandResult>> {
    match EngineConfig::load(LoadOptions::default()) {
        Ok(config) => {
            crate::init_logging(&config);
            Ok(config)
        }
        Err(error) => Err(Box::new(CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        ))),
    }
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, Box<CommandResult>> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        Box::new(CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        ))
    })
}

pub(crate) async fn connect_pool(config: &EngineConfig) -> Result<DbPool, CommandFailure> {
    connect_from_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4))
}

pub(crate) async fn open_store(
    config: &EngineConfig,
) -> Result<SqlCommerceStore, CommandFailure> {
    Ok(SqlCommerceStore::new(connect_pool(config).await?))
}
