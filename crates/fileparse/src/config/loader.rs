use std::path::{Path, PathBuf};

use crate::config::schema::{Config, StorageBackend};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub const CONFIG_PATH_ENV: &str = "FILEPARSE_CONFIG";
pub const HOST_ENV: &str = "FILEPARSE_HOST";
pub const PORT_ENV: &str = "FILEPARSE_PORT";
pub const UPLOAD_DIR_ENV: &str = "FILEPARSE_UPLOAD_DIR";
pub const DATABASE_ENV: &str = "FILEPARSE_DATABASE";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Resolves the process configuration.
///
/// The file comes from `cli_path`, else `FILEPARSE_CONFIG`; with neither set
/// the defaults are used. Environment overrides are applied last.
pub fn resolve_config(cli_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let path = cli_path.or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            load_config(&path)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Applies `FILEPARSE_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    if let Some(host) = lookup(HOST_ENV) {
        config.server.host = host;
    }
    if let Some(port) = lookup(PORT_ENV) {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            name: PORT_ENV,
            value: port.clone(),
        })?;
    }
    if let Some(dir) = lookup(UPLOAD_DIR_ENV) {
        config.storage.upload_dir = PathBuf::from(dir);
    }
    if let Some(db) = lookup(DATABASE_ENV) {
        if db.eq_ignore_ascii_case("memory") {
            config.storage.backend = StorageBackend::Memory;
        } else {
            config.storage.backend = StorageBackend::Sqlite;
            config.storage.database_path = Some(PathBuf::from(db));
        }
    }
    Ok(())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.host.trim().is_empty() {
        return Err(invalid("server.host must not be empty"));
    }
    if config.server.port == 0 {
        return Err(invalid("server.port must not be 0"));
    }
    if config.server.max_upload_bytes == 0 {
        return Err(invalid("server.max_upload_bytes must be at least 1"));
    }
    if config.storage.upload_dir.as_os_str().is_empty() {
        return Err(invalid("storage.upload_dir must not be empty"));
    }
    if config.engine.workers == 0 {
        return Err(invalid("engine.workers must be at least 1"));
    }
    if config.engine.batch_size == 0 {
        return Err(invalid("engine.batch_size must be at least 1"));
    }
    if config.engine.terminal_write_attempts < 2 {
        return Err(invalid("engine.terminal_write_attempts must be at least 2"));
    }
    if config.engine.job_timeout_secs == Some(0) {
        return Err(invalid("engine.job_timeout_secs must be at least 1"));
    }
    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}
