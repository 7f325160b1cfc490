use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileparseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Engine error: {0}")]
    Engine(#[from] crate::engine::EngineError),

    #[error("Repository error: {0}")]
    Repository(#[from] crate::repo::RepositoryError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Ingestion error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Failure raised by a content extractor.
///
/// Malformed input and I/O failures are kept apart so the engine can log
/// the cause precisely; every variant ends the job in `failed`.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("Extraction exceeded the {after_secs}s time limit")]
    TimedOut { after_secs: u64 },

    #[error("Extractor panicked: {message}")]
    Panicked { message: String },
}

impl ExtractError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
        }
    }

    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Short machine-friendly label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::MalformedInput { .. } => "malformed_input",
            ExtractError::Io { .. } => "io_failure",
            ExtractError::Cancelled => "cancelled",
            ExtractError::TimedOut { .. } => "timed_out",
            ExtractError::Panicked { .. } => "panicked",
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read upload body for '{path}': {reason}")]
    ReadBody { path: PathBuf, reason: String },

    #[error("Failed to release file '{path}': {source}")]
    ReleaseFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to persist upload: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to register upload: {0}")]
    Engine(#[from] crate::engine::EngineError),
}

pub type Result<T> = std::result::Result<T, FileparseError>;
