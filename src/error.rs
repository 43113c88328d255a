use std::path::PathBuf;
use thiserror::Error;

/// Document-level failures while obtaining raw records. Always fatal for a run.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source document not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Failed to read source document {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source responded with HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected document shape: {0}")]
    Shape(String),
}

/// Destination failures. Abort the load; documents already written stay.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Destination unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid collection name: {0}")]
    InvalidName(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Document serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Error, Debug)]
pub enum LogFileError {
    #[error("Cannot create log directory '{}': {source}", path.display())]
    Dir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open log file: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, EtlError>;
