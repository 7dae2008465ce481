//! Crate-wide error type for storage, configuration and setup paths.
//! The translate entry point never returns these; it degrades to pass-through.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parsing error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid language code: {0:?}")]
    InvalidLanguage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
