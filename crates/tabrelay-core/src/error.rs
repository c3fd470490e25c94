//! Error types for the tab relay.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Tab host error: {0}")]
    Host(String),

    #[error("Process lookup failed for tab {tab_id}: {reason}")]
    ProcessLookup { tab_id: i64, reason: String },

    #[error("Process error: {0}")]
    Process(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
