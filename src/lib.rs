//! flowboard - A live flow-metrics dashboard over a local issue log.
//!
//! This library provides the core functionality for the `flowboard` binary:
//! reading the append-only JSONL issue log, deriving flow metrics from it,
//! and serving them to browser clients that refresh when the log changes.

pub mod cli;
pub mod commands;
pub mod config;
pub mod gui;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod mutator;
pub mod storage;

/// Library-level error type for flowboard operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Mutator failed: {0}")]
    Mutator(String),

    #[error("No dashboard server is running")]
    NotRunning,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for flowboard operations.
pub type Result<T> = std::result::Result<T, Error>;
