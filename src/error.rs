//! Error types for the order-flow engine

use thiserror::Error;

/// Top-level error type for the engine
#[derive(Error, Debug, Clone)]
pub enum BotError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Feed channel closed")]
    ChannelClosed,
}

/// Connection-specific errors
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    #[error("Failed to establish connection: {0}")]
    EstablishmentFailed(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Depth-snapshot fetch errors
#[derive(Error, Debug, Clone)]
pub enum SnapshotError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("REST API returned status {0}")]
    Status(u16),

    #[error("Failed to decode snapshot: {0}")]
    Decode(String),

    #[error("Snapshot retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Wire-frame parsing errors
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid data type: {0}")]
    InvalidDataType(String),
}
