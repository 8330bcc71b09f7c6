//! Error types for the good-morning service.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors (settings / questions / templates / history store).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Bad row data: {0}")]
    BadRow(String),
}

/// Channel transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send via {channel}: {reason}")]
    SendFailed { channel: String, reason: String },

    #[error("Channel {channel} is not configured: {reason}")]
    NotConfigured { channel: String, reason: String },

    #[error("Profile has no address for channel {channel}")]
    MissingAddress { channel: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
