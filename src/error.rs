//! Error types for the carbon-intensity collector

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by data sources, readers, publishers and the orchestrator
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A configured variant key has no registered implementation
    #[error(
        "specified {role} ({requested}) does not exist. Options are: {}",
        .options.join(" ")
    )]
    UnknownVariant {
        role: &'static str,
        requested: String,
        options: Vec<String>,
    },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    /// A single zone could not be fetched
    #[error("Provider error for zone {zone}: {message}")]
    ProviderError { zone: String, message: String },

    #[error("Reader error: {0}")]
    ReaderError(String),

    /// Delivery of one message failed; the sink is still usable
    #[error("Publish error: {0}")]
    PublishError(String),

    /// The sink connection is gone
    #[error("Publisher connection error: {0}")]
    ConnectionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    /// Whether the dispatch loop may carry on after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::PublishError(_))
    }
}
