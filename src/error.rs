use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the mmindex library
#[derive(Error, Debug)]
pub enum MmIndexError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// A vector's length disagrees with the index dimension
    #[error("Dimension mismatch for {modality} vector: expected {expected}, got {actual}")]
    DimensionMismatch {
        modality: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A tenant directory holds some but not all persisted files
    #[error("Incomplete persisted state for client {client_id}: missing {missing:?}")]
    PersistenceIncomplete {
        client_id: String,
        missing: Vec<String>,
    },

    /// A mapping references an offset beyond the index total
    #[error("Offset integrity violation in {modality} mapping: offset {offset} >= total {total}")]
    OffsetIntegrity {
        modality: &'static str,
        offset: usize,
        total: usize,
    },

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Binary encoding errors
    #[error("Encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Binary decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for mmindex operations
pub type Result<T> = std::result::Result<T, MmIndexError>;
