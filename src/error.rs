//! Error types for lingolink.

use thiserror::Error;

/// Errors surfaced to callers of the session API.
///
/// Stage failures never appear here: they are resolved inside the pipeline
/// by the fallback policy and reported through the delivery's mode.
#[derive(Error, Debug)]
pub enum LingolinkError {
    // Configuration errors — fail fast at load or session creation
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // The field cannot be named `source`: thiserror would wire it up as
    // the error's `Error::source()`.
    #[error("Unsupported language pair: {source_language} -> {target_language}")]
    UnsupportedLanguagePair {
        source_language: String,
        target_language: String,
    },

    // Session errors
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Session already exists: {session_id}")]
    SessionAlreadyExists { session_id: String },

    // Capacity errors
    #[error("Capacity exceeded: {in_flight} pipelines in flight, {queued} queued")]
    CapacityExceeded { in_flight: usize, queued: usize },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LingolinkError>;
