//! Error types for `kuby`.
//!
//! Uses [`thiserror`] for ergonomic error derivation. Line-level parse
//! failures are never errors; they surface as
//! [`LogEntry::has_parsing_error`](crate::entry::LogEntry::has_parsing_error).

use thiserror::Error;

/// Errors that can occur in `kuby`.
///
/// Maps to exit codes: [`Config`](Self::Config), [`Validation`](Self::Validation)
/// and [`Import`](Self::Import) → exit 1, everything else → exit 2.
#[derive(Debug, Error)]
pub enum KubyError {
    /// Configuration error (invalid flag combination, unreadable config file).
    #[error("configuration error: {0}")]
    Config(String),

    /// A parsing rule was rejected while editing the options.
    #[error("invalid parsing option: {0}")]
    Validation(String),

    /// An options file could not be imported.
    #[error("error importing options: {0}")]
    Import(String),

    /// Log retrieval failed for one source.
    #[error("error fetching logs for {source_id}: {message}")]
    Source { source_id: String, message: String },

    /// The log backend could not list sources or contexts.
    #[error("log backend error: {0}")]
    Backend(String),

    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error in the options store.
    #[error("options file error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl KubyError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Import(_) | Self::Toml(_) => 1,
            _ => 2,
        }
    }
}
