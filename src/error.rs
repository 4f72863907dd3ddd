//! Error types for the dictionary engine.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for dictionary loading, reloading and configuration.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Dictionary file missing or unreadable
    #[error("dictionary source unavailable at {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dictionary file is not valid UTF-8
    #[error("dictionary {} is not valid UTF-8: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// File watcher could not be created or attached
    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Background compile task panicked or was cancelled
    #[error("background reload task failed: {0}")]
    Background(#[from] tokio::task::JoinError),

    /// Controller was shut down before the operation finished
    #[error("reload controller has been shut down")]
    Disposed,
}

/// Result type alias for dictionary operations.
pub type Result<T> = std::result::Result<T, GuardError>;

/// A single regex term that failed to compile.
///
/// Carries the offending source text so the caller can log it and move on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid pattern '{source_text}': {reason}")]
pub struct CompileError {
    pub source_text: String,
    pub reason: String,
}

impl CompileError {
    pub fn new(source_text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            reason: reason.into(),
        }
    }
}
