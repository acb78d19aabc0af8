//! Error types for ModelMatch

use thiserror::Error;

/// Result type alias using ModelMatch's Error
pub type Result<T> = std::result::Result<T, Error>;

/// ModelMatch error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Storage errors (E400-E499)
    #[error("Failed to persist metrics: {0}. The update was not saved; retry the call.")]
    StorageWriteFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Routing errors (E1100-E1199)
    #[error("Unknown task type '{0}'. Supported task types: code, reasoning, summarization, search-heavy, general.")]
    UnknownTaskType(String),

    #[error("Unknown routing mode '{0}'. Valid modes: balanced, quality, cost, fast.")]
    UnknownMode(String),

    // Provider errors (E1200-E1299)
    #[error("Search provider failed: {0}")]
    SearchFailed(String),

    #[error("Model execution failed: {0}")]
    ExecutionFailed(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::StorageWriteFailed(_) => "E400",
            Self::DatabaseError(_) => "E401",
            Self::Serialization(_) => "E402",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::UnknownTaskType(_) => "E1100",
            Self::UnknownMode(_) => "E1101",
            Self::SearchFailed(_) => "E1200",
            Self::ExecutionFailed(_) => "E1201",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::StorageWriteFailed(_) => Some("modelmatch config get storage.data_dir".to_string()),
            Self::UnknownTaskType(_) => Some("modelmatch classify <prompt>".to_string()),
            Self::UnknownMode(_) => Some("modelmatch config set routing.default_mode balanced".to_string()),
            Self::ConfigError(_) => Some("modelmatch config list".to_string()),
            _ => None,
        }
    }

    /// Whether the caller can reasonably retry the failed operation
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StorageWriteFailed(_)
                | Self::DatabaseError(_)
                | Self::Io(_)
                | Self::SearchFailed(_)
                | Self::ExecutionFailed(_)
        )
    }
}
