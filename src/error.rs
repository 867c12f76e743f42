//! Unified error handling for the calsync crate
//!
//! Every fallible operation in the scrape/sync pipeline returns [`Error`].
//! The orchestrator decides whether to retry a failed task by asking the
//! error itself through [`Error::is_recoverable`], so the retry policy for
//! each failure kind lives in exactly one place.
//!
//! # Taxonomy
//!
//! | Variant                | Retried | Notes                                   |
//! |------------------------|---------|-----------------------------------------|
//! | `RoomSelection`        | no      | configuration mismatch                  |
//! | `NavigationExhausted`  | yes     | widget may just be slow to render       |
//! | `StorageConflict`      | yes     | SQLite busy/locked during a transaction |
//! | `Automation`           | yes     | next attempt opens a fresh session      |
//! | `Validation`           | no      | malformed input to a pure component     |

use std::io;
use thiserror::Error;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Browser session and widget interaction errors
    Automation,
    /// Calendar navigation errors
    Navigation,
    /// Storage and I/O errors
    Storage,
    /// Input validation errors
    Validation,
    /// Configuration errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short lowercase name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automation => "automation",
            Self::Navigation => "navigation",
            Self::Storage => "storage",
            Self::Validation => "validation",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the calsync crate
#[derive(Error, Debug)]
pub enum Error {
    /// The room type's external identity is not selectable in the widget
    #[error("Room '{external_id}' is not selectable in the booking widget")]
    RoomSelection { external_id: String },

    /// The widget never displayed the target month within the step bound
    #[error("Could not reach '{target}' after {steps} steps (last displayed: '{last_seen}')")]
    NavigationExhausted {
        target: String,
        steps: u32,
        last_seen: String,
    },

    /// Concurrent write anomaly inside a synchronizer transaction
    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    /// Driver-level failure (crashed tab, evaluation error, timeout)
    #[error("Automation failure: {0}")]
    Automation(String),

    /// Input rejected before any side effect happened
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::RoomSelection { .. } => false,
            Self::NavigationExhausted { .. } => true,
            Self::StorageConflict(_) => true,
            Self::Automation(_) => true,
            Self::Validation(_) => false,
            Self::Database(_) => false,
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RoomSelection { .. } | Self::Automation(_) => ErrorCategory::Automation,
            Self::NavigationExhausted { .. } => ErrorCategory::Navigation,
            Self::StorageConflict(_) | Self::Database(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Validation(_) | Self::Json(_) => ErrorCategory::Validation,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Create an automation error
    pub fn automation(msg: impl Into<String>) -> Self {
        Self::Automation(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Busy/locked means another writer holds the database; everything else is fatal.
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                Self::StorageConflict(err.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
