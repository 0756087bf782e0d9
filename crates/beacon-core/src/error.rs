//! Error types for beacon operations.
//!
//! Delivery failures are not errors: an endpoint answering 500 or timing out
//! is a normal [`DeliveryOutcome`](crate::webhook::DeliveryOutcome). The
//! variants here cover infrastructure problems (stores, configuration,
//! serialization) that the dispatcher catches at its boundary.

use thiserror::Error;

/// Result type alias for beacon operations.
pub type BeaconResult<T> = Result<T, BeaconError>;

/// Main error type for beacon operations.
#[derive(Error, Debug)]
pub enum BeaconError {
    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Subscription or delivery record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Subscription exists but is deactivated.
    #[error("Subscription inactive: {0}")]
    SubscriptionInactive(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    DbConnectionFailed,
    DbOperationFailed,
    NotFound,
    SubscriptionInactive,
    ConfigInvalid,
    NetClientBuild,
    Io,
    Serialization,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::NotFound => "NF_001",
            ErrorCode::SubscriptionInactive => "SUB_001",
            ErrorCode::ConfigInvalid => "CFG_001",
            ErrorCode::NetClientBuild => "NET_001",
            ErrorCode::Io => "IO_001",
            ErrorCode::Serialization => "SER_001",
        }
    }
}

impl BeaconError {
    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Database { code, .. } => *code,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::SubscriptionInactive(_) => ErrorCode::SubscriptionInactive,
            Self::Configuration(_) => ErrorCode::ConfigInvalid,
            Self::HttpClient(_) => ErrorCode::NetClientBuild,
            Self::Io(_) => ErrorCode::Io,
            Self::Serialization(_) => ErrorCode::Serialization,
        }
    }
}

impl From<rusqlite::Error> for BeaconError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::CannotOpen =>
            {
                ErrorCode::DbConnectionFailed
            }
            _ => ErrorCode::DbOperationFailed,
        };
        Self::Database {
            message: err.to_string(),
            code,
            source: Some(Box::new(err)),
        }
    }
}
