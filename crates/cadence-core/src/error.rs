//! Error types for Cadence

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid payload: {0}")]
    Validation(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Object storage could not be reached (connection refused/reset, 5xx)
    #[error("Storage connection error: {0}")]
    StorageConnection(String),

    /// Object storage answered but the object could not be served
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceExhausted(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("{operation} failed for {entity}: {source}")]
    Context {
        operation: String,
        entity: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// How a failure should be treated by the task runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Infrastructure hiccup; retry after an extended delay
    Transient,
    /// Out of some resource; retrying will not help
    ResourceExhausted,
    /// Missing input or precondition; abort immediately
    Fatal,
    /// Anything else; default retry policy applies
    Unclassified,
}

impl Error {
    /// Wrap an error with the operation and entity it happened on
    pub fn context(self, operation: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::Context {
            operation: operation.into(),
            entity: entity.into(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Context { source, .. } => source.kind(),
            Self::StorageConnection(_) | Self::Pool(_) => ErrorKind::Transient,
            Self::Database(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                ErrorKind::Transient
            }
            Self::Database(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::OutOfMemory | rusqlite::ErrorCode::DiskFull
                ) =>
            {
                ErrorKind::ResourceExhausted
            }
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::Validation(_) | Self::NotFound(_) | Self::Config(_) | Self::Encryption(_) => {
                ErrorKind::Fatal
            }
            Self::Http(e) if e.is_connect() => ErrorKind::Transient,
            _ => ErrorKind::Unclassified,
        }
    }
}
