use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Log source unavailable: {}: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Insert error: {0}")]
    Insert(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task error: {0}")]
    Task(String),
}

// The offending line is skipped; the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineParseError {
    #[error("Expected field {index} but line has only {found} fields")]
    MissingField { index: usize, found: usize },

    #[error("Unknown month abbreviation: {0:?}")]
    UnknownMonth(String),

    #[error("Invalid day of month: {0:?}")]
    InvalidDay(String),

    #[error("No username in field {0:?}")]
    EmptyUsername(String),
}

impl From<tokio::task::JoinError> for EtlError {
    fn from(err: tokio::task::JoinError) -> Self {
        EtlError::Task(err.to_string())
    }
}

pub type EtlResult<T> = Result<T, EtlError>;
