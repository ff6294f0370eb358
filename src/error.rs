use std::{fmt::Display, string::FromUtf8Error, sync::PoisonError};

/// Custom Result type for csvdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for csvdb
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Statement parsing error
    Parse(String),
    /// Unknown column, or an empty source with no table loaded yet
    NotFound(String),
    /// Source unreadable or malformed (including remote fetch failures)
    Load(String),
    /// Table could not be written back to its source
    Save(String),
    /// Operation defined but not implemented (insert, delete)
    Unsupported(String),
    /// A waiting query was abandoned because the table was closed
    Cancelled,
    /// Internal error (poisoned lock, I/O, etc.)
    Internal(String),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(value: PoisonError<T>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<FromUtf8Error> for Error {
    fn from(value: FromUtf8Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(err) => write!(f, "parse error {}", err),
            Error::NotFound(err) => write!(f, "{}", err),
            Error::Load(err) => write!(f, "{}", err),
            Error::Save(err) => write!(f, "{}", err),
            Error::Unsupported(err) => write!(f, "{}", err),
            Error::Cancelled => write!(f, "query cancelled, server is shutting down"),
            Error::Internal(err) => write!(f, "internal error {}", err),
        }
    }
}
