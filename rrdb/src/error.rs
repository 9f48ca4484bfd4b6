//! Error types for the rrdb data path.

/// Error type for rrdb operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A persistence backend failed to read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A value could not be encoded or decoded at the storage boundary.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid input or parameter.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The receiving worker has shut down.
    #[error("worker has been shut down")]
    Shutdown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl From<common::DurationParseError> for Error {
    fn from(err: common::DurationParseError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

/// Result type alias for rrdb operations.
pub type Result<T> = std::result::Result<T, Error>;
