use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeederError {
    /// Port unavailable or open failed.
    #[error("connection error: {0}")]
    Connection(String),
    /// No matching reply before the deadline.
    #[error("timeout waiting for device reply")]
    Timeout,
    /// Rejected before any hardware I/O.
    #[error("validation error: {0}")]
    Validation(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("configuration error: {0}")]
    Config(String),
    /// Persisting a derived schedule failed; the change was rolled back.
    #[error("storage error: {0}")]
    Storage(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl FeederError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FeederError>;
