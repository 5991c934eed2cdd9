//! Error types for arnica.

use thiserror::Error;

/// Result type alias using [`ArnicaError`].
pub type Result<T> = std::result::Result<T, ArnicaError>;

/// Error type for all arnica operations.
#[derive(Error, Debug)]
pub enum ArnicaError {
    /// Malformed input from the caller: a bad document, an analysis failure,
    /// or an unparseable delete query. Reported back, never retried.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The operation is not supported in the current mode.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Index engine failure.
    #[error("index error: {0}")]
    Index(String),

    /// Update log failure.
    #[error("update log error: {0}")]
    UpdateLog(String),

    /// Unrecoverable failure. Must be propagated immediately, never swallowed
    /// by cleanup paths.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ArnicaError {
    /// Create a bad request error.
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        ArnicaError::BadRequest(message.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        ArnicaError::Unsupported(message.into())
    }

    /// Create an index error.
    pub fn index<S: Into<String>>(message: S) -> Self {
        ArnicaError::Index(message.into())
    }

    /// Create an update log error.
    pub fn update_log<S: Into<String>>(message: S) -> Self {
        ArnicaError::UpdateLog(message.into())
    }

    /// Create a fatal error.
    pub fn fatal<S: Into<String>>(message: S) -> Self {
        ArnicaError::Fatal(message.into())
    }

    /// Whether this error must be rethrown by shutdown paths instead of being
    /// logged and suppressed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ArnicaError::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArnicaError::bad_request("missing unique key");
        assert_eq!(err.to_string(), "bad request: missing unique key");

        let err = ArnicaError::unsupported("rollback in replica mode");
        assert_eq!(err.to_string(), "unsupported operation: rollback in replica mode");
    }

    #[test]
    fn test_is_fatal() {
        assert!(ArnicaError::fatal("out of memory").is_fatal());
        assert!(!ArnicaError::index("segment missing").is_fatal());
    }
}
