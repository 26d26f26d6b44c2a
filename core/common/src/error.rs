//! Common error types for CourseSync.

use thiserror::Error;

/// Top-level error type for CourseSync operations.
///
/// The first group of variants mirrors how the remote platform answers a
/// request; the orchestrator branches on them. The remaining variants cover
/// local failures.
#[derive(Debug, Error)]
pub enum Error {
    /// No user session; the remote call was not attempted.
    #[error("Login required: {0}")]
    Unauthenticated(String),

    /// Referenced remote object no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks edit permission on an existing remote object.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Any other non-2xx response or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The user declined a required structural change.
    #[error("Declined by user: {0}")]
    UserDeclined(String),

    /// Cancellation was observed before the operation finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the remote side reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether the remote side refused the edit.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden(_))
    }

    /// Whether this error stands for an observed cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether this is a transient failure (non-2xx or transport).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        assert!(Error::NotFound("course 1".to_string()).is_not_found());
        assert!(Error::Forbidden("course 1".to_string()).is_forbidden());
        assert!(Error::Cancelled.is_cancelled());
        assert!(Error::Network("503".to_string()).is_transient());
        assert!(!Error::Forbidden("course 1".to_string()).is_transient());
        assert!(!Error::UserDeclined("wrap".to_string()).is_cancelled());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::Unauthenticated("post course".to_string());
        assert_eq!(err.to_string(), "Login required: post course");
        assert_eq!(Error::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_from_serde_json() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
