//! Error types for folio.

use thiserror::Error;

/// Result type alias using folio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for folio operations.
///
/// `NotFound` deliberately covers both "does not exist" and "caller may not
/// see it", so callers cannot probe for the existence of other workspaces'
/// documents.
#[derive(Error, Debug)]
pub enum Error {
    /// Document, version, chat, or owner does not exist or is not accessible.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Publication (or lifecycle) transition attempted from an incompatible state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generation requested with no resolvable source content.
    #[error("No valid source content to generate from")]
    NoValidSource,

    /// Completion stream failed or was rejected.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Underlying store transaction failed (wraps sqlx::Error)
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Generation stopped by the caller before the stream finished.
    #[error("Generation cancelled")]
    Cancelled,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the failure came from the completion service rather than
    /// from the request or the store. Callers use this to offer a retry.
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, Error::Generation(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Generation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("document".to_string());
        assert_eq!(err.to_string(), "Not found: document");
    }

    #[test]
    fn test_error_display_invalid_state() {
        let err = Error::InvalidState("version is not the current draft".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid state: version is not the current draft"
        );
    }

    #[test]
    fn test_error_display_no_valid_source() {
        assert_eq!(
            Error::NoValidSource.to_string(),
            "No valid source content to generate from"
        );
    }

    #[test]
    fn test_error_display_generation() {
        let err = Error::Generation("stream closed".to_string());
        assert_eq!(err.to_string(), "Generation error: stream closed");
    }

    #[test]
    fn test_from_sqlx_error_is_persistence() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Persistence(_)));
        assert!(err.to_string().starts_with("Persistence error:"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_is_generation_failure() {
        assert!(Error::Generation("x".to_string()).is_generation_failure());
        assert!(!Error::NoValidSource.is_generation_failure());
        assert!(!Error::Cancelled.is_generation_failure());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
