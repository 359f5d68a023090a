//! Error types for velociraptor-bridge.

use thiserror::Error;

/// Error type for velociraptor-bridge operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file missing, unreadable or malformed.
    #[error("Config error: {0}")]
    Config(String),

    /// The API connection could not be established.
    #[error("{message}: {source}")]
    Unavailable {
        /// Description of what was being attempted.
        message: String,
        /// Underlying cause.
        #[source]
        source: Box<Error>,
    },

    /// gRPC call or stream failed.
    #[error("gRPC error: {0}")]
    Transport(#[from] tonic::Status),

    /// gRPC channel could not be built or dialed.
    #[error("Channel error: {0}")]
    Channel(#[from] tonic::transport::Error),

    /// A response payload was not a valid batch of records, or a result
    /// could not be serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Caller supplied an argument that cannot be turned into a statement.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error while reading local files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap `source` as an [`Error::Unavailable`] with a descriptive message.
    pub fn unavailable(message: impl Into<String>, source: Error) -> Self {
        Error::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if this error was raised before any network call.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}

/// Result type alias for velociraptor-bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_wraps_cause() {
        let err = Error::unavailable(
            "Failed to connect to Velociraptor",
            Error::Config("missing ca_certificate".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Failed to connect to Velociraptor: Config error: missing ca_certificate"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_caller_error() {
        assert!(Error::InvalidArgument("limit".to_string()).is_caller_error());
        assert!(!Error::Transport(tonic::Status::unavailable("down")).is_caller_error());
    }
}
