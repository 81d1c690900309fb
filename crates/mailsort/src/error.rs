//! Error taxonomy shared by the sync engine, fetch executor and label actions

/// Errors surfaced by the remote mail service, the local mirror store and
/// the engines built on top of them.
///
/// `RateLimited` and `Network` are resolved inside the fetch executor's
/// retry loop; everything else is fatal for the operation that produced it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(
        "Protocol error{}: {message}",
        .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
    )]
    Protocol { status: Option<u16>, message: String },

    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Unknown operation: '{0}'")]
    UnknownOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Protocol error without an HTTP status
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            status: None,
            message: message.into(),
        }
    }

    /// Whether the fetch executor may retry the failed call
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Network(_))
    }

    /// Whether the error means the requested entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::RateLimited("quota".into()).is_retryable());
        assert!(Error::Network("reset".into()).is_retryable());
        assert!(!Error::NotFound("m1".into()).is_retryable());
        assert!(!Error::Auth("expired".into()).is_retryable());
        assert!(!Error::protocol("bad json").is_retryable());
    }

    #[test]
    fn test_protocol_display() {
        let err = Error::Protocol {
            status: Some(400),
            message: "bad request".into(),
        };
        assert_eq!(err.to_string(), "Protocol error (HTTP 400): bad request");
        assert_eq!(
            Error::protocol("bad json").to_string(),
            "Protocol error: bad json"
        );
    }
}
