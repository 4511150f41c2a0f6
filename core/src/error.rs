//! Error types shared by domain stores and their collaborators.

use thiserror::Error;

/// Errors surfaced by remote operations and domain rules
///
/// `Clone` so that failures can travel inside actions back through the
/// reducer. Remote failures are never interpreted or retried by the store;
/// they reach the caller as they were produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The backend could not be reached (connection refused, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status
    #[error("Server error (status {status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The backend answered, but the payload could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The requested entity (or a required route parameter) is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input was rejected before reaching the backend
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// The action is not allowed for the current user
    #[error("Permission denied: {0}")]
    Permission(String),

    /// The device position could not be determined
    #[error("Geolocation unavailable: {0}")]
    GeoUnavailable(String),

    /// No user is signed in
    #[error("No authenticated user")]
    Unauthenticated,

    /// The store runtime failed to produce an outcome
    #[error("Store runtime error: {0}")]
    Runtime(String),
}

impl SyncError {
    /// Whether the error came from talking to a remote service
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Server { .. } | Self::InvalidResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_status() {
        let error = SyncError::Server {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(error.to_string(), "Server error (status 503): unavailable");
    }

    #[test]
    fn only_transport_failures_are_remote() {
        assert!(SyncError::Network("refused".into()).is_remote());
        assert!(SyncError::InvalidResponse("eof".into()).is_remote());
        assert!(!SyncError::NotFound("p1".into()).is_remote());
        assert!(!SyncError::Unauthenticated.is_remote());
    }
}
