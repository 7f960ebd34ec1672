//! Centralized error types for the agent crates.
//!
//! `PlatformError` describes failures of the shared plumbing (HTTP client,
//! subscriber setup) and classifies them as retryable or not.

use thiserror::Error;

/// Common error type for platform operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP request failed for a reason other than a timeout or refused connection
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream could not be reached
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Check if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_common::PlatformError;
    ///
    /// assert!(PlatformError::Timeout("lookup".to_string()).is_retryable());
    /// assert!(!PlatformError::InvalidInput("ratio".to_string()).is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_) | Self::Http(_))
    }

    /// Classify a transport-level reqwest failure.
    ///
    /// Timeouts and connection failures get their own variants so callers can
    /// report them distinctly; everything else stays `Http`.
    #[must_use]
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Http(err)
        }
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(PlatformError::Unavailable("refused".to_string()).is_retryable());
        assert!(PlatformError::Timeout("read".to_string()).is_retryable());
    }

    #[test]
    fn test_non_retryable_errors() {
        assert!(!PlatformError::InvalidInput("test".to_string()).is_retryable());
        assert!(!PlatformError::Internal("test".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = PlatformError::invalid_input("header X-Vault-Namespace");
        assert_eq!(err.to_string(), "Invalid input: header X-Vault-Namespace");

        let err = PlatformError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "Service unavailable: connection refused");
    }
}
