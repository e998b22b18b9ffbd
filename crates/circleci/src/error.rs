//! Error types for CircleCI API operations.
//!
//! Errors are categorized so callers can tell transient transport problems
//! from credential or input problems.

use std::fmt;

/// Result type alias for CircleCI API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable).
    Network,
    /// Token missing, invalid or lacking permission.
    Auth,
    /// Project or key not found.
    NotFound,
    /// Response body could not be decoded.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Not found on CircleCI",
            Self::Format => "Unexpected API response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and try again",
            Self::Auth => "Check that the API token is set and has access to the organization",
            Self::NotFound => "Verify the organization, project and VCS type are correct",
            Self::Format => "The API may have changed; check the CircleCI status page",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to CircleCI.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The API rejected the token.
    #[error("CircleCI rejected the API token (HTTP {status})")]
    Unauthorized {
        /// HTTP status code (401 or 403).
        status: u16,
    },

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Unrecognized VCS type.
    #[error("unknown VCS type '{0}' (expected github or bitbucket)")]
    UnknownVcs(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { status, .. } => match status {
                Some(code) if (400..500).contains(code) => ErrorCategory::Other,
                _ => ErrorCategory::Network,
            },
            Error::Unauthorized { .. } => ErrorCategory::Auth,
            Error::NotFound(_) => ErrorCategory::NotFound,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::UnknownVcs(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the remote object was absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.category(), ErrorCategory::NotFound)
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code @ (401 | 403)) => Self::Unauthorized { status: code },
            ureq::Error::StatusCode(404) => Self::NotFound("HTTP 404".to_string()),
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Format.is_retryable());
        assert!(!ErrorCategory::Other.is_retryable());
    }

    #[test]
    fn test_error_category_text() {
        for category in [
            ErrorCategory::Network,
            ErrorCategory::Auth,
            ErrorCategory::NotFound,
            ErrorCategory::Format,
            ErrorCategory::Other,
        ] {
            assert!(!category.description().is_empty());
            assert!(!category.advice().is_empty());
        }
        assert_eq!(format!("{}", ErrorCategory::Auth), "Authentication failed");
    }

    #[test]
    fn test_http_error_category() {
        assert!(Error::http("timed out", None).is_retryable());
        assert!(Error::http("HTTP 502", Some(502)).is_retryable());
        assert_eq!(
            Error::http("HTTP 400", Some(400)).category(),
            ErrorCategory::Other
        );
    }

    #[test]
    fn test_from_ureq_status() {
        let err: Error = ureq::Error::StatusCode(401).into();
        assert!(matches!(err, Error::Unauthorized { status: 401 }));
        assert_eq!(err.category(), ErrorCategory::Auth);

        let err: Error = ureq::Error::StatusCode(404).into();
        assert!(err.is_not_found());

        let err: Error = ureq::Error::StatusCode(500).into();
        match err {
            Error::Http { message, status } => {
                assert_eq!(message, "HTTP 500");
                assert_eq!(status, Some(500));
            }
            other => panic!("Expected Error::Http, got {other:?}"),
        }
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.category(), ErrorCategory::Format);
        assert!(err.to_string().starts_with("invalid API response"));
    }

    #[test]
    fn test_unknown_vcs_display() {
        let err = Error::UnknownVcs("gitlab".to_string());
        assert!(err.to_string().contains("gitlab"));
        assert_eq!(err.category(), ErrorCategory::Other);
    }
}
