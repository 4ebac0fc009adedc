//! Error types for Surfa ingest

use thiserror::Error;

/// HTTP statuses retried by default
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [
    429, // Too Many Requests
    500, // Internal Server Error
    502, // Bad Gateway
    503, // Service Unavailable
    504, // Gateway Timeout
];

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid constructor arguments (bad key format, key too short, zero thresholds)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed event rejected before it reaches the buffer
    #[error("Invalid event: {0}")]
    Validation(String),

    /// 401/403 from the ingest endpoint, never retried
    #[error("{message}")]
    Auth { status_code: u16, message: String },

    /// Non-retryable 4xx, or a 429/5xx that exhausted its retries
    #[error("{message}")]
    Ingest {
        status_code: u16,
        message: String,
        /// Response body, truncated for display
        body: String,
    },

    /// Transport failure. `transient` is set for timeouts and connection
    /// failures, which were retried before surfacing.
    #[error("Network error: {message}")]
    Network { message: String, transient: bool },
}

impl Error {
    pub fn network(message: impl Into<String>, transient: bool) -> Self {
        Self::Network {
            message: message.into(),
            transient,
        }
    }

    /// HTTP status carried by the error, if the server answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Auth { status_code, .. } | Self::Ingest { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Whether the default retry policy treats this failure as transient:
    /// a status from [`RETRYABLE_STATUS_CODES`], a timeout, or a failed
    /// connection.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ingest { status_code, .. } => RETRYABLE_STATUS_CODES.contains(status_code),
            Self::Network { transient, .. } => *transient,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        let rate_limited = Error::Ingest {
            status_code: 429,
            message: "Server error: 429".to_string(),
            body: String::new(),
        };
        let bad_request = Error::Ingest {
            status_code: 400,
            message: "Client error: 400".to_string(),
            body: String::new(),
        };
        let not_implemented = Error::Ingest {
            status_code: 501,
            message: "Server error: 501".to_string(),
            body: String::new(),
        };
        let auth = Error::Auth {
            status_code: 401,
            message: "Authentication failed: 401".to_string(),
        };

        assert!(rate_limited.is_retryable());
        assert!(Error::network("connection refused", true).is_retryable());
        assert!(!Error::network("invalid header value", false).is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!not_implemented.is_retryable());
        assert!(!auth.is_retryable());
        assert!(!Error::Config("bad key".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display_formatting() {
        let err = Error::Config("key too short".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: key too short");

        let err = Error::Validation("Event must have 'kind' field".to_string());
        assert!(err.to_string().starts_with("Invalid event"));

        let err = Error::Auth {
            status_code: 401,
            message: "Authentication failed: 401 - revoked key".to_string(),
        };
        assert_eq!(err.to_string(), "Authentication failed: 401 - revoked key");

        let err = Error::network("connection refused", true);
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_status_code() {
        let err = Error::Ingest {
            status_code: 422,
            message: "Client error: 422".to_string(),
            body: String::new(),
        };
        assert_eq!(err.status_code(), Some(422));
        assert_eq!(Error::network("timeout", true).status_code(), None);
    }
}
