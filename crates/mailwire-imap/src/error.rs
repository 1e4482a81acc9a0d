//! Error types for the IMAP library.

use thiserror::Error;

use crate::types::ResponseCode;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure on the transport (open, read or write).
    #[error("communication error: {0}")]
    Communication(#[from] std::io::Error),

    /// Secure transport negotiation failed.
    #[error("certificate validation failed: {0}")]
    CertificateValidation(String),

    /// Login rejected for invalid or expired credentials.
    #[error("authentication failed: {alert}")]
    AuthenticationFailed {
        /// Human-readable text sent by the server.
        alert: String,
        /// Response code attached to the rejection, if any.
        code: Option<ResponseCode>,
    },

    /// Server completed a command with `NO` or `BAD`.
    #[error("protocol error: {alert}")]
    Protocol {
        /// Human-readable text sent by the server.
        alert: String,
        /// Response code attached to the completion, if any.
        code: Option<ResponseCode>,
    },

    /// Server is temporarily unable to serve the request (`UNAVAILABLE`).
    #[error("server error: {alert}")]
    Server {
        /// Human-readable text sent by the server.
        alert: String,
    },

    /// Malformed data on the wire. The stream cannot be read any further.
    #[error("framing error at position {position}: {message}")]
    Framing {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Operation not valid for the current connection or transport.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Coarse classification of an [`Error`].
///
/// Callers branch on this to decide between prompting for credentials,
/// offering a certificate trust flow, or retrying later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport I/O failure.
    Communication,
    /// Secure transport negotiation failure.
    CertificateValidation,
    /// Credentials were rejected.
    AuthenticationFailed,
    /// Any other non-`OK` completion.
    Protocol,
    /// Transient server-side condition.
    Server,
    /// Malformed input; the stream is dead.
    Framing,
}

impl Error {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Communication(_) => ErrorKind::Communication,
            Self::CertificateValidation(_) => ErrorKind::CertificateValidation,
            Self::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            Self::Protocol { .. } | Self::InvalidState(_) => ErrorKind::Protocol,
            Self::Server { .. } => ErrorKind::Server,
            Self::Framing { .. } => ErrorKind::Framing,
        }
    }

    /// Returns the server's human-readable text, if this error carries one.
    #[must_use]
    pub fn alert(&self) -> Option<&str> {
        match self {
            Self::AuthenticationFailed { alert, .. }
            | Self::Protocol { alert, .. }
            | Self::Server { alert } => Some(alert),
            _ => None,
        }
    }

    /// Returns the response code attached by the server, if any.
    #[must_use]
    pub const fn response_code(&self) -> Option<&ResponseCode> {
        match self {
            Self::AuthenticationFailed { code, .. } | Self::Protocol { code, .. } => code.as_ref(),
            Self::Server { .. } => Some(&ResponseCode::Unavailable),
            _ => None,
        }
    }

    /// Returns true if retrying the same operation later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Server | ErrorKind::Communication)
    }

    /// Builds a framing error.
    pub(crate) fn framing(position: usize, message: impl Into<String>) -> Self {
        Self::Framing {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(io.kind(), ErrorKind::Communication);
        assert_eq!(
            Error::CertificateValidation("self signed".into()).kind(),
            ErrorKind::CertificateValidation
        );
        assert_eq!(Error::framing(3, "bad").kind(), ErrorKind::Framing);
        assert_eq!(
            Error::InvalidState("no starttls".into()).kind(),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn test_alert_and_code() {
        let err = Error::AuthenticationFailed {
            alert: "invalid creds".into(),
            code: Some(ResponseCode::AuthenticationFailed),
        };
        assert_eq!(err.alert(), Some("invalid creds"));
        assert_eq!(err.response_code(), Some(&ResponseCode::AuthenticationFailed));
        assert_eq!(err.to_string(), "authentication failed: invalid creds");

        let err = Error::Server {
            alert: "try later".into(),
        };
        assert_eq!(err.response_code(), Some(&ResponseCode::Unavailable));
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Server { alert: String::new() }.is_retryable());
        assert!(!Error::Protocol { alert: String::new(), code: None }.is_retryable());
        assert!(!Error::framing(0, "x").is_retryable());
    }
}
