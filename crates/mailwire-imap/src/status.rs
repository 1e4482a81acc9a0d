//! Connection health reporting.

use crate::{Error, ErrorKind};

/// Health of a connection as shown to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// The connection opened successfully.
    Connected,
    /// Settings need attention: credentials, certificate or login refused.
    BadConfiguration,
    /// The server reported a temporary problem.
    ServerError,
    /// The server could not be reached or the stream broke.
    CommunicationError,
}

impl ChannelState {
    /// Returns the state to report after `open` failed with `error`.
    #[must_use]
    pub const fn from_error(error: &Error) -> Self {
        match error.kind() {
            ErrorKind::AuthenticationFailed
            | ErrorKind::CertificateValidation
            | ErrorKind::Protocol => Self::BadConfiguration,
            ErrorKind::Server => Self::ServerError,
            ErrorKind::Communication | ErrorKind::Framing => Self::CommunicationError,
        }
    }
}

/// Receives connection health transitions.
pub trait StatusSink: Send + Sync {
    /// Called after every `open` attempt.
    fn report(&self, state: ChannelState);
}

/// Sink that logs transitions with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn report(&self, state: ChannelState) {
        match state {
            ChannelState::Connected => tracing::info!(?state, "channel state"),
            _ => tracing::warn!(?state, "channel state"),
        }
    }
}

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
    fn test_from_error() {
        let auth = Error::AuthenticationFailed {
            alert: String::new(),
            code: None,
        };
        assert_eq!(ChannelState::from_error(&auth), ChannelState::BadConfiguration);

        let cert = Error::CertificateValidation("unknown issuer".into());
        assert_eq!(ChannelState::from_error(&cert), ChannelState::BadConfiguration);

        let server = Error::Server {
            alert: String::new(),
        };
        assert_eq!(ChannelState::from_error(&server), ChannelState::ServerError);

        let io = Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert_eq!(ChannelState::from_error(&io), ChannelState::CommunicationError);
    }

    #[test]
    fn test_tracing_sink_is_object_safe() {
        let sink: Box<dyn StatusSink> = Box::new(TracingSink);
        sink.report(ChannelState::Connected);
        sink.report(ChannelState::ServerError);
    }
}
