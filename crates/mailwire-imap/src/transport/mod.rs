//! Byte transports a [`Connection`](crate::Connection) runs over.
//!
//! The connection only needs two things from a transport: an input stream
//! the response parser can read from, and a way to write one command line.
//! [`NetworkTransport`] is the TCP/TLS implementation; tests substitute an
//! in-memory one.

mod config;
mod network;
mod stream;

use std::future::Future;

use tokio::io::AsyncRead;

pub use config::{Config, ConfigBuilder, Security};
pub use network::NetworkTransport;
pub use stream::{ImapStream, default_tls_config};

use crate::{Error, Result};

/// Line-oriented channel to an IMAP server.
///
/// Implementations may write `async fn` for the methods returning futures.
pub trait Transport: Send {
    /// Input half handed to the response parser.
    type Reader: AsyncRead + Unpin + Send;

    /// Establishes the channel and returns its input half.
    ///
    /// # Errors
    ///
    /// [`Error::Communication`] when the peer cannot be reached,
    /// [`Error::CertificateValidation`] when TLS negotiation fails.
    fn open(&mut self) -> impl Future<Output = Result<Self::Reader>> + Send;

    /// Releases the channel. Must be safe to call when already closed.
    fn close(&mut self);

    /// Returns true while the output half is usable.
    fn is_open(&self) -> bool;

    /// Writes `text` followed by CRLF.
    ///
    /// Only `log_text` may be recorded in logs, so that sensitive command
    /// text never leaves the process.
    ///
    /// # Errors
    ///
    /// [`Error::Communication`] on I/O failure or when the channel is closed.
    fn write_line(
        &mut self,
        text: &str,
        log_text: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Returns true if the connection should upgrade the channel with
    /// STARTTLS before logging in.
    fn wants_starttls(&self) -> bool {
        false
    }

    /// Negotiates TLS over the open channel after the server accepted
    /// STARTTLS, returning the new input half.
    ///
    /// # Errors
    ///
    /// [`Error::CertificateValidation`] when negotiation fails. The default
    /// implementation reports that the transport cannot upgrade.
    fn start_tls(
        &mut self,
        reader: Self::Reader,
    ) -> impl Future<Output = Result<Self::Reader>> + Send {
        drop(reader);
        async {
            Err(Error::InvalidState(
                "transport does not support STARTTLS".to_string(),
            ))
        }
    }
}
