//! TCP and TLS transport.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

use super::{Config, ImapStream, Security, Transport, default_tls_config};
use crate::{Error, Result};

/// Transport over TCP with optional implicit TLS or STARTTLS.
pub struct NetworkTransport {
    config: Config,
    tls: Option<Arc<rustls::ClientConfig>>,
    writer: Option<WriteHalf<ImapStream>>,
    tls_active: bool,
}

impl NetworkTransport {
    /// Creates a transport for the given configuration.
    ///
    /// Nothing is connected until [`Transport::open`] is called.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            tls: None,
            writer: None,
            tls_active: false,
        }
    }

    /// Uses a custom TLS client configuration instead of the webpki roots.
    #[must_use]
    pub fn with_tls_config(mut self, tls: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns true if the open channel is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls_active
    }

    fn tls_config(&self) -> Arc<rustls::ClientConfig> {
        self.tls.clone().unwrap_or_else(default_tls_config)
    }

    async fn connect(&self) -> Result<ImapStream> {
        let address = self.config.address();
        let connect = TcpStream::connect((self.config.host.as_str(), self.config.port));
        let tcp = tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| {
                Error::Communication(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection to {address} timed out"),
                ))
            })??;

        let stream = ImapStream::Plain(tcp);
        match self.config.security {
            Security::Implicit => {
                stream
                    .upgrade_to_tls(self.tls_config(), &self.config.host)
                    .await
            }
            Security::None | Security::StartTls => Ok(stream),
        }
    }
}

impl std::fmt::Debug for NetworkTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkTransport")
            .field("config", &self.config)
            .field("open", &self.writer.is_some())
            .field("tls_active", &self.tls_active)
            .finish_non_exhaustive()
    }
}

impl Transport for NetworkTransport {
    type Reader = ReadHalf<ImapStream>;

    async fn open(&mut self) -> Result<Self::Reader> {
        self.close();

        let stream = self.connect().await?;
        self.tls_active = stream.is_tls();
        tracing::info!(
            address = %self.config.address(),
            security = ?self.config.security,
            tls = self.tls_active,
            "connected"
        );

        let (reader, writer) = tokio::io::split(stream);
        self.writer = Some(writer);
        Ok(reader)
    }

    fn close(&mut self) {
        if self.writer.take().is_some() {
            tracing::info!(address = %self.config.address(), "disconnected");
        }
        self.tls_active = false;
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    async fn write_line(&mut self, text: &str, log_text: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            Error::Communication(io::Error::new(
                io::ErrorKind::NotConnected,
                "transport is not open",
            ))
        })?;

        tracing::debug!("C: {log_text}");
        let mut line = Vec::with_capacity(text.len() + 2);
        line.extend_from_slice(text.as_bytes());
        line.extend_from_slice(b"\r\n");
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    fn wants_starttls(&self) -> bool {
        self.config.security == Security::StartTls && !self.tls_active
    }

    async fn start_tls(&mut self, reader: Self::Reader) -> Result<Self::Reader> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| Error::InvalidState("transport is not open".to_string()))?;
        if !reader.is_pair_of(&writer) {
            return Err(Error::InvalidState(
                "reader does not belong to this transport".to_string(),
            ));
        }

        let stream = reader
            .unsplit(writer)
            .upgrade_to_tls(self.tls_config(), &self.config.host)
            .await?;
        self.tls_active = true;
        tracing::info!(address = %self.config.address(), "STARTTLS negotiated");

        let (reader, writer) = tokio::io::split(stream);
        self.writer = Some(writer);
        Ok(reader)
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
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
    use tokio::net::TcpListener;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_wants_starttls_follows_security() {
        let config = Config::builder("localhost").security(Security::None).build();
        let plain = NetworkTransport::new(config);
        assert!(!plain.wants_starttls());

        let config = Config::builder("localhost")
            .security(Security::StartTls)
            .build();
        let starttls = NetworkTransport::new(config);
        assert!(starttls.wants_starttls());
        assert!(!starttls.is_open());
    }

    #[tokio::test]
    async fn test_write_line_when_closed() {
        let mut transport = NetworkTransport::new(Config::new("localhost"));
        let err = transport.write_line("1 NOOP", "1 NOOP").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Communication);
    }

    #[tokio::test]
    async fn test_plain_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            write.write_all(b"* OK ready\r\n").await.unwrap();
            let mut line = String::new();
            BufReader::new(read).read_line(&mut line).await.unwrap();
            line
        });

        let config = Config::builder("127.0.0.1")
            .port(port)
            .security(Security::None)
            .build();
        let mut transport = NetworkTransport::new(config);
        let mut reader = transport.open().await.unwrap();
        assert!(transport.is_open());
        assert!(!transport.is_tls());

        let mut greeting = [0u8; 12];
        reader.read_exact(&mut greeting).await.unwrap();
        assert_eq!(&greeting, b"* OK ready\r\n");

        transport
            .write_line("1 LOGIN a \"b\"", "1 [IMAP command redacted]")
            .await
            .unwrap();
        assert_eq!(server.await.unwrap(), "1 LOGIN a \"b\"\r\n");

        transport.close();
        transport.close();
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_connect_refused_is_communication() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config::builder("127.0.0.1")
            .port(port)
            .security(Security::None)
            .connect_timeout(Duration::from_secs(5))
            .build();
        let mut transport = NetworkTransport::new(config);
        let err = transport.open().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Communication);
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_tls_handshake_failure_is_certificate_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Not a TLS server: answers the ClientHello with plaintext.
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = socket.write_all(b"* OK not tls\r\n").await;
        });

        let config = Config::builder("127.0.0.1")
            .port(port)
            .security(Security::Implicit)
            .build();
        let mut transport = NetworkTransport::new(config);
        let err = transport.open().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CertificateValidation);
    }
}
