//! Tagged command execution over a single IMAP connection.
//!
//! A [`Connection`] owns its [`Transport`] and the [`ResponseParser`] bound
//! to the transport's input. It opens lazily: the first [`Connection::execute`]
//! reads the greeting, discovers capabilities, negotiates STARTTLS when the
//! transport asks for it and logs in.
//!
//! ```text
//! Closed ──open() ok──→ NotAuthenticated | Authenticated
//! Closed ──open() err─→ Closed
//! Open   ──execute()──→ Open
//! Open   ──close()────→ Closed
//! ```
//!
//! Exactly one command is in flight at a time. Every operation borrows the
//! connection mutably, so commands cannot overlap. If a command future is
//! dropped before its completion arrives, the stream position is unknown;
//! the connection remembers this and reconnects before the next command.

mod credentials;

use std::sync::Arc;

pub use credentials::Credentials;

use crate::classify::{Phase, completion_error};
use crate::command::{Command, TagGenerator};
use crate::parser::{Payload, Response, ResponseParser};
use crate::status::{ChannelState, StatusSink};
use crate::transport::Transport;
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, ErrorKind, Result};

/// Protocol state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport is open.
    Closed,
    /// Open, without credentials having been presented.
    NotAuthenticated,
    /// Open and logged in (or pre-authenticated by the server).
    Authenticated,
}

/// How the server greeted us.
enum Greeting {
    Ok,
    PreAuth,
}

/// A tagged request/response IMAP connection.
pub struct Connection<T: Transport> {
    transport: T,
    parser: Option<ResponseParser<T::Reader>>,
    tags: TagGenerator,
    credentials: Option<Credentials>,
    login_command: Option<Command>,
    client_id: Option<Vec<(String, String)>>,
    sink: Option<Arc<dyn StatusSink>>,
    state: ConnectionState,
    capabilities: Vec<Capability>,
    /// Set while a command is written but its completion not yet read.
    in_flight: bool,
}

impl<T: Transport> Connection<T> {
    /// Creates a closed connection with its own tag counter.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_tag_generator(transport, TagGenerator::new())
    }

    /// Creates a closed connection drawing tags from `tags`.
    #[must_use]
    pub fn with_tag_generator(transport: T, tags: TagGenerator) -> Self {
        Self {
            transport,
            parser: None,
            tags,
            credentials: None,
            login_command: None,
            client_id: None,
            sink: None,
            state: ConnectionState::Closed,
            capabilities: Vec::new(),
            in_flight: false,
        }
    }

    /// Reports every `open` outcome to `sink`.
    #[must_use]
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sends `ID` with these fields after capability discovery when the
    /// server advertises the ID extension.
    #[must_use]
    pub fn with_client_id(mut self, fields: Vec<(String, String)>) -> Self {
        self.client_id = Some(fields);
        self
    }

    /// Sets the credentials used by the next login.
    ///
    /// An already authenticated connection is not affected until it is
    /// reopened.
    pub fn set_credentials(&mut self, username: impl Into<String>, secret: impl Into<String>) {
        self.credentials = Some(Credentials::new(username, secret));
        self.login_command = None;
    }

    /// Removes the credentials. Later opens stay unauthenticated unless the
    /// server pre-authenticates.
    pub fn clear_credentials(&mut self) {
        self.credentials = None;
        self.login_command = None;
    }

    /// Returns the configured credentials.
    #[must_use]
    pub const fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Returns the current protocol state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns true if the connection is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.state, ConnectionState::Closed)
    }

    /// Returns true if the connection is open and logged in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, ConnectionState::Authenticated)
    }

    /// Returns the capabilities advertised by the server.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn is_capable(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Returns the tag generator.
    #[must_use]
    pub const fn tag_generator(&self) -> &TagGenerator {
        &self.tags
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Opens and logs in. Does nothing if already open.
    ///
    /// # Errors
    ///
    /// - [`Error::Communication`] when the transport fails
    /// - [`Error::CertificateValidation`] when TLS negotiation fails
    /// - [`Error::Server`] when the server greets with `BYE`
    /// - [`Error::InvalidState`] when STARTTLS is required but not offered
    /// - a classified login error
    ///
    /// The connection is closed again after any failure.
    pub async fn open(&mut self) -> Result<()> {
        if self.in_flight {
            tracing::warn!("previous command was abandoned, reconnecting");
            self.close();
        }
        if self.is_open() {
            return Ok(());
        }

        let result = self.establish().await;
        let reported = match &result {
            Ok(()) => {
                tracing::info!(state = ?self.state, "connection open");
                ChannelState::Connected
            }
            Err(e) => {
                tracing::warn!(?e, "failed to open connection");
                self.close();
                ChannelState::from_error(e)
            }
        };
        if let Some(sink) = &self.sink {
            sink.report(reported);
        }
        result
    }

    /// Executes a command and returns the untagged and continuation
    /// responses received before its completion.
    ///
    /// Opens the connection first if needed.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the command text contains CR or LF
    /// - any error of [`Connection::open`]
    /// - [`Error::Server`] for a `NO`/`BAD` completion with `[UNAVAILABLE]`
    /// - [`Error::Protocol`] for any other `NO`/`BAD` completion
    /// - [`Error::Communication`] or [`Error::Framing`] when the stream
    ///   breaks, in which case the connection is closed
    pub async fn execute(&mut self, command: &Command) -> Result<Vec<Response>> {
        check_line(command)?;
        self.open().await?;
        let (responses, _) = self.run(command, Phase::Command).await?;
        Ok(responses)
    }

    /// Executes a command, discarding its responses.
    ///
    /// # Errors
    ///
    /// See [`Connection::execute`].
    pub async fn execute_simple(&mut self, command: &Command) -> Result<()> {
        self.execute(command).await.map(drop)
    }

    /// Re-queries the server capabilities.
    ///
    /// # Errors
    ///
    /// See [`Connection::execute`].
    pub async fn refresh_capabilities(&mut self) -> Result<&[Capability]> {
        self.open().await?;
        self.query_capabilities().await?;
        Ok(self.capabilities.as_slice())
    }

    /// Sends LOGOUT and closes. Does nothing if the connection is closed.
    ///
    /// The connection is closed even if LOGOUT fails.
    ///
    /// # Errors
    ///
    /// Any error reported while sending LOGOUT.
    pub async fn logout(&mut self) -> Result<()> {
        if !self.is_open() || self.in_flight {
            self.close();
            return Ok(());
        }
        let result = self.run(&Command::logout(), Phase::Command).await;
        self.close();
        result.map(drop)
    }

    /// Closes the transport and drops the parser. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut parser) = self.parser.take() {
            parser.destroy_responses();
        }
        if self.transport.is_open() || self.state != ConnectionState::Closed {
            tracing::debug!("closing connection");
        }
        self.transport.close();
        self.state = ConnectionState::Closed;
        self.capabilities.clear();
        self.in_flight = false;
    }

    /// Runs the open sequence. The state stays `Closed` until it succeeds.
    async fn establish(&mut self) -> Result<()> {
        let reader = self.transport.open().await?;
        self.parser = Some(ResponseParser::new(reader));

        let greeting = self.read_greeting().await?;
        if self.capabilities.is_empty() {
            self.query_capabilities().await?;
        }

        if self.transport.wants_starttls() {
            if matches!(greeting, Greeting::PreAuth) {
                return Err(Error::InvalidState(
                    "server pre-authenticated a connection that requires STARTTLS".to_string(),
                ));
            }
            self.start_tls().await?;
        }

        self.send_client_id().await?;

        self.state = match greeting {
            Greeting::PreAuth => ConnectionState::Authenticated,
            Greeting::Ok => self.login().await?,
        };
        Ok(())
    }

    async fn read_greeting(&mut self) -> Result<Greeting> {
        let response = self.read_response().await?;
        let greeting = match &response {
            Response::Untagged {
                status: Some(Status::Ok),
                ..
            } => Greeting::Ok,
            response if response.is_keyword("PREAUTH") => Greeting::PreAuth,
            response if response.is_keyword("BYE") => {
                let alert = response
                    .payload()
                    .map(|p| p.alert_text().to_string())
                    .unwrap_or_default();
                return Err(Error::Server { alert });
            }
            other => {
                return Err(Error::Protocol {
                    alert: format!("unexpected greeting: {other:?}"),
                    code: None,
                });
            }
        };

        let code = response.payload().and_then(|p| p.code.as_ref());
        if let Some(ResponseCode::Capability(caps)) = code {
            self.capabilities.clone_from(caps);
        }
        Ok(greeting)
    }

    async fn query_capabilities(&mut self) -> Result<()> {
        let (responses, completion) = self.run(&Command::capability(), Phase::Command).await?;
        if let Some(caps) = capabilities_from(&responses, &completion) {
            self.capabilities = caps;
        }
        Ok(())
    }

    async fn start_tls(&mut self) -> Result<()> {
        if !self.is_capable(&Capability::StartTls) {
            return Err(Error::InvalidState(
                "server does not advertise STARTTLS".to_string(),
            ));
        }
        self.run(&Command::starttls(), Phase::Command).await?;

        let parser = self
            .parser
            .take()
            .ok_or_else(|| Error::InvalidState("connection is not open".to_string()))?;
        if parser.has_buffered_data() {
            return Err(Error::InvalidState(
                "unexpected data received before TLS negotiation".to_string(),
            ));
        }

        let reader = self.transport.start_tls(parser.into_inner()).await?;
        self.parser = Some(ResponseParser::new(reader));

        // Capabilities sent in plaintext cannot be trusted.
        self.capabilities.clear();
        self.query_capabilities().await
    }

    async fn send_client_id(&mut self) -> Result<()> {
        let Some(fields) = &self.client_id else {
            return Ok(());
        };
        if !self.is_capable(&Capability::Id) {
            return Ok(());
        }

        let command = Command::id(Some(fields.as_slice()));
        match self.run(&command, Phase::Command).await {
            Err(e) if e.kind() == ErrorKind::Protocol => {
                tracing::debug!(?e, "server rejected ID");
                Ok(())
            }
            result => result.map(drop),
        }
    }

    async fn login(&mut self) -> Result<ConnectionState> {
        let Some(credentials) = &self.credentials else {
            return Ok(ConnectionState::NotAuthenticated);
        };
        if self.is_capable(&Capability::LoginDisabled) {
            return Err(Error::InvalidState(
                "server has disabled LOGIN on this connection".to_string(),
            ));
        }

        let command = self
            .login_command
            .get_or_insert_with(|| credentials.login_command())
            .clone();
        let (responses, completion) = self.run(&command, Phase::Login).await?;
        if let Some(caps) = capabilities_from(&responses, &completion) {
            self.capabilities = caps;
        }
        Ok(ConnectionState::Authenticated)
    }

    /// Writes one command and reads until its completion.
    ///
    /// Returns the collected responses and the completion payload for `OK`.
    async fn run(
        &mut self,
        command: &Command,
        phase: Phase,
    ) -> Result<(Vec<Response>, Payload)> {
        check_line(command)?;

        let tag = self.tags.next();
        self.in_flight = true;
        let written = self
            .transport
            .write_line(&command.tagged_line(&tag), &command.tagged_log_line(&tag))
            .await;
        if let Err(e) = written {
            tracing::warn!(?e, %tag, "failed to send command, closing connection");
            self.close();
            return Err(e);
        }

        let mut collected = Vec::new();
        loop {
            match self.read_response().await? {
                Response::Tagged {
                    tag: received,
                    status,
                    payload,
                } if received == tag => {
                    self.in_flight = false;
                    tracing::debug!(%tag, verb = command.verb(), %status, "command completed");
                    if let Some(err) = completion_error(phase, status, &payload) {
                        if let Some(parser) = self.parser.as_mut() {
                            parser.destroy_responses();
                        }
                        return Err(err);
                    }
                    return Ok((collected, payload));
                }
                Response::Tagged { tag: received, .. } => {
                    tracing::warn!(expected = %tag, %received, "dropping completion for another tag");
                }
                response => collected.push(response),
            }
        }
    }

    /// Reads the next response. A read failure closes the connection.
    async fn read_response(&mut self) -> Result<Response> {
        let parser = self
            .parser
            .as_mut()
            .ok_or_else(|| Error::InvalidState("connection is not open".to_string()))?;
        let result = parser.next_response().await;
        if let Err(e) = &result {
            tracing::warn!(?e, "failed to read response, closing connection");
            self.close();
        }
        result
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.transport)
            .field("state", &self.state)
            .field("tags", &self.tags)
            .field("credentials", &self.credentials)
            .field("capabilities", &self.capabilities)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

fn check_line(command: &Command) -> Result<()> {
    if command.has_line_break() {
        return Err(Error::InvalidState(format!(
            "{} command contains a line break",
            command.verb()
        )));
    }
    Ok(())
}

/// Extracts the latest capability list from a command's responses.
fn capabilities_from(responses: &[Response], completion: &Payload) -> Option<Vec<Capability>> {
    if let Some(ResponseCode::Capability(caps)) = &completion.code {
        return Some(caps.clone());
    }

    responses.iter().rev().find_map(|response| {
        let payload = response.payload()?;
        if let Some(ResponseCode::Capability(caps)) = &payload.code {
            return Some(caps.clone());
        }
        if response.is_keyword("CAPABILITY") {
            let list = payload.text.split_once(' ').map_or("", |(_, rest)| rest);
            return Some(Capability::parse_list(list));
        }
        None
    })
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
    use crate::parser::parse_response;

    #[test]
    fn test_capabilities_from_untagged() {
        let responses =
            vec![parse_response(b"* CAPABILITY IMAP4rev1 STARTTLS AUTH=PLAIN\r\n").unwrap()];
        let caps = capabilities_from(&responses, &Payload::default()).unwrap();
        assert_eq!(
            caps,
            vec![
                Capability::Imap4Rev1,
                Capability::StartTls,
                Capability::Auth("PLAIN".to_string())
            ]
        );
    }

    #[test]
    fn test_capabilities_from_completion_code() {
        let completion = parse_response(b"2 OK [CAPABILITY IMAP4rev2 IDLE] done\r\n").unwrap();
        let caps = capabilities_from(&[], completion.payload().unwrap()).unwrap();
        assert_eq!(caps, vec![Capability::Imap4Rev2, Capability::Idle]);
    }

    #[test]
    fn test_capabilities_absent() {
        let responses = vec![parse_response(b"* 3 EXISTS\r\n").unwrap()];
        assert!(capabilities_from(&responses, &Payload::default()).is_none());
    }

    #[test]
    fn test_check_line() {
        assert!(check_line(&Command::noop()).is_ok());
        let command = Command::new("SELECT").astring("INBOX\r\n1 DELETE x");
        let err = check_line(&command).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
