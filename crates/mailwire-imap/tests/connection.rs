//! Integration tests for the connection state machine.
//!
//! These tests drive a `Connection` over a scripted in-memory transport:
//! every `open` hands out the next scripted server stream, and every written
//! line is captured together with the text that was allowed into the logs.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream};

use mailwire_imap::{
    Capability, ChannelState, Command, Connection, ConnectionState, Error, ErrorKind,
    Response, ResponseCode, Result, StatusSink, TagGenerator, Transport,
};

type ServerStream = Box<dyn AsyncRead + Unpin + Send>;

/// Transport replaying canned server streams.
#[derive(Default)]
struct ScriptedTransport {
    sessions: VecDeque<ServerStream>,
    open: bool,
    starttls: bool,
    tls_active: bool,
    opens: usize,
    written: Vec<String>,
    logged: Vec<String>,
}

impl ScriptedTransport {
    fn new(sessions: &[&[u8]]) -> Self {
        let mut transport = Self::default();
        for session in sessions {
            transport.push(session);
        }
        transport
    }

    fn push(&mut self, script: &[u8]) {
        self.sessions
            .push_back(Box::new(Cursor::new(script.to_vec())));
    }

    fn with_starttls(mut self) -> Self {
        self.starttls = true;
        self
    }
}

impl Transport for ScriptedTransport {
    type Reader = ServerStream;

    async fn open(&mut self) -> Result<ServerStream> {
        self.opens += 1;
        self.tls_active = false;
        let stream = self.sessions.pop_front().ok_or_else(|| {
            Error::Communication(io::Error::from(io::ErrorKind::ConnectionRefused))
        })?;
        self.open = true;
        Ok(stream)
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn write_line(&mut self, text: &str, log_text: &str) -> Result<()> {
        if !self.open {
            return Err(Error::Communication(io::Error::from(
                io::ErrorKind::NotConnected,
            )));
        }
        self.written.push(text.to_string());
        self.logged.push(log_text.to_string());
        Ok(())
    }

    fn wants_starttls(&self) -> bool {
        self.starttls && !self.tls_active
    }

    async fn start_tls(&mut self, reader: ServerStream) -> Result<ServerStream> {
        drop(reader);
        self.tls_active = true;
        self.sessions
            .pop_front()
            .ok_or_else(|| Error::CertificateValidation("handshake failed".to_string()))
    }
}

#[derive(Default)]
struct RecordingSink(Mutex<Vec<ChannelState>>);

impl RecordingSink {
    fn states(&self) -> Vec<ChannelState> {
        self.0.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingSink {
    fn report(&self, state: ChannelState) {
        self.0.lock().unwrap().push(state);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn written(connection: &Connection<ScriptedTransport>) -> Vec<&str> {
    connection
        .transport()
        .written
        .iter()
        .map(String::as_str)
        .collect()
}

const GREETING: &[u8] = b"* OK IMAP4rev1 server ready\r\n";

fn session(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

#[tokio::test]
async fn login_then_execute_collects_untagged_responses() {
    init_tracing();
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n1 OK done\r\n",
        b"2 OK [CAPABILITY IMAP4rev1 IDLE] logged in\r\n",
        b"* 3 EXISTS\r\n* 1 FETCH (BODY[] {11}\r\nhello\r\nworld)\r\n3 OK NOOP completed\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));
    connection.set_credentials("alice", "s3cret");

    let responses = connection.execute(&Command::noop()).await.unwrap();

    assert_eq!(responses.len(), 2);
    assert!(responses[0].is_keyword("EXISTS"));
    let elements = responses[1].elements().unwrap();
    let body = elements[2].as_list().unwrap();
    assert_eq!(body[2].as_text().unwrap(), "hello\r\nworld");

    assert!(connection.is_authenticated());
    assert_eq!(connection.state(), ConnectionState::Authenticated);
    assert!(connection.is_capable(&Capability::Idle));
    assert_eq!(
        written(&connection),
        vec!["1 CAPABILITY", "2 LOGIN alice \"s3cret\"", "3 NOOP"]
    );
}

#[tokio::test]
async fn sensitive_commands_are_redacted_in_logs() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"2 OK logged in\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));
    connection.set_credentials("alice", "s3cret");
    connection.open().await.unwrap();

    let transport = connection.transport();
    assert_eq!(transport.written[1], "2 LOGIN alice \"s3cret\"");
    assert_eq!(transport.logged[1], "2 [IMAP command redacted]");
    assert_eq!(transport.logged[0], "1 CAPABILITY");
    assert!(transport.logged.iter().all(|line| !line.contains("s3cret")));
}

#[tokio::test]
async fn greeting_capabilities_skip_capability_query() {
    let script = session(&[
        b"* OK [CAPABILITY IMAP4rev1 LITERAL+] ready\r\n",
        b"1 OK NOOP done\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));

    connection.execute_simple(&Command::noop()).await.unwrap();

    assert_eq!(connection.state(), ConnectionState::NotAuthenticated);
    assert!(connection.is_capable(&Capability::LiteralPlus));
    assert_eq!(written(&connection), vec!["1 NOOP"]);
}

#[tokio::test]
async fn rejected_credentials_are_authentication_failures() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"2 NO [AUTHENTICATIONFAILED] invalid creds\r\n",
    ]);
    let sink = Arc::new(RecordingSink::default());
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]))
        .with_status_sink(Arc::clone(&sink) as Arc<dyn StatusSink>);
    connection.set_credentials("alice", "wrong");

    let err = connection.execute(&Command::noop()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    assert_eq!(err.alert(), Some("invalid creds"));
    assert_eq!(err.response_code(), Some(&ResponseCode::AuthenticationFailed));
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(!connection.transport().open);
    assert_eq!(sink.states(), vec![ChannelState::BadConfiguration]);
}

#[tokio::test]
async fn login_no_without_code_is_authentication_failure() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"2 NO go away\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));
    connection.set_credentials("alice", "wrong");

    let err = connection.open().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    assert_eq!(err.response_code(), None);
}

#[tokio::test]
async fn login_with_unknown_code_is_protocol_error() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"2 NO [SOMEOTHERCODE] x\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));
    connection.set_credentials("alice", "pw");

    let err = connection.open().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(
        err.response_code(),
        Some(&ResponseCode::Unknown {
            name: "SOMEOTHERCODE".to_string(),
            args: None
        })
    );
}

#[tokio::test]
async fn login_unavailable_is_server_error() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"2 NO [UNAVAILABLE] backend down\r\n",
    ]);
    let sink = Arc::new(RecordingSink::default());
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]))
        .with_status_sink(Arc::clone(&sink) as Arc<dyn StatusSink>);
    connection.set_credentials("alice", "pw");

    let err = connection.open().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert!(err.is_retryable());
    assert_eq!(err.alert(), Some("backend down"));
    assert_eq!(sink.states(), vec![ChannelState::ServerError]);
}

#[tokio::test]
async fn bye_greeting_is_server_error() {
    let script = b"* BYE [ALERT] too many connections\r\n";
    let mut connection = Connection::new(ScriptedTransport::new(&[script]));

    let err = connection.open().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.alert(), Some("too many connections"));
    assert!(!connection.is_open());
    assert!(connection.transport().written.is_empty());
}

#[tokio::test]
async fn preauth_greeting_skips_login() {
    let script = session(&[
        b"* PREAUTH [CAPABILITY IMAP4rev2] welcome back\r\n",
        b"1 OK done\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));
    connection.set_credentials("alice", "pw");

    connection.execute(&Command::noop()).await.unwrap();

    assert!(connection.is_authenticated());
    assert_eq!(written(&connection), vec!["1 NOOP"]);
}

#[tokio::test]
async fn command_failure_keeps_connection_open() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"2 NO [NONEXISTENT] no such mailbox\r\n",
        b"3 BAD [UNAVAILABLE] busy\r\n",
        b"4 OK done\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));
    let select = Command::new("SELECT").astring("Missing");

    let err = connection.execute(&select).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(err.response_code(), Some(&ResponseCode::NonExistent));
    assert_eq!(err.alert(), Some("no such mailbox"));
    assert!(connection.is_open());

    let err = connection.execute(&select).await.unwrap_err();
    assert!(matches!(err, Error::Server { .. }));

    connection.execute_simple(&Command::noop()).await.unwrap();
    assert_eq!(
        written(&connection),
        vec!["1 CAPABILITY", "2 SELECT Missing", "3 SELECT Missing", "4 NOOP"]
    );
}

#[tokio::test]
async fn completion_for_another_tag_is_dropped() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"* 4 EXISTS\r\n99 OK stale\r\n+ go ahead\r\n2 OK done\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));

    let responses = connection.execute(&Command::noop()).await.unwrap();

    assert_eq!(responses.len(), 2);
    assert!(responses.iter().all(|r| r.tag().is_none()));
    assert!(matches!(responses[1], Response::Continuation { .. }));
}

#[tokio::test]
async fn line_breaks_are_rejected_before_opening() {
    let mut connection = Connection::new(ScriptedTransport::new(&[GREETING]));
    let command = Command::new("SELECT").astring("INBOX\r\nA1 DELETE INBOX");

    let err = connection.execute(&command).await.unwrap_err();

    assert!(matches!(err, Error::InvalidState(_)));
    assert_eq!(connection.transport().opens, 0);
    assert_eq!(connection.tag_generator().current(), 0);
}

#[tokio::test]
async fn transport_failure_is_communication_error() {
    let sink = Arc::new(RecordingSink::default());
    let mut connection = Connection::new(ScriptedTransport::default())
        .with_status_sink(Arc::clone(&sink) as Arc<dyn StatusSink>);

    let err = connection.execute(&Command::noop()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Communication);
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(sink.states(), vec![ChannelState::CommunicationError]);
}

#[tokio::test]
async fn peer_close_mid_command_closes_and_next_command_reopens() {
    let first = session(&[GREETING, b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n"]);
    let second = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n3 OK done\r\n",
        b"4 OK done\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&first, &second]));

    let err = connection.execute(&Command::noop()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Communication);
    assert!(!connection.is_open());

    connection.execute(&Command::noop()).await.unwrap();
    assert_eq!(connection.transport().opens, 2);
    assert_eq!(
        written(&connection),
        vec!["1 CAPABILITY", "2 NOOP", "3 CAPABILITY", "4 NOOP"]
    );
}

#[tokio::test]
async fn truncated_literal_is_framing_error() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"* 1 FETCH (BODY[] {50}\r\nshort",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));

    let err = connection.execute(&Command::noop()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Framing);
    assert!(!connection.is_open());
}

#[tokio::test]
async fn starttls_upgrades_and_requeries_capabilities() {
    let plain = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED\r\n1 OK done\r\n",
        b"2 OK begin TLS negotiation now\r\n",
    ]);
    let tls = session(&[
        b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n3 OK done\r\n",
        b"4 OK logged in\r\n",
    ]);
    let transport = ScriptedTransport::new(&[&plain, &tls]).with_starttls();
    let mut connection = Connection::new(transport);
    connection.set_credentials("alice", "pw");

    connection.open().await.unwrap();

    assert!(connection.is_authenticated());
    assert!(!connection.is_capable(&Capability::StartTls));
    assert!(connection.transport().tls_active);
    assert_eq!(
        written(&connection),
        vec!["1 CAPABILITY", "2 STARTTLS", "3 CAPABILITY", "4 LOGIN alice \"pw\""]
    );
}

#[tokio::test]
async fn starttls_without_server_support_fails() {
    let plain = session(&[GREETING, b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n"]);
    let transport = ScriptedTransport::new(&[&plain]).with_starttls();
    let mut connection = Connection::new(transport);

    let err = connection.open().await.unwrap_err();

    assert!(matches!(err, Error::InvalidState(_)));
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(written(&connection), vec!["1 CAPABILITY"]);
    assert!(!connection.is_open());
}

#[tokio::test]
async fn data_injected_before_tls_is_rejected() {
    let plain = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1 STARTTLS\r\n1 OK done\r\n",
        b"2 OK begin TLS\r\n* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n",
    ]);
    let transport = ScriptedTransport::new(&[&plain, b""]).with_starttls();
    let mut connection = Connection::new(transport);

    let err = connection.open().await.unwrap_err();

    assert!(matches!(err, Error::InvalidState(_)));
    assert!(!connection.transport().tls_active);
}

#[tokio::test]
async fn client_id_is_sent_when_advertised_and_rejection_ignored() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1 ID\r\n1 OK done\r\n",
        b"2 BAD unsupported\r\n",
        b"3 OK done\r\n",
    ]);
    let fields = vec![("name".to_string(), "mailwire".to_string())];
    let mut connection =
        Connection::new(ScriptedTransport::new(&[&script])).with_client_id(fields);

    connection.execute(&Command::noop()).await.unwrap();

    assert_eq!(
        written(&connection),
        vec!["1 CAPABILITY", "2 ID (\"name\" \"mailwire\")", "3 NOOP"]
    );
}

#[tokio::test]
async fn client_id_is_skipped_without_capability() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"2 OK done\r\n",
    ]);
    let fields = vec![("name".to_string(), "mailwire".to_string())];
    let mut connection =
        Connection::new(ScriptedTransport::new(&[&script])).with_client_id(fields);

    connection.execute(&Command::noop()).await.unwrap();
    assert_eq!(written(&connection), vec!["1 CAPABILITY", "2 NOOP"]);
}

#[tokio::test]
async fn new_credentials_replace_cached_login() {
    let first = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"2 OK logged in\r\n",
    ]);
    let second = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n3 OK done\r\n",
        b"4 OK logged in\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&first, &second]));
    connection.set_credentials("alice", "old");
    connection.open().await.unwrap();
    connection.close();

    connection.set_credentials("alice", "new");
    connection.open().await.unwrap();

    let transport = connection.transport();
    assert_eq!(transport.written[1], "2 LOGIN alice \"old\"");
    assert_eq!(transport.written[3], "4 LOGIN alice \"new\"");
}

#[tokio::test]
async fn cleared_credentials_open_unauthenticated() {
    let script = session(&[GREETING, b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n"]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));
    connection.set_credentials("alice", "pw");
    connection.clear_credentials();

    connection.open().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::NotAuthenticated);
    assert!(connection.credentials().is_none());
}

#[tokio::test]
async fn abandoned_command_forces_reconnect() {
    let (client, mut server): (DuplexStream, DuplexStream) = tokio::io::duplex(4096);
    server
        .write_all(&session(&[GREETING, b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n"]))
        .await
        .unwrap();

    let mut transport = ScriptedTransport::default();
    transport.sessions.push_back(Box::new(client));
    transport.push(&session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n3 OK done\r\n",
        b"4 OK done\r\n",
    ]));
    let mut connection = Connection::new(transport);

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), connection.execute(&Command::noop()))
            .await;
    assert!(abandoned.is_err());
    assert!(connection.is_open());

    connection.execute(&Command::noop()).await.unwrap();
    assert_eq!(connection.transport().opens, 2);
    assert_eq!(
        written(&connection),
        vec!["1 CAPABILITY", "2 NOOP", "3 CAPABILITY", "4 NOOP"]
    );
    drop(server);
}

#[tokio::test]
async fn shared_tag_generator_couples_connections() {
    let tags = TagGenerator::new();
    let first = session(&[
        b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        b"1 OK done\r\n",
        b"3 OK done\r\n",
    ]);
    let second = session(&[b"* OK [CAPABILITY IMAP4rev1] ready\r\n", b"2 OK done\r\n"]);
    let mut a = Connection::with_tag_generator(ScriptedTransport::new(&[&first]), tags.share());
    let mut b = Connection::with_tag_generator(ScriptedTransport::new(&[&second]), tags.share());

    a.execute(&Command::noop()).await.unwrap();
    b.execute(&Command::noop()).await.unwrap();
    a.execute(&Command::noop()).await.unwrap();

    assert_eq!(written(&a), vec!["1 NOOP", "3 NOOP"]);
    assert_eq!(written(&b), vec!["2 NOOP"]);
    assert_eq!(tags.current(), 3);
}

#[tokio::test]
async fn close_is_idempotent_and_logout_closes() {
    let script = session(&[
        GREETING,
        b"* CAPABILITY IMAP4rev1\r\n1 OK done\r\n",
        b"* BYE logging out\r\n2 OK LOGOUT completed\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));

    connection.close();
    connection.close();
    assert_eq!(connection.state(), ConnectionState::Closed);

    connection.open().await.unwrap();
    connection.logout().await.unwrap();
    assert!(!connection.is_open());
    assert!(!connection.transport().open);
    assert!(connection.capabilities().is_empty());

    connection.logout().await.unwrap();
    connection.close();
    assert_eq!(written(&connection), vec!["1 CAPABILITY", "2 LOGOUT"]);
}

#[tokio::test]
async fn refresh_capabilities_requeries() {
    let script = session(&[
        b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        b"* CAPABILITY IMAP4rev1 IDLE NAMESPACE\r\n1 OK done\r\n",
    ]);
    let mut connection = Connection::new(ScriptedTransport::new(&[&script]));

    let caps = connection.refresh_capabilities().await.unwrap().to_vec();

    assert_eq!(
        caps,
        vec![Capability::Imap4Rev1, Capability::Idle, Capability::Namespace]
    );
}
