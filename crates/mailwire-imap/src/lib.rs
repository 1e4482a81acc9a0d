//! # mailwire-imap
//!
//! The tagged request/response core of an IMAP client: literal-safe
//! response framing, command tagging, connection setup and login, and a
//! classification of failures that tells a user interface what went wrong.
//!
//! ## Features
//!
//! - **Literal-safe framing**: `{n}` literals are read as raw bytes, so
//!   payloads containing CRLF never split a response
//! - **Cancel-safe reads**: parser progress lives in the parser, not in the
//!   future that drives it
//! - **Lazy open**: the first command connects, reads the greeting, discovers
//!   capabilities, negotiates STARTTLS and logs in
//! - **Classified errors**: bad credentials, certificate problems, transient
//!   server trouble and broken streams are distinguishable
//! - **TLS via rustls**: Secure connections without OpenSSL dependency
//! - **Redacted logging**: LOGIN and other sensitive commands never reach
//!   the logs in clear text
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailwire_imap::{Command, Config, Connection, NetworkTransport, Security};
//!
//! # async fn run() -> mailwire_imap::Result<()> {
//! let config = Config::builder("imap.example.com")
//!     .security(Security::Implicit)
//!     .build();
//! let mut connection = Connection::new(NetworkTransport::new(config));
//! connection.set_credentials("user@example.com", "password");
//!
//! let responses = connection.execute(&Command::noop()).await?;
//! for response in &responses {
//!     println!("{response:?}");
//! }
//!
//! connection.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use mailwire_imap::{Command, Connection, ErrorKind, Transport};
//!
//! # async fn run<T: Transport>(connection: &mut Connection<T>) {
//! match connection.execute(&Command::capability()).await {
//!     Ok(_) => {}
//!     Err(e) if e.kind() == ErrorKind::AuthenticationFailed => {
//!         eprintln!("check your password: {}", e.alert().unwrap_or_default());
//!     }
//!     Err(e) if e.is_retryable() => eprintln!("try again later: {e}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: Command builders, argument quoting and tag generation
//! - [`connection`]: Connection state machine
//! - [`parser`]: Response framing and parsing
//! - [`transport`]: Transport trait and the TCP/TLS implementation
//! - [`types`]: Core IMAP types (tags, status, response codes, capabilities)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod classify;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod status;
pub mod transport;
pub mod types;

pub use classify::{Phase, classify};
pub use command::{Argument, Command, TagGenerator};
pub use connection::{Connection, ConnectionState, Credentials};
pub use error::{Error, ErrorKind, Result};
pub use parser::{Element, Payload, Response, ResponseParser};
pub use status::{ChannelState, StatusSink, TracingSink};
pub use transport::{Config, ConfigBuilder, NetworkTransport, Security, Transport};
pub use types::{Capability, ResponseCode, Status, Tag};
