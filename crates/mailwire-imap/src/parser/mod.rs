//! IMAP protocol parser.
//!
//! The parser is split into three parts:
//!
//! - **Reader**: [`ResponseParser`] pulls bytes from a stream and assembles
//!   one logical response at a time, reading `{n}` literals as raw bytes
//! - **Response**: classifies a logical line as continuation, untagged or
//!   tagged completion
//! - **Lexer**: tokenizes data within a line (atoms, strings, literals,
//!   parenthesized lists)
//!
//! # Example
//!
//! ```
//! use mailwire_imap::parser::{parse_response, Response};
//! use mailwire_imap::Status;
//!
//! let response = parse_response(b"* OK IMAP4rev2 server ready\r\n").unwrap();
//!
//! match response {
//!     Response::Untagged { status: Some(Status::Ok), payload } => {
//!         assert!(payload.text.contains("IMAP4rev2"));
//!     }
//!     _ => panic!("Expected untagged OK"),
//! }
//! ```

pub mod lexer;
mod reader;
pub mod response;

pub use lexer::{Lexer, Token};
pub use reader::{MAX_LINE_LENGTH, MAX_LITERAL_SIZE, ResponseParser};
pub use response::{Element, Payload, Response, parse_response};
