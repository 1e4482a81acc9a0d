//! Core IMAP types.
//!
//! Value types shared by the parser, the command builder and the connection.

mod capability;
mod identifiers;
mod response_code;

pub use capability::{Capability, Status};
pub use identifiers::Tag;
pub use response_code::ResponseCode;
