//! Response value types.

use bytes::Bytes;

use crate::types::{ResponseCode, Status, Tag};

/// Parsed content of a response line after its prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    /// Free-text message (status responses) or the lossy text of the data.
    pub text: String,
    /// Bracketed response code, if present.
    pub code: Option<ResponseCode>,
    /// Alert to show to the user, set when the code is `[ALERT]`.
    pub alert: Option<String>,
    /// Raw bytes of an untagged data response, literals included.
    pub data: Option<Bytes>,
}

impl Payload {
    /// Returns the text to surface to a user when this response is an error.
    #[must_use]
    pub fn alert_text(&self) -> &str {
        self.alert.as_deref().unwrap_or(&self.text)
    }
}

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Continuation request (`+`).
    Continuation {
        /// Text or base64 challenge following the `+`.
        text: String,
    },
    /// Untagged response (`*`), not correlated to a command.
    Untagged {
        /// `OK`, `NO` or `BAD` for status responses, `None` for data.
        status: Option<Status>,
        /// Response content.
        payload: Payload,
    },
    /// Tagged completion of one issued command.
    Tagged {
        /// The command tag.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Response content.
        payload: Payload,
    },
}

impl Response {
    /// Returns the status of a status or completion response.
    #[must_use]
    pub const fn status(&self) -> Option<Status> {
        match self {
            Self::Continuation { .. } => None,
            Self::Untagged { status, .. } => *status,
            Self::Tagged { status, .. } => Some(*status),
        }
    }

    /// Returns the payload, if this is not a continuation.
    #[must_use]
    pub const fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Continuation { .. } => None,
            Self::Untagged { payload, .. } | Self::Tagged { payload, .. } => Some(payload),
        }
    }

    /// Returns the tag of a completion response.
    #[must_use]
    pub const fn tag(&self) -> Option<&Tag> {
        match self {
            Self::Tagged { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Returns the leading keyword of an untagged data response,
    /// e.g. `CAPABILITY`, or `EXISTS` for `* 23 EXISTS`.
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        let Self::Untagged { status: None, payload } = self else {
            return None;
        };
        let data = payload.data.as_deref()?;
        let mut words = data.split(|&b| b == b' ');
        let first = words.next()?;
        let word = if !first.is_empty() && first.iter().all(u8::is_ascii_digit) {
            words.next()?
        } else {
            first
        };
        std::str::from_utf8(word).ok()
    }

    /// Returns true if this is an untagged data response with the given
    /// keyword, ignoring ASCII case.
    #[must_use]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.keyword()
            .is_some_and(|k| k.eq_ignore_ascii_case(keyword))
    }

    /// Tokenizes the data of an untagged data response.
    ///
    /// Status responses and continuations yield an empty list.
    pub fn elements(&self) -> crate::Result<Vec<Element>> {
        match self.payload().and_then(|p| p.data.as_ref()) {
            Some(data) => super::helpers::parse_elements(data),
            None => Ok(Vec::new()),
        }
    }
}

/// A token tree element of an untagged data response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// Bare atom.
    Atom(String),
    /// Number.
    Number(u64),
    /// `NIL`.
    Nil,
    /// Quoted string.
    String(String),
    /// Literal bytes.
    Literal(Bytes),
    /// Parenthesized list.
    List(Vec<Element>),
    /// Bracketed section, e.g. the `[HEADER]` of `BODY[HEADER]`.
    Section(Vec<Element>),
}

impl Element {
    /// Returns the element as text if it is an atom, string or literal.
    #[must_use]
    pub fn as_text(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            Self::Atom(s) | Self::String(s) => Some(std::borrow::Cow::Borrowed(s)),
            Self::Literal(b) => Some(String::from_utf8_lossy(b)),
            _ => None,
        }
    }

    /// Returns the nested elements of a list or section.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) | Self::Section(items) => Some(items),
            _ => None,
        }
    }
}
