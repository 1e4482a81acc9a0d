//! IMAP response parser.
//!
//! Classifies a single logical response line as continuation, untagged or
//! tagged completion. Untagged data responses are not interpreted here;
//! their bytes are kept in [`Payload::data`] and can be tokenized on demand
//! with [`Response::elements`].

#![allow(clippy::missing_errors_doc)]

mod helpers;
mod types;

pub use types::{Element, Payload, Response};

use bytes::Bytes;

use crate::types::{Status, Tag};
use crate::{Error, Result};

use helpers::{parse_resp_text, split_word, strip_line_ending};

/// Untagged keywords whose remainder follows the `resp-text` grammar even
/// though they carry no `OK`/`NO`/`BAD` status.
const CONDITION_KEYWORDS: [&str; 2] = ["BYE", "PREAUTH"];

/// Parses a complete response line, including its CRLF and any inlined literals.
pub fn parse_response(input: &[u8]) -> Result<Response> {
    parse_line(&Bytes::copy_from_slice(input))
}

/// Parses a complete response line held in a shared buffer.
pub(crate) fn parse_line(input: &Bytes) -> Result<Response> {
    let line = input.slice_ref(strip_line_ending(input));

    match line.first() {
        Some(b'+') => Ok(parse_continuation(&line)),
        Some(b'*') => parse_untagged(&line),
        Some(b) if !b.is_ascii_whitespace() => parse_tagged(&line),
        _ => Err(Error::framing(0, "missing tag")),
    }
}

/// Parses `+ text`.
fn parse_continuation(line: &[u8]) -> Response {
    let rest = &line[1..];
    let rest = rest.strip_prefix(b" ").unwrap_or(rest);
    Response::Continuation {
        text: String::from_utf8_lossy(rest).into_owned(),
    }
}

/// Parses `* ...`.
fn parse_untagged(line: &Bytes) -> Result<Response> {
    let Some(rest) = line.strip_prefix(b"* ") else {
        return Err(Error::framing(1, "expected space after '*'"));
    };
    let offset = 2;
    let (word, after) = split_word(rest);
    let keyword = std::str::from_utf8(word).unwrap_or_default();

    if let Some(status) = Status::parse(keyword) {
        let payload = parse_resp_text(after, offset + word.len() + 1)?;
        return Ok(Response::Untagged {
            status: Some(status),
            payload,
        });
    }

    let data = line.slice_ref(rest);
    let mut payload = if CONDITION_KEYWORDS
        .iter()
        .any(|k| k.eq_ignore_ascii_case(keyword))
    {
        parse_resp_text(after, offset + word.len() + 1)?
    } else {
        Payload {
            text: String::from_utf8_lossy(rest).into_owned(),
            ..Payload::default()
        }
    };
    payload.data = Some(data);

    Ok(Response::Untagged {
        status: None,
        payload,
    })
}

/// Parses `tag STATUS resp-text`.
fn parse_tagged(line: &[u8]) -> Result<Response> {
    let tag_len = line
        .iter()
        .position(u8::is_ascii_whitespace)
        .unwrap_or(line.len());
    let tag = String::from_utf8_lossy(&line[..tag_len]).into_owned();

    let Some(rest) = line[tag_len..].strip_prefix(b" ") else {
        return Err(Error::framing(tag_len, "missing status after tag"));
    };
    let (word, after) = split_word(rest);
    let status = std::str::from_utf8(word)
        .ok()
        .and_then(Status::parse)
        .ok_or_else(|| {
            Error::framing(
                tag_len + 1,
                format!("invalid status: {}", String::from_utf8_lossy(word)),
            )
        })?;
    let payload = parse_resp_text(after, tag_len + word.len() + 2)?;

    Ok(Response::Tagged {
        tag: Tag::new(tag),
        status,
        payload,
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
    use crate::types::{ResponseCode, Status};

    use super::*;

    #[test]
    fn test_parse_untagged_ok() {
        let response = parse_response(b"* OK IMAP4rev2 server ready\r\n").unwrap();

        match response {
            Response::Untagged {
                status: Some(Status::Ok),
                payload,
            } => {
                assert!(payload.code.is_none());
                assert_eq!(payload.text, "IMAP4rev2 server ready");
                assert!(payload.data.is_none());
            }
            other => panic!("Expected untagged OK, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_ok() {
        let response = parse_response(b"A001 OK LOGIN completed\r\n").unwrap();

        match response {
            Response::Tagged {
                tag,
                status,
                payload,
            } => {
                assert_eq!(tag.as_str(), "A001");
                assert_eq!(status, Status::Ok);
                assert!(payload.code.is_none());
                assert_eq!(payload.text, "LOGIN completed");
            }
            other => panic!("Expected tagged response, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_no_with_code() {
        let response = parse_response(b"A1 NO [AUTHENTICATIONFAILED] invalid creds\r\n").unwrap();

        assert_eq!(response.tag(), Some(&Tag::new("A1")));
        assert_eq!(response.status(), Some(Status::No));
        let payload = response.payload().unwrap();
        assert_eq!(payload.code, Some(ResponseCode::AuthenticationFailed));
        assert_eq!(payload.alert_text(), "invalid creds");
    }

    #[test]
    fn test_parse_unknown_code_kept() {
        let response = parse_response(b"A2 NO [SOMEOTHERCODE] nope\r\n").unwrap();
        assert_eq!(
            response.payload().unwrap().code,
            Some(ResponseCode::Unknown {
                name: "SOMEOTHERCODE".into(),
                args: None
            })
        );
    }

    #[test]
    fn test_elements_with_oversized_literal_length() {
        let response = parse_response(b"* 1 FETCH {18446744073709551615}\r\nab\r\n").unwrap();
        let err = response.elements().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Framing);
    }

    #[test]
    fn test_parse_status_without_text() {
        let response = parse_response(b"7 OK\r\n").unwrap();
        assert_eq!(response.status(), Some(Status::Ok));
        assert_eq!(response.payload().unwrap().text, "");
    }

    #[test]
    fn test_parse_capability_data() {
        let response = parse_response(b"* CAPABILITY IMAP4rev1 IDLE STARTTLS\r\n").unwrap();

        assert_eq!(response.status(), None);
        assert_eq!(response.keyword(), Some("CAPABILITY"));
        let payload = response.payload().unwrap();
        assert_eq!(payload.text, "CAPABILITY IMAP4rev1 IDLE STARTTLS");
        assert_eq!(
            payload.data.as_deref(),
            Some(&b"CAPABILITY IMAP4rev1 IDLE STARTTLS"[..])
        );
    }

    #[test]
    fn test_parse_message_data_keyword() {
        let response = parse_response(b"* 23 EXISTS\r\n").unwrap();
        assert_eq!(response.keyword(), Some("EXISTS"));
        assert!(response.is_keyword("exists"));
    }

    #[test]
    fn test_parse_bye_and_preauth() {
        let response = parse_response(b"* BYE [UNAVAILABLE] shutting down\r\n").unwrap();
        assert_eq!(response.status(), None);
        assert!(response.is_keyword("BYE"));
        let payload = response.payload().unwrap();
        assert_eq!(payload.code, Some(ResponseCode::Unavailable));
        assert_eq!(payload.text, "shutting down");

        let response = parse_response(b"* PREAUTH [CAPABILITY IMAP4rev1] welcome\r\n").unwrap();
        assert!(response.is_keyword("PREAUTH"));
        assert!(matches!(
            response.payload().unwrap().code,
            Some(ResponseCode::Capability(_))
        ));
    }

    #[test]
    fn test_parse_continuation() {
        let response = parse_response(b"+ Ready for literal\r\n").unwrap();
        assert_eq!(
            response,
            Response::Continuation {
                text: "Ready for literal".to_string()
            }
        );

        let response = parse_response(b"+\r\n").unwrap();
        assert_eq!(
            response,
            Response::Continuation {
                text: String::new()
            }
        );
    }

    #[test]
    fn test_parse_literal_data() {
        let response = parse_response(b"* 1 FETCH (BODY[] {11}\r\nhello\r\nworld)\r\n").unwrap();
        let elements = response.elements().unwrap();
        let list = elements[2].as_list().unwrap();
        assert_eq!(list[2].as_text().unwrap(), "hello\r\nworld");
    }

    #[test]
    fn test_missing_tag() {
        let err = parse_response(b" OK whatever\r\n").unwrap_err();
        assert!(matches!(err, Error::Framing { .. }));
        assert!(parse_response(b"\r\n").is_err());
    }

    #[test]
    fn test_missing_or_invalid_status() {
        assert!(matches!(
            parse_response(b"A1\r\n").unwrap_err(),
            Error::Framing { .. }
        ));
        assert!(matches!(
            parse_response(b"A1 MAYBE later\r\n").unwrap_err(),
            Error::Framing { .. }
        ));
    }

    #[test]
    fn test_untagged_without_space() {
        assert!(parse_response(b"*OK\r\n").is_err());
    }

    #[test]
    fn test_response_code_case_sensitive() {
        let response = parse_response(b"3 NO [unavailable] later\r\n").unwrap();
        assert!(matches!(
            response.payload().unwrap().code,
            Some(ResponseCode::Unknown { .. })
        ));
    }
}
