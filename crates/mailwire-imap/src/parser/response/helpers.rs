//! Parser helper functions.

use bytes::Bytes;

use crate::parser::lexer::{Lexer, Token};
use crate::types::ResponseCode;
use crate::{Error, Result};

use super::types::{Element, Payload};

/// Strips the trailing CRLF (or bare LF) of a response line.
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))
        .unwrap_or(line)
}

/// Splits off the first space-delimited word.
pub fn split_word(input: &[u8]) -> (&[u8], &[u8]) {
    match input.iter().position(|&b| b == b' ') {
        Some(i) => (&input[..i], &input[i + 1..]),
        None => (input, &[]),
    }
}

/// Parses `resp-text`: an optional `[CODE args]` followed by free text.
///
/// `offset` is the position of `input` within the line, for error reporting.
pub fn parse_resp_text(input: &[u8], offset: usize) -> Result<Payload> {
    let (code, rest) = if input.first() == Some(&b'[') {
        let close = input
            .iter()
            .position(|&b| b == b']')
            .ok_or_else(|| Error::framing(offset, "unterminated response code"))?;
        let code = parse_response_code(&input[1..close]);
        let rest = &input[close + 1..];
        (Some(code), rest.strip_prefix(b" ").unwrap_or(rest))
    } else {
        (None, input)
    };

    let text = String::from_utf8_lossy(rest).into_owned();
    let alert = matches!(code, Some(ResponseCode::Alert)).then(|| text.clone());

    Ok(Payload {
        text,
        code,
        alert,
        data: None,
    })
}

/// Parses the inside of a bracketed response code.
fn parse_response_code(inner: &[u8]) -> ResponseCode {
    let (name, args) = split_word(inner);
    let name = String::from_utf8_lossy(name);
    let args = String::from_utf8_lossy(args);
    let args = args.trim();

    ResponseCode::parse(&name, (!args.is_empty()).then_some(args))
}

/// Tokenizes untagged data into an element tree.
pub fn parse_elements(data: &Bytes) -> Result<Vec<Element>> {
    let mut lexer = Lexer::new(data);
    parse_sequence(&mut lexer, data, None)
}

/// Parses elements until the closing token (or end of input when `close` is `None`).
fn parse_sequence<'a>(
    lexer: &mut Lexer<'a>,
    data: &Bytes,
    close: Option<Token<'a>>,
) -> Result<Vec<Element>> {
    let mut elements = Vec::new();

    loop {
        let token = lexer.next_token()?;
        match token {
            Token::Eof | Token::Crlf => {
                return match close {
                    None => Ok(elements),
                    Some(expected) => Err(Error::framing(
                        lexer.position(),
                        format!("unbalanced data, missing {expected:?}"),
                    )),
                };
            }
            Token::RParen | Token::RBracket => {
                return if close.as_ref() == Some(&token) {
                    Ok(elements)
                } else {
                    Err(Error::framing(
                        lexer.position(),
                        format!("unexpected {token:?}"),
                    ))
                };
            }
            Token::Space => {}
            Token::LParen => {
                let items = parse_sequence(lexer, data, Some(Token::RParen))?;
                elements.push(Element::List(items));
            }
            Token::LBracket => {
                let items = parse_sequence(lexer, data, Some(Token::RBracket))?;
                elements.push(Element::Section(items));
            }
            Token::Atom(s) => elements.push(Element::Atom(s.to_string())),
            Token::Asterisk => elements.push(Element::Atom("*".to_string())),
            Token::Plus => elements.push(Element::Atom("+".to_string())),
            Token::Number(n) => elements.push(Element::Number(n)),
            Token::Nil => elements.push(Element::Nil),
            Token::QuotedString(s) => elements.push(Element::String(s)),
            Token::Literal(bytes) => elements.push(Element::Literal(data.slice_ref(bytes))),
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
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending(b"abc\r\n"), b"abc");
        assert_eq!(strip_line_ending(b"abc\n"), b"abc");
        assert_eq!(strip_line_ending(b"abc"), b"abc");
    }

    #[test]
    fn test_resp_text_with_code() {
        let payload = parse_resp_text(b"[AUTHENTICATIONFAILED] invalid creds", 0).unwrap();
        assert_eq!(payload.code, Some(ResponseCode::AuthenticationFailed));
        assert_eq!(payload.text, "invalid creds");
        assert_eq!(payload.alert, None);
    }

    #[test]
    fn test_resp_text_alert() {
        let payload = parse_resp_text(b"[ALERT] System going down", 0).unwrap();
        assert_eq!(payload.code, Some(ResponseCode::Alert));
        assert_eq!(payload.alert.as_deref(), Some("System going down"));
        assert_eq!(payload.alert_text(), "System going down");
    }

    #[test]
    fn test_resp_text_code_with_args() {
        let payload = parse_resp_text(b"[PERMANENTFLAGS (\\Seen \\*)] Limited", 0).unwrap();
        assert_eq!(
            payload.code,
            Some(ResponseCode::Unknown {
                name: "PERMANENTFLAGS".into(),
                args: Some("(\\Seen \\*)".into())
            })
        );
        assert_eq!(payload.text, "Limited");
    }

    #[test]
    fn test_resp_text_without_code() {
        let payload = parse_resp_text(b"LOGIN completed", 0).unwrap();
        assert!(payload.code.is_none());
        assert_eq!(payload.text, "LOGIN completed");
    }

    #[test]
    fn test_unterminated_code() {
        let err = parse_resp_text(b"[ALERT oops", 5).unwrap_err();
        assert!(matches!(err, Error::Framing { position: 5, .. }));
    }

    #[test]
    fn test_elements_nested() {
        let data = Bytes::from_static(b"1 FETCH (FLAGS (\\Seen) BODY[HEADER] {5}\r\nhello UID 7)");
        let elements = parse_elements(&data).unwrap();

        assert_eq!(elements[0], Element::Number(1));
        assert_eq!(elements[1], Element::Atom("FETCH".into()));
        let list = elements[2].as_list().unwrap();
        assert_eq!(list[0], Element::Atom("FLAGS".into()));
        assert_eq!(list[1], Element::List(vec![Element::Atom("\\Seen".into())]));
        assert_eq!(list[2], Element::Atom("BODY".into()));
        assert_eq!(list[3], Element::Section(vec![Element::Atom("HEADER".into())]));
        assert_eq!(list[4], Element::Literal(Bytes::from_static(b"hello")));
        assert_eq!(list[6], Element::Number(7));
    }

    #[test]
    fn test_elements_unbalanced() {
        let data = Bytes::from_static(b"LIST (\\HasChildren \"/\" INBOX");
        assert!(parse_elements(&data).is_err());

        let data = Bytes::from_static(b"LIST \\HasChildren)");
        assert!(parse_elements(&data).is_err());
    }
}
