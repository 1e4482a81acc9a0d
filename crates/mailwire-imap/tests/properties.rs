//! Property tests for tagging, quoting and literal framing.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::io::Cursor;

use proptest::prelude::*;

use mailwire_imap::parser::{ResponseParser, parse_response};
use mailwire_imap::{Command, Element, Response, Status, TagGenerator};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn tags_strictly_increase(count in 1usize..200, start in 0u64..1_000_000) {
        let tags = TagGenerator::starting_after(start);
        let shared = tags.share();
        let mut last = start;
        for i in 0..count {
            let tag = if i % 2 == 0 { tags.next() } else { shared.next() };
            let n = tag.number().unwrap();
            prop_assert!(n > last);
            last = n;
        }
        prop_assert_eq!(tags.current(), start + count as u64);
    }

    #[test]
    fn literal_payload_never_splits_a_response(
        payload in proptest::collection::vec(any::<u8>(), 0..512),
        chunk in 1usize..64,
    ) {
        let mut wire = format!("* 1 FETCH (BODY[] {{{}}}\r\n", payload.len()).into_bytes();
        wire.extend_from_slice(&payload);
        wire.extend_from_slice(b")\r\n7 OK done\r\n");

        // Deliver the bytes in small chunks to exercise partial reads.
        let mut builder = tokio_test::io::Builder::new();
        for part in wire.chunks(chunk) {
            builder.read(part);
        }
        let mock = builder.build();

        let (first, second) = runtime().block_on(async move {
            let mut parser = ResponseParser::new(mock);
            let first = parser.next_response().await.unwrap();
            let second = parser.next_response().await.unwrap();
            (first, second)
        });

        let elements = first.elements().unwrap();
        let Some(Element::List(items)) = elements.get(2) else {
            panic!("expected FETCH list, got {elements:?}");
        };
        prop_assert_eq!(&items[2], &Element::Literal(payload.clone().into()));
        prop_assert_eq!(second.tag().unwrap().as_str(), "7");
        prop_assert_eq!(second.status(), Some(Status::Ok));
    }

    #[test]
    fn quoted_arguments_stay_on_one_line(value in "[ -~]{0,64}") {
        let command = Command::new("SELECT").astring(value.clone());
        prop_assert!(!command.has_line_break());

        let line = command.text();
        prop_assert!(line.starts_with("SELECT "));
        prop_assert!(!line.contains('\r') && !line.contains('\n'));
    }

    #[test]
    fn text_after_code_is_preserved(text in "[a-zA-Z0-9 ]{0,40}") {
        let line = format!("A1 NO [SOMEOTHERCODE] {text}\r\n");
        let response = parse_response(line.as_bytes()).unwrap();
        let Response::Tagged { status, payload, .. } = response else {
            panic!("expected tagged response");
        };
        prop_assert_eq!(status, Status::No);
        prop_assert_eq!(payload.text.trim(), text.trim());
    }
}

#[test]
fn literal_framing_over_plain_reader() {
    let wire = b"* 2 FETCH (BODY[] {4}\r\n\r\n\r\n)\r\n3 OK done\r\n".to_vec();
    let responses = runtime().block_on(async move {
        let mut parser = ResponseParser::new(Cursor::new(wire));
        let first = parser.next_response().await.unwrap();
        let second = parser.next_response().await.unwrap();
        (first, second)
    });

    assert!(responses.0.is_keyword("FETCH"));
    assert_eq!(responses.1.tag().unwrap().as_str(), "3");
}
