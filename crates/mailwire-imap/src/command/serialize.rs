//! Command serialization helpers.

use super::Argument;

/// Writes an astring (atom or quoted string).
pub fn write_astring(buf: &mut String, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        write_quoted(buf, s);
    } else {
        buf.push_str(s);
    }
}

/// Writes a quoted string, escaping `"` and `\`.
pub fn write_quoted(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            buf.push('\\');
        }
        buf.push(c);
    }
    buf.push('"');
}

/// Writes a single command argument.
pub fn write_argument(buf: &mut String, arg: &Argument) {
    match arg {
        Argument::Atom(s) => buf.push_str(s),
        Argument::Astring(s) => write_astring(buf, s),
        Argument::Quoted(s) => write_quoted(buf, s),
        Argument::Nil => buf.push_str("NIL"),
        Argument::List(items) => {
            buf.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(' ');
                }
                write_argument(buf, item);
            }
            buf.push(')');
        }
    }
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b >= 0x7F
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

    fn astring(s: &str) -> String {
        let mut buf = String::new();
        write_astring(&mut buf, s);
        buf
    }

    fn quoted(s: &str) -> String {
        let mut buf = String::new();
        write_quoted(&mut buf, s);
        buf
    }

    #[test]
    fn test_astring_atom() {
        assert_eq!(astring("INBOX"), "INBOX");
        assert_eq!(astring("user@example.com"), "user@example.com");
    }

    #[test]
    fn test_astring_needs_quotes() {
        assert_eq!(astring(""), "\"\"");
        assert_eq!(astring("Sent Items"), "\"Sent Items\"");
        assert_eq!(astring("a*b"), "\"a*b\"");
    }

    #[test]
    fn test_quoted_escapes() {
        assert_eq!(quoted("plain"), "\"plain\"");
        assert_eq!(quoted("pa\"ss"), "\"pa\\\"ss\"");
        assert_eq!(quoted("back\\slash"), "\"back\\\\slash\"");
    }

    #[test]
    fn test_list_argument() {
        let mut buf = String::new();
        write_argument(
            &mut buf,
            &Argument::List(vec![
                Argument::Quoted("name".into()),
                Argument::Quoted("mailwire".into()),
                Argument::Nil,
            ]),
        );
        assert_eq!(buf, "(\"name\" \"mailwire\" NIL)");
    }
}
