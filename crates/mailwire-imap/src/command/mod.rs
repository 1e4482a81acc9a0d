//! IMAP command builder.
//!
//! A [`Command`] is a verb plus ordered arguments. Commands carrying secrets
//! are marked sensitive so that their text never reaches the logs.

mod serialize;
mod tag_generator;

pub use tag_generator::TagGenerator;

use crate::types::Tag;

/// Placeholder written to logs in place of a sensitive command.
pub const REDACTED: &str = "[IMAP command redacted]";

/// A single command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Written verbatim.
    Atom(String),
    /// Written bare when it is a valid atom, quoted otherwise.
    Astring(String),
    /// Always written as a quoted string.
    Quoted(String),
    /// The `NIL` keyword.
    Nil,
    /// Parenthesized list of arguments.
    List(Vec<Argument>),
}

impl Argument {
    fn has_line_break(&self) -> bool {
        match self {
            Self::Atom(s) | Self::Astring(s) | Self::Quoted(s) => {
                s.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0)
            }
            Self::Nil => false,
            Self::List(items) => items.iter().any(Self::has_line_break),
        }
    }
}

/// IMAP command.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    args: Vec<Argument>,
    sensitive: bool,
}

impl Command {
    /// Creates a command with no arguments.
    #[must_use]
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
            sensitive: false,
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    /// Appends an argument written verbatim.
    #[must_use]
    pub fn atom(self, s: impl Into<String>) -> Self {
        self.arg(Argument::Atom(s.into()))
    }

    /// Appends an astring argument.
    #[must_use]
    pub fn astring(self, s: impl Into<String>) -> Self {
        self.arg(Argument::Astring(s.into()))
    }

    /// Appends a quoted string argument.
    #[must_use]
    pub fn quoted(self, s: impl Into<String>) -> Self {
        self.arg(Argument::Quoted(s.into()))
    }

    /// Marks the command as sensitive.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// CAPABILITY command.
    #[must_use]
    pub fn capability() -> Self {
        Self::new("CAPABILITY")
    }

    /// NOOP command.
    #[must_use]
    pub fn noop() -> Self {
        Self::new("NOOP")
    }

    /// LOGOUT command.
    #[must_use]
    pub fn logout() -> Self {
        Self::new("LOGOUT")
    }

    /// STARTTLS command.
    #[must_use]
    pub fn starttls() -> Self {
        Self::new("STARTTLS")
    }

    /// LOGIN command. Always sensitive; the secret is always quoted.
    #[must_use]
    pub fn login(username: &str, secret: &str) -> Self {
        Self::new("LOGIN").astring(username).quoted(secret).sensitive()
    }

    /// ID command (RFC 2971). `None` sends `ID NIL`.
    #[must_use]
    pub fn id(parameters: Option<&[(String, String)]>) -> Self {
        let arg = parameters.map_or(Argument::Nil, |params| {
            Argument::List(
                params
                    .iter()
                    .flat_map(|(k, v)| [Argument::Quoted(k.clone()), Argument::Quoted(v.clone())])
                    .collect(),
            )
        });
        Self::new("ID").arg(arg)
    }

    /// Returns the command verb.
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Returns the arguments in order.
    #[must_use]
    pub fn arguments(&self) -> &[Argument] {
        &self.args
    }

    /// Returns true if the command text must not be logged.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Returns true if any argument would break the line framing.
    #[must_use]
    pub fn has_line_break(&self) -> bool {
        self.verb.bytes().any(|b| b == b'\r' || b == b'\n')
            || self.args.iter().any(Argument::has_line_break)
    }

    /// Returns the command text without tag or line terminator.
    #[must_use]
    pub fn text(&self) -> String {
        let mut buf = self.verb.clone();
        for arg in &self.args {
            buf.push(' ');
            serialize::write_argument(&mut buf, arg);
        }
        buf
    }

    /// Returns the tagged command line, without CRLF.
    #[must_use]
    pub fn tagged_line(&self, tag: &Tag) -> String {
        format!("{tag} {}", self.text())
    }

    /// Returns what may be logged for the tagged command line.
    #[must_use]
    pub fn tagged_log_line(&self, tag: &Tag) -> String {
        if self.sensitive {
            format!("{tag} {REDACTED}")
        } else {
            self.tagged_line(tag)
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Command");
        s.field("verb", &self.verb);
        if self.sensitive {
            s.field("args", &REDACTED);
        } else {
            s.field("args", &self.args);
        }
        s.field("sensitive", &self.sensitive).finish()
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
    fn test_simple_commands() {
        let tag = Tag::new("1");
        assert_eq!(Command::capability().tagged_line(&tag), "1 CAPABILITY");
        assert_eq!(Command::noop().tagged_line(&tag), "1 NOOP");
        assert_eq!(Command::logout().tagged_line(&tag), "1 LOGOUT");
        assert_eq!(Command::starttls().tagged_line(&tag), "1 STARTTLS");
    }

    #[test]
    fn test_login_text() {
        let cmd = Command::login("user@example.com", "se\"cr\\et");
        assert!(cmd.is_sensitive());
        assert_eq!(cmd.text(), "LOGIN user@example.com \"se\\\"cr\\\\et\"");
    }

    #[test]
    fn test_login_secret_always_quoted() {
        let cmd = Command::login("bob", "plain");
        assert_eq!(cmd.text(), "LOGIN bob \"plain\"");
    }

    #[test]
    fn test_sensitive_log_line() {
        let tag = Tag::new("7");
        let cmd = Command::login("bob", "hunter2");
        let log = cmd.tagged_log_line(&tag);
        assert_eq!(log, format!("7 {REDACTED}"));
        assert_ne!(log, cmd.tagged_line(&tag));
        assert!(!format!("{cmd:?}").contains("hunter2"));
    }

    #[test]
    fn test_plain_log_line_matches() {
        let tag = Tag::new("3");
        let cmd = Command::new("SELECT").astring("INBOX");
        assert_eq!(cmd.tagged_log_line(&tag), cmd.tagged_line(&tag));
        assert_eq!(cmd.tagged_line(&tag), "3 SELECT INBOX");
    }

    #[test]
    fn test_id_command() {
        let params = vec![
            ("name".to_string(), "mailwire".to_string()),
            ("version".to_string(), "0.1".to_string()),
        ];
        assert_eq!(
            Command::id(Some(&params)).text(),
            "ID (\"name\" \"mailwire\" \"version\" \"0.1\")"
        );
        assert_eq!(Command::id(None).text(), "ID NIL");
    }

    #[test]
    fn test_line_break_detection() {
        assert!(!Command::new("NOOP").has_line_break());
        assert!(Command::new("SELECT").quoted("a\r\nb").has_line_break());
        assert!(
            Command::new("X")
                .arg(Argument::List(vec![Argument::Atom("\n".into())]))
                .has_line_break()
        );
    }
}
