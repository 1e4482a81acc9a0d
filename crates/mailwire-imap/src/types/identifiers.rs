//! Command tags.

/// IMAP command tag.
///
/// Each command sent by the client carries a unique tag, and the server's
/// completion response echoes it back to correlate request and response.
/// Tags produced by [`TagGenerator`](crate::command::TagGenerator) are the
/// decimal form of a counter, so [`Tag::number`] recovers their order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(String);

impl Tag {
    /// Creates a new tag from a string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric value of a counter-generated tag.
    #[must_use]
    pub fn number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
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
    fn new_and_display() {
        let tag = Tag::new("A001");
        assert_eq!(tag.as_str(), "A001");
        assert_eq!(format!("{tag}"), "A001");
    }

    #[test]
    fn equality() {
        assert_eq!(Tag::new("7"), Tag::new("7"));
        assert_ne!(Tag::new("7"), Tag::new("8"));
        assert!(Tag::new("7") == "7");
    }

    #[test]
    fn number() {
        assert_eq!(Tag::new("42").number(), Some(42));
        assert_eq!(Tag::new("A1").number(), None);
    }
}
