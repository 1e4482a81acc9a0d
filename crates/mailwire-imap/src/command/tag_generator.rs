//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Tag;

/// Tag generator for IMAP commands.
///
/// Generates unique, strictly increasing tags in the format "1", "2", etc.
/// The counter is never reset; a fresh generator is required to start over.
///
/// A generator can be [shared](TagGenerator::share) between connections that
/// must draw from a single sequence, for example to correlate traffic of two
/// sibling connections in a test.
#[derive(Debug, Default)]
pub struct TagGenerator {
    counter: Arc<AtomicU64>,
}

impl TagGenerator {
    /// Creates a new tag generator. The first tag is "1".
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator whose next tag is `last + 1`.
    #[must_use]
    pub fn starting_after(last: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(last)),
        }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&self) -> Tag {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Tag::new(n.to_string())
    }

    /// Returns the value of the most recently issued tag (0 if none).
    #[must_use]
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Returns a handle drawing from the same counter.
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
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
    fn test_tag_generation() {
        let generator = TagGenerator::new();
        assert_eq!(generator.next(), Tag::new("1"));
        assert_eq!(generator.next(), Tag::new("2"));
        assert_eq!(generator.next(), Tag::new("3"));
    }

    #[test]
    fn test_current() {
        let generator = TagGenerator::new();
        assert_eq!(generator.current(), 0);
        let _ = generator.next();
        assert_eq!(generator.current(), 1);
    }

    #[test]
    fn test_starting_after() {
        let generator = TagGenerator::starting_after(99);
        assert_eq!(generator.next().as_str(), "100");
    }

    #[test]
    fn test_shared_counter() {
        let first = TagGenerator::new();
        let second = first.share();
        assert_eq!(first.next().as_str(), "1");
        assert_eq!(second.next().as_str(), "2");
        assert_eq!(first.next().as_str(), "3");
        assert_eq!(second.current(), 3);
    }

    #[test]
    fn test_uniqueness() {
        let generator = TagGenerator::new();
        let mut seen = std::collections::HashSet::new();

        for _ in 0..10000 {
            let tag = generator.next();
            assert!(seen.insert(tag), "duplicate tag generated");
        }
    }

    #[test]
    fn test_uniqueness_across_threads() {
        let generator = TagGenerator::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = generator.share();
                std::thread::spawn(move || (0..500).map(|_| shared.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            for tag in handle.join().unwrap() {
                assert!(seen.insert(tag));
            }
        }
        assert_eq!(generator.current(), 2000);
    }
}
