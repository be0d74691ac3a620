//! Builder pattern for Event construction

use crate::{Event, Tag};

/// Fluent builder for constructing Event instances
///
/// # Example
///
/// ```
/// use quiver_core::EventBuilder;
///
/// let event = EventBuilder::new()
///     .id("abc123")
///     .pubkey("def456")
///     .created_at(1234567890)
///     .kind(1)
///     .content("Hello, Nostr!")
///     .add_tag(vec!["e", "event_id"])
///     .add_tag(vec!["p", "pubkey_id"])
///     .sig("sig789")
///     .build();
///
/// assert_eq!(event.id, "abc123");
/// assert_eq!(event.tags.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventBuilder {
    id: String,
    pubkey: String,
    created_at: i64,
    kind: u16,
    tags: Vec<Tag>,
    content: String,
    sig: String,
}

impl EventBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event ID
    pub fn id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Set the author's public key
    pub fn pubkey<S: Into<String>>(mut self, pubkey: S) -> Self {
        self.pubkey = pubkey.into();
        self
    }

    /// Set the creation timestamp
    pub fn created_at(mut self, timestamp: i64) -> Self {
        self.created_at = timestamp;
        self
    }

    /// Set the event kind
    pub fn kind(mut self, kind: u16) -> Self {
        self.kind = kind;
        self
    }

    /// Set the content
    pub fn content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = content.into();
        self
    }

    /// Set the signature
    pub fn sig<S: Into<String>>(mut self, sig: S) -> Self {
        self.sig = sig.into();
        self
    }

    /// Add a single tag
    ///
    /// Accepts any iterator of string-like values
    pub fn add_tag<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.push(Tag::new(values));
        self
    }

    /// Replace the whole tag list
    pub fn tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    /// Add an `expiration` tag
    pub fn expiration(self, timestamp: i64) -> Self {
        self.add_tag(["expiration".to_string(), timestamp.to_string()])
    }

    /// Build the Event
    pub fn build(self) -> Event {
        Event {
            id: self.id,
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig: self.sig,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basic() {
        let event = EventBuilder::new()
            .id("test_id")
            .pubkey("test_pubkey")
            .created_at(1234567890)
            .kind(1)
            .content("Hello!")
            .sig("test_sig")
            .build();

        assert_eq!(event.id, "test_id");
        assert_eq!(event.pubkey, "test_pubkey");
        assert_eq!(event.created_at, 1234567890);
        assert_eq!(event.kind, 1);
        assert_eq!(event.content, "Hello!");
        assert_eq!(event.sig, "test_sig");
        assert!(event.tags.is_empty());
    }

    #[test]
    fn test_builder_with_tags() {
        let event = EventBuilder::new()
            .add_tag(vec!["e", "event_id"])
            .add_tag(vec!["p", "pubkey_id", "relay_url"])
            .expiration(1700000000)
            .build();

        assert_eq!(event.tags.len(), 3);
        assert_eq!(event.tags[0].values, vec!["e", "event_id"]);
        assert_eq!(event.tags[1].values, vec!["p", "pubkey_id", "relay_url"]);
        assert_eq!(event.tags[2].values, vec!["expiration", "1700000000"]);
    }

    #[test]
    fn test_builder_default() {
        let event = EventBuilder::default().build();

        assert_eq!(event.id, "");
        assert_eq!(event.created_at, 0);
        assert_eq!(event.kind, 0);
        assert!(event.tags.is_empty());
    }
}
