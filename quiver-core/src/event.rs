//! Event and tag value types

use crate::kind::KindClass;
use serde::{Deserialize, Serialize};

/// An immutable, signed Nostr event as handed over by the protocol layer
///
/// The store never checks `id` or `sig`; that is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Event ID (hex-encoded)
    pub id: String,
    /// Author public key (hex-encoded)
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: i64,
    /// Event kind
    pub kind: u16,
    /// Ordered tag list
    pub tags: Vec<Tag>,
    /// Content
    pub content: String,
    /// Schnorr signature (hex-encoded)
    pub sig: String,
}

/// A single tag: `["name", "value", ...]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag {
    pub values: Vec<String>,
}

impl Tag {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Tag name (first element)
    pub fn name(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// Tag value (second element)
    pub fn value(&self) -> Option<&str> {
        self.values.get(1).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Event {
    /// Lifecycle class of this event's kind
    pub fn kind_class(&self) -> KindClass {
        KindClass::of(self.kind)
    }

    /// Values of every tag named `name`
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.name() == Some(name))
            .filter_map(Tag::value)
    }

    /// The `d` tag of an addressable event
    ///
    /// Returns `None` for every other class. A missing `d` tag reads as the empty string.
    pub fn d_tag(&self) -> Option<&str> {
        match self.kind_class() {
            KindClass::Addressable => Some(self.tag_values("d").next().unwrap_or("")),
            _ => None,
        }
    }

    /// `kind:pubkey:d` address for replaceable and addressable events
    pub fn address(&self) -> Option<String> {
        match self.kind_class() {
            KindClass::Replaceable => Some(format!("{}:{}:", self.kind, self.pubkey)),
            KindClass::Addressable => Some(format!(
                "{}:{}:{}",
                self.kind,
                self.pubkey,
                self.d_tag().unwrap_or("")
            )),
            _ => None,
        }
    }

    /// Self-declared expiration timestamp
    pub fn expiration(&self) -> Option<i64> {
        self.tag_values("expiration")
            .next()
            .and_then(|value| value.trim().parse::<i64>().ok())
    }

    /// True when the event carries an expiration at or before `now`
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiration().is_some_and(|expiration| expiration <= now)
    }

    /// Serialized tag list as stored in the header row
    pub(crate) fn tags_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.tags)
    }
}

/// Parsed `kind:pubkey:d` coordinate from an `a` tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address<'a> {
    pub kind: u16,
    pub pubkey: &'a str,
    pub d_tag: &'a str,
}

impl<'a> Address<'a> {
    pub fn parse(value: &'a str) -> Option<Self> {
        let mut parts = value.splitn(3, ':');
        let kind = parts.next()?.parse::<u16>().ok()?;
        let pubkey = parts.next()?;
        let d_tag = parts.next().unwrap_or("");
        Some(Self {
            kind,
            pubkey,
            d_tag,
        })
    }

    /// The address in the same `kind:pubkey:d` form as [`Event::address`]
    pub fn canonical(&self) -> String {
        format!("{}:{}:{}", self.kind, self.pubkey, self.d_tag)
    }
}

/// Current unix time in seconds
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
