//! Conversions between JSON, nostr-sdk events and stored events
//!
//! The store itself never checks ids or signatures. [`Event::verified_from_json`]
//! is there for callers that import untrusted dumps and want nostr-sdk to do it.

use crate::{Error, Event, Result, Tag};

/// Convert from a nostr-sdk Event (infallible)
impl From<nostr_sdk::Event> for Event {
    fn from(nostr_event: nostr_sdk::Event) -> Self {
        Event::from(&nostr_event)
    }
}

impl From<&nostr_sdk::Event> for Event {
    fn from(nostr_event: &nostr_sdk::Event) -> Self {
        Event {
            id: nostr_event.id.to_hex(),
            pubkey: nostr_event.pubkey.to_string(),
            created_at: nostr_event.created_at.as_u64() as i64,
            kind: nostr_event.kind.as_u16(),
            tags: nostr_event
                .tags
                .iter()
                .map(|tag| Tag {
                    values: tag.as_vec().iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
            content: nostr_event.content.clone(),
            sig: nostr_event.sig.to_string(),
        }
    }
}

/// Parse a NIP-01 JSON event without checking id or signature
///
/// # Example
///
/// ```
/// use quiver_core::Event;
///
/// let json = r#"{"id":"abc","pubkey":"def","created_at":1234567890,"kind":1,"tags":[["t","nostr"]],"content":"Hello","sig":"123"}"#;
/// let event = Event::try_from(json)?;
/// assert_eq!(event.kind, 1);
/// # Ok::<(), quiver_core::Error>(())
/// ```
impl TryFrom<&str> for Event {
    type Error = Error;

    fn try_from(json: &str) -> Result<Self> {
        check_kind_range(json)?;

        serde_json::from_str(json).map_err(|e| {
            let msg = e.to_string();
            let hint = if msg.contains("missing field") {
                " (required Nostr event fields: id, pubkey, created_at, kind, tags, content, sig)"
            } else if msg.contains("invalid type") {
                " (hint: tags must be an array of string arrays, all values must be strings)"
            } else {
                ""
            };
            Error::Conversion(format!("{}{}", msg, hint))
        })
    }
}

impl TryFrom<String> for Event {
    type Error = Error;

    fn try_from(json: String) -> Result<Self> {
        Event::try_from(json.as_str())
    }
}

/// Serialize to compact NIP-01 JSON
impl TryFrom<&Event> for String {
    type Error = Error;

    fn try_from(event: &Event) -> Result<Self> {
        Ok(serde_json::to_string(event)?)
    }
}

impl Event {
    /// Parse with nostr-sdk and verify the id hash and Schnorr signature
    pub fn verified_from_json(json: &str) -> Result<Self> {
        check_kind_range(json)?;

        let nostr_event: nostr_sdk::Event =
            serde_json::from_str(json).map_err(|e| Error::Conversion(e.to_string()))?;
        nostr_event
            .verify()
            .map_err(|e| Error::Conversion(format!("Event {} failed verification: {}", nostr_event.id, e)))?;

        Ok(Event::from(nostr_event))
    }
}

/// Reject out-of-range kinds with a readable message before deserializing
fn check_kind_range(json: &str) -> Result<()> {
    if let Some(kind) = serde_json::from_str::<serde_json::Value>(json)
        .ok()
        .and_then(|v| v.get("kind").and_then(|k| k.as_i64()))
        .filter(|k| !(0..=65535).contains(k))
    {
        return Err(Error::Conversion(format!(
            "Event kind {} is out of valid range (0-65535). Nostr event kinds must fit in a u16.",
            kind
        )));
    }
    Ok(())
}
