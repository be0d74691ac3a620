//! Event kind ranges and lifecycle classes

/// Legacy user metadata kind (replaceable)
pub const METADATA: u16 = 0;
/// Short text note
pub const TEXT_NOTE: u16 = 1;
/// Legacy follow list kind (replaceable)
pub const CONTACT_LIST: u16 = 3;
/// Deletion request
pub const DELETION: u16 = 5;
/// Request to vanish
pub const VANISH: u16 = 62;

const REPLACEABLE: std::ops::Range<u16> = 10_000..20_000;
const EPHEMERAL: std::ops::Range<u16> = 20_000..30_000;
const ADDRESSABLE: std::ops::Range<u16> = 30_000..40_000;

/// Kinds whose content is mirrored into the full-text index by default
pub const DEFAULT_SEARCHABLE_KINDS: &[u16] = &[0, 1, 20, 1111, 9802, 30023, 30024];

/// Storage lifecycle of an event, decided by its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindClass {
    /// Append-only
    Regular,
    /// One row per (kind, author)
    Replaceable,
    /// Never stored
    Ephemeral,
    /// One row per (kind, author, d tag)
    Addressable,
}

impl KindClass {
    /// Classify a kind
    pub fn of(kind: u16) -> Self {
        if kind == METADATA || kind == CONTACT_LIST || REPLACEABLE.contains(&kind) {
            KindClass::Replaceable
        } else if EPHEMERAL.contains(&kind) {
            KindClass::Ephemeral
        } else if ADDRESSABLE.contains(&kind) {
            KindClass::Addressable
        } else {
            KindClass::Regular
        }
    }
}

pub fn is_replaceable(kind: u16) -> bool {
    KindClass::of(kind) == KindClass::Replaceable
}

pub fn is_ephemeral(kind: u16) -> bool {
    KindClass::of(kind) == KindClass::Ephemeral
}

pub fn is_addressable(kind: u16) -> bool {
    KindClass::of(kind) == KindClass::Addressable
}

/// SQL predicate selecting replaceable kinds, matching the partial unique index
pub(crate) const REPLACEABLE_SQL: &str = "(kind IN (0, 3) OR (kind >= 10000 AND kind < 20000))";

/// SQL predicate selecting addressable kinds, matching the partial unique index
pub(crate) const ADDRESSABLE_SQL: &str = "(kind >= 30000 AND kind < 40000)";
