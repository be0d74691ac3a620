//! Which optional indexes a store builds, and which tags it indexes at all

use crate::Tag;

/// Decides whether a tag of an event of `kind` goes into the tag table
pub type TagPredicate = fn(kind: u16, tag: &Tag) -> bool;

/// Index all tags with a single-letter name and a value
pub fn single_letter_tags(_kind: u16, tag: &Tag) -> bool {
    tag.len() >= 2 && tag.name().is_some_and(|name| name.chars().count() == 1)
}

/// Index layout trade-offs
///
/// The defaults suit a client cache: listings by kind, by author and by tag
/// are fast, while the very large "any tag" and "everything by date" indexes
/// are left out.
#[derive(Debug, Clone, Copy)]
pub struct IndexingPolicy {
    /// Index bare `created_at` (only worth it for sync-everything workloads)
    pub index_created_at: bool,
    /// Index `tag_hash` without kind (kind-agnostic tag lookups, very large)
    pub index_tag_hash: bool,
    /// Index `tag_hash + kind + author` (per-author tag lookups, e.g. DMs and reports)
    pub index_tag_hash_kind_pubkey: bool,
    /// Break `created_at` ties by id so results are fully deterministic
    pub order_by_id: bool,
    /// Tag eligibility
    pub should_index: TagPredicate,
}

impl Default for IndexingPolicy {
    fn default() -> Self {
        Self {
            index_created_at: false,
            index_tag_hash: false,
            index_tag_hash_kind_pubkey: true,
            order_by_id: true,
            should_index: single_letter_tags,
        }
    }
}

impl IndexingPolicy {
    /// Every optional index on
    pub fn all() -> Self {
        Self {
            index_created_at: true,
            index_tag_hash: true,
            index_tag_hash_kind_pubkey: true,
            ..Self::default()
        }
    }

    pub fn should_index(&self, kind: u16, tag: &Tag) -> bool {
        (self.should_index)(kind, tag)
    }

    /// `ORDER BY` suffix for `created_at` on `table`
    pub(crate) fn order_by(&self, table: &str) -> String {
        if self.order_by_id {
            format!("{table}.created_at DESC, {table}.id ASC")
        } else {
            format!("{table}.created_at DESC")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_letter_tags() {
        assert!(single_letter_tags(1, &Tag::new(["e", "abc"])));
        assert!(single_letter_tags(1, &Tag::new(["t", "nostr", "extra"])));
        assert!(!single_letter_tags(1, &Tag::new(["e"])));
        assert!(!single_letter_tags(1, &Tag::new(["alt", "text"])));
        assert!(!single_letter_tags(1, &Tag::new(Vec::<String>::new())));
    }

    #[test]
    fn test_custom_predicate() {
        fn only_p(_kind: u16, tag: &Tag) -> bool {
            tag.name() == Some("p")
        }

        let policy = IndexingPolicy {
            should_index: only_p,
            ..IndexingPolicy::default()
        };
        assert!(policy.should_index(1, &Tag::new(["p", "x"])));
        assert!(!policy.should_index(1, &Tag::new(["e", "x"])));
    }

    #[test]
    fn test_order_by() {
        let policy = IndexingPolicy::default();
        assert_eq!(
            policy.order_by("event_headers"),
            "event_headers.created_at DESC, event_headers.id ASC"
        );

        let loose = IndexingPolicy {
            order_by_id: false,
            ..policy
        };
        assert_eq!(loose.order_by("h"), "h.created_at DESC");
    }
}
