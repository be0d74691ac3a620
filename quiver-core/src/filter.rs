//! Query predicate over stored events
//!
//! Semantics follow NIP-01: fields are AND'ed, values inside one field are OR'ed.
//! `tags_all` is the AND flavour of `tags`: every listed value must be present
//! as its own tag on the event.

use std::collections::BTreeMap;

/// Query predicate over stored events
///
/// # Example
///
/// ```
/// use quiver_core::Filter;
///
/// let filter = Filter::new()
///     .kinds([1, 6])
///     .tag("t", ["nostr", "rust"])
///     .since(1_700_000_000)
///     .limit(20);
///
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub ids: Option<Vec<String>>,
    pub authors: Option<Vec<String>>,
    pub kinds: Option<Vec<u16>>,
    /// Tag name -> accepted values (any of)
    pub tags: Option<BTreeMap<String, Vec<String>>>,
    /// Tag name -> required values (all of)
    pub tags_all: Option<BTreeMap<String, Vec<String>>>,
    /// Inclusive lower bound on `created_at`
    pub since: Option<i64>,
    /// Inclusive upper bound on `created_at`
    pub until: Option<i64>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = Some(authors.into_iter().map(Into::into).collect());
        self
    }

    pub fn kinds<I: IntoIterator<Item = u16>>(mut self, kinds: I) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Match events carrying a `name` tag with any of `values`
    pub fn tag<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Match events carrying a `name` tag for every one of `values`
    pub fn tag_all<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags_all
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Search text, if it has any non-blank content
    pub fn search_text(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// True when the filter carries no predicate and no limit
    ///
    /// An empty filter is valid: it selects every stored event, newest first.
    pub fn is_empty(&self) -> bool {
        self.ids.is_none()
            && self.authors.is_none()
            && self.kinds.is_none()
            && self.tags.as_ref().is_none_or(BTreeMap::is_empty)
            && self.tags_all.as_ref().is_none_or(BTreeMap::is_empty)
            && self.since.is_none()
            && self.until.is_none()
            && self.search_text().is_none()
            && self.limit.is_none()
    }
}
