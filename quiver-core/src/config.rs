//! Store configuration

use crate::kind::DEFAULT_SEARCHABLE_KINDS;
use crate::policy::IndexingPolicy;
use std::collections::BTreeSet;

/// Settings threaded through [`EventStore::open`](crate::EventStore::open)
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Optional index layout and tag eligibility
    pub policy: IndexingPolicy,
    /// Tag hash seed used only when the database file is first created
    ///
    /// `None` draws a random seed. An existing file always keeps its own seed.
    pub seed: Option<u64>,
    /// Kinds mirrored into the full-text index
    pub searchable_kinds: BTreeSet<u16>,
    /// Probe and build the full-text index at creation time
    pub full_text: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            policy: IndexingPolicy::default(),
            seed: None,
            searchable_kinds: DEFAULT_SEARCHABLE_KINDS.iter().copied().collect(),
            full_text: true,
        }
    }
}

impl StoreConfig {
    pub fn with_policy(mut self, policy: IndexingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_searchable_kinds<I: IntoIterator<Item = u16>>(mut self, kinds: I) -> Self {
        self.searchable_kinds = kinds.into_iter().collect();
        self
    }

    pub fn without_full_text(mut self) -> Self {
        self.full_text = false;
        self
    }

    pub fn is_searchable(&self, kind: u16) -> bool {
        self.searchable_kinds.contains(&kind)
    }
}
