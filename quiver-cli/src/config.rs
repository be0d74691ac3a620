//! TOML configuration for the `quiver` binary
//!
//! ```toml
//! seed = 42
//!
//! [indexing]
//! index_created_at = false
//! index_tag_hash = false
//! index_tag_hash_kind_pubkey = true
//! order_by_id = true
//!
//! [search]
//! enabled = true
//! kinds = [0, 1, 30023]
//! ```
//!
//! Every key is optional; missing keys keep the library defaults.

use anyhow::{Context, Result};
use quiver_core::{IndexingPolicy, StoreConfig};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Tag hash seed for newly created databases
    pub seed: Option<u64>,
    pub indexing: IndexingSection,
    pub search: SearchSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexingSection {
    pub index_created_at: Option<bool>,
    pub index_tag_hash: Option<bool>,
    pub index_tag_hash_kind_pubkey: Option<bool>,
    pub order_by_id: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSection {
    pub enabled: bool,
    pub kinds: Option<Vec<u16>>,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            kinds: None,
        }
    }
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Overlay the file's settings on the library defaults
    pub fn into_store_config(self) -> StoreConfig {
        let defaults = IndexingPolicy::default();
        let indexing = self.indexing;
        let policy = IndexingPolicy {
            index_created_at: indexing.index_created_at.unwrap_or(defaults.index_created_at),
            index_tag_hash: indexing.index_tag_hash.unwrap_or(defaults.index_tag_hash),
            index_tag_hash_kind_pubkey: indexing
                .index_tag_hash_kind_pubkey
                .unwrap_or(defaults.index_tag_hash_kind_pubkey),
            order_by_id: indexing.order_by_id.unwrap_or(defaults.order_by_id),
            ..defaults
        };

        let mut config = StoreConfig::default().with_policy(policy);
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(kinds) = self.search.kinds {
            config = config.with_searchable_kinds(kinds);
        }
        if !self.search.enabled {
            config = config.without_full_text();
        }
        config
    }
}
