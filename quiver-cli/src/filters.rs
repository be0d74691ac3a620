use anyhow::{Context, Result};
use quiver_core::Filter;

/// Parse a command-line filter: one NIP-01 filter object or an array of them
pub fn parse_filters(json: &str) -> Result<Vec<Filter>> {
    let json = json.trim();
    if json.starts_with('[') {
        serde_json::from_str(json).context("Invalid filter list")
    } else {
        let filter: Filter = serde_json::from_str(json).context("Invalid filter")?;
        Ok(vec![filter])
    }
}
