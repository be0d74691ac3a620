//! Serde support for Filter
//!
//! Filters travel as NIP-01 JSON objects where tag predicates are keyed by the
//! tag name with a prefix: `#e` for "any of" and `&e` for "all of".
//!
//! ```
//! use quiver_core::Filter;
//!
//! let filter: Filter = serde_json::from_str(
//!     r##"{"kinds":[1],"#t":["nostr","rust"],"&p":["alice","bob"],"limit":5}"##,
//! )
//! .unwrap();
//!
//! assert_eq!(filter.kinds, Some(vec![1]));
//! assert_eq!(filter.tags.unwrap()["t"], vec!["nostr", "rust"]);
//! assert_eq!(filter.tags_all.unwrap()["p"], vec!["alice", "bob"]);
//! ```

use crate::Filter;
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

const ANY_PREFIX: char = '#';
const ALL_PREFIX: char = '&';

impl Serialize for Filter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;

        if let Some(ids) = &self.ids {
            map.serialize_entry("ids", ids)?;
        }
        if let Some(authors) = &self.authors {
            map.serialize_entry("authors", authors)?;
        }
        if let Some(kinds) = &self.kinds {
            map.serialize_entry("kinds", kinds)?;
        }
        for (name, values) in self.tags.iter().flatten() {
            map.serialize_entry(&format!("{ANY_PREFIX}{name}"), values)?;
        }
        for (name, values) in self.tags_all.iter().flatten() {
            map.serialize_entry(&format!("{ALL_PREFIX}{name}"), values)?;
        }
        if let Some(since) = self.since {
            map.serialize_entry("since", &since)?;
        }
        if let Some(until) = self.until {
            map.serialize_entry("until", &until)?;
        }
        if let Some(search) = &self.search {
            map.serialize_entry("search", search)?;
        }
        if let Some(limit) = self.limit {
            map.serialize_entry("limit", &limit)?;
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(FilterVisitor)
    }
}

struct FilterVisitor;

impl<'de> Visitor<'de> for FilterVisitor {
    type Value = Filter;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a NIP-01 filter object")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Filter, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut filter = Filter::default();

        while let Some(key) = access.next_key::<String>()? {
            match key.as_str() {
                "ids" => filter.ids = Some(access.next_value()?),
                "authors" => filter.authors = Some(access.next_value()?),
                "kinds" => filter.kinds = Some(access.next_value()?),
                "since" => filter.since = access.next_value()?,
                "until" => filter.until = access.next_value()?,
                "search" => filter.search = access.next_value()?,
                "limit" => filter.limit = access.next_value()?,
                _ => {
                    if let Some(name) = key.strip_prefix(ANY_PREFIX) {
                        insert_tag(&mut filter.tags, name, access.next_value()?)
                            .map_err(de::Error::custom)?;
                    } else if let Some(name) = key.strip_prefix(ALL_PREFIX) {
                        insert_tag(&mut filter.tags_all, name, access.next_value()?)
                            .map_err(de::Error::custom)?;
                    } else {
                        access.next_value::<IgnoredAny>()?;
                    }
                }
            }
        }

        Ok(filter)
    }
}

fn insert_tag(
    map: &mut Option<BTreeMap<String, Vec<String>>>,
    name: &str,
    values: Vec<String>,
) -> Result<(), String> {
    if name.is_empty() {
        return Err("tag predicate without a tag name".to_string());
    }
    map.get_or_insert_with(BTreeMap::new)
        .insert(name.to_string(), values);
    Ok(())
}
