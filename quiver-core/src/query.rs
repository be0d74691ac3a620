//! Filter to SQL compilation
//!
//! Every filter is reduced to a subquery yielding header `row_id`s. Filters
//! with tag predicates are driven from the tag table (a reverse lookup),
//! joining it to itself once per additional tag constraint. Filters without
//! tag predicates are driven from the headers, or from the full-text index
//! when they only search. Several filters are combined with `UNION` and
//! joined back to the headers once.
//!
//! Two shapes skip the subquery entirely: the unfilled filter (everything,
//! newest first) and a single filter with no tag predicates, which selects
//! event columns straight from the headers.
//!
//! ```text
//! SELECT DISTINCT event_tags.event_header_row_id AS row_id FROM event_tags
//!   INNER JOIN event_tags AS t1 ON t1.event_header_row_id = event_tags.event_header_row_id ...
//!   [INNER JOIN event_headers ...] [INNER JOIN event_fts ...]
//!   WHERE event_tags.tag_hash IN (...) AND t1.tag_hash = ? AND event_tags.kind IN (...) ...
//!   [ORDER BY event_tags.created_at DESC LIMIT ?]
//! ```

use crate::hasher::TagHasher;
use crate::policy::IndexingPolicy;
use crate::schema::{FTS_TABLE, FtsVersion, match_expression};
use crate::sql::{QuerySpec, WhereClause, integer_values, text_values};
use crate::{Event, Filter, kind};
use rusqlite::Row;
use rusqlite::types::{Type, Value};

/// Columns decoded by [`event_from_row`], in order
pub(crate) const EVENT_COLUMNS: &str = "event_headers.id, event_headers.pubkey, event_headers.created_at, \
     event_headers.kind, event_headers.tags, event_headers.content, event_headers.sig";

const ADDRESSABLE_HINT: &str = "(event_headers.kind >= 30000 AND event_headers.kind < 40000)";

/// How a filter's search text translates to SQL
#[derive(Debug, Clone, PartialEq, Eq)]
enum SearchTerm {
    None,
    Match(String),
    /// Search requested but no engine: matches nothing
    Impossible,
}

/// A filter split into the parts each table answers
struct Plan<'a> {
    filter: &'a Filter,
    /// `d` values from `tags` (any of)
    d_any: Option<&'a Vec<String>>,
    /// `d` values from `tags_all` (all of)
    d_all: Option<&'a Vec<String>>,
    /// Every other tag constraint; each entry is a set of accepted hashes
    facts: Vec<Vec<i64>>,
    search: SearchTerm,
}

impl<'a> Plan<'a> {
    fn new(filter: &'a Filter, hasher: &TagHasher, fts: FtsVersion) -> Self {
        let mut facts = Vec::new();
        let mut d_any = None;
        let mut d_all = None;

        for (name, values) in filter.tags.iter().flatten() {
            if name == "d" {
                d_any = Some(values);
                continue;
            }
            let seed = hasher.name_seed(name);
            facts.push(values.iter().map(|v| hasher.hash_with(seed, v)).collect());
        }

        for (name, values) in filter.tags_all.iter().flatten() {
            if name == "d" {
                d_all = Some(values);
                continue;
            }
            let seed = hasher.name_seed(name);
            let mut hashes: Vec<i64> = values.iter().map(|v| hasher.hash_with(seed, v)).collect();
            hashes.sort_unstable();
            hashes.dedup();
            facts.extend(hashes.into_iter().map(|hash| vec![hash]));
        }

        let search = match filter.search_text() {
            None => SearchTerm::None,
            Some(_) if !fts.is_enabled() => SearchTerm::Impossible,
            Some(text) => SearchTerm::Match(match_expression(text)),
        };

        Self {
            filter,
            d_any,
            d_all,
            facts,
            search,
        }
    }

    fn has_tags(&self) -> bool {
        !self.facts.is_empty()
    }

    fn has_d_tags(&self) -> bool {
        self.d_any.is_some() || self.d_all.is_some()
    }

    fn joins_fts(&self) -> bool {
        matches!(self.search, SearchTerm::Match(_))
    }

    /// All requested kinds are addressable
    fn addressable_only(&self) -> bool {
        self.filter
            .kinds
            .as_ref()
            .is_some_and(|kinds| !kinds.is_empty() && kinds.iter().all(|k| kind::is_addressable(*k)))
    }

    fn add_search(&self, clause: &mut WhereClause) {
        match &self.search {
            SearchTerm::None => {}
            SearchTerm::Match(expression) => clause.matches(FTS_TABLE, expression),
            SearchTerm::Impossible => clause.raw("0"),
        }
    }

    fn add_d_tags(&self, clause: &mut WhereClause) {
        if let Some(values) = self.d_any {
            clause.equals_or_in("event_headers.d_tag", text_values(values));
        }
        for value in self.d_all.into_iter().flatten() {
            clause.equals("event_headers.d_tag", Value::Text(value.clone()));
        }
    }

    /// Every predicate answerable by the header table (plus search)
    fn header_clause(&self) -> WhereClause {
        let filter = self.filter;
        let mut clause = WhereClause::new();

        if let Some(ids) = &filter.ids {
            clause.equals_or_in("event_headers.id", text_values(ids));
        }
        self.add_search(&mut clause);
        if let Some(kinds) = &filter.kinds {
            clause.equals_or_in("event_headers.kind", integer_values(kinds.iter().copied()));
        }
        if let Some(authors) = &filter.authors {
            clause.equals_or_in("event_headers.pubkey", text_values(authors));
        }
        self.add_d_tags(&mut clause);
        if let Some(since) = filter.since {
            clause.greater_than_or_equals("event_headers.created_at", since);
        }
        if let Some(until) = filter.until {
            clause.less_than_or_equals("event_headers.created_at", until);
        }
        if self.addressable_only() {
            clause.raw(ADDRESSABLE_HINT);
        }
        clause
    }
}

/// Compiles filters against one store's index layout
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueryBuilder {
    policy: IndexingPolicy,
    fts: FtsVersion,
}

impl QueryBuilder {
    pub fn new(policy: IndexingPolicy, fts: FtsVersion) -> Self {
        Self { policy, fts }
    }

    fn everything(&self) -> QuerySpec {
        QuerySpec::new(
            format!(
                "SELECT {EVENT_COLUMNS} FROM event_headers ORDER BY {}",
                self.policy.order_by("event_headers")
            ),
            Vec::new(),
        )
    }

    fn nothing(&self) -> QuerySpec {
        QuerySpec::new(format!("SELECT {EVENT_COLUMNS} FROM event_headers WHERE 0"), Vec::new())
    }

    /// Statement returning every event matching `filter`, newest first
    pub fn select(&self, filter: &Filter, hasher: &TagHasher) -> QuerySpec {
        if filter.is_empty() {
            return self.everything();
        }

        let plan = Plan::new(filter, hasher, self.fts);
        if plan.has_tags() {
            let sub = self.tag_subquery(&plan, hasher);
            return self.join_headers(sub);
        }

        // Direct header query
        let clause = plan.header_clause();
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM event_headers");
        if plan.joins_fts() {
            sql.push_str(&format!(
                " INNER JOIN {FTS_TABLE} ON {FTS_TABLE}.rowid = event_headers.row_id"
            ));
        }
        if !clause.is_empty() {
            sql.push_str(&format!(" WHERE {}", clause.conditions()));
        }
        sql.push_str(&format!(" ORDER BY {}", self.policy.order_by("event_headers")));

        let mut args = clause.into_args();
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            args.push(limit_value(limit));
        }
        QuerySpec::new(sql, args)
    }

    /// Statement returning the union of every filter's matches, newest first
    pub fn select_many(&self, filters: &[Filter], hasher: &TagHasher) -> QuerySpec {
        match filters {
            [] => self.nothing(),
            [filter] => self.select(filter, hasher),
            _ if filters.iter().any(Filter::is_empty) => self.everything(),
            _ => {
                let union = self.union(filters.iter(), hasher);
                self.join_headers(union)
            }
        }
    }

    pub fn count(&self, filter: &Filter, hasher: &TagHasher) -> QuerySpec {
        self.count_many(std::slice::from_ref(filter), hasher)
    }

    pub fn count_many(&self, filters: &[Filter], hasher: &TagHasher) -> QuerySpec {
        if filters.is_empty() {
            return QuerySpec::new("SELECT 0", Vec::new());
        }
        if filters.iter().any(Filter::is_empty) {
            return QuerySpec::new("SELECT COUNT(*) FROM event_headers", Vec::new());
        }
        let union = self.union(filters.iter(), hasher);
        QuerySpec::new(format!("SELECT COUNT(*) FROM ({})", union.sql), union.args)
    }

    /// Statement deleting every match; unfilled filters select nothing here
    pub fn delete_many(&self, filters: &[Filter], hasher: &TagHasher) -> Option<QuerySpec> {
        let filled: Vec<&Filter> = filters.iter().filter(|f| !f.is_empty()).collect();
        if filled.is_empty() {
            return None;
        }
        let union = self.union(filled.into_iter(), hasher);
        Some(QuerySpec::new(
            format!("DELETE FROM event_headers WHERE row_id IN ({})", union.sql),
            union.args,
        ))
    }

    /// `row_id` subquery of one filter, or a `UNION` of several
    fn union<'f>(&self, filters: impl Iterator<Item = &'f Filter>, hasher: &TagHasher) -> QuerySpec {
        let mut subqueries: Vec<QuerySpec> = filters.map(|f| self.row_ids(f, hasher)).collect();
        if subqueries.len() == 1 {
            return subqueries.remove(0);
        }

        let mut args = Vec::new();
        let mut parts = Vec::with_capacity(subqueries.len());
        for sub in subqueries {
            parts.push(format!("SELECT row_id FROM ({})", sub.sql));
            args.extend(sub.args);
        }
        QuerySpec::new(parts.join(" UNION "), args)
    }

    /// Outer select over a `row_id` subquery
    fn join_headers(&self, sub: QuerySpec) -> QuerySpec {
        QuerySpec::new(
            format!(
                "SELECT {EVENT_COLUMNS} FROM event_headers \
                 INNER JOIN ({}) AS filtered ON filtered.row_id = event_headers.row_id \
                 ORDER BY {}",
                sub.sql,
                self.policy.order_by("event_headers")
            ),
            sub.args,
        )
    }

    /// `row_id` subquery of a single filter
    pub fn row_ids(&self, filter: &Filter, hasher: &TagHasher) -> QuerySpec {
        let plan = Plan::new(filter, hasher, self.fts);
        if plan.has_tags() {
            self.tag_subquery(&plan, hasher)
        } else {
            self.header_subquery(&plan)
        }
    }

    fn header_subquery(&self, plan: &Plan<'_>) -> QuerySpec {
        let clause = plan.header_clause();
        let limit = plan.filter.limit;

        // Search alone is answered by the full-text index
        if let SearchTerm::Match(expression) = &plan.search {
            let only_search = plan.filter.ids.is_none()
                && plan.filter.kinds.is_none()
                && plan.filter.authors.is_none()
                && !plan.has_d_tags()
                && plan.filter.since.is_none()
                && plan.filter.until.is_none()
                && limit.is_none();
            if only_search {
                return QuerySpec::new(
                    format!("SELECT {FTS_TABLE}.rowid AS row_id FROM {FTS_TABLE} WHERE {FTS_TABLE} MATCH ?"),
                    vec![Value::Text(expression.clone())],
                );
            }
        }

        let mut sql = String::from("SELECT event_headers.row_id AS row_id FROM event_headers");
        if plan.joins_fts() {
            sql.push_str(&format!(
                " INNER JOIN {FTS_TABLE} ON {FTS_TABLE}.rowid = event_headers.row_id"
            ));
        }
        if !clause.is_empty() {
            sql.push_str(&format!(" WHERE {}", clause.conditions()));
        }

        let mut args = clause.into_args();
        if let Some(limit) = limit {
            sql.push_str(&format!(
                " ORDER BY {} LIMIT ?",
                self.policy.order_by("event_headers")
            ));
            args.push(limit_value(limit));
        }
        QuerySpec::new(sql, args)
    }

    fn tag_subquery(&self, plan: &Plan<'_>, hasher: &TagHasher) -> QuerySpec {
        let filter = plan.filter;
        let limit = filter.limit;
        let order_by_id = limit.is_some() && self.policy.order_by_id;
        let joins_headers = filter.ids.is_some() || plan.has_d_tags() || order_by_id;

        let mut sql = String::from(
            "SELECT DISTINCT event_tags.event_header_row_id AS row_id FROM event_tags",
        );
        for i in 1..plan.facts.len() {
            sql.push_str(&format!(
                " INNER JOIN event_tags AS t{i} ON t{i}.event_header_row_id = event_tags.event_header_row_id \
                 AND t{i}.kind = event_tags.kind AND t{i}.created_at = event_tags.created_at"
            ));
        }
        if joins_headers {
            sql.push_str(" INNER JOIN event_headers ON event_headers.row_id = event_tags.event_header_row_id");
        }
        if plan.joins_fts() {
            sql.push_str(&format!(
                " INNER JOIN {FTS_TABLE} ON {FTS_TABLE}.rowid = event_tags.event_header_row_id"
            ));
        }

        let mut clause = WhereClause::new();
        if let Some(ids) = &filter.ids {
            clause.equals_or_in("event_headers.id", text_values(ids));
        }
        plan.add_search(&mut clause);
        for (i, hashes) in plan.facts.iter().enumerate() {
            let column = if i == 0 {
                "event_tags.tag_hash".to_string()
            } else {
                format!("t{i}.tag_hash")
            };
            clause.equals_or_in(&column, integer_values(hashes.iter().copied()));
        }
        if let Some(kinds) = &filter.kinds {
            clause.equals_or_in("event_tags.kind", integer_values(kinds.iter().copied()));
        }
        if let Some(authors) = &filter.authors {
            clause.equals_or_in(
                "event_tags.pubkey_hash",
                integer_values(authors.iter().map(|a| hasher.hash_pubkey(a))),
            );
        }
        plan.add_d_tags(&mut clause);
        if let Some(since) = filter.since {
            clause.greater_than_or_equals("event_tags.created_at", since);
        }
        if let Some(until) = filter.until {
            clause.less_than_or_equals("event_tags.created_at", until);
        }

        sql.push_str(&format!(" WHERE {}", clause.conditions()));

        let mut args = clause.into_args();
        if let Some(limit) = limit {
            if order_by_id {
                sql.push_str(" ORDER BY event_tags.created_at DESC, event_headers.id ASC LIMIT ?");
            } else {
                sql.push_str(" ORDER BY event_tags.created_at DESC LIMIT ?");
            }
            args.push(limit_value(limit));
        }
        QuerySpec::new(sql, args)
    }
}

fn limit_value(limit: usize) -> Value {
    Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX))
}

/// Decode one row selected with [`EVENT_COLUMNS`]
pub(crate) fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let tags: String = row.get(4)?;
    let tags = serde_json::from_str(&tags)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Event {
        id: row.get(0)?,
        pubkey: row.get(1)?,
        created_at: row.get(2)?,
        kind: row.get(3)?,
        tags,
        content: row.get(5)?,
        sig: row.get(6)?,
    })
}
