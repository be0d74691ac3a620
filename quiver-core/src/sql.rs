//! Parameterized SQL fragments
//!
//! Values never end up in SQL text. Every predicate adds `?` placeholders and
//! pushes the matching bound values, in textual order.

use rusqlite::types::Value;

/// Compiled statement: SQL text plus its bound values
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub sql: String,
    pub args: Vec<Value>,
}

impl QuerySpec {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    pub fn params(&self) -> rusqlite::ParamsFromIter<std::slice::Iter<'_, Value>> {
        rusqlite::params_from_iter(self.args.iter())
    }
}

/// AND-joined list of conditions
#[derive(Debug, Default)]
pub(crate) struct WhereClause {
    conditions: Vec<String>,
    args: Vec<Value>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = ?` for one value, `column IN (?, ...)` for many, false for none
    pub fn equals_or_in<I>(&mut self, column: &str, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let values: Vec<Value> = values.into_iter().collect();
        match values.len() {
            0 => self.conditions.push("0".to_string()),
            1 => self.conditions.push(format!("{column} = ?")),
            n => self
                .conditions
                .push(format!("{column} IN ({})", placeholders(n))),
        }
        self.args.extend(values);
    }

    pub fn equals(&mut self, column: &str, value: Value) {
        self.conditions.push(format!("{column} = ?"));
        self.args.push(value);
    }

    pub fn greater_than_or_equals(&mut self, column: &str, value: i64) {
        self.conditions.push(format!("{column} >= ?"));
        self.args.push(Value::Integer(value));
    }

    pub fn less_than_or_equals(&mut self, column: &str, value: i64) {
        self.conditions.push(format!("{column} <= ?"));
        self.args.push(Value::Integer(value));
    }

    /// Full-text match against `table`
    pub fn matches(&mut self, table: &str, text: &str) {
        self.conditions.push(format!("{table} MATCH ?"));
        self.args.push(Value::Text(text.to_string()));
    }

    /// Condition without parameters
    pub fn raw(&mut self, condition: &str) {
        self.conditions.push(condition.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Conditions joined with AND, each parenthesized when there is more than one
    pub fn conditions(&self) -> String {
        if self.conditions.len() == 1 {
            return self.conditions[0].clone();
        }
        self.conditions
            .iter()
            .map(|c| format!("({c})"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    pub fn into_args(self) -> Vec<Value> {
        self.args
    }
}

/// `?, ?, ?` with `n` placeholders
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) fn text_values<'a, I>(values: I) -> impl Iterator<Item = Value> + 'a
where
    I: IntoIterator<Item = &'a String> + 'a,
{
    values.into_iter().map(|v| Value::Text(v.clone()))
}

pub(crate) fn integer_values<I, T>(values: I) -> impl Iterator<Item = Value>
where
    I: IntoIterator<Item = T>,
    T: Into<i64>,
{
    values.into_iter().map(|v| Value::Integer(v.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_value_uses_equals() {
        let mut clause = WhereClause::new();
        clause.equals_or_in("kind", integer_values([1u16]));
        assert_eq!(clause.conditions(), "kind = ?");
        assert_eq!(clause.into_args(), vec![Value::Integer(1)]);
    }

    #[test]
    fn test_many_values_use_in() {
        let mut clause = WhereClause::new();
        clause.equals_or_in("kind", integer_values([1u16, 6, 7]));
        clause.greater_than_or_equals("created_at", 10);
        assert_eq!(clause.conditions(), "(kind IN (?, ?, ?)) AND (created_at >= ?)");
        assert_eq!(clause.into_args().len(), 4);
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let mut clause = WhereClause::new();
        clause.equals_or_in("id", Vec::new());
        assert_eq!(clause.conditions(), "0");
        assert!(clause.into_args().is_empty());
    }

    #[test]
    fn test_values_are_never_inlined() {
        let hostile = "x'); DROP TABLE event_headers; --".to_string();
        let mut clause = WhereClause::new();
        clause.equals_or_in("pubkey", text_values([&hostile]));
        clause.matches("event_fts", &hostile);

        assert!(!clause.conditions().contains("DROP"));
        assert_eq!(clause.into_args()[0], Value::Text(hostile));
    }
}
