use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::backend::BackendError;

/// A read against a named collection: column projection, embedded relations,
/// filters, ordering, and an offset/limit window. Providers interpret the
/// request; callers never see a provider-specific wire format.
#[derive(Debug, Clone)]
pub struct SelectRequest {
    pub table: &'static str,
    pub columns: Vec<&'static str>,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub range: Option<Range>,
}

/// An embedded relation returned inline with each parent row, so a feed page
/// renders without N+1 follow-up queries.
#[derive(Debug, Clone)]
pub struct Embed {
    pub relation: &'static str,
    pub columns: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub enum Filter {
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
}

#[derive(Debug, Clone)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub offset: usize,
    pub limit: usize,
}

impl SelectRequest {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            embeds: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
        }
    }

    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    pub fn embed(mut self, relation: &'static str, columns: &[&'static str]) -> Self {
        self.embeds.push(Embed {
            relation,
            columns: columns.to_vec(),
        });
        self
    }

    pub fn eq(mut self, column: &'static str, value: Value) -> Self {
        self.filters.push(Filter::Eq(column, value));
        self
    }

    pub fn in_values(mut self, column: &'static str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In(column, values));
        self
    }

    pub fn order_desc(mut self, column: &'static str) -> Self {
        self.order.push(Order {
            column,
            descending: true,
        });
        self
    }

    pub fn order_asc(mut self, column: &'static str) -> Self {
        self.order.push(Order {
            column,
            descending: false,
        });
        self
    }

    pub fn range(mut self, offset: usize, limit: usize) -> Self {
        self.range = Some(Range { offset, limit });
        self
    }
}

/// A row insert. `upsert` requests merge-on-conflict semantics (used for
/// owner-scoped profile edits); plain inserts report uniqueness violations
/// as [`BackendError::Conflict`].
#[derive(Debug, Clone)]
pub struct InsertRequest {
    pub table: &'static str,
    pub row: Value,
    pub upsert: bool,
}

impl InsertRequest {
    pub fn new(table: &'static str, row: Value) -> Self {
        Self {
            table,
            row,
            upsert: false,
        }
    }

    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }
}

/// A filtered delete. The ownership filter travels inside the request, so a
/// caller can never delete another user's row regardless of UI-side checks.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub table: &'static str,
    pub filters: Vec<Filter>,
}

impl DeleteRequest {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            filters: Vec::new(),
        }
    }

    pub fn eq(mut self, column: &'static str, value: Value) -> Self {
        self.filters.push(Filter::Eq(column, value));
        self
    }
}

impl Filter {
    /// Row-level evaluation used by the in-process provider.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Filter::Eq(column, value) => row.get(column) == Some(value),
            Filter::In(column, values) => row
                .get(column)
                .map(|v| values.contains(v))
                .unwrap_or(false),
        }
    }
}

/// Deserialize provider rows into a typed record set.
pub fn from_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, BackendError> {
    rows.into_iter().map(from_row).collect()
}

pub fn from_row<T: DeserializeOwned>(row: Value) -> Result<T, BackendError> {
    serde_json::from_value(row).map_err(|e| BackendError::Protocol(format!("malformed row: {e}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn eq_filter_matches_on_field_equality() {
        let filter = Filter::Eq("user_id", json!("abc"));
        assert!(filter.matches(&json!({ "user_id": "abc" })));
        assert!(!filter.matches(&json!({ "user_id": "xyz" })));
        assert!(!filter.matches(&json!({ "other": "abc" })));
    }

    #[test]
    fn in_filter_matches_membership() {
        let filter = Filter::In("user_id", vec![json!("a"), json!("b")]);
        assert!(filter.matches(&json!({ "user_id": "b" })));
        assert!(!filter.matches(&json!({ "user_id": "c" })));
    }

    #[test]
    fn builder_accumulates_clauses() {
        let req = SelectRequest::new("posts")
            .columns(&["id", "user_id"])
            .embed("profiles", &["id", "username"])
            .eq("user_id", json!("u1"))
            .order_desc("created_at")
            .order_desc("id")
            .range(5, 10);

        assert_eq!(req.columns, vec!["id", "user_id"]);
        assert_eq!(req.embeds.len(), 1);
        assert_eq!(req.filters.len(), 1);
        assert_eq!(req.order.len(), 2);
        let range = req.range.unwrap();
        assert_eq!((range.offset, range.limit), (5, 10));
    }
}
