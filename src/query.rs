//! Query executor seam
//!
//! The batch engine does not parse or plan queries. It hands the query
//! text and parameters to a `QueryExecutor` and streams whatever column
//! list and lazy row sequence comes back.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::graph::GraphStore;
use crate::value::Params;

/// One result row: column → value
pub type Row = Params;

/// Tabular result with lazily produced rows.
pub struct QueryResult<'a> {
    pub columns: Vec<String>,
    pub rows: Box<dyn Iterator<Item = Result<Row>> + 'a>,
}

impl<'a> QueryResult<'a> {
    pub fn new<I>(columns: Vec<String>, rows: I) -> Self
    where
        I: Iterator<Item = Result<Row>> + 'a,
    {
        Self { columns, rows: Box::new(rows) }
    }
}

pub trait QueryExecutor: Send + Sync {
    /// Run `query` against `store`. Rows may borrow the store until dropped.
    fn execute<'s>(&'s self, store: &'s mut dyn GraphStore, query: &str, params: &Params) -> Result<QueryResult<'s>>;
}

type Script = Box<dyn Fn(&mut dyn GraphStore, &Params) -> Result<QueryResult<'static>> + Send + Sync>;

/// Executor answering a fixed set of query strings with scripted results.
///
/// Unknown query text fails with `GraphError::Query`.
#[derive(Default)]
pub struct RowsExecutor {
    scripts: HashMap<String, Script>,
}

impl RowsExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with whatever `script` produces
    pub fn on<F>(mut self, query: &str, script: F) -> Self
    where
        F: Fn(&mut dyn GraphStore, &Params) -> Result<QueryResult<'static>> + Send + Sync + 'static,
    {
        self.scripts.insert(query.to_string(), Box::new(script));
        self
    }
}

impl QueryExecutor for RowsExecutor {
    fn execute<'s>(&'s self, store: &'s mut dyn GraphStore, query: &str, params: &Params) -> Result<QueryResult<'s>> {
        let script = self
            .scripts
            .get(query)
            .ok_or_else(|| GraphError::Query(format!("No script for query '{}'", query)))?;
        script(store, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use crate::value::Value;

    #[test]
    fn test_scripted_query() {
        let executor = RowsExecutor::new().on("count", |store, params| {
            let n = store.next_node_after(None).map_or(0, |_| 1);
            let mut row = Row::new();
            row.insert("n".to_string(), Value::Integer(n));
            row.insert("p".to_string(), params.get("p").cloned().unwrap_or(Value::Null));
            Ok(QueryResult::new(vec!["n".into(), "p".into()], std::iter::once(Ok(row))))
        });
        let mut graph = MemoryGraph::new();
        let mut params = Params::new();
        params.insert("p".to_string(), Value::from("x"));

        let result = executor.execute(&mut graph, "count", &params).unwrap();
        assert_eq!(result.columns, vec!["n", "p"]);
        let rows: Vec<Row> = result.rows.collect::<Result<_>>().unwrap();
        assert_eq!(rows[0]["n"], Value::Integer(1));
        assert_eq!(rows[0]["p"], Value::from("x"));
    }

    #[test]
    fn test_unknown_query_fails() {
        let executor = RowsExecutor::new();
        let mut graph = MemoryGraph::new();
        let err = executor.execute(&mut graph, "match (n) return n", &Params::new()).err();
        assert!(matches!(err, Some(GraphError::Query(_))));
    }
}
