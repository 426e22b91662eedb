//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::io::{self, Write};

use graphbatch::graph::GraphStore;
use graphbatch::query::{QueryExecutor, QueryResult, Row};
use graphbatch::value::{Params, Value};
use graphbatch::{Batch, BatchSession, MemoryGraph, OutputFormat, ResultWriter, RowsExecutor, SessionOptions};
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// Query doubles
// ---------------------------------------------------------------------------

/// Answers every query with `rows` identical rows, produced lazily
pub struct ConstantRows {
    pub rows: u64,
}

impl ConstantRows {
    pub const COLUMNS: [&'static str; 3] = ["n", "name", "score"];

    pub fn row() -> Row {
        let mut row = Row::new();
        row.insert("n".to_string(), Value::Integer(42));
        row.insert("name".to_string(), Value::String("constant".to_string()));
        row.insert("score".to_string(), Value::Float(0.5));
        row
    }
}

impl QueryExecutor for ConstantRows {
    fn execute<'s>(&'s self, _store: &'s mut dyn GraphStore, _query: &str, _params: &Params) -> graphbatch::Result<QueryResult<'s>> {
        let columns = Self::COLUMNS.iter().map(|c| c.to_string()).collect();
        Ok(QueryResult::new(columns, (0..self.rows).map(|_| Ok(Self::row()))))
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Counts bytes and keeps none of them
#[derive(Default)]
pub struct CountingWriter {
    pub bytes: u64,
    pub flushes: u64,
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Batch runners
// ---------------------------------------------------------------------------

/// Run `raw` against `graph` in compact mode; the response is parsed back
/// even when the batch failed.
pub fn run_batch(graph: &mut MemoryGraph, raw: JsonValue) -> (graphbatch::Result<()>, JsonValue) {
    run_batch_with(graph, &RowsExecutor::new(), &OutputFormat::compact(), raw)
}

pub fn run_batch_with(
    graph: &mut MemoryGraph,
    executor: &dyn QueryExecutor,
    format: &OutputFormat,
    raw: JsonValue,
) -> (graphbatch::Result<()>, JsonValue) {
    let batch = Batch::from_json(raw).unwrap();
    let mut writer = ResultWriter::new(Vec::new(), format);
    let result = BatchSession::new(graph, executor)
        .with_options(SessionOptions::default())
        .run(&batch, &mut writer)
        .map(|_| ());
    let bytes = writer.into_inner();
    let out = if bytes.is_empty() { JsonValue::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (result, out)
}

/// Run a batch that must succeed and return its response
pub fn run_ok(graph: &mut MemoryGraph, raw: JsonValue) -> JsonValue {
    let (result, out) = run_batch(graph, raw);
    result.unwrap();
    out
}

/// Every node id the store holds, in cursor order
pub fn node_ids(graph: &MemoryGraph) -> Vec<u64> {
    let mut ids = Vec::new();
    let mut cursor = None;
    while let Some(id) = graph.next_node_after(cursor) {
        ids.push(id.0);
        cursor = Some(id);
    }
    ids
}
