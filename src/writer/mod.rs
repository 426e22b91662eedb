//! Streaming result writer
//!
//! One traversal writes entities, paths, nested values and tabular query
//! results. The two wire modes differ only in a handful of decisions,
//! captured in a `Style`:
//!
//! | | compact | compat |
//! |---|---|---|
//! | identity field | `id: 12` | `self: "<base>/node/12"` |
//! | relationship ends | `start: 1` | `start: "<base>/node/1"` |
//! | result cells | `{"Long": 5}` | `5` |
//! | rows field | `rows` | `data` |
//! | `count` / `time` | yes | no |
//!
//! Nothing is buffered beyond the row being written; the writer flushes the
//! sink each time a framing array (batch or command) is closed.

pub mod generator;

pub use generator::JsonGenerator;

use std::io::{self, Write};
use std::str::FromStr;
use std::time::Instant;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{GraphError, Result};
use crate::graph::{EntityKind, Node, Path, Properties, Relationship};
use crate::query::{QueryResult, Row};
use crate::value::Value;

/// Base URI used by compat mode when none is configured
pub const DEFAULT_BASE_URI: &str = "http://localhost:7474/db/data/";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireMode {
    /// Typed, id-based
    #[default]
    Compact,
    /// URI-based, untyped cells
    Compat,
}

impl FromStr for WireMode {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(WireMode::Compact),
            "compat" => Ok(WireMode::Compat),
            other => Err(GraphError::Format(format!("unknown mode '{}'", other))),
        }
    }
}

/// `{compact|compat} × {pretty|compact-whitespace}` plus the compat base URI.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputFormat {
    pub mode: WireMode,
    pub pretty: bool,
    pub base_uri: String,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            mode: WireMode::Compact,
            pretty: false,
            base_uri: DEFAULT_BASE_URI.to_string(),
        }
    }
}

impl OutputFormat {
    pub fn compact() -> Self {
        Self::default()
    }

    pub fn compat(base_uri: &str) -> Self {
        Self {
            mode: WireMode::Compat,
            base_uri: base_uri.to_string(),
            ..Self::default()
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// Media-type parameters, e.g. `application/json; format=compat; pretty=true`.
/// Recognized parameters: `format` (or `mode`), `pretty`, `base` (or `uri`).
impl FromStr for OutputFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        let mut format = OutputFormat::default();
        for param in s.split(';') {
            let Some((name, value)) = param.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match name.trim().to_ascii_lowercase().as_str() {
                "format" | "mode" => format.mode = value.parse()?,
                "pretty" => {
                    format.pretty = value
                        .parse()
                        .map_err(|_| GraphError::Format(format!("pretty must be true or false, got '{}'", value)))?
                }
                "base" | "uri" => format.base_uri = value.to_string(),
                _ => {}
            }
        }
        Ok(format)
    }
}

// ============================================================================
// Styles
// ============================================================================

#[derive(Clone, Copy)]
struct Style {
    identity: &'static str,
    reference: fn(&str, EntityKind, u64) -> JsonValue,
    tag_cells: bool,
    rows_field: &'static str,
    summary: bool,
}

const COMPACT: Style = Style {
    identity: "id",
    reference: numeric_reference,
    tag_cells: true,
    rows_field: "rows",
    summary: true,
};

const COMPAT: Style = Style {
    identity: "self",
    reference: uri_reference,
    tag_cells: false,
    rows_field: "data",
    summary: false,
};

fn numeric_reference(_base: &str, _kind: EntityKind, id: u64) -> JsonValue {
    JsonValue::from(id)
}

fn uri_reference(base: &str, kind: EntityKind, id: u64) -> JsonValue {
    JsonValue::String(format!("{}{}/{}", base, kind.as_str(), id))
}

// ============================================================================
// Writer
// ============================================================================

pub struct ResultWriter<W: Write> {
    gen: JsonGenerator<W>,
    style: Style,
    /// Always ends with `/`
    base_uri: String,
}

impl ResultWriter<io::Sink> {
    /// A writer that accepts everything and emits nothing
    pub fn discard() -> Self {
        Self::new(io::sink(), &OutputFormat::default())
    }
}

impl<W: Write> ResultWriter<W> {
    pub fn new(out: W, format: &OutputFormat) -> Self {
        let style = match format.mode {
            WireMode::Compact => COMPACT,
            WireMode::Compat => COMPAT,
        };
        let mut base_uri = format.base_uri.clone();
        if !base_uri.ends_with('/') {
            base_uri.push('/');
        }
        Self {
            gen: JsonGenerator::new(out, format.pretty),
            style,
            base_uri,
        }
    }

    /// Open a framing array (the batch, or one command's output)
    pub fn start_array(&mut self) -> Result<()> {
        self.gen.begin_array()
    }

    /// Close a framing array and push what was written to the sink
    pub fn end_array(&mut self) -> Result<()> {
        self.gen.end_array()?;
        self.gen.flush()
    }

    /// Containers still open
    pub fn depth(&self) -> usize {
        self.gen.depth()
    }

    /// Close every container above `depth` and flush, leaving a
    /// syntactically complete document after an aborted write.
    pub fn unwind(&mut self, depth: usize) -> Result<()> {
        while self.gen.depth() > depth {
            self.gen.end_container()?;
        }
        self.gen.flush()
    }

    pub fn write_node(&mut self, node: &Node) -> Result<()> {
        self.gen.begin_object()?;
        self.reference(self.style.identity, EntityKind::Node, node.id.0)?;
        self.properties(&node.properties)?;
        self.gen.end_object()
    }

    pub fn write_relationship(&mut self, rel: &Relationship) -> Result<()> {
        self.gen.begin_object()?;
        self.reference(self.style.identity, EntityKind::Relationship, rel.id.0)?;
        self.reference("start", EntityKind::Node, rel.start.0)?;
        self.reference("end", EntityKind::Node, rel.end.0)?;
        self.gen.field("type", &rel.rel_type)?;
        self.properties(&rel.properties)?;
        self.gen.end_object()
    }

    pub fn write_path(&mut self, path: &Path) -> Result<()> {
        self.gen.begin_object()?;
        self.gen.field("length", &path.length())?;
        self.gen.key("start")?;
        self.optional_node(path.start_node())?;
        self.gen.key("end")?;
        self.optional_node(path.end_node())?;
        self.gen.key("last_rel")?;
        match path.last_relationship() {
            Some(rel) => self.write_relationship(rel)?,
            None => self.gen.null()?,
        }
        self.gen.key("nodes")?;
        self.gen.begin_array()?;
        for node in &path.nodes {
            self.write_node(node)?;
        }
        self.gen.end_array()?;
        self.gen.key("relationships")?;
        self.gen.begin_array()?;
        for rel in &path.relationships {
            self.write_relationship(rel)?;
        }
        self.gen.end_array()?;
        self.gen.end_object()
    }

    /// Any value, untagged. Lists and maps recurse.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.gen.null(),
            Value::Boolean(b) => self.gen.scalar(b),
            Value::Integer(i) => self.gen.scalar(i),
            Value::Float(f) => self.gen.scalar(f),
            Value::String(s) => self.gen.scalar(s),
            Value::List(items) => {
                self.gen.begin_array()?;
                for item in items {
                    self.write_value(item)?;
                }
                self.gen.end_array()
            }
            Value::Map(map) => {
                self.gen.begin_object()?;
                for (key, item) in map {
                    self.gen.key(key)?;
                    self.write_value(item)?;
                }
                self.gen.end_object()
            }
            Value::Node(node) => self.write_node(node),
            Value::Relationship(rel) => self.write_relationship(rel),
            Value::Path(path) => self.write_path(path),
        }
    }

    /// Stream a tabular result, pulling one row at a time. `on_row` sees each
    /// row right after it is written. Returns the row count.
    pub fn write_result<F>(&mut self, result: QueryResult<'_>, started: Instant, mut on_row: F) -> Result<u64>
    where
        F: FnMut(&Row),
    {
        let QueryResult { columns, rows } = result;

        self.gen.begin_object()?;
        self.gen.key("columns")?;
        self.gen.begin_array()?;
        for column in &columns {
            self.gen.scalar(column)?;
        }
        self.gen.end_array()?;

        self.gen.key(self.style.rows_field)?;
        self.gen.begin_array()?;
        let mut count = 0u64;
        for row in rows {
            let row = row?;
            self.write_row(&columns, &row)?;
            on_row(&row);
            count += 1;
        }
        self.gen.end_array()?;

        if self.style.summary {
            let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            self.gen.field("count", &count)?;
            self.gen.field("time", &elapsed)?;
        }
        self.gen.end_object()?;
        Ok(count)
    }

    /// Flush everything written so far
    pub fn close(&mut self) -> Result<()> {
        self.gen.flush()
    }

    pub fn into_inner(self) -> W {
        self.gen.into_inner()
    }

    fn write_row(&mut self, columns: &[String], row: &Row) -> Result<()> {
        self.gen.begin_array()?;
        for column in columns {
            match row.get(column) {
                Some(value) => self.write_cell(value)?,
                None => self.write_cell(&Value::Null)?,
            }
        }
        self.gen.end_array()
    }

    fn write_cell(&mut self, value: &Value) -> Result<()> {
        if !self.style.tag_cells {
            return self.write_value(value);
        }
        self.gen.begin_object()?;
        self.gen.key(value.type_name())?;
        self.write_value(value)?;
        self.gen.end_object()
    }

    fn reference(&mut self, field: &str, kind: EntityKind, id: u64) -> Result<()> {
        let rendered = (self.style.reference)(&self.base_uri, kind, id);
        self.gen.field(field, &rendered)
    }

    /// `data`, omitted when there are no properties
    fn properties(&mut self, properties: &Properties) -> Result<()> {
        if properties.is_empty() {
            return Ok(());
        }
        self.gen.key("data")?;
        self.gen.begin_object()?;
        for (key, value) in properties {
            self.gen.key(key)?;
            self.gen.json(value)?;
        }
        self.gen.end_object()
    }

    fn optional_node(&mut self, node: Option<&Node>) -> Result<()> {
        match node {
            Some(node) => self.write_node(node),
            None => self.gen.null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeId, RelId};
    use serde_json::json;

    fn node(id: u64, props: JsonValue) -> Node {
        let properties = match props {
            JsonValue::Object(map) => map.into_iter().collect(),
            _ => Properties::new(),
        };
        Node { id: NodeId(id), properties }
    }

    fn rel(id: u64, start: u64, end: u64) -> Relationship {
        Relationship {
            id: RelId(id),
            start: NodeId(start),
            end: NodeId(end),
            rel_type: "KNOWS".to_string(),
            properties: Properties::new(),
        }
    }

    fn render(format: &OutputFormat, f: impl FnOnce(&mut ResultWriter<Vec<u8>>) -> Result<()>) -> JsonValue {
        let mut writer = ResultWriter::new(Vec::new(), format);
        f(&mut writer).unwrap();
        writer.close().unwrap();
        serde_json::from_slice(&writer.into_inner()).unwrap()
    }

    fn one_row(columns: &[&str], cells: Vec<Value>) -> QueryResult<'static> {
        let row: Row = columns.iter().map(|c| c.to_string()).zip(cells).collect();
        QueryResult::new(columns.iter().map(|c| c.to_string()).collect(), std::iter::once(Ok(row)))
    }

    #[test]
    fn test_compact_entities() {
        let out = render(&OutputFormat::compact(), |w| {
            w.start_array()?;
            w.write_node(&node(1, json!({"name": "foo"})))?;
            w.write_node(&node(2, json!({})))?;
            w.write_relationship(&rel(0, 1, 0))?;
            w.end_array()
        });
        assert_eq!(
            out,
            json!([
                {"id": 1, "data": {"name": "foo"}},
                {"id": 2},
                {"id": 0, "start": 1, "end": 0, "type": "KNOWS"}
            ])
        );
    }

    #[test]
    fn test_compat_entities_use_uris() {
        let out = render(&OutputFormat::compat("http://host/db"), |w| {
            w.start_array()?;
            w.write_node(&node(1, json!({"name": "foo"})))?;
            w.write_relationship(&rel(4, 1, 0))?;
            w.end_array()
        });
        assert_eq!(
            out,
            json!([
                {"self": "http://host/db/node/1", "data": {"name": "foo"}},
                {
                    "self": "http://host/db/relationship/4",
                    "start": "http://host/db/node/1",
                    "end": "http://host/db/node/0",
                    "type": "KNOWS"
                }
            ])
        );
    }

    #[test]
    fn test_compact_result_tags_cells() {
        let result = one_row(
            &["n", "x", "s", "l", "missing"],
            vec![
                Value::Node(node(3, json!({}))),
                Value::Float(1.5),
                Value::from("a"),
                Value::List(vec![Value::from(1), Value::Null]),
            ],
        );
        let out = render(&OutputFormat::compact(), |w| w.write_result(result, Instant::now(), |_| {}).map(|_| ()));

        assert_eq!(out["columns"], json!(["n", "x", "s", "l", "missing"]));
        assert_eq!(
            out["rows"],
            json!([[{"Node": {"id": 3}}, {"Double": 1.5}, {"String": "a"}, {"Array": [1, null]}, {"Null": null}]])
        );
        assert_eq!(out["count"], json!(1));
        assert!(out["time"].is_u64());
    }

    #[test]
    fn test_compat_result_is_bare() {
        let result = one_row(&["n", "i"], vec![Value::Node(node(3, json!({}))), Value::from(7)]);
        let out = render(&OutputFormat::compat("http://h/"), |w| w.write_result(result, Instant::now(), |_| {}).map(|_| ()));

        assert_eq!(out, json!({"columns": ["n", "i"], "data": [[{"self": "http://h/node/3"}, 7]]}));
    }

    #[test]
    fn test_path_shape() {
        let path = Path {
            nodes: vec![node(1, json!({})), node(2, json!({}))],
            relationships: vec![rel(0, 1, 2)],
        };
        let out = render(&OutputFormat::compact(), |w| w.write_path(&path));
        assert_eq!(out["length"], json!(1));
        assert_eq!(out["start"], json!({"id": 1}));
        assert_eq!(out["end"], json!({"id": 2}));
        assert_eq!(out["last_rel"]["id"], json!(0));
        assert_eq!(out["nodes"].as_array().unwrap().len(), 2);

        let empty = Path { nodes: vec![node(1, json!({}))], relationships: vec![] };
        let out = render(&OutputFormat::compat("http://h"), |w| w.write_path(&empty));
        assert_eq!(out["last_rel"], JsonValue::Null);
        assert_eq!(out["start"], json!({"self": "http://h/node/1"}));
    }

    #[test]
    fn test_on_row_sees_every_row() {
        let rows = (0..3).map(|i| {
            let mut row = Row::new();
            row.insert("i".to_string(), Value::from(i));
            Ok(row)
        });
        let result = QueryResult::new(vec!["i".into()], rows);
        let mut seen = Vec::new();
        let mut writer = ResultWriter::new(Vec::new(), &OutputFormat::compact());
        let count = writer.write_result(result, Instant::now(), |row| seen.push(row["i"].clone())).unwrap();
        assert_eq!(count, 3);
        assert_eq!(seen, vec![Value::from(0), Value::from(1), Value::from(2)]);
    }

    #[test]
    fn test_pretty_is_orthogonal_to_mode() {
        let format = OutputFormat::compat("http://h").with_pretty(true);
        let mut writer = ResultWriter::new(Vec::new(), &format);
        writer.write_node(&node(1, json!({"a": 1}))).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.contains('\n'));
        assert_eq!(serde_json::from_str::<JsonValue>(&text).unwrap()["self"], json!("http://h/node/1"));
    }

    #[test]
    fn test_unwind_closes_partial_output() {
        let failing = QueryResult::new(
            vec!["i".into()],
            vec![Ok(Row::new()), Err(GraphError::Query("boom".into()))].into_iter(),
        );
        let mut writer = ResultWriter::new(Vec::new(), &OutputFormat::compact());
        writer.start_array().unwrap();
        writer.start_array().unwrap();
        assert!(writer.write_result(failing, Instant::now(), |_| {}).is_err());
        writer.unwind(0).unwrap();

        let out: JsonValue = serde_json::from_slice(&writer.into_inner()).unwrap();
        assert_eq!(out, json!([[{"columns": ["i"], "rows": [[{"Null": null}]]}]]));
    }

    #[test]
    fn test_discard_accepts_everything() {
        let mut writer = ResultWriter::discard();
        writer.start_array().unwrap();
        writer.write_node(&node(1, json!({"a": 1}))).unwrap();
        writer.end_array().unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_output_format_from_media_type() {
        let format: OutputFormat = "application/json; format=compat; pretty=true; base=http://x/db".parse().unwrap();
        assert_eq!(format.mode, WireMode::Compat);
        assert!(format.pretty);
        assert_eq!(format.base_uri, "http://x/db");

        let format: OutputFormat = "application/json".parse().unwrap();
        assert_eq!(format, OutputFormat::default());
        assert!("application/json; format=xml".parse::<OutputFormat>().is_err());
        assert!("application/json; pretty=maybe".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_deserialize() {
        let format: OutputFormat = serde_json::from_value(json!({"mode": "compat", "pretty": true})).unwrap();
        assert_eq!(format.mode, WireMode::Compat);
        assert_eq!(format.base_uri, DEFAULT_BASE_URI);
    }
}
