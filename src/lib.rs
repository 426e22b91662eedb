//! graphbatch - batched graph commands with a streaming JSON result writer
//!
//! A client sends a batch: a JSON array of `[opcode, selector, payload]`
//! commands. The batch runs inside one transaction against a `GraphStore`;
//! named references bound by earlier commands (`"ref": "foo"`) can be used
//! as selectors by later ones. The response is one JSON array with one
//! sub-array per command, streamed to the sink as it is produced.
//!
//! ```no_run
//! use graphbatch::{Batch, BatchSession, MemoryGraph, OutputFormat, ResultWriter, RowsExecutor};
//!
//! let mut graph = MemoryGraph::new();
//! let executor = RowsExecutor::new();
//! let batch = Batch::from_slice(br#"[["ADD_NODES", {"data": {"name": "foo"}, "ref": "foo"}],
//!                                   ["ADD_RELS", {"type": "KNOWS", "start": "foo", "end": 0}]]"#).unwrap();
//!
//! let mut writer = ResultWriter::new(std::io::stdout(), &OutputFormat::compact());
//! BatchSession::new(&mut graph, &executor).run(&batch, &mut writer).unwrap();
//! ```

pub mod context;
pub mod database;
pub mod error;
pub mod graph;
pub mod interpreter;
pub mod metrics;
pub mod protocol;
pub mod query;
pub mod reader;
pub mod selector;
pub mod session;
pub mod sink;
pub mod value;
pub mod writer;

pub use database::Database;
pub use error::{GraphError, Result};
pub use graph::{EntityId, EntityKind, GraphStore, MemoryGraph, Node, NodeId, Path, RelId, Relationship};
pub use metrics::{Metrics, MetricsSnapshot};
pub use protocol::{Batch, Command, Opcode, Selector};
pub use query::{QueryExecutor, QueryResult, Row, RowsExecutor};
pub use reader::{read_results, ResultCallback};
pub use session::{AccessMode, BatchReport, BatchSession, SessionOptions};
pub use sink::{ChannelSink, ChunkReceiver};
pub use value::Value;
pub use writer::{OutputFormat, ResultWriter, WireMode};
