//! Command interpreter
//!
//! One handler per opcode. Each command resolves its selection, mutates
//! the store and writes its output into the writer's current array; the
//! session owns the framing and the transaction around it.

use std::io::Write;
use std::time::Instant;

use crate::context::Context;
use crate::error::{GraphError, Result};
use crate::graph::{EntityId, EntityKind, GraphStore, NodeId, RelId, Unique};
use crate::protocol::{
    Command, CypherRequest, DeleteOptions, IndexDescriptor, Operation, Payload, RelationshipDescriptor,
    UpdateDescriptor,
};
use crate::query::QueryExecutor;
use crate::selector::{self, Selection};
use crate::value::{Params, Value};
use crate::writer::ResultWriter;

/// What one command produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Entities written to the output
    pub entities: u64,
    /// Query rows streamed
    pub rows: u64,
}

pub struct Interpreter<'a, W: Write> {
    store: &'a mut dyn GraphStore,
    executor: &'a dyn QueryExecutor,
    context: &'a mut Context,
    writer: &'a mut ResultWriter<W>,
}

impl<'a, W: Write> Interpreter<'a, W> {
    pub fn new(
        store: &'a mut dyn GraphStore,
        executor: &'a dyn QueryExecutor,
        context: &'a mut Context,
        writer: &'a mut ResultWriter<W>,
    ) -> Self {
        Self { store, executor, context, writer }
    }

    /// Run one command
    pub fn execute(&mut self, command: &Command) -> Result<Outcome> {
        let kind = command.opcode.selection_kind();
        let selection = selector::resolve(&command.selector, kind, &*self.store, self.context)?;

        match &command.operation {
            Operation::AddNodes(payload) => self.add_nodes(payload),
            Operation::AddRels(payload) => self.add_relationships(payload),
            Operation::Update(payload) => self.update(selection, payload),
            Operation::Get => self.get(selection),
            Operation::DeleteNodes(options) => self.delete_nodes(selection, options),
            Operation::DeleteRels => self.delete_relationships(selection),
            Operation::Cypher(request) => self.cypher(request),
        }
    }

    // ── Handlers ───────────────────────────────────────────────────

    fn add_nodes(&mut self, payload: &Payload<UpdateDescriptor>) -> Result<Outcome> {
        let mut outcome = Outcome::default();
        for desc in payload.iter() {
            let id = match &desc.unique {
                Some(unique) => match self.store.unique_node(&unique.index, &unique.key, &unique.value)? {
                    Unique::Created(id) => {
                        self.apply(EntityId::Node(id), desc)?;
                        id
                    }
                    Unique::Existing(id) => {
                        self.bind(EntityId::Node(id), desc);
                        id
                    }
                },
                None => {
                    let id = self.store.create_node()?;
                    self.apply(EntityId::Node(id), desc)?;
                    id
                }
            };
            self.write_entity(EntityId::Node(id))?;
            outcome.entities += 1;
        }
        Ok(outcome)
    }

    fn add_relationships(&mut self, payload: &Payload<RelationshipDescriptor>) -> Result<Outcome> {
        let mut outcome = Outcome::default();
        for desc in payload.iter() {
            let mut starts = selector::resolve(&desc.start, EntityKind::Node, &*self.store, self.context)?;
            // resolved up front so a bad `end` fails even with no starts;
            // every further start walks a fresh cursor
            let mut first_ends = Some(selector::resolve(&desc.end, EntityKind::Node, &*self.store, self.context)?);

            while let Some(start) = starts.next(&*self.store) {
                let mut ends = match first_ends.take() {
                    Some(ends) => ends,
                    None => selector::resolve(&desc.end, EntityKind::Node, &*self.store, self.context)?,
                };
                while let Some(end) = ends.next(&*self.store) {
                    let (EntityId::Node(from), EntityId::Node(to)) = (start, end) else {
                        continue;
                    };
                    let rel = self.connect(from, to, desc)?;
                    self.write_entity(EntityId::Relationship(rel))?;
                    outcome.entities += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// Create one relationship. With a unique key, the fresh relationship is
    /// offered to the index and deleted again if another one already holds
    /// the key; the holder is returned untouched.
    fn connect(&mut self, from: NodeId, to: NodeId, desc: &RelationshipDescriptor) -> Result<RelId> {
        let created = self.store.create_relationship(from, to, &desc.rel_type)?;
        if let Some(unique) = &desc.update.unique {
            if let Unique::Existing(existing) =
                self.store.unique_relationship(&unique.index, &unique.key, &unique.value, created)?
            {
                self.store.delete_relationship(created)?;
                self.bind(EntityId::Relationship(existing), &desc.update);
                return Ok(existing);
            }
        }
        self.apply(EntityId::Relationship(created), &desc.update)?;
        Ok(created)
    }

    fn update(&mut self, mut selection: Selection, payload: &Payload<UpdateDescriptor>) -> Result<Outcome> {
        match payload {
            Payload::One(desc) => {
                while let Some(entity) = selection.next(&*self.store) {
                    self.apply(entity, desc)?;
                }
            }
            Payload::Many(descs) => {
                let mut applied = 0;
                while let Some(entity) = selection.next(&*self.store) {
                    // stop at the first extra entity; the rest is never walked
                    let Some(desc) = descs.get(applied) else {
                        return Err(GraphError::SelectionExceedsPayload { provided: descs.len() });
                    };
                    self.apply(entity, desc)?;
                    applied += 1;
                }
                if applied < descs.len() {
                    return Err(GraphError::CountMismatch { selected: applied, provided: descs.len() });
                }
            }
        }
        Ok(Outcome::default())
    }

    fn get(&mut self, mut selection: Selection) -> Result<Outcome> {
        let mut outcome = Outcome::default();
        while let Some(entity) = selection.next(&*self.store) {
            self.write_entity(entity)?;
            outcome.entities += 1;
        }
        Ok(outcome)
    }

    fn delete_nodes(&mut self, mut selection: Selection, options: &DeleteOptions) -> Result<Outcome> {
        let reference = self.store.reference_node();
        while let Some(entity) = selection.next(&*self.store) {
            let EntityId::Node(node) = entity else { continue };
            if Some(node) == reference {
                continue;
            }
            if options.force {
                for rel in self.store.relationships_of(node)? {
                    self.store.delete_relationship(rel)?;
                }
            }
            self.store.delete_node(node)?;
        }
        Ok(Outcome::default())
    }

    fn delete_relationships(&mut self, mut selection: Selection) -> Result<Outcome> {
        while let Some(entity) = selection.next(&*self.store) {
            if let EntityId::Relationship(rel) = entity {
                self.store.delete_relationship(rel)?;
            }
        }
        Ok(Outcome::default())
    }

    fn cypher(&mut self, request: &CypherRequest) -> Result<Outcome> {
        let mut params: Params = request
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect();
        if request.use_context {
            params.extend(self.context.to_params(&*self.store)?);
        }

        let started = Instant::now();
        let result = self.executor.execute(&mut *self.store, &request.query, &params)?;

        let context = &mut *self.context;
        let merge = request.merge_result;
        let rows = self.writer.write_result(result, started, |row| {
            if merge {
                for (column, value) in row {
                    context.bind_value(column, value.clone());
                }
            }
        })?;
        Ok(Outcome { entities: 0, rows })
    }

    // ── Shared steps ───────────────────────────────────────────────

    /// Properties, index entries, then the context binding
    fn apply(&mut self, entity: EntityId, desc: &UpdateDescriptor) -> Result<()> {
        if let Some(data) = &desc.data {
            for (key, value) in data {
                if value.is_null() {
                    self.store.remove_property(entity, key)?;
                } else {
                    self.store.set_property(entity, key, value.clone())?;
                }
            }
        }
        if let Some(entries) = &desc.index {
            for entry in entries.iter() {
                self.update_index(entity, entry)?;
            }
        }
        self.bind(entity, desc);
        Ok(())
    }

    fn update_index(&mut self, entity: EntityId, entry: &IndexDescriptor) -> Result<()> {
        let key = entry.key.as_deref();
        if let Some(old) = &entry.old {
            self.store.index_remove(entity, &entry.index, key, Some(old))?;
        }
        match (key, &entry.value) {
            (Some(key), Some(value)) => self.store.index_add(entity, &entry.index, key, value),
            (key, None) => self.store.index_remove(entity, &entry.index, key, None),
            (None, Some(_)) => Err(GraphError::Index(format!(
                "Entry for index '{}' has a value but no key",
                entry.index
            ))),
        }
    }

    fn bind(&mut self, entity: EntityId, desc: &UpdateDescriptor) {
        if let Some(name) = &desc.reference {
            self.context.bind_entity(name, entity);
        }
    }

    fn write_entity(&mut self, entity: EntityId) -> Result<()> {
        match entity {
            EntityId::Node(id) => self.writer.write_node(&self.store.node(id)?),
            EntityId::Relationship(id) => self.writer.write_relationship(&self.store.relationship(id)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{MemoryGraph, Node, RelBounds, Relationship};
    use crate::protocol::Command;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::query::{QueryResult, Row, RowsExecutor};
    use crate::writer::OutputFormat;
    use serde_json::{json, Value as JsonValue};

    struct Harness {
        graph: MemoryGraph,
        executor: RowsExecutor,
        context: Context,
    }

    impl Harness {
        fn new() -> Self {
            Self { graph: MemoryGraph::new(), executor: RowsExecutor::new(), context: Context::new() }
        }

        /// Run one command and return what it wrote
        fn run(&mut self, raw: JsonValue) -> Result<JsonValue> {
            let command = Command::from_json(0, raw)?;
            let mut writer = ResultWriter::new(Vec::new(), &OutputFormat::compact());
            writer.start_array()?;
            Interpreter::new(&mut self.graph, &self.executor, &mut self.context, &mut writer).execute(&command)?;
            writer.end_array()?;
            Ok(serde_json::from_slice(&writer.into_inner())?)
        }
    }

    /// Delegates to a `MemoryGraph`, counting node scan steps taken
    /// before the first relationship is created.
    struct ScanCountingGraph {
        inner: MemoryGraph,
        scans: AtomicUsize,
        scans_before_create: Option<usize>,
    }

    impl ScanCountingGraph {
        fn with_nodes(count: usize) -> Self {
            let mut inner = MemoryGraph::new();
            for _ in 0..count {
                inner.create_node().unwrap();
            }
            Self { inner, scans: AtomicUsize::new(0), scans_before_create: None }
        }

        fn run(&mut self, raw: JsonValue) -> Result<()> {
            let command = Command::from_json(0, raw)?;
            let (executor, mut context) = (RowsExecutor::new(), Context::new());
            let mut writer = ResultWriter::discard();
            writer.start_array()?;
            Interpreter::new(self, &executor, &mut context, &mut writer).execute(&command)?;
            writer.end_array()
        }
    }

    impl GraphStore for ScanCountingGraph {
        fn begin_tx(&mut self) -> Result<()> {
            self.inner.begin_tx()
        }
        fn commit_tx(&mut self) -> Result<()> {
            self.inner.commit_tx()
        }
        fn rollback_tx(&mut self) -> Result<()> {
            self.inner.rollback_tx()
        }
        fn reference_node(&self) -> Option<NodeId> {
            self.inner.reference_node()
        }
        fn create_node(&mut self) -> Result<NodeId> {
            self.inner.create_node()
        }
        fn node(&self, id: NodeId) -> Result<Node> {
            self.inner.node(id)
        }
        fn delete_node(&mut self, id: NodeId) -> Result<()> {
            self.inner.delete_node(id)
        }
        fn relationships_of(&self, node: NodeId) -> Result<Vec<RelId>> {
            self.inner.relationships_of(node)
        }
        fn next_node_after(&self, after: Option<NodeId>) -> Option<NodeId> {
            self.scans.fetch_add(1, Ordering::Relaxed);
            self.inner.next_node_after(after)
        }
        fn create_relationship(&mut self, start: NodeId, end: NodeId, rel_type: &str) -> Result<RelId> {
            if self.scans_before_create.is_none() {
                self.scans_before_create = Some(self.scans.load(Ordering::Relaxed));
            }
            self.inner.create_relationship(start, end, rel_type)
        }
        fn relationship(&self, id: RelId) -> Result<Relationship> {
            self.inner.relationship(id)
        }
        fn delete_relationship(&mut self, id: RelId) -> Result<()> {
            self.inner.delete_relationship(id)
        }
        fn next_relationship_after(&self, after: Option<RelId>) -> Option<RelId> {
            self.inner.next_relationship_after(after)
        }
        fn contains(&self, entity: EntityId) -> bool {
            self.inner.contains(entity)
        }
        fn set_property(&mut self, entity: EntityId, key: &str, value: JsonValue) -> Result<()> {
            self.inner.set_property(entity, key, value)
        }
        fn remove_property(&mut self, entity: EntityId, key: &str) -> Result<()> {
            self.inner.remove_property(entity, key)
        }
        fn index_add(&mut self, entity: EntityId, index: &str, key: &str, value: &JsonValue) -> Result<()> {
            self.inner.index_add(entity, index, key, value)
        }
        fn index_remove(
            &mut self,
            entity: EntityId,
            index: &str,
            key: Option<&str>,
            value: Option<&JsonValue>,
        ) -> Result<()> {
            self.inner.index_remove(entity, index, key, value)
        }
        fn index_get(
            &self,
            kind: EntityKind,
            index: Option<&str>,
            key: &str,
            value: Option<&JsonValue>,
            bounds: RelBounds,
        ) -> Result<Vec<EntityId>> {
            self.inner.index_get(kind, index, key, value, bounds)
        }
        fn index_query(
            &self,
            kind: EntityKind,
            index: Option<&str>,
            query: &JsonValue,
            bounds: RelBounds,
        ) -> Result<Vec<EntityId>> {
            self.inner.index_query(kind, index, query, bounds)
        }
        fn unique_node(&mut self, index: &str, key: &str, value: &JsonValue) -> Result<Unique<NodeId>> {
            self.inner.unique_node(index, key, value)
        }
        fn unique_relationship(
            &mut self,
            index: &str,
            key: &str,
            value: &JsonValue,
            candidate: RelId,
        ) -> Result<Unique<RelId>> {
            self.inner.unique_relationship(index, key, value, candidate)
        }
    }

    #[test]
    fn test_add_node_binds_reference() {
        let mut h = Harness::new();
        let out = h.run(json!(["ADD_NODES", {"data": {"name": "foo"}, "ref": "foo"}])).unwrap();
        assert_eq!(out, json!([{"id": 1, "data": {"name": "foo"}}]));

        let out = h.run(json!(["GET_NODES", "foo", null])).unwrap();
        assert_eq!(out, json!([{"id": 1, "data": {"name": "foo"}}]));
    }

    #[test]
    fn test_add_relationship_between_references() {
        let mut h = Harness::new();
        h.run(json!(["ADD_NODES", [{"ref": "a"}, {"ref": "b"}]])).unwrap();
        let out = h.run(json!(["ADD_RELS", {"type": "KNOWS", "start": "a", "end": 0, "data": {"w": 1}, "ref": "r"}])).unwrap();
        assert_eq!(out, json!([{"id": 0, "start": 1, "end": 0, "type": "KNOWS", "data": {"w": 1}}]));

        let out = h.run(json!(["GET_RELS", "r", null])).unwrap();
        assert_eq!(out[0]["id"], json!(0));
    }

    #[test]
    fn test_update_removes_null_properties() {
        let mut h = Harness::new();
        h.run(json!(["ADD_NODES", {"data": {"name": "foo", "age": 3}}])).unwrap();
        h.run(json!(["UPDATE_NODES", 1, {"data": {"name": null, "missing": null, "age": 4}}])).unwrap();

        let out = h.run(json!(["GET_NODES", 1, null])).unwrap();
        assert_eq!(out, json!([{"id": 1, "data": {"age": 4}}]));
    }

    #[test]
    fn test_update_list_payload_pairs_positionally() {
        let mut h = Harness::new();
        h.run(json!(["ADD_NODES", [{}, {}]])).unwrap();
        h.run(json!(["UPDATE_NODES", [2, 1], [{"data": {"n": "two"}}, {"data": {"n": "one"}}]])).unwrap();
        let out = h.run(json!(["GET_NODES", [1, 2], null])).unwrap();
        assert_eq!(out[0]["data"]["n"], json!("one"));
        assert_eq!(out[1]["data"]["n"], json!("two"));
    }

    #[test]
    fn test_update_count_mismatch() {
        let mut h = Harness::new();
        h.run(json!(["ADD_NODES", [{}, {}, {}]])).unwrap();
        let err = h.run(json!(["UPDATE_NODES", [1, 2, 3], [{}, {}]])).unwrap_err();
        assert!(matches!(err, GraphError::SelectionExceedsPayload { provided: 2 }));

        let err = h.run(json!(["UPDATE_NODES", [1], [{}, {}]])).unwrap_err();
        assert!(matches!(err, GraphError::CountMismatch { selected: 1, provided: 2 }));
    }

    #[test]
    fn test_update_mismatch_stops_at_first_extra_entity() {
        let mut graph = ScanCountingGraph::with_nodes(1_000);
        let err = graph.run(json!(["UPDATE_NODES", "*", [{}]])).unwrap_err();
        assert!(matches!(err, GraphError::SelectionExceedsPayload { provided: 1 }));
        // reference node, node 1, then stop
        assert_eq!(graph.scans.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_add_relationships_streams_wildcard_end() {
        let mut graph = ScanCountingGraph::with_nodes(1_000);
        graph.run(json!(["ADD_RELS", {"type": "T", "start": 0, "end": "*"}])).unwrap();
        assert!(matches!(graph.scans_before_create, Some(scans) if scans <= 2));
        assert_eq!(graph.inner.relationship_count(), 1_001);
    }

    #[test]
    fn test_add_relationships_wildcard_both_ends() {
        let mut graph = ScanCountingGraph::with_nodes(2);
        graph.run(json!(["ADD_RELS", {"type": "T", "start": "*", "end": "*"}])).unwrap();
        // every start walks the end scan again
        assert_eq!(graph.inner.relationship_count(), 9);
    }

    #[test]
    fn test_add_relationships_rejects_bad_end_without_starts() {
        let mut h = Harness::new();
        let err = h.run(json!(["ADD_RELS", {"type": "T", "start": [], "end": "ghost"}])).unwrap_err();
        assert!(matches!(err, GraphError::UnboundReference(_)));
    }

    #[test]
    fn test_index_descriptor_semantics() {
        let mut h = Harness::new();
        h.run(json!(["ADD_NODES", {"index": [{"index": "i", "key": "k", "value": "a"}, {"index": "i", "key": "j", "value": "b"}]}])).unwrap();
        let lookup = |h: &mut Harness, key: &str, value: &str| {
            h.run(json!(["GET_NODES", {"index": "i", "key": key, "value": value}, null])).unwrap().as_array().unwrap().len()
        };
        assert_eq!(lookup(&mut h, "k", "a"), 1);

        // old removed, new added
        h.run(json!(["UPDATE_NODES", 1, {"index": {"index": "i", "key": "k", "value": "c", "old": "a"}}])).unwrap();
        assert_eq!(lookup(&mut h, "k", "a"), 0);
        assert_eq!(lookup(&mut h, "k", "c"), 1);

        // null value removes by key
        h.run(json!(["UPDATE_NODES", 1, {"index": {"index": "i", "key": "k", "value": null}}])).unwrap();
        assert_eq!(lookup(&mut h, "k", "c"), 0);
        assert_eq!(lookup(&mut h, "j", "b"), 1);

        // no key, no value: everything for the entity
        h.run(json!(["UPDATE_NODES", 1, {"index": {"index": "i"}}])).unwrap();
        assert_eq!(lookup(&mut h, "j", "b"), 0);

        let err = h.run(json!(["UPDATE_NODES", 1, {"index": {"index": "i", "value": 1}}])).unwrap_err();
        assert!(matches!(err, GraphError::Index(_)));
    }

    #[test]
    fn test_unique_node_initializes_once() {
        let mut h = Harness::new();
        let cmd = json!(["ADD_NODES", {"unique": {"index": "u", "key": "k", "value": 1}, "data": {"v": 1}, "ref": "x"}]);
        let first = h.run(cmd).unwrap();
        let second = h
            .run(json!(["ADD_NODES", {"unique": {"index": "u", "key": "k", "value": 1}, "data": {"v": 2}, "ref": "y"}]))
            .unwrap();
        assert_eq!(first[0]["id"], second[0]["id"]);
        assert_eq!(second[0]["data"]["v"], json!(1));
        assert_eq!(h.context.entity("y", EntityKind::Node).unwrap(), EntityId::Node(NodeId(1)));
    }

    #[test]
    fn test_unique_relationship_discards_transient() {
        let mut h = Harness::new();
        h.run(json!(["ADD_NODES", {}])).unwrap();
        let rel = json!(["ADD_RELS", {"type": "T", "start": 0, "end": 1, "unique": {"index": "r", "key": "k", "value": "x"}, "data": {"n": 1}}]);
        let first = h.run(rel.clone()).unwrap();
        let second = h.run(rel).unwrap();
        assert_eq!(first[0]["id"], second[0]["id"]);
        assert_eq!(h.graph.relationship_count(), 1);
    }

    #[test]
    fn test_cross_product() {
        let mut h = Harness::new();
        h.run(json!(["ADD_NODES", [{}, {}, {}, {}, {}]])).unwrap();
        let out = h.run(json!(["ADD_RELS", {"type": "T", "start": [1, 2], "end": [3, 4, 5]}])).unwrap();
        let pairs: Vec<(u64, u64)> = out
            .as_array()
            .unwrap()
            .iter()
            .map(|r| (r["start"].as_u64().unwrap(), r["end"].as_u64().unwrap()))
            .collect();
        assert_eq!(pairs, vec![(1, 3), (1, 4), (1, 5), (2, 3), (2, 4), (2, 5)]);
    }

    #[test]
    fn test_delete_nodes_guard_and_force() {
        let mut h = Harness::new();
        h.run(json!(["ADD_NODES", {"ref": "a"}])).unwrap();
        h.run(json!(["ADD_RELS", {"type": "T", "start": 0, "end": "a"}])).unwrap();

        let err = h.run(json!(["DELETE_NODES", "a", {}])).unwrap_err();
        assert!(matches!(err, GraphError::NodeHasRelationships(1)));

        h.run(json!(["DELETE_NODES", "*", {"force": true}])).unwrap();
        assert_eq!(h.graph.node_count(), 1);
        assert_eq!(h.graph.relationship_count(), 0);
        assert!(h.graph.node(NodeId(0)).is_ok());
    }

    #[test]
    fn test_delete_nodes_skips_reference_node() {
        let mut h = Harness::new();
        let out = h.run(json!(["DELETE_NODES", 0, {"force": true}])).unwrap();
        assert_eq!(out, json!([]));
        let out = h.run(json!(["DELETE_NODES", [0], null])).unwrap();
        assert_eq!(out, json!([]));
        assert!(h.graph.node(NodeId(0)).is_ok());
    }

    #[test]
    fn test_delete_relationships() {
        let mut h = Harness::new();
        h.run(json!(["ADD_RELS", {"type": "T", "start": 0, "end": 0}])).unwrap();
        let out = h.run(json!(["DELETE_RELS", "*", null])).unwrap();
        assert_eq!(out, json!([]));
        assert_eq!(h.graph.relationship_count(), 0);
    }

    #[test]
    fn test_cypher_context_and_merge() {
        let mut h = Harness::new();
        h.executor = RowsExecutor::new().on("echo", |_store, params| {
            let mut row = Row::new();
            row.insert("p".to_string(), params.get("p").cloned().unwrap_or(Value::Null));
            row.insert("me".to_string(), params.get("me").cloned().unwrap_or(Value::Null));
            Ok(QueryResult::new(vec!["p".into(), "me".into()], std::iter::once(Ok(row))))
        });
        h.run(json!(["ADD_NODES", {"ref": "me"}])).unwrap();
        h.context.bind_value("p", Value::from("ctx"));

        let out = h
            .run(json!(["CYPHER", {"query": "echo", "params": {"p": "param"}, "useContext": true, "mergeResult": true}]))
            .unwrap();
        let result = &out[0];
        assert_eq!(result["rows"][0][0], json!({"String": "ctx"}));
        assert_eq!(result["rows"][0][1], json!({"Node": {"id": 1}}));
        assert_eq!(result["count"], json!(1));
        assert_eq!(h.context.get("me"), Some(&crate::context::Binding::Entity(EntityId::Node(NodeId(1)))));

        let out = h.run(json!(["CYPHER", {"query": "echo", "params": {"p": "param"}}])).unwrap();
        assert_eq!(out[0]["rows"][0][0], json!({"String": "param"}));
        assert_eq!(out[0]["rows"][0][1], json!({"Null": null}));
    }

    #[test]
    fn test_unknown_reference_fails() {
        let mut h = Harness::new();
        let err = h.run(json!(["GET_NODES", "ghost", null])).unwrap_err();
        assert!(matches!(err, GraphError::UnboundReference(_)));
    }
}
