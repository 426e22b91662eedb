//! MemoryGraph - in-memory `GraphStore` with undo-log transactions.
//!
//! Node 0 is the reference node and exists from construction. Ids are
//! never reused, including after a rollback.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Bound;

use serde_json::Value as JsonValue;

use super::index_set::{IndexEntry, IndexSet};
use super::{
    EntityId, EntityKind, GraphStore, Node, NodeId, Properties, RelBounds, RelId, Relationship,
    Unique,
};
use crate::error::{GraphError, Result};

/// Index consulted when a node selector names no index
pub const NODE_AUTO_INDEX: &str = "node_auto_index";

/// Index consulted when a relationship selector names no index
pub const RELATIONSHIP_AUTO_INDEX: &str = "relationship_auto_index";

fn auto_index(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Node => NODE_AUTO_INDEX,
        EntityKind::Relationship => RELATIONSHIP_AUTO_INDEX,
    }
}

#[derive(Debug, Clone, Default)]
struct NodeEntry {
    properties: Properties,
    rels: BTreeSet<u64>,
}

#[derive(Debug, Clone)]
struct RelEntry {
    start: NodeId,
    end: NodeId,
    rel_type: String,
    properties: Properties,
}

/// Inverse of one mutation, replayed backwards on rollback.
#[derive(Debug)]
enum Undo {
    NodeCreated(u64),
    RelCreated(u64),
    NodeDeleted(u64, NodeEntry),
    RelDeleted(u64, RelEntry),
    Property { entity: EntityId, key: String, old: Option<JsonValue> },
    IndexAdded(IndexEntry),
    IndexRemoved(IndexEntry),
}

pub struct MemoryGraph {
    nodes: BTreeMap<u64, NodeEntry>,
    rels: BTreeMap<u64, RelEntry>,
    next_node: u64,
    next_rel: u64,
    indexes: IndexSet,
    /// Property keys mirrored into the automatic indexes
    auto_keys: HashSet<String>,
    /// Some while a transaction is open
    undo: Option<Vec<Undo>>,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraph {
    /// Empty graph holding only the reference node.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(0, NodeEntry::default());
        Self {
            nodes,
            rels: BTreeMap::new(),
            next_node: 1,
            next_rel: 0,
            indexes: IndexSet::new(),
            auto_keys: HashSet::new(),
            undo: None,
        }
    }

    /// Mirror these property keys into the automatic indexes.
    pub fn with_auto_index<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auto_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.rels.len()
    }

    pub fn in_transaction(&self) -> bool {
        self.undo.is_some()
    }

    fn log(&mut self, undo: Undo) {
        if let Some(log) = self.undo.as_mut() {
            log.push(undo);
        }
    }

    fn properties_mut(&mut self, entity: EntityId) -> Result<&mut Properties> {
        match entity {
            EntityId::Node(id) => self
                .nodes
                .get_mut(&id.0)
                .map(|n| &mut n.properties)
                .ok_or(GraphError::NodeNotFound(id.0)),
            EntityId::Relationship(id) => self
                .rels
                .get_mut(&id.0)
                .map(|r| &mut r.properties)
                .ok_or(GraphError::RelationshipNotFound(id.0)),
        }
    }

    fn add_entry(&mut self, entity: EntityId, index: &str, key: &str, value: &JsonValue) {
        if let Some(entry) = self.indexes.add(entity.kind(), index, key, value, entity.raw()) {
            self.log(Undo::IndexAdded(entry));
        }
    }

    fn remove_entries(&mut self, entity: EntityId, index: &str, key: Option<&str>, value: Option<&JsonValue>) {
        let removed = self.indexes.remove_matching(entity.kind(), index, key, value, entity.raw());
        for entry in removed {
            self.log(Undo::IndexRemoved(entry));
        }
    }

    fn purge_entries(&mut self, entity: EntityId) {
        for entry in self.indexes.purge(entity.kind(), entity.raw()) {
            self.log(Undo::IndexRemoved(entry));
        }
    }

    fn revert(&mut self, step: Undo) {
        match step {
            Undo::NodeCreated(id) => {
                self.nodes.remove(&id);
            }
            Undo::RelCreated(id) => {
                if let Some(rel) = self.rels.remove(&id) {
                    self.unlink(id, &rel);
                }
            }
            Undo::NodeDeleted(id, entry) => {
                self.nodes.insert(id, entry);
            }
            Undo::RelDeleted(id, entry) => {
                self.link(id, &entry);
                self.rels.insert(id, entry);
            }
            Undo::Property { entity, key, old } => {
                if let Ok(props) = self.properties_mut(entity) {
                    match old {
                        Some(value) => props.insert(key, value),
                        None => props.remove(&key),
                    };
                }
            }
            Undo::IndexAdded(entry) => {
                self.indexes.remove(&entry);
            }
            Undo::IndexRemoved(entry) => {
                self.indexes.insert(&entry);
            }
        }
    }

    fn link(&mut self, id: u64, rel: &RelEntry) {
        for node in [rel.start, rel.end] {
            if let Some(entry) = self.nodes.get_mut(&node.0) {
                entry.rels.insert(id);
            }
        }
    }

    fn unlink(&mut self, id: u64, rel: &RelEntry) {
        for node in [rel.start, rel.end] {
            if let Some(entry) = self.nodes.get_mut(&node.0) {
                entry.rels.remove(&id);
            }
        }
    }

    fn index_name<'a>(kind: EntityKind, index: Option<&'a str>) -> &'a str {
        index.unwrap_or_else(|| auto_index(kind))
    }

    fn bounded(&self, kind: EntityKind, ids: Vec<u64>, bounds: RelBounds) -> Vec<EntityId> {
        ids.into_iter()
            .filter(|id| match kind {
                EntityKind::Node => self.nodes.contains_key(id),
                EntityKind::Relationship => self
                    .rels
                    .get(id)
                    .map_or(false, |r| bounds.matches(r.start, r.end)),
            })
            .map(|id| EntityId::of(kind, id))
            .collect()
    }
}

impl GraphStore for MemoryGraph {
    fn begin_tx(&mut self) -> Result<()> {
        if self.undo.is_some() {
            return Err(GraphError::Transaction("transaction already open".to_string()));
        }
        self.undo = Some(Vec::new());
        Ok(())
    }

    fn commit_tx(&mut self) -> Result<()> {
        self.undo
            .take()
            .map(|_| ())
            .ok_or_else(|| GraphError::Transaction("no open transaction to commit".to_string()))
    }

    fn rollback_tx(&mut self) -> Result<()> {
        let log = self
            .undo
            .take()
            .ok_or_else(|| GraphError::Transaction("no open transaction to roll back".to_string()))?;
        for step in log.into_iter().rev() {
            self.revert(step);
        }
        Ok(())
    }

    fn reference_node(&self) -> Option<NodeId> {
        self.nodes.contains_key(&0).then_some(NodeId(0))
    }

    fn create_node(&mut self) -> Result<NodeId> {
        let id = self.next_node;
        self.next_node += 1;
        self.nodes.insert(id, NodeEntry::default());
        self.log(Undo::NodeCreated(id));
        Ok(NodeId(id))
    }

    fn node(&self, id: NodeId) -> Result<Node> {
        let entry = self.nodes.get(&id.0).ok_or(GraphError::NodeNotFound(id.0))?;
        Ok(Node { id, properties: entry.properties.clone() })
    }

    fn delete_node(&mut self, id: NodeId) -> Result<()> {
        let entry = self.nodes.get(&id.0).ok_or(GraphError::NodeNotFound(id.0))?;
        if !entry.rels.is_empty() {
            return Err(GraphError::NodeHasRelationships(id.0));
        }
        self.purge_entries(EntityId::Node(id));
        if let Some(entry) = self.nodes.remove(&id.0) {
            self.log(Undo::NodeDeleted(id.0, entry));
        }
        Ok(())
    }

    fn relationships_of(&self, node: NodeId) -> Result<Vec<RelId>> {
        let entry = self.nodes.get(&node.0).ok_or(GraphError::NodeNotFound(node.0))?;
        Ok(entry.rels.iter().copied().map(RelId).collect())
    }

    fn next_node_after(&self, after: Option<NodeId>) -> Option<NodeId> {
        let lower = after.map_or(Bound::Unbounded, |id| Bound::Excluded(id.0));
        self.nodes.range((lower, Bound::Unbounded)).next().map(|(id, _)| NodeId(*id))
    }

    fn create_relationship(&mut self, start: NodeId, end: NodeId, rel_type: &str) -> Result<RelId> {
        for node in [start, end] {
            if !self.nodes.contains_key(&node.0) {
                return Err(GraphError::NodeNotFound(node.0));
            }
        }
        let id = self.next_rel;
        self.next_rel += 1;
        let entry = RelEntry {
            start,
            end,
            rel_type: rel_type.to_string(),
            properties: Properties::new(),
        };
        self.link(id, &entry);
        self.rels.insert(id, entry);
        self.log(Undo::RelCreated(id));
        Ok(RelId(id))
    }

    fn relationship(&self, id: RelId) -> Result<Relationship> {
        let entry = self.rels.get(&id.0).ok_or(GraphError::RelationshipNotFound(id.0))?;
        Ok(Relationship {
            id,
            start: entry.start,
            end: entry.end,
            rel_type: entry.rel_type.clone(),
            properties: entry.properties.clone(),
        })
    }

    fn delete_relationship(&mut self, id: RelId) -> Result<()> {
        if !self.rels.contains_key(&id.0) {
            return Err(GraphError::RelationshipNotFound(id.0));
        }
        self.purge_entries(EntityId::Relationship(id));
        if let Some(entry) = self.rels.remove(&id.0) {
            self.unlink(id.0, &entry);
            self.log(Undo::RelDeleted(id.0, entry));
        }
        Ok(())
    }

    fn next_relationship_after(&self, after: Option<RelId>) -> Option<RelId> {
        let lower = after.map_or(Bound::Unbounded, |id| Bound::Excluded(id.0));
        self.rels.range((lower, Bound::Unbounded)).next().map(|(id, _)| RelId(*id))
    }

    fn contains(&self, entity: EntityId) -> bool {
        match entity {
            EntityId::Node(id) => self.nodes.contains_key(&id.0),
            EntityId::Relationship(id) => self.rels.contains_key(&id.0),
        }
    }

    fn set_property(&mut self, entity: EntityId, key: &str, value: JsonValue) -> Result<()> {
        if !self.contains(entity) {
            return Err(GraphError::not_found(entity));
        }
        let auto = self.auto_keys.contains(key);
        if auto {
            self.remove_entries(entity, auto_index(entity.kind()), Some(key), None);
            self.add_entry(entity, auto_index(entity.kind()), key, &value);
        }
        let old = self.properties_mut(entity)?.insert(key.to_string(), value);
        self.log(Undo::Property { entity, key: key.to_string(), old });
        Ok(())
    }

    fn remove_property(&mut self, entity: EntityId, key: &str) -> Result<()> {
        let Some(old) = self.properties_mut(entity)?.remove(key) else {
            return Ok(());
        };
        if self.auto_keys.contains(key) {
            self.remove_entries(entity, auto_index(entity.kind()), Some(key), None);
        }
        self.log(Undo::Property { entity, key: key.to_string(), old: Some(old) });
        Ok(())
    }

    fn index_add(&mut self, entity: EntityId, index: &str, key: &str, value: &JsonValue) -> Result<()> {
        if !self.contains(entity) {
            return Err(GraphError::not_found(entity));
        }
        self.add_entry(entity, index, key, value);
        Ok(())
    }

    fn index_remove(
        &mut self,
        entity: EntityId,
        index: &str,
        key: Option<&str>,
        value: Option<&JsonValue>,
    ) -> Result<()> {
        self.remove_entries(entity, index, key, value);
        Ok(())
    }

    fn index_get(
        &self,
        kind: EntityKind,
        index: Option<&str>,
        key: &str,
        value: Option<&JsonValue>,
        bounds: RelBounds,
    ) -> Result<Vec<EntityId>> {
        let ids = self.indexes.get(kind, Self::index_name(kind, index), key, value);
        Ok(self.bounded(kind, ids, bounds))
    }

    fn index_query(
        &self,
        kind: EntityKind,
        index: Option<&str>,
        query: &JsonValue,
        bounds: RelBounds,
    ) -> Result<Vec<EntityId>> {
        let JsonValue::String(text) = query else {
            return Err(GraphError::Index(format!("Index query must be a string, got {}", query)));
        };
        let ids = self.indexes.query(kind, Self::index_name(kind, index), text)?;
        Ok(self.bounded(kind, ids, bounds))
    }

    fn unique_node(&mut self, index: &str, key: &str, value: &JsonValue) -> Result<Unique<NodeId>> {
        if let Some(id) = self.indexes.first(EntityKind::Node, index, key, value) {
            if self.nodes.contains_key(&id) {
                return Ok(Unique::Existing(NodeId(id)));
            }
        }
        let id = self.create_node()?;
        self.add_entry(EntityId::Node(id), index, key, value);
        Ok(Unique::Created(id))
    }

    fn unique_relationship(
        &mut self,
        index: &str,
        key: &str,
        value: &JsonValue,
        candidate: RelId,
    ) -> Result<Unique<RelId>> {
        if let Some(id) = self.indexes.first(EntityKind::Relationship, index, key, value) {
            if id != candidate.0 && self.rels.contains_key(&id) {
                return Ok(Unique::Existing(RelId(id)));
            }
        }
        self.index_add(EntityId::Relationship(candidate), index, key, value)?;
        Ok(Unique::Created(candidate))
    }
}
