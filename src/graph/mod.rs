//! Graph store adapter API
//!
//! The batch engine never owns entities. It refers to them through
//! opaque numeric handles and reaches their data only through the
//! `GraphStore` trait, so any engine (the in-memory `MemoryGraph`, a
//! disk-backed store) can sit behind the same interface.

pub mod index_set;
pub mod memory;

pub use memory::MemoryGraph;

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;

use crate::error::Result;

/// Property map of a node or relationship. Ordered so output is stable.
pub type Properties = BTreeMap<String, JsonValue>;

/// Handle to a node owned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

/// Handle to a relationship owned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelId(pub u64);

/// Which family of entities a selector or index addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Relationship,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Relationship => "relationship",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handle to either kind of entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    Node(NodeId),
    Relationship(RelId),
}

impl EntityId {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityId::Node(_) => EntityKind::Node,
            EntityId::Relationship(_) => EntityKind::Relationship,
        }
    }

    /// Raw numeric id, without the kind
    pub fn raw(&self) -> u64 {
        match self {
            EntityId::Node(id) => id.0,
            EntityId::Relationship(id) => id.0,
        }
    }

    /// Build a handle of `kind` from a raw id
    pub fn of(kind: EntityKind, raw: u64) -> Self {
        match kind {
            EntityKind::Node => EntityId::Node(NodeId(raw)),
            EntityKind::Relationship => EntityId::Relationship(RelId(raw)),
        }
    }
}

impl From<NodeId> for EntityId {
    fn from(id: NodeId) -> Self {
        EntityId::Node(id)
    }
}

impl From<RelId> for EntityId {
    fn from(id: RelId) -> Self {
        EntityId::Relationship(id)
    }
}

// ── Entity snapshots ───────────────────────────────────────────────

/// Point-in-time copy of one node, as handed to the result writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub properties: Properties,
}

/// Point-in-time copy of one relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: RelId,
    pub start: NodeId,
    pub end: NodeId,
    pub rel_type: String,
    pub properties: Properties,
}

/// Alternating node/relationship walk. `nodes.len() == relationships.len() + 1`
/// for any path produced by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl Path {
    /// Number of relationships
    pub fn length(&self) -> usize {
        self.relationships.len()
    }

    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn end_node(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn last_relationship(&self) -> Option<&Relationship> {
        self.relationships.last()
    }
}

// ── Store contract ─────────────────────────────────────────────────

/// Outcome of an atomic get-or-create against a unique index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unique<T> {
    /// No entry existed; the entity is new and now indexed.
    Created(T),
    /// An entry existed; nothing was created.
    Existing(T),
}

impl<T> Unique<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, Unique::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Unique::Created(v) | Unique::Existing(v) => v,
        }
    }
}

/// Endpoint filter for relationship index lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelBounds {
    pub start: Option<NodeId>,
    pub end: Option<NodeId>,
}

impl RelBounds {
    pub fn matches(&self, start: NodeId, end: NodeId) -> bool {
        self.start.map_or(true, |s| s == start) && self.end.map_or(true, |e| e == end)
    }
}

/// Capability interface the batch engine drives.
///
/// Send + Sync required for use behind RwLock<Box<dyn GraphStore>> in Database
pub trait GraphStore: Send + Sync {
    // === TRANSACTIONS ===

    /// Open the one transaction a batch runs in
    fn begin_tx(&mut self) -> Result<()>;

    /// Make every change since `begin_tx` permanent
    fn commit_tx(&mut self) -> Result<()>;

    /// Undo every change since `begin_tx`
    fn rollback_tx(&mut self) -> Result<()>;

    // === NODES ===

    /// The root entity that is never deleted
    fn reference_node(&self) -> Option<NodeId>;

    fn create_node(&mut self) -> Result<NodeId>;

    /// Snapshot of a node; `NodeNotFound` if the id is unknown
    fn node(&self, id: NodeId) -> Result<Node>;

    /// Delete a node. Fails with `NodeHasRelationships` if any remain.
    fn delete_node(&mut self, id: NodeId) -> Result<()>;

    /// Ids of every relationship touching `node`, in either direction
    fn relationships_of(&self, node: NodeId) -> Result<Vec<RelId>>;

    /// Smallest live node id greater than `after` (or the first one)
    fn next_node_after(&self, after: Option<NodeId>) -> Option<NodeId>;

    // === RELATIONSHIPS ===

    fn create_relationship(&mut self, start: NodeId, end: NodeId, rel_type: &str) -> Result<RelId>;

    fn relationship(&self, id: RelId) -> Result<Relationship>;

    fn delete_relationship(&mut self, id: RelId) -> Result<()>;

    fn next_relationship_after(&self, after: Option<RelId>) -> Option<RelId>;

    // === PROPERTIES ===

    fn contains(&self, entity: EntityId) -> bool;

    fn set_property(&mut self, entity: EntityId, key: &str, value: JsonValue) -> Result<()>;

    /// Remove a property; absent keys are a no-op
    fn remove_property(&mut self, entity: EntityId, key: &str) -> Result<()>;

    // === INDEXES ===

    fn index_add(&mut self, entity: EntityId, index: &str, key: &str, value: &JsonValue) -> Result<()>;

    /// Remove index entries for `entity`: the exact (key, value) pair, every
    /// value under `key`, or (key = None) every entry in the index.
    fn index_remove(
        &mut self,
        entity: EntityId,
        index: &str,
        key: Option<&str>,
        value: Option<&JsonValue>,
    ) -> Result<()>;

    /// Exact lookup; `index = None` addresses the automatic index of `kind`,
    /// `value = None` matches any value under `key`.
    fn index_get(
        &self,
        kind: EntityKind,
        index: Option<&str>,
        key: &str,
        value: Option<&JsonValue>,
        bounds: RelBounds,
    ) -> Result<Vec<EntityId>>;

    /// Free-text lookup in the store's query syntax
    fn index_query(
        &self,
        kind: EntityKind,
        index: Option<&str>,
        query: &JsonValue,
        bounds: RelBounds,
    ) -> Result<Vec<EntityId>>;

    /// Atomically find the node indexed under (key, value) or create and index a new one
    fn unique_node(&mut self, index: &str, key: &str, value: &JsonValue) -> Result<Unique<NodeId>>;

    /// Index `candidate` under (key, value) unless another relationship already holds it
    fn unique_relationship(
        &mut self,
        index: &str,
        key: &str,
        value: &JsonValue,
        candidate: RelId,
    ) -> Result<Unique<RelId>>;
}
