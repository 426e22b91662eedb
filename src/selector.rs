//! Selector resolution
//!
//! A `Selection` is a cursor, not a collection: wildcard selections walk
//! the store's id order one step at a time and borrow the store only for
//! that step, so a handler can mutate (even delete) the current entity
//! before asking for the next one.

use crate::context::Context;
use crate::error::{GraphError, Result};
use crate::graph::{EntityId, EntityKind, GraphStore, NodeId, RelBounds, RelId};
use crate::protocol::{IndexLookup, Selector, SelectorItem};

pub struct Selection {
    source: Source,
}

enum Source {
    Fixed(std::vec::IntoIter<EntityId>),
    Scan { kind: EntityKind, after: Option<u64>, done: bool },
}

impl Selection {
    pub fn empty() -> Self {
        Self::fixed(Vec::new())
    }

    pub fn fixed(ids: Vec<EntityId>) -> Self {
        Self { source: Source::Fixed(ids.into_iter()) }
    }

    /// Every entity of `kind`, in id order
    pub fn all(kind: EntityKind) -> Self {
        Self { source: Source::Scan { kind, after: None, done: false } }
    }

    /// Advance the cursor
    pub fn next(&mut self, store: &dyn GraphStore) -> Option<EntityId> {
        match &mut self.source {
            Source::Fixed(ids) => ids.next(),
            Source::Scan { kind, after, done } => {
                if *done {
                    return None;
                }
                let next = match kind {
                    EntityKind::Node => store.next_node_after(after.map(NodeId)).map(EntityId::Node),
                    EntityKind::Relationship => {
                        store.next_relationship_after(after.map(RelId)).map(EntityId::Relationship)
                    }
                };
                match next {
                    Some(entity) => *after = Some(entity.raw()),
                    None => *done = true,
                }
                next
            }
        }
    }
}

/// Turn a selector into a selection of `kind`.
///
/// Ids and references are checked here, so an unknown id or unbound name
/// fails the command before it does anything. Index lookups are evaluated
/// eagerly by the store; only wildcard selections stay lazy.
pub fn resolve(selector: &Selector, kind: EntityKind, store: &dyn GraphStore, context: &Context) -> Result<Selection> {
    match selector {
        Selector::Empty => Ok(Selection::empty()),
        Selector::Wildcard => Ok(Selection::all(kind)),
        Selector::Id(id) => Ok(Selection::fixed(vec![existing(store, kind, *id)?])),
        Selector::Ref(name) => Ok(Selection::fixed(vec![context.entity(name, kind)?])),
        Selector::List(items) => items
            .iter()
            .map(|item| match item {
                SelectorItem::Id(id) => existing(store, kind, *id),
                SelectorItem::Ref(name) => context.entity(name, kind),
            })
            .collect::<Result<Vec<_>>>()
            .map(Selection::fixed),
        Selector::Index(lookup) => lookup_index(lookup, kind, store).map(Selection::fixed),
    }
}

fn existing(store: &dyn GraphStore, kind: EntityKind, id: u64) -> Result<EntityId> {
    let entity = EntityId::of(kind, id);
    if store.contains(entity) {
        Ok(entity)
    } else {
        Err(GraphError::not_found(entity))
    }
}

fn lookup_index(lookup: &IndexLookup, kind: EntityKind, store: &dyn GraphStore) -> Result<Vec<EntityId>> {
    for endpoint in [lookup.start, lookup.end].into_iter().flatten() {
        existing(store, EntityKind::Node, endpoint)?;
    }
    let bounds = RelBounds {
        start: lookup.start.map(NodeId),
        end: lookup.end.map(NodeId),
    };
    let index = lookup.index.as_deref();
    if let Some(query) = &lookup.query {
        return store.index_query(kind, index, query, bounds);
    }
    match &lookup.key {
        Some(key) => store.index_get(kind, index, key, lookup.value.as_ref(), bounds),
        None => Ok(Vec::new()),
    }
}
