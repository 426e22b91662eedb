//! Batch-scoped reference table
//!
//! Names bound by `ref` (entity handles) or folded in by `mergeResult`
//! (arbitrary values). Lives exactly as long as one batch.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::graph::{EntityId, EntityKind, GraphStore};
use crate::value::{Params, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Entity(EntityId),
    Value(Value),
}

#[derive(Debug, Default)]
pub struct Context {
    bindings: HashMap<String, Binding>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to an entity; last write wins
    pub fn bind_entity(&mut self, name: &str, entity: EntityId) {
        self.bindings.insert(name.to_string(), Binding::Entity(entity));
    }

    /// Bind `name` to a value. Node and relationship values are stored as
    /// handles so later selectors see the live entity.
    pub fn bind_value(&mut self, name: &str, value: Value) {
        let binding = match value.entity() {
            Some(entity) => Binding::Entity(entity),
            None => Binding::Value(value),
        };
        self.bindings.insert(name.to_string(), binding);
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Entity bound to `name`, which must be of `kind`
    pub fn entity(&self, name: &str, kind: EntityKind) -> Result<EntityId> {
        match self.bindings.get(name) {
            Some(Binding::Entity(entity)) if entity.kind() == kind => Ok(*entity),
            Some(_) => Err(GraphError::ReferenceKind { name: name.to_string(), expected: kind.as_str() }),
            None => Err(GraphError::UnboundReference(name.to_string())),
        }
    }

    /// Snapshot every binding as a query parameter. Entities deleted since
    /// they were bound are left out rather than failing the query.
    pub fn to_params(&self, store: &dyn GraphStore) -> Result<Params> {
        let mut params = Params::with_capacity(self.bindings.len());
        for (name, binding) in &self.bindings {
            let value = match binding {
                Binding::Entity(entity) if !store.contains(*entity) => {
                    tracing::debug!(name = %name, entity = ?entity, "Skipping binding to deleted entity");
                    continue;
                }
                Binding::Entity(EntityId::Node(id)) => Value::Node(store.node(*id)?),
                Binding::Entity(EntityId::Relationship(id)) => Value::Relationship(store.relationship(*id)?),
                Binding::Value(value) => value.clone(),
            };
            params.insert(name.clone(), value);
        }
        Ok(params)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
