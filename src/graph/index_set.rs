//! In-memory secondary indexes for `MemoryGraph`.
//!
//! Not persisted. Values are keyed by a canonical string form: strings
//! index as their raw text, every other JSON value as its JSON encoding,
//! so `"42"` and `42` land on the same entry.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value as JsonValue;

use super::EntityKind;
use crate::error::{GraphError, Result};

/// key → value key → entity ids
type Entries = HashMap<String, BTreeMap<String, BTreeSet<u64>>>;

/// One index entry, as recorded for undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub kind: EntityKind,
    pub index: String,
    pub key: String,
    pub value: String,
    pub id: u64,
}

/// Named exact-match indexes, separated per entity kind.
#[derive(Default)]
pub struct IndexSet {
    indexes: HashMap<(EntityKind, String), Entries>,
}

/// Canonical index form of a JSON value
pub fn value_key(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (key, value) → id. Returns the entry if it was not present yet.
    pub fn add(&mut self, kind: EntityKind, index: &str, key: &str, value: &JsonValue, id: u64) -> Option<IndexEntry> {
        let entry = IndexEntry {
            kind,
            index: index.to_string(),
            key: key.to_string(),
            value: value_key(value),
            id,
        };
        self.insert(&entry).then_some(entry)
    }

    /// Re-insert an entry verbatim (undo path).
    pub fn insert(&mut self, entry: &IndexEntry) -> bool {
        self.indexes
            .entry((entry.kind, entry.index.clone()))
            .or_default()
            .entry(entry.key.clone())
            .or_default()
            .entry(entry.value.clone())
            .or_default()
            .insert(entry.id)
    }

    /// Remove one entry verbatim. Returns whether it existed.
    pub fn remove(&mut self, entry: &IndexEntry) -> bool {
        let Some(entries) = self.indexes.get_mut(&(entry.kind, entry.index.clone())) else {
            return false;
        };
        let Some(values) = entries.get_mut(&entry.key) else {
            return false;
        };
        let Some(ids) = values.get_mut(&entry.value) else {
            return false;
        };
        let removed = ids.remove(&entry.id);
        if ids.is_empty() {
            values.remove(&entry.value);
        }
        if values.is_empty() {
            entries.remove(&entry.key);
        }
        removed
    }

    /// Remove the entries of `id` in one index, narrowed by key and value.
    /// Returns what was removed.
    pub fn remove_matching(
        &mut self,
        kind: EntityKind,
        index: &str,
        key: Option<&str>,
        value: Option<&JsonValue>,
        id: u64,
    ) -> Vec<IndexEntry> {
        let wanted = value.map(value_key);
        let doomed: Vec<IndexEntry> = self
            .entries_of(kind, index, id)
            .into_iter()
            .filter(|e| key.map_or(true, |k| e.key == k))
            .filter(|e| wanted.as_ref().map_or(true, |v| &e.value == v))
            .collect();
        for entry in &doomed {
            self.remove(entry);
        }
        doomed
    }

    /// Remove `id` from every index of `kind` (entity deletion).
    pub fn purge(&mut self, kind: EntityKind, id: u64) -> Vec<IndexEntry> {
        let names: Vec<String> = self
            .indexes
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.clone())
            .collect();
        names
            .iter()
            .flat_map(|name| self.remove_matching(kind, name, None, None, id))
            .collect()
    }

    /// Exact lookup. `value = None` matches every value under `key`.
    pub fn get(&self, kind: EntityKind, index: &str, key: &str, value: Option<&JsonValue>) -> Vec<u64> {
        let Some(values) = self.indexes.get(&(kind, index.to_string())).and_then(|e| e.get(key)) else {
            return Vec::new();
        };
        let ids: BTreeSet<u64> = match value {
            Some(v) => values.get(&value_key(v)).cloned().unwrap_or_default(),
            None => values.values().flatten().copied().collect(),
        };
        ids.into_iter().collect()
    }

    /// Lowest id holding (key, value), if any.
    pub fn first(&self, kind: EntityKind, index: &str, key: &str, value: &JsonValue) -> Option<u64> {
        self.indexes
            .get(&(kind, index.to_string()))
            .and_then(|e| e.get(key))
            .and_then(|values| values.get(&value_key(value)))
            .and_then(|ids| ids.iter().next().copied())
    }

    /// Free-text lookup: `key:pattern` where pattern is an exact value,
    /// `prefix*` or `*`. A key of `*` searches every key.
    pub fn query(&self, kind: EntityKind, index: &str, query: &str) -> Result<Vec<u64>> {
        let (key, pattern) = query
            .split_once(':')
            .ok_or_else(|| GraphError::Index(format!("Query '{}' is not of the form key:value", query)))?;
        let Some(entries) = self.indexes.get(&(kind, index.to_string())) else {
            return Ok(Vec::new());
        };

        let mut ids = BTreeSet::new();
        for (entry_key, values) in entries {
            if key != "*" && entry_key != key {
                continue;
            }
            for (value, holders) in values {
                if pattern_matches(pattern, value) {
                    ids.extend(holders.iter().copied());
                }
            }
        }
        Ok(ids.into_iter().collect())
    }

    fn entries_of(&self, kind: EntityKind, index: &str, id: u64) -> Vec<IndexEntry> {
        let Some(entries) = self.indexes.get(&(kind, index.to_string())) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for (key, values) in entries {
            for (value, ids) in values {
                if ids.contains(&id) {
                    found.push(IndexEntry {
                        kind,
                        index: index.to_string(),
                        key: key.clone(),
                        value: value.clone(),
                        id,
                    });
                }
            }
        }
        found
    }
}

fn pattern_matches(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}
