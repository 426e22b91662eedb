//! Batch wire protocol
//!
//! Input is a JSON array of commands, each `[opcode, selector, payload]`
//! or `[opcode, payload]` (no selection). Everything is decoded and
//! validated once, here, into typed commands; the interpreter never
//! inspects raw JSON.
//!
//! Selector shapes:
//!   `12`                      - entity by id
//!   `"name"`                  - entity bound to a reference earlier in the batch
//!   `"*"`                     - every entity of the kind
//!   `[1, "name", 3]`          - ids and references, in order
//!   `{index, key, value}`     - exact index lookup
//!   `{index, query}`          - free-text index query
//!   `start`/`end` in the map  - endpoint filter for relationship indexes

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value as JsonValue};

use crate::error::{GraphError, Result};
use crate::graph::EntityKind;

/// Selector token matching every entity of a kind
pub const WILDCARD: &str = "*";

// ============================================================================
// Opcodes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    AddNodes,
    AddRels,
    UpdateNodes,
    UpdateRels,
    GetNodes,
    GetRels,
    DeleteNodes,
    DeleteRels,
    Cypher,
}

impl Opcode {
    pub const ALL: [Opcode; 9] = [
        Opcode::AddNodes,
        Opcode::AddRels,
        Opcode::UpdateNodes,
        Opcode::UpdateRels,
        Opcode::GetNodes,
        Opcode::GetRels,
        Opcode::DeleteNodes,
        Opcode::DeleteRels,
        Opcode::Cypher,
    ];

    /// Case-insensitive lookup
    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| GraphError::UnknownOpcode(name.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::AddNodes => "ADD_NODES",
            Opcode::AddRels => "ADD_RELS",
            Opcode::UpdateNodes => "UPDATE_NODES",
            Opcode::UpdateRels => "UPDATE_RELS",
            Opcode::GetNodes => "GET_NODES",
            Opcode::GetRels => "GET_RELS",
            Opcode::DeleteNodes => "DELETE_NODES",
            Opcode::DeleteRels => "DELETE_RELS",
            Opcode::Cypher => "CYPHER",
        }
    }

    /// Kind of entity the command's selector resolves to
    pub fn selection_kind(&self) -> EntityKind {
        match self {
            Opcode::AddRels | Opcode::UpdateRels | Opcode::GetRels | Opcode::DeleteRels => {
                EntityKind::Relationship
            }
            Opcode::AddNodes
            | Opcode::UpdateNodes
            | Opcode::GetNodes
            | Opcode::DeleteNodes
            | Opcode::Cypher => EntityKind::Node,
        }
    }

    /// Whether the opcode mutates the store
    pub fn is_write(&self) -> bool {
        !matches!(self, Opcode::GetNodes | Opcode::GetRels | Opcode::Cypher)
    }
}

// ============================================================================
// Selectors
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Structurally empty (null, missing, or any unrecognized shape)
    Empty,
    Id(u64),
    Ref(String),
    Wildcard,
    List(Vec<SelectorItem>),
    Index(IndexLookup),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorItem {
    Id(u64),
    Ref(String),
}

/// Index lookup descriptor. `start`/`end` only apply to relationship indexes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IndexLookup {
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<JsonValue>,
    #[serde(default)]
    pub query: Option<JsonValue>,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub end: Option<u64>,
}

impl Selector {
    /// Decode a selector. Unrecognized shapes select nothing; malformed
    /// ids and list elements are rejected.
    pub fn from_json(value: JsonValue) -> std::result::Result<Self, String> {
        match value {
            JsonValue::Number(n) => n
                .as_u64()
                .map(Selector::Id)
                .ok_or_else(|| format!("invalid entity id {}", n)),
            JsonValue::String(s) if s == WILDCARD => Ok(Selector::Wildcard),
            JsonValue::String(s) => Ok(Selector::Ref(s)),
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    JsonValue::Number(n) => n
                        .as_u64()
                        .map(SelectorItem::Id)
                        .ok_or_else(|| format!("invalid entity id {}", n)),
                    JsonValue::String(s) => Ok(SelectorItem::Ref(s)),
                    other => Err(format!("selector list elements must be ids or references, got {}", other)),
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Selector::List),
            JsonValue::Object(map) => serde_json::from_value(JsonValue::Object(map))
                .map(Selector::Index)
                .map_err(|e| format!("invalid index selector: {}", e)),
            JsonValue::Null | JsonValue::Bool(_) => Ok(Selector::Empty),
        }
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = JsonValue::deserialize(deserializer)?;
        Selector::from_json(raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// A single object or a list of them; single and bulk operations share one path.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Payload<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Payload<T> {
    pub fn len(&self) -> usize {
        match self {
            Payload::Many(items) => items.len(),
            Payload::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Payload::Many(items) => items.iter(),
            Payload::One(item) => std::slice::from_ref(item).iter(),
        }
    }
}

/// `{data, ref, index, unique}`: properties and index entries to apply, plus the name to bind
/// and unique key of one entity.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdateDescriptor {
    /// Null values remove the property
    #[serde(default)]
    pub data: Option<Map<String, JsonValue>>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub index: Option<Payload<IndexDescriptor>>,
    #[serde(default)]
    pub unique: Option<UniqueKey>,
}

/// `{index, key?, value?, old?}`.
///
/// `old` removes the (key, old) pairing first. Then a present `value` adds
/// (key, value); an absent or null one removes by key, or every entry of
/// the entity in the index when `key` is absent too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexDescriptor {
    pub index: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<JsonValue>,
    #[serde(default)]
    pub old: Option<JsonValue>,
}

/// Unique index key for get-or-create
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UniqueKey {
    pub index: String,
    pub key: String,
    pub value: JsonValue,
}

/// `ADD_RELS` entry: a relationship type plus start/end selectors; the
/// cross product of both selections is connected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelationshipDescriptor {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub start: Selector,
    pub end: Selector,
    #[serde(flatten)]
    pub update: UpdateDescriptor,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeleteOptions {
    /// Delete incident relationships first
    #[serde(default)]
    pub force: bool,
}

/// `CYPHER` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CypherRequest {
    pub query: String,
    #[serde(default)]
    pub params: Map<String, JsonValue>,
    /// Merge the batch context into `params` (context wins on collision)
    #[serde(default, rename = "useContext")]
    pub use_context: bool,
    /// Fold every result row into the context (last row wins)
    #[serde(default, rename = "mergeResult")]
    pub merge_result: bool,
}

// ============================================================================
// Commands
// ============================================================================

/// Typed payload of one command
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    AddNodes(Payload<UpdateDescriptor>),
    AddRels(Payload<RelationshipDescriptor>),
    /// UPDATE_NODES and UPDATE_RELS
    Update(Payload<UpdateDescriptor>),
    /// GET_NODES and GET_RELS
    Get,
    DeleteNodes(DeleteOptions),
    DeleteRels,
    Cypher(CypherRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub opcode: Opcode,
    pub selector: Selector,
    pub operation: Operation,
}

impl Command {
    /// Decode the `index`-th command of a batch
    pub fn from_json(index: usize, raw: JsonValue) -> Result<Self> {
        let invalid = |reason: String| GraphError::InvalidCommand { index, reason };

        let JsonValue::Array(mut parts) = raw else {
            return Err(invalid("command must be an array".to_string()));
        };
        if !(2..=3).contains(&parts.len()) {
            return Err(invalid(format!("expected 2 or 3 elements, got {}", parts.len())));
        }

        let payload = parts.pop().unwrap_or(JsonValue::Null);
        let selector = if parts.len() == 2 {
            Selector::from_json(parts.pop().unwrap_or(JsonValue::Null)).map_err(invalid)?
        } else {
            Selector::Empty
        };
        let opcode = match parts.pop() {
            Some(JsonValue::String(name)) => Opcode::parse(&name)?,
            _ => return Err(invalid("opcode must be a string".to_string())),
        };

        let operation = match opcode {
            Opcode::AddNodes => Operation::AddNodes(decode(payload).map_err(invalid)?),
            Opcode::AddRels => Operation::AddRels(decode(payload).map_err(invalid)?),
            Opcode::UpdateNodes | Opcode::UpdateRels => Operation::Update(decode(payload).map_err(invalid)?),
            Opcode::GetNodes | Opcode::GetRels => Operation::Get,
            Opcode::DeleteNodes => Operation::DeleteNodes(if payload.is_null() {
                DeleteOptions::default()
            } else {
                decode(payload).map_err(invalid)?
            }),
            Opcode::DeleteRels => Operation::DeleteRels,
            Opcode::Cypher => Operation::Cypher(decode(payload).map_err(invalid)?),
        };

        Ok(Command { opcode, selector, operation })
    }
}

fn decode<T: serde::de::DeserializeOwned>(payload: JsonValue) -> std::result::Result<T, String> {
    serde_json::from_value(payload).map_err(|e| e.to_string())
}

/// Ordered commands submitted in one round trip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    /// Decode a JSON array of commands
    pub fn from_json(raw: JsonValue) -> Result<Self> {
        let JsonValue::Array(items) = raw else {
            return Err(GraphError::InvalidCommand {
                index: 0,
                reason: "batch must be a JSON array".to_string(),
            });
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| Command::from_json(i, item))
            .collect::<Result<Vec<_>>>()
            .map(Batch::new)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_json(serde_json::from_slice(bytes)?)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Whether any command mutates the store
    pub fn has_writes(&self) -> bool {
        self.commands.iter().any(|c| c.opcode.is_write())
    }
}

impl IntoIterator for Batch {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}
