//! Incremental reader for tabular results
//!
//! Parses a `{"columns", "rows"|"data", "count", "time"}` object straight
//! off a byte stream and reports it cell by cell to a `ResultCallback`.
//! Rows are never collected, so a client can consume a million-row result
//! in constant memory.

use std::fmt;
use std::io::Read;

use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Value as JsonValue;

use crate::error::Result;

/// Receives a result as it is parsed. Every method defaults to a no-op.
pub trait ResultCallback {
    fn columns(&mut self, _columns: &[String]) {}

    /// Start of row `index` (0-based)
    fn row(&mut self, _index: u64) {}

    /// One cell. `type_name` is the compact-mode tag, or the JSON kind of the
    /// value for untagged (compat) rows.
    fn cell(&mut self, _column: usize, _type_name: &str, _value: JsonValue) {}

    fn count(&mut self, _count: u64) {}

    fn time(&mut self, _millis: u64) {}
}

/// Read one tabular result from `reader`
pub fn read_results<R: Read, C: ResultCallback>(reader: R, callback: &mut C) -> Result<()> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    ResultSeed { callback }.deserialize(&mut de)?;
    de.end()?;
    Ok(())
}

/// Tag for an untagged cell
fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "Null",
        JsonValue::Bool(_) => "Boolean",
        JsonValue::Number(n) if n.is_f64() => "Double",
        JsonValue::Number(_) => "Long",
        JsonValue::String(_) => "String",
        JsonValue::Array(_) => "Array",
        JsonValue::Object(_) => "Map",
    }
}

// ── Seeds ──────────────────────────────────────────────────────────

struct ResultSeed<'c, C> {
    callback: &'c mut C,
}

impl<'de, C: ResultCallback> DeserializeSeed<'de> for ResultSeed<'_, C> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, C: ResultCallback> Visitor<'de> for ResultSeed<'_, C> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a query result object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        let callback = self.callback;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "columns" => {
                    let columns: Vec<String> = map.next_value()?;
                    callback.columns(&columns);
                }
                "rows" | "data" => map.next_value_seed(RowsSeed {
                    callback: &mut *callback,
                    tagged: key == "rows",
                })?,
                "count" => callback.count(map.next_value()?),
                "time" => callback.time(map.next_value()?),
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(())
    }
}

struct RowsSeed<'c, C> {
    callback: &'c mut C,
    tagged: bool,
}

impl<'de, C: ResultCallback> DeserializeSeed<'de> for RowsSeed<'_, C> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, C: ResultCallback> Visitor<'de> for RowsSeed<'_, C> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of rows")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        let mut index = 0;
        loop {
            let row = RowSeed { callback: &mut *self.callback, index, tagged: self.tagged };
            if seq.next_element_seed(row)?.is_none() {
                return Ok(());
            }
            index += 1;
        }
    }
}

struct RowSeed<'c, C> {
    callback: &'c mut C,
    index: u64,
    tagged: bool,
}

impl<'de, C: ResultCallback> DeserializeSeed<'de> for RowSeed<'_, C> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        self.callback.row(self.index);
        deserializer.deserialize_seq(self)
    }
}

impl<'de, C: ResultCallback> Visitor<'de> for RowSeed<'_, C> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a row array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        let mut column = 0;
        loop {
            let found = if self.tagged {
                seq.next_element_seed(TaggedCell { callback: &mut *self.callback, column })?
            } else {
                seq.next_element::<JsonValue>()?.map(|value| {
                    self.callback.cell(column, json_type(&value), value);
                })
            };
            if found.is_none() {
                return Ok(());
            }
            column += 1;
        }
    }
}

/// `{"<Type>": value}`
struct TaggedCell<'c, C> {
    callback: &'c mut C,
    column: usize,
}

impl<'de, C: ResultCallback> DeserializeSeed<'de> for TaggedCell<'_, C> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, C: ResultCallback> Visitor<'de> for TaggedCell<'_, C> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a single-entry {type: value} cell")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        let Some(type_name) = map.next_key::<String>()? else {
            return Err(serde::de::Error::invalid_length(0, &self));
        };
        let value: JsonValue = map.next_value()?;
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        self.callback.cell(self.column, &type_name, value);
        Ok(())
    }
}
