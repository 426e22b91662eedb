//! Incremental JSON generator
//!
//! serde_json serializes whole values; the result writer needs to open an
//! array, emit a million rows into it and close it later. `JsonGenerator`
//! drives serde_json's `Formatter` by hand and tracks container nesting, so
//! whitespace (compact or pretty) stays independent of what is written.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use serde_json::Value as JsonValue;

use crate::error::{GraphError, Result};

enum Layout {
    Compact(CompactFormatter),
    Pretty(PrettyFormatter<'static>),
}

macro_rules! delegate {
    ($($name:ident($($arg:ident: $ty:ty),*);)*) => {
        impl Layout {
            $(
                fn $name<W: ?Sized + Write>(&mut self, out: &mut W $(, $arg: $ty)*) -> io::Result<()> {
                    match self {
                        Layout::Compact(f) => f.$name(out $(, $arg)*),
                        Layout::Pretty(f) => f.$name(out $(, $arg)*),
                    }
                }
            )*
        }
    };
}

delegate! {
    begin_array();
    end_array();
    begin_array_value(first: bool);
    end_array_value();
    begin_object();
    end_object();
    begin_object_key(first: bool);
    end_object_key();
    begin_object_value();
    end_object_value();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Array,
    Object,
}

#[derive(Debug)]
struct Frame {
    container: Container,
    first: bool,
}

pub struct JsonGenerator<W: Write> {
    out: W,
    layout: Layout,
    stack: Vec<Frame>,
}

impl<W: Write> JsonGenerator<W> {
    pub fn new(out: W, pretty: bool) -> Self {
        let layout = if pretty {
            Layout::Pretty(PrettyFormatter::new())
        } else {
            Layout::Compact(CompactFormatter)
        };
        Self { out, layout, stack: Vec::new() }
    }

    /// Open containers
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn begin_array(&mut self) -> Result<()> {
        self.before_value()?;
        self.layout.begin_array(&mut self.out)?;
        self.stack.push(Frame { container: Container::Array, first: true });
        Ok(())
    }

    pub fn end_array(&mut self) -> Result<()> {
        self.close(Container::Array)?;
        self.layout.end_array(&mut self.out)?;
        self.after_value()
    }

    pub fn begin_object(&mut self) -> Result<()> {
        self.before_value()?;
        self.layout.begin_object(&mut self.out)?;
        self.stack.push(Frame { container: Container::Object, first: true });
        Ok(())
    }

    pub fn end_object(&mut self) -> Result<()> {
        self.close(Container::Object)?;
        self.layout.end_object(&mut self.out)?;
        self.after_value()
    }

    /// Close whatever container is innermost
    pub fn end_container(&mut self) -> Result<()> {
        match self.stack.last().map(|f| f.container) {
            Some(Container::Array) => self.end_array(),
            Some(Container::Object) => self.end_object(),
            None => Err(misuse("no open container")),
        }
    }

    /// Field name; the next call writes its value
    pub fn key(&mut self, name: &str) -> Result<()> {
        let first = match self.stack.last_mut() {
            Some(frame) if frame.container == Container::Object => std::mem::replace(&mut frame.first, false),
            _ => return Err(misuse("field name outside of an object")),
        };
        self.layout.begin_object_key(&mut self.out, first)?;
        serde_json::to_writer(&mut self.out, name)?;
        self.layout.end_object_key(&mut self.out)?;
        self.layout.begin_object_value(&mut self.out)?;
        Ok(())
    }

    /// Any serializable scalar, written as one token
    pub fn scalar<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.before_value()?;
        serde_json::to_writer(&mut self.out, value)?;
        self.after_value()
    }

    pub fn null(&mut self) -> Result<()> {
        self.scalar(&())
    }

    /// A JSON tree, walked so nested containers follow the layout
    pub fn json(&mut self, value: &JsonValue) -> Result<()> {
        match value {
            JsonValue::Array(items) => {
                self.begin_array()?;
                for item in items {
                    self.json(item)?;
                }
                self.end_array()
            }
            JsonValue::Object(map) => {
                self.begin_object()?;
                for (k, v) in map {
                    self.key(k)?;
                    self.json(v)?;
                }
                self.end_object()
            }
            scalar => self.scalar(scalar),
        }
    }

    /// Shorthand for `key` followed by a scalar
    pub fn field<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        self.key(name)?;
        self.scalar(value)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn before_value(&mut self) -> Result<()> {
        if let Some(frame) = self.stack.last_mut() {
            if frame.container == Container::Array {
                let first = std::mem::replace(&mut frame.first, false);
                self.layout.begin_array_value(&mut self.out, first)?;
            }
        }
        Ok(())
    }

    fn after_value(&mut self) -> Result<()> {
        match self.stack.last().map(|f| f.container) {
            Some(Container::Array) => self.layout.end_array_value(&mut self.out)?,
            Some(Container::Object) => self.layout.end_object_value(&mut self.out)?,
            None => {}
        }
        Ok(())
    }

    fn close(&mut self, container: Container) -> Result<()> {
        match self.stack.pop() {
            Some(frame) if frame.container == container => Ok(()),
            _ => Err(misuse("unbalanced container")),
        }
    }
}

fn misuse(what: &str) -> GraphError {
    GraphError::Io(io::Error::new(io::ErrorKind::InvalidInput, format!("JSON generator: {}", what)))
}
