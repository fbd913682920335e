//! The node model yielded by the tokenizer.
//!
//! A [`NodeKind`] plus an optional decoded [`Value`] is the unit every layer
//! of the reader chain forwards, buffers, or replaces. Nodes are immutable
//! once produced.

/// The kind of the node the reader is currently positioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// No node has been read yet.
    None,
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    /// A property name inside an object. The name is exposed as the node's
    /// string value.
    Property,
    /// A primitive value: string, number, boolean or null.
    PrimitiveValue,
    EndOfInput,
}

/// A decoded JSON number.
///
/// Decimal literals of arbitrary length are preserved losslessly as their
/// lexeme unless the reader was configured for IEEE-754 narrow decoding, in
/// which case every non-integer number becomes a `Double`.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    /// An integer that fits `i64`.
    Int(i64),
    /// An IEEE-754 double, produced only under narrow decoding.
    Double(f64),
    /// The verbatim lexeme of a decimal that must not lose precision.
    Decimal(String),
}

impl Number {
    /// The numeric value as `f64`, lossy for long decimals.
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Double(d) => *d,
            Number::Decimal(s) => s.parse().unwrap_or(f64::NAN),
        }
    }
}

/// A decoded primitive value or property name.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }
}

/// A node captured by the lookahead and reordering layers for later replay.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedNode {
    pub kind: NodeKind,
    pub value: Option<Value>,
}

impl BufferedNode {
    pub(crate) fn new(kind: NodeKind, value: Option<Value>) -> Self {
        Self { kind, value }
    }

    /// The property name, when this is a `Property` node.
    pub(crate) fn name(&self) -> Option<&str> {
        if self.kind == NodeKind::Property {
            self.value.as_ref().and_then(Value::as_str)
        } else {
            None
        }
    }
}
