//! Payload values stored in the sandbox heap
//!
//! This module defines the [`Value`] enum, the payload type of the heap the
//! sandbox runs on. Scalars cover the snippets' primitive examples; objects
//! carry an [`Instance`] whose dynamic class drives method dispatch.
//!
//! [`ValueKind`] is the static type of a value. Overload resolution compares
//! argument kinds against parameter kinds, never the dynamic class of an
//! object argument: a [`Value::Ref`] carries the class it is viewed as, and
//! that view is its kind.

use super::handle::{HandleId, NodeId};
use crate::dispatch::instance::Instance;
use std::fmt;

/// Runtime values in the sandbox
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Unit,
    Int(i32),
    Float(f32),
    Bool(bool),
    Char(char),
    Text(String),
    Object(Instance),
    Ref(ObjectRef),
}

/// A non-owning reference to an object on the heap, seen through a view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub handle: HandleId,
    pub node: NodeId,
    /// Static class of the reference
    pub view: String,
}

/// Static type of a [`Value`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Unit,
    Int,
    Float,
    Bool,
    Char,
    Text,
    Object(String),
}

impl ValueKind {
    /// Parameter kind for an object of `class` (or a class derived from it)
    pub fn object(class: impl Into<String>) -> Self {
        ValueKind::Object(class.into())
    }

    pub fn as_class(&self) -> Option<&str> {
        match self {
            ValueKind::Object(class) => Some(class),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Unit => "void",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Char => "char",
            ValueKind::Text => "string",
            ValueKind::Object(class) => class,
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unit => ValueKind::Unit,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Char(_) => ValueKind::Char,
            Value::Text(_) => ValueKind::Text,
            Value::Object(instance) => ValueKind::Object(instance.class().to_string()),
            Value::Ref(reference) => ValueKind::Object(reference.view.clone()),
        }
    }

    /// Get the integer value, returns None if not an Int
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the float value, returns None if not a Float
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_object_ref(&self) -> Option<&ObjectRef> {
        match self {
            Value::Ref(reference) => Some(reference),
            _ => None,
        }
    }

    /// Check if this value is an object
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::Text(s) => write!(f, "\"{}\"", s),
            Value::Object(instance) => write!(f, "<{}>", instance.class()),
            Value::Ref(reference) => write!(f, "&{} {}", reference.view, reference.handle),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// Render a list of argument kinds as `int, float`
pub fn describe_kinds(args: &[Value]) -> String {
    args.iter()
        .map(|arg| arg.kind().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
