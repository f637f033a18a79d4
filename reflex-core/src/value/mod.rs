//! Dynamic Values
//!
//! Reactive data is dynamically shaped: any property of any object may hold
//! any kind of value, and objects nest. [`Value`] is that shape.
//!
//! # Equality
//!
//! [`Value::strict_eq`] decides whether a write changed anything. Primitives
//! compare by value and objects by identity, so replacing an object with a
//! structurally identical copy still counts as a change. Integers and floats
//! are one number space (`1 == 1.0`), and NaN never equals itself.

mod object;

use std::collections::HashSet;

pub use object::{Accessor, Object, ObjectId, Receiver};
pub(crate) use object::WeakObject;

use crate::error::{ReflexError, Result};
use crate::reactive::Reactive;

/// Any value that can be stored in an object property.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absence of a value. Also what missing properties read as.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
    /// A plain, untracked object.
    Object(Object),
    /// A tracked handle over an object.
    Reactive(Reactive),
}

impl Value {
    /// Short name of this value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Reactive(_) => "reactive",
        }
    }

    /// Whether this value is an object or a handle over one.
    ///
    /// Only object-like values are ever wrapped.
    pub fn is_object_like(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    /// Whether this value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// JavaScript-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Reactive(_) => true,
        }
    }

    /// Strict equality: primitives by value, objects by identity.
    ///
    /// A handle and the object it wraps are distinct values.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The number as a float, for both integers and floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The handle, if this is one.
    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(handle) => Some(handle),
            _ => None,
        }
    }

    /// The underlying object, looking through handles.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            Value::Reactive(handle) => Some(handle.raw()),
            _ => None,
        }
    }

    /// Replace a handle with the object it wraps. Other values are unchanged.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Reactive(handle) => Value::Object(handle.raw().clone()),
            other => other,
        }
    }

    /// Convert from JSON. Arrays become objects keyed by index.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), Value::from_json(item)))
                    .collect(),
            ),
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Value::from_json(item)))
                    .collect(),
            ),
        }
    }

    /// Snapshot as JSON.
    ///
    /// Handles are read through their raw object, so taking a snapshot inside
    /// an effect records no dependencies. Accessors are evaluated.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.to_json_inner(&mut HashSet::new())
    }

    fn to_json_inner(&self, ancestors: &mut HashSet<ObjectId>) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or(ReflexError::NonFiniteNumber(*f))?,
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Object(_) | Value::Reactive(_) => {
                let object = self.as_object().cloned().unwrap_or_default();
                if !ancestors.insert(object.id()) {
                    return Err(ReflexError::Cyclic(object.id()));
                }
                let mut map = serde_json::Map::new();
                for key in object.keys() {
                    let item = object.get(&key).to_json_inner(ancestors)?;
                    map.insert(key, item);
                }
                ancestors.remove(&object.id());
                serde_json::Value::Object(map)
            }
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Reactive> for Value {
    fn from(handle: Reactive) -> Self {
        Value::Reactive(handle)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl TryFrom<Value> for bool {
    type Error = ReflexError;

    fn try_from(value: Value) -> Result<Self> {
        value.as_bool().ok_or(ReflexError::TypeMismatch {
            expected: "bool",
            found: value.kind(),
        })
    }
}

impl TryFrom<Value> for i64 {
    type Error = ReflexError;

    fn try_from(value: Value) -> Result<Self> {
        value.as_int().ok_or(ReflexError::TypeMismatch {
            expected: "int",
            found: value.kind(),
        })
    }
}

impl TryFrom<Value> for f64 {
    type Error = ReflexError;

    fn try_from(value: Value) -> Result<Self> {
        value.as_float().ok_or(ReflexError::TypeMismatch {
            expected: "float",
            found: value.kind(),
        })
    }
}

impl TryFrom<Value> for String {
    type Error = ReflexError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(ReflexError::TypeMismatch {
                expected: "string",
                found: other.kind(),
            }),
        }
    }
}

impl TryFrom<Value> for Object {
    type Error = ReflexError;

    fn try_from(value: Value) -> Result<Self> {
        match value.into_raw() {
            Value::Object(object) => Ok(object),
            other => Err(ReflexError::NotAnObject(other.kind())),
        }
    }
}
