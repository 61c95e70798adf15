//! Runtime value container.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

/// Runtime value produced by evaluating an expression or decoding a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer value.
    Int(i64),
    /// Decimal value.
    Decimal(f64),
    /// Boolean value.
    Bool(bool),
    /// String value.
    Text(String),
    /// Reference to a row of a backend-resident entity.
    Ref {
        entity: String,
        row: u64,
    },
    /// Struct instance with fields in declaration order.
    Struct {
        name: String,
        fields: Vec<(String, Value)>,
    },
    /// Positional tuple.
    Tuple(Vec<Value>),
    /// List of values.
    List(Vec<Value>),
    /// Null value.
    Null,
}

impl Eq for Value {}

// Manual Hash because f64 does not implement it; decimals hash by bit
// pattern, consistent with PartialEq for non-NaN values.
impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Int(v) => v.hash(state),
            Value::Decimal(v) => v.to_bits().hash(state),
            Value::Bool(v) => v.hash(state),
            Value::Text(v) => v.hash(state),
            Value::Ref { entity, row } => {
                entity.hash(state);
                row.hash(state);
            }
            Value::Struct { name, fields } => {
                name.hash(state);
                fields.hash(state);
            }
            Value::Tuple(items) | Value::List(items) => items.hash(state),
            Value::Null => {}
        }
    }
}

impl Value {
    /// Returns the boolean content, or an error for non-boolean values.
    pub fn as_bool(&self) -> RuntimeResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(RuntimeError::InvalidValue(format!(
                "expected boolean, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Returns the integer content, or an error for non-integer values.
    pub fn as_int(&self) -> RuntimeResult<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(RuntimeError::InvalidValue(format!(
                "expected integer, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Short value-kind name for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Bool(_) => "boolean",
            Value::Text(_) => "text",
            Value::Ref { .. } => "entity",
            Value::Struct { .. } => "struct",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Null => "null",
        }
    }

    /// Looks up a struct field by name.
    #[must_use]
    pub fn struct_field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct { fields, .. } => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Total order between two values of the same kind.
    ///
    /// Nulls sort first; decimals use IEEE total ordering so sorting never
    /// panics on NaN.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Decimal(b)) => (*a as f64).total_cmp(b),
            (Value::Decimal(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (
                Value::Ref { entity: ea, row: ra },
                Value::Ref { entity: eb, row: rb },
            ) => ea.cmp(eb).then(ra.cmp(rb)),
            (Value::Tuple(a), Value::Tuple(b)) | (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            // Mixed kinds only happen on malformed data; order by kind name
            // to stay total.
            (a, b) => a.kind_name().cmp(b.kind_name()),
        }
    }

    /// Adds two numeric values, used by `@sum`.
    pub fn add(&self, other: &Value) -> RuntimeResult<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::InvalidValue("integer overflow".to_string())),
            (Value::Decimal(a), Value::Decimal(b)) => Ok(Value::Decimal(a + b)),
            (Value::Int(a), Value::Decimal(b)) => Ok(Value::Decimal(*a as f64 + b)),
            (Value::Decimal(a), Value::Int(b)) => Ok(Value::Decimal(a + *b as f64)),
            (a, b) => Err(RuntimeError::InvalidValue(format!(
                "cannot add {} and {}",
                a.kind_name(),
                b.kind_name()
            ))),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Decimal(v)
    }
}
