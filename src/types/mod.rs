//! Type and value definitions for atquery.

mod value;

pub use value::Value;

use serde::{Deserialize, Serialize};

/// Static type of an expression, attribute or result.
///
/// Entities and structs are referenced by name; the schemas themselves live
/// in the [`Catalog`](crate::catalog::Catalog).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point decimal.
    Decimal,
    /// Boolean.
    Boolean,
    /// UTF-8 string.
    Text,
    /// Reference to a persistent entity.
    Entity(String),
    /// In-memory struct value.
    Struct(String),
    /// Positional tuple, fields optionally named.
    Tuple(Vec<(Option<String>, Type)>),
    /// Homogeneous list.
    List(Box<Type>),
    /// Nullable wrapper, produced by the `@?` cardinality.
    Nullable(Box<Type>),
}

impl Type {
    /// Returns whether a value of type `from` is acceptable where `self` is
    /// expected.
    ///
    /// Equal types are always assignable; integers promote to decimal and
    /// any type promotes into its nullable wrapper.
    #[must_use]
    pub fn is_assignable_from(&self, from: &Type) -> bool {
        if self == from {
            return true;
        }
        match self {
            Type::Decimal => *from == Type::Integer,
            Type::Nullable(inner) => inner.is_assignable_from(from),
            _ => false,
        }
    }

    /// Returns whether values of this type have a total order.
    #[must_use]
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            Type::Integer | Type::Decimal | Type::Boolean | Type::Text
        )
    }

    /// Returns whether values of this type can be added up by `@sum`.
    #[must_use]
    pub fn is_summable(&self) -> bool {
        matches!(self, Type::Integer | Type::Decimal)
    }

    /// Returns whether values of this type can serve as a group key.
    ///
    /// Composite and collection types are rejected; scalar values and entity
    /// references have stable equality.
    #[must_use]
    pub fn is_groupable(&self) -> bool {
        matches!(
            self,
            Type::Integer | Type::Decimal | Type::Boolean | Type::Text | Type::Entity(_)
        )
    }

    /// Returns whether this type has a representation in the storage
    /// backend's query language.
    #[must_use]
    pub fn is_backend_scalar(&self) -> bool {
        matches!(
            self,
            Type::Integer | Type::Decimal | Type::Boolean | Type::Text | Type::Entity(_)
        )
    }

    /// The zero value for `@sum` over an empty set, if any.
    #[must_use]
    pub fn sum_zero(&self) -> Option<Value> {
        match self {
            Type::Integer => Some(Value::Int(0)),
            Type::Decimal => Some(Value::Decimal(0.0)),
            _ => None,
        }
    }

    /// Wraps this type in a list.
    #[must_use]
    pub fn list_of(self) -> Type {
        Type::List(Box::new(self))
    }

    /// Wraps this type in a nullable, unless it already is one.
    #[must_use]
    pub fn nullable(self) -> Type {
        match self {
            Type::Nullable(_) => self,
            other => Type::Nullable(Box::new(other)),
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Integer => write!(f, "integer"),
            Type::Decimal => write!(f, "decimal"),
            Type::Boolean => write!(f, "boolean"),
            Type::Text => write!(f, "text"),
            Type::Entity(name) => write!(f, "{name}"),
            Type::Struct(name) => write!(f, "{name}"),
            Type::Tuple(fields) => {
                write!(f, "(")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    match name {
                        Some(n) => write!(f, "{n}:{ty}")?,
                        None => write!(f, "{ty}")?,
                    }
                }
                write!(f, ")")
            }
            Type::List(elem) => write!(f, "list<{elem}>"),
            Type::Nullable(inner) => write!(f, "{inner}?"),
        }
    }
}
