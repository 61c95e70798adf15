//! Storage backend interface.
//!
//! Entity-sourced at-expressions compile into a [`BackendQuery`], a small
//! relational expression tree the storage layer executes on its own. The
//! crate ships one implementation, [`MemoryBackend`], which embedders can
//! replace with a real database adapter.

mod memory;
pub(crate) mod translate;

pub use memory::MemoryBackend;

use std::collections::HashMap;

use crate::ast::{ArithmeticOp, ComparisonOp, LogicalOp};
use crate::error::RuntimeResult;
use crate::types::Value;

/// Expression language understood by storage backends.
///
/// Deliberately smaller than [`BoundExpression`](crate::binder::BoundExpression):
/// no host calls, no subqueries, no references to enclosing at-expressions.
/// The planner rejects anything that does not fit.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendExpr {
    /// Constant.
    Literal(Value),
    /// Named runtime parameter, supplied through [`QueryContext::params`].
    Param(String),
    /// The current row reference of a queried entity.
    SourceRef { source: usize },
    /// Attribute of a queried entity's current row, possibly through
    /// reference attributes.
    Attr { source: usize, path: Vec<String> },
    Comparison {
        left: Box<BackendExpr>,
        op: ComparisonOp,
        right: Box<BackendExpr>,
    },
    Arithmetic {
        left: Box<BackendExpr>,
        op: ArithmeticOp,
        right: Box<BackendExpr>,
    },
    Logical {
        op: LogicalOp,
        operands: Vec<BackendExpr>,
    },
}

/// One output column of a backend query.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendField {
    pub expr: BackendExpr,
}

/// A complete query over entity sources.
///
/// Evaluation is the cross product of `entities` in order, filtered by the
/// conjunction of `filter`, producing one value per field per surviving row.
/// Summarization, sorting and result shaping stay on the host side.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendQuery {
    /// `(alias, entity name)` pairs in declaration order.
    pub entities: Vec<(String, String)>,
    /// Filter conjuncts; an empty list keeps every row.
    pub filter: Vec<BackendExpr>,
    /// Output columns in declaration order.
    pub fields: Vec<BackendField>,
}

/// Per-execution inputs to a backend query.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// Values for [`BackendExpr::Param`] references.
    pub params: HashMap<String, Value>,
    /// Row window the backend may apply, when the host determined that
    /// truncation before summarization and sorting is sound.
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Executes backend queries and resolves entity references.
pub trait StorageBackend {
    /// Runs a query, returning one value row per surviving source row.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeError`](crate::error::RuntimeError) when the query
    /// cannot be evaluated, a parameter is missing, or storage fails.
    fn execute(&self, query: &BackendQuery, ctx: &QueryContext) -> RuntimeResult<Vec<Vec<Value>>>;

    /// Reads one attribute of a stored entity row, used to dereference
    /// [`Value::Ref`] on the host side.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeError`](crate::error::RuntimeError) when the row or
    /// attribute does not exist.
    fn fetch_attr(&self, entity: &str, row: u64, attr: &str) -> RuntimeResult<Value>;
}
