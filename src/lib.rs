//! atquery: a compiler and evaluator for relational query expressions.
//!
//! The crate compiles at-expressions, the `source @cardinality { where }
//! ( what ) limit n offset m` query construct, into executable plans. An
//! at-expression reads either backend-resident entities (compiled into a
//! [`BackendQuery`](backend::BackendQuery) the storage layer runs) or an
//! in-memory collection (evaluated on the host), with identical observable
//! semantics.
//!
//! The pipeline is: build an [`AtExpr`] AST, compile it against a
//! [`Catalog`] and [`Scope`] into a [`Plan`], then run the plan with an
//! [`Executor`] over a [`StorageBackend`] and runtime [`Bindings`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use atquery::ast::ComparisonOp;
//! use atquery::{
//!     compile_at_expr, AtExpr, AttrDef, Bindings, Cardinality, Catalog, EntityDef,
//!     Executor, Expr, MemoryBackend, Scope, SourceItem, Type, Value, WhatItem,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut catalog = Catalog::new();
//! catalog.define_entity(EntityDef::new(
//!     "user",
//!     vec![
//!         AttrDef::new("name", Type::Text),
//!         AttrDef::new("score", Type::Integer),
//!     ],
//! ))?;
//! let catalog = Arc::new(catalog);
//!
//! let backend = MemoryBackend::new(Arc::clone(&catalog));
//! backend.insert("user", vec![Value::from("alice"), Value::from(10)])?;
//! backend.insert("user", vec![Value::from("bob"), Value::from(7)])?;
//!
//! // user @* { .score >= 10 } ( .name )
//! let query = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
//!     .filter(Expr::ImplicitAttr("score".into()).cmp(ComparisonOp::Gte, Expr::int(10)))
//!     .select(vec![WhatItem::new(Expr::ImplicitAttr("name".into()))]);
//!
//! let plan = compile_at_expr(&catalog, &Scope::new(), &query)?;
//! let bindings = Bindings::new();
//! let result = Executor::new(&backend, &bindings).execute(&plan)?;
//! assert_eq!(result, Value::List(vec![Value::from("alice")]));
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod backend;
pub mod binder;
pub mod catalog;
pub mod error;
pub mod executor;
pub mod planner;
pub mod types;

pub use ast::{
    AggregateKind, AtExpr, Cardinality, ComparisonOp, Expr, SortDirection, SourceItem, WhatItem,
};
pub use backend::{MemoryBackend, StorageBackend};
pub use binder::{compile_at_expr, Binder, FnSig, Scope};
pub use catalog::{AttrDef, Catalog, EntityDef, StructDef};
pub use error::{CompileError, CompileResult, RuntimeError, RuntimeResult};
pub use executor::{Bindings, Executor, ExecutorConfig, HostFn};
pub use planner::Plan;
pub use types::{Type, Value};

/// Runs a compiled plan with default execution guards.
///
/// # Errors
///
/// See [`Executor::execute`].
pub fn execute_at_expr(
    plan: &Plan,
    backend: &dyn StorageBackend,
    bindings: &Bindings,
) -> RuntimeResult<Value> {
    Executor::new(backend, bindings).execute(plan)
}
