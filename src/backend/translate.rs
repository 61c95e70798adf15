//! Translation of bound expressions into the backend expression language.
//!
//! Entity-sourced at-expressions must translate completely; any construct
//! outside the backend language is a compile error, never a silent fall
//! back to host evaluation.

use crate::backend::BackendExpr;
use crate::binder::BoundExpression;
use crate::error::{CompileError, CompileResult};

/// Translates one bound expression of the at-expression `at_id`.
///
/// # Errors
///
/// [`CompileError::CallNotSql`] for host function calls,
/// [`CompileError::NotSqlCompatible`] for subqueries, references to
/// enclosing at-expressions, collection literals, member reads of
/// non-source values, and locals of non-scalar type.
pub(crate) fn translate(expr: &BoundExpression, at_id: usize) -> CompileResult<BackendExpr> {
    match expr {
        BoundExpression::Literal { value, .. } => Ok(BackendExpr::Literal(value.clone())),
        BoundExpression::Local { name, ty } => {
            if ty.is_backend_scalar() {
                Ok(BackendExpr::Param(name.clone()))
            } else {
                Err(CompileError::NotSqlCompatible)
            }
        }
        BoundExpression::SourceRef { at_id: id, source, .. } => {
            if *id == at_id {
                Ok(BackendExpr::SourceRef { source: *source })
            } else {
                Err(CompileError::NotSqlCompatible)
            }
        }
        BoundExpression::Attr { at_id: id, attr } => {
            if *id == at_id {
                Ok(BackendExpr::Attr {
                    source: attr.source,
                    path: attr.path.clone(),
                })
            } else {
                Err(CompileError::NotSqlCompatible)
            }
        }
        BoundExpression::Comparison { left, op, right } => Ok(BackendExpr::Comparison {
            left: Box::new(translate(left, at_id)?),
            op: *op,
            right: Box::new(translate(right, at_id)?),
        }),
        BoundExpression::Arithmetic { left, op, right, .. } => Ok(BackendExpr::Arithmetic {
            left: Box::new(translate(left, at_id)?),
            op: *op,
            right: Box::new(translate(right, at_id)?),
        }),
        BoundExpression::Logical { op, operands } => Ok(BackendExpr::Logical {
            op: *op,
            operands: operands
                .iter()
                .map(|e| translate(e, at_id))
                .collect::<CompileResult<_>>()?,
        }),
        BoundExpression::Call { name, .. } => Err(CompileError::CallNotSql {
            name: name.clone(),
        }),
        BoundExpression::ListLiteral { .. }
        | BoundExpression::Member { .. }
        | BoundExpression::Subquery { .. } => Err(CompileError::NotSqlCompatible),
    }
}
