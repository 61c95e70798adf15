//! Bound expression definitions.
//!
//! A [`BoundExpression`] is the result of name and type resolution over the
//! input AST; every node knows its static type. Attribute references carry
//! the identity of the at-expression whose source they read, which is what
//! the planner's pushdown analysis and the ambiguity checks key on.

use crate::ast::{ArithmeticOp, ComparisonOp, LogicalOp};
use crate::catalog::AttributeRef;
use crate::planner::Plan;
use crate::types::{Type, Value};

/// Expression after semantic analysis.
#[derive(Debug, Clone)]
pub enum BoundExpression {
    /// Literal constant.
    Literal { value: Value, ty: Type },

    /// List literal.
    ListLiteral {
        items: Vec<BoundExpression>,
        elem_ty: Type,
    },

    /// Local variable from the enclosing scope, resolved at runtime from
    /// the caller's bindings.
    Local { name: String, ty: Type },

    /// The whole current element of a source (`$`, or an alias).
    SourceRef {
        at_id: usize,
        source: usize,
        ty: Type,
    },

    /// Attribute of a source's current element.
    Attr { at_id: usize, attr: AttributeRef },

    /// Member access rooted at an arbitrary value (struct field or entity
    /// attribute read).
    Member {
        base: Box<BoundExpression>,
        name: String,
        ty: Type,
    },

    /// Binary comparison; always boolean.
    Comparison {
        left: Box<BoundExpression>,
        op: ComparisonOp,
        right: Box<BoundExpression>,
    },

    /// Binary arithmetic.
    Arithmetic {
        left: Box<BoundExpression>,
        op: ArithmeticOp,
        right: Box<BoundExpression>,
        ty: Type,
    },

    /// Logical combination; always boolean.
    Logical {
        op: LogicalOp,
        operands: Vec<BoundExpression>,
    },

    /// Host function call.
    Call {
        name: String,
        args: Vec<BoundExpression>,
        ty: Type,
    },

    /// Nested at-expression.
    Subquery { plan: Box<Plan> },
}

impl BoundExpression {
    /// Static type of this expression.
    #[must_use]
    pub fn ty(&self) -> Type {
        match self {
            BoundExpression::Literal { ty, .. }
            | BoundExpression::Local { ty, .. }
            | BoundExpression::SourceRef { ty, .. }
            | BoundExpression::Member { ty, .. }
            | BoundExpression::Arithmetic { ty, .. }
            | BoundExpression::Call { ty, .. } => ty.clone(),
            BoundExpression::ListLiteral { elem_ty, .. } => elem_ty.clone().list_of(),
            BoundExpression::Attr { attr, .. } => attr.ty.clone(),
            BoundExpression::Comparison { .. } | BoundExpression::Logical { .. } => Type::Boolean,
            BoundExpression::Subquery { plan } => plan.result_type.clone(),
        }
    }

    /// Creates a literal expression.
    #[must_use]
    pub fn literal(value: Value, ty: Type) -> Self {
        BoundExpression::Literal { value, ty }
    }

    /// Creates an attribute-equality comparison, the compiled form of a
    /// bare-name or type-matched where-term.
    #[must_use]
    pub fn attr_eq(at_id: usize, attr: AttributeRef, value: BoundExpression) -> Self {
        BoundExpression::Comparison {
            left: Box::new(BoundExpression::Attr { at_id, attr }),
            op: ComparisonOp::Eq,
            right: Box::new(value),
        }
    }

    /// Returns whether this expression reads a source of the given
    /// at-expression, directly or through a nested subquery.
    #[must_use]
    pub fn depends_on(&self, at_id: usize) -> bool {
        match self {
            BoundExpression::Literal { .. } | BoundExpression::Local { .. } => false,
            BoundExpression::SourceRef { at_id: id, .. }
            | BoundExpression::Attr { at_id: id, .. } => *id == at_id,
            BoundExpression::Member { base, .. } => base.depends_on(at_id),
            BoundExpression::ListLiteral { items, .. } => {
                items.iter().any(|e| e.depends_on(at_id))
            }
            BoundExpression::Comparison { left, right, .. } => {
                left.depends_on(at_id) || right.depends_on(at_id)
            }
            BoundExpression::Arithmetic { left, right, .. } => {
                left.depends_on(at_id) || right.depends_on(at_id)
            }
            BoundExpression::Logical { operands, .. } => {
                operands.iter().any(|e| e.depends_on(at_id))
            }
            BoundExpression::Call { args, .. } => args.iter().any(|e| e.depends_on(at_id)),
            BoundExpression::Subquery { plan } => plan.depends_on(at_id),
        }
    }

    /// Returns whether any node is a host function call or subquery, the
    /// constructs that force host-side evaluation.
    #[must_use]
    pub fn has_host_only(&self) -> bool {
        match self {
            BoundExpression::Literal { .. }
            | BoundExpression::Local { .. }
            | BoundExpression::SourceRef { .. }
            | BoundExpression::Attr { .. } => false,
            BoundExpression::Member { base, .. } => base.has_host_only(),
            BoundExpression::ListLiteral { items, .. } => items.iter().any(Self::has_host_only),
            BoundExpression::Comparison { left, right, .. } => {
                left.has_host_only() || right.has_host_only()
            }
            BoundExpression::Arithmetic { left, right, .. } => {
                left.has_host_only() || right.has_host_only()
            }
            BoundExpression::Logical { operands, .. } => {
                operands.iter().any(Self::has_host_only)
            }
            BoundExpression::Call { .. } | BoundExpression::Subquery { .. } => true,
        }
    }
}
