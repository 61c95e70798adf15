//! Semantic analysis: turns an [`AtExpr`] into an executable
//! [`Plan`](crate::planner::Plan).
//!
//! Binding walks the AST once. Each at-expression pushes a frame carrying
//! its bound sources and attribute index; placeholder and implicit-attribute
//! resolution consult the frame stack, so nested at-expressions see their
//! enclosing sources.

pub mod expression;
pub mod scope;
pub mod source;
mod what;
mod where_clause;

pub use expression::BoundExpression;
pub use scope::{AtFrame, FnSig, Scope};
pub use source::{BoundSource, FromRoot, SourceKind};
pub use what::{RowShape, Summarization, WhatField, WhatPlan};

use std::collections::HashSet;

use crate::ast::{ArithmeticOp, AtExpr, ComparisonOp, Expr, LogicalOp};
use crate::catalog::{AttributeIndex, AttributeRef, Catalog};
use crate::error::{CompileError, CompileResult};
use crate::planner::{BoundAt, Plan};
use crate::types::{Type, Value};

/// Compiles one at-expression against a catalog and a compile-time scope.
///
/// # Errors
///
/// Returns a [`CompileError`] for any name, type, clause or pushdown
/// violation; see the error enum for the full vocabulary.
pub fn compile_at_expr(catalog: &Catalog, scope: &Scope, at: &AtExpr) -> CompileResult<Plan> {
    Binder::new(catalog, scope).compile(at)
}

/// Stateful binder for one compilation.
pub struct Binder<'a> {
    catalog: &'a Catalog,
    scope: &'a Scope,
    frames: Vec<AtFrame>,
    next_at_id: usize,
}

impl<'a> Binder<'a> {
    /// Creates a binder with an empty frame stack.
    #[must_use]
    pub fn new(catalog: &'a Catalog, scope: &'a Scope) -> Self {
        Binder {
            catalog,
            scope,
            frames: Vec::new(),
            next_at_id: 0,
        }
    }

    /// Compiles the outermost at-expression.
    ///
    /// # Errors
    ///
    /// See [`compile_at_expr`].
    pub fn compile(&mut self, at: &AtExpr) -> CompileResult<Plan> {
        self.compile_at(at)
    }

    pub(crate) fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub(crate) fn scope(&self) -> &'a Scope {
        self.scope
    }

    /// Innermost frame; where/what binding always runs with one pushed.
    pub(crate) fn current_frame(&self) -> &AtFrame {
        match self.frames.last() {
            Some(frame) => frame,
            None => unreachable!("where/what binding runs with a frame pushed"),
        }
    }

    /// Returns whether `name` is an alias of the innermost or any enclosing
    /// at-expression.
    pub(crate) fn is_frame_alias(&self, name: &str) -> bool {
        self.frames
            .iter()
            .any(|f| f.source_by_alias(name).is_some())
    }

    fn compile_at(&mut self, at: &AtExpr) -> CompileResult<Plan> {
        let at_id = self.next_at_id;
        self.next_at_id += 1;

        // Iterable source expressions are compiled in the enclosing scope,
        // before the new frame exists.
        let catalog = self.catalog;
        let taken = self.taken_names();
        let bound_from = source::bind_from(
            catalog,
            &at.sources,
            &mut |e| self.bind_expr(e),
            &|name| taken.contains(name),
        )?;

        let pairs: Vec<(String, Type)> = bound_from
            .sources
            .iter()
            .map(|s| (s.alias.clone(), s.element_type.clone()))
            .collect();
        let attrs = AttributeIndex::build(catalog, &pairs);
        let root = bound_from.root;

        self.frames.push(AtFrame {
            at_id,
            sources: bound_from.sources,
            placeholder: bound_from.placeholder,
            attrs,
        });
        let clauses = self.bind_clauses(at);
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => unreachable!("frame pushed above"),
        };
        let (where_terms, what) = clauses?;

        // Limit and offset see the enclosing scope only.
        let limit = self.bind_bound(at.limit.as_ref(), "limit")?;
        let offset = self.bind_bound(at.offset.as_ref(), "offset")?;

        Plan::build(BoundAt {
            at_id,
            sources: frame.sources,
            root,
            where_terms,
            what,
            limit,
            offset,
            cardinality: at.cardinality,
        })
    }

    fn bind_clauses(
        &mut self,
        at: &AtExpr,
    ) -> CompileResult<(Vec<BoundExpression>, what::WhatPlan)> {
        let where_terms = where_clause::bind_where(self, &at.where_terms)?;
        let what = what::bind_what(self, at.what.as_deref())?;
        Ok((where_terms, what))
    }

    fn bind_bound(
        &mut self,
        expr: Option<&Expr>,
        clause: &'static str,
    ) -> CompileResult<Option<BoundExpression>> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        let bound = self.bind_expr(expr)?;
        let ty = bound.ty();
        if ty != Type::Integer {
            return Err(CompileError::LimitType { clause, ty });
        }
        Ok(Some(bound))
    }

    /// Names a new source alias must not collide with.
    fn taken_names(&self) -> HashSet<String> {
        let mut taken: HashSet<String> = self
            .frames
            .iter()
            .flat_map(|f| f.sources.iter().map(|s| s.alias.clone()))
            .collect();
        for name in self.scope.local_names() {
            taken.insert(name.to_string());
        }
        taken
    }

    /// Binds a general expression in the current frame stack.
    pub(crate) fn bind_expr(&mut self, expr: &Expr) -> CompileResult<BoundExpression> {
        match expr {
            Expr::Literal(value) => {
                let ty = literal_type(value)?;
                Ok(BoundExpression::Literal {
                    value: value.clone(),
                    ty,
                })
            }
            Expr::ListLiteral { elem, items } => self.bind_list(elem.as_ref(), items),
            Expr::Name(name) => self.bind_name(name),
            Expr::Placeholder => self.bind_placeholder(),
            Expr::ImplicitAttr(name) => self.bind_implicit_attr(name),
            Expr::Member(base, name) => self.bind_member(base, name),
            Expr::Comparison(left, op, right) => self.bind_comparison(left, *op, right),
            Expr::Arithmetic(left, op, right) => self.bind_arithmetic(left, *op, right),
            Expr::Logical(op, operands) => self.bind_logical(*op, operands),
            Expr::Call(name, args) => self.bind_call(name, args),
            Expr::At(sub) => {
                let plan = self.compile_at(sub)?;
                Ok(BoundExpression::Subquery {
                    plan: Box::new(plan),
                })
            }
        }
    }

    fn bind_list(
        &mut self,
        elem: Option<&Type>,
        items: &[Expr],
    ) -> CompileResult<BoundExpression> {
        let bound: Vec<BoundExpression> = items
            .iter()
            .map(|e| self.bind_expr(e))
            .collect::<CompileResult<_>>()?;
        let elem_ty = match elem {
            Some(ty) => ty.clone(),
            None => match bound.first() {
                Some(first) => first.ty(),
                None => return Err(CompileError::BadLiteral { kind: "empty_list" }),
            },
        };
        for item in &bound {
            let ty = item.ty();
            if !elem_ty.is_assignable_from(&ty) {
                return Err(CompileError::TypeMismatch {
                    expected: elem_ty,
                    actual: ty,
                });
            }
        }
        Ok(BoundExpression::ListLiteral {
            items: bound,
            elem_ty,
        })
    }

    fn bind_name(&mut self, name: &str) -> CompileResult<BoundExpression> {
        // Innermost alias wins over enclosing aliases, which win over locals.
        for frame in self.frames.iter().rev() {
            if let Some(source) = frame.source_by_alias(name) {
                return Ok(BoundExpression::SourceRef {
                    at_id: frame.at_id,
                    source,
                    ty: frame.sources[source].element_type.clone(),
                });
            }
        }
        if let Some(ty) = self.scope.local(name) {
            return Ok(BoundExpression::Local {
                name: name.to_string(),
                ty: ty.clone(),
            });
        }
        Err(CompileError::UnknownName {
            name: name.to_string(),
        })
    }

    fn bind_placeholder(&mut self) -> CompileResult<BoundExpression> {
        let mut found = None;
        let mut count = 0;
        for frame in &self.frames {
            if let Some(source) = frame.placeholder {
                count += 1;
                found = Some((frame.at_id, source, frame.sources[source].element_type.clone()));
            }
        }
        match (count, found) {
            (0, _) => Err(CompileError::PlaceholderNone),
            (1, Some((at_id, source, ty))) => Ok(BoundExpression::SourceRef { at_id, source, ty }),
            _ => Err(CompileError::PlaceholderAmbiguous),
        }
    }

    fn bind_implicit_attr(&mut self, name: &str) -> CompileResult<BoundExpression> {
        let Some(frame) = self.frames.last() else {
            return Err(CompileError::UnknownName {
                name: name.to_string(),
            });
        };
        let matches = frame.attrs.find_by_name(name);
        match matches.len() {
            0 => Err(CompileError::UnknownAttribute {
                owner: frame
                    .sources
                    .iter()
                    .map(|s| s.alias.clone())
                    .collect::<Vec<_>>()
                    .join(","),
                attr: name.to_string(),
            }),
            1 => Ok(BoundExpression::Attr {
                at_id: frame.at_id,
                attr: matches[0].clone(),
            }),
            _ => Err(CompileError::AttrNameAmbig {
                name: name.to_string(),
                candidates: matches
                    .iter()
                    .map(|a| frame.attrs.candidate_label(a))
                    .collect(),
            }),
        }
    }

    fn bind_member(&mut self, base: &Expr, name: &str) -> CompileResult<BoundExpression> {
        let bound = self.bind_expr(base)?;
        match bound {
            BoundExpression::SourceRef { at_id, source, ty } => {
                let attr = self.lookup_attr(&ty, name)?;
                Ok(BoundExpression::Attr {
                    at_id,
                    attr: AttributeRef {
                        source,
                        path: vec![name.to_string()],
                        ty: attr,
                    },
                })
            }
            BoundExpression::Attr { at_id, attr } => {
                let ty = self.lookup_attr(&attr.ty, name)?;
                let mut path = attr.path;
                path.push(name.to_string());
                Ok(BoundExpression::Attr {
                    at_id,
                    attr: AttributeRef {
                        source: attr.source,
                        path,
                        ty,
                    },
                })
            }
            other => {
                let base_ty = other.ty();
                let ty = self.lookup_attr(&base_ty, name)?;
                Ok(BoundExpression::Member {
                    base: Box::new(other),
                    name: name.to_string(),
                    ty,
                })
            }
        }
    }

    fn lookup_attr(&self, owner: &Type, name: &str) -> CompileResult<Type> {
        self.catalog
            .attr_of(owner, name)
            .map(|a| a.ty.clone())
            .ok_or_else(|| CompileError::UnknownAttribute {
                owner: owner.to_string(),
                attr: name.to_string(),
            })
    }

    fn bind_comparison(
        &mut self,
        left: &Expr,
        op: ComparisonOp,
        right: &Expr,
    ) -> CompileResult<BoundExpression> {
        let left = self.bind_expr(left)?;
        let right = self.bind_expr(right)?;
        let (lty, rty) = (left.ty(), right.ty());
        if !lty.is_assignable_from(&rty) && !rty.is_assignable_from(&lty) {
            return Err(CompileError::TypeMismatch {
                expected: lty,
                actual: rty,
            });
        }
        let ordering = !matches!(op, ComparisonOp::Eq | ComparisonOp::Neq);
        if ordering && !lty.is_orderable() {
            return Err(CompileError::TypeMismatch {
                expected: Type::Integer,
                actual: lty,
            });
        }
        Ok(BoundExpression::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn bind_arithmetic(
        &mut self,
        left: &Expr,
        op: ArithmeticOp,
        right: &Expr,
    ) -> CompileResult<BoundExpression> {
        let left = self.bind_expr(left)?;
        let right = self.bind_expr(right)?;
        let (lty, rty) = (left.ty(), right.ty());
        let ty = match (&lty, &rty, op) {
            (Type::Text, Type::Text, ArithmeticOp::Add) => Type::Text,
            (Type::Integer, Type::Integer, _) => Type::Integer,
            (Type::Integer | Type::Decimal, Type::Integer | Type::Decimal, _) => Type::Decimal,
            _ => {
                return Err(CompileError::TypeMismatch {
                    expected: lty,
                    actual: rty,
                })
            }
        };
        Ok(BoundExpression::Arithmetic {
            left: Box::new(left),
            op,
            right: Box::new(right),
            ty,
        })
    }

    fn bind_logical(&mut self, op: LogicalOp, operands: &[Expr]) -> CompileResult<BoundExpression> {
        if op == LogicalOp::Not && operands.len() != 1 {
            return Err(CompileError::ArgCount {
                name: "not".to_string(),
                expected: 1,
                actual: operands.len(),
            });
        }
        let bound: Vec<BoundExpression> = operands
            .iter()
            .map(|e| self.bind_expr(e))
            .collect::<CompileResult<_>>()?;
        for operand in &bound {
            let ty = operand.ty();
            if ty != Type::Boolean {
                return Err(CompileError::TypeMismatch {
                    expected: Type::Boolean,
                    actual: ty,
                });
            }
        }
        Ok(BoundExpression::Logical { op, operands: bound })
    }

    fn bind_call(&mut self, name: &str, args: &[Expr]) -> CompileResult<BoundExpression> {
        let scope = self.scope;
        let Some(sig) = scope.fn_sig(name) else {
            return Err(CompileError::UnknownName {
                name: name.to_string(),
            });
        };
        if args.len() != sig.params.len() {
            return Err(CompileError::ArgCount {
                name: name.to_string(),
                expected: sig.params.len(),
                actual: args.len(),
            });
        }
        let bound: Vec<BoundExpression> = args
            .iter()
            .map(|e| self.bind_expr(e))
            .collect::<CompileResult<_>>()?;
        for (param, arg) in sig.params.iter().zip(&bound) {
            let ty = arg.ty();
            if !param.is_assignable_from(&ty) {
                return Err(CompileError::TypeMismatch {
                    expected: param.clone(),
                    actual: ty,
                });
            }
        }
        Ok(BoundExpression::Call {
            name: name.to_string(),
            args: bound,
            ty: sig.ret.clone(),
        })
    }
}

fn literal_type(value: &Value) -> CompileResult<Type> {
    match value {
        Value::Int(_) => Ok(Type::Integer),
        Value::Decimal(_) => Ok(Type::Decimal),
        Value::Bool(_) => Ok(Type::Boolean),
        Value::Text(_) => Ok(Type::Text),
        Value::Ref { entity, .. } => Ok(Type::Entity(entity.clone())),
        Value::Struct { name, .. } => Ok(Type::Struct(name.clone())),
        Value::Tuple(_) => Err(CompileError::BadLiteral { kind: "tuple" }),
        Value::List(_) => Err(CompileError::BadLiteral { kind: "list" }),
        Value::Null => Err(CompileError::BadLiteral { kind: "null" }),
    }
}
