//! Where-clause binding.
//!
//! Terms are implicitly AND-ed. Besides plain boolean predicates, two
//! shorthand forms compile to attribute-equality comparisons: a bare name
//! referring to a local variable, and a nameless non-boolean term matched
//! against source attributes by type.

use crate::ast::Expr;
use crate::binder::expression::BoundExpression;
use crate::binder::Binder;
use crate::catalog::AttributeRef;
use crate::error::{CompileError, CompileResult};
use crate::types::Type;

/// Binds all where-terms of one at-expression.
pub(crate) fn bind_where(
    binder: &mut Binder<'_>,
    terms: &[Expr],
) -> CompileResult<Vec<BoundExpression>> {
    terms
        .iter()
        .enumerate()
        .map(|(index, term)| bind_term(binder, index, term))
        .collect()
}

fn bind_term(
    binder: &mut Binder<'_>,
    index: usize,
    term: &Expr,
) -> CompileResult<BoundExpression> {
    // A bare name naming a local (and not shadowed by a source alias) is
    // matched against attributes by name, then by type.
    if let Expr::Name(name) = term {
        if !binder.is_frame_alias(name) {
            if let Some(ty) = binder.scope().local(name).cloned() {
                return bind_local_term(binder, name, &ty);
            }
        }
    }

    let bound = binder.bind_expr(term)?;
    let ty = bound.ty();
    if ty == Type::Boolean {
        return Ok(bound);
    }

    let at_id = binder.current_frame().at_id;
    if bound.depends_on(at_id) {
        // A term reading this at-expression's sources must be a predicate.
        return Err(CompileError::WhereTermType { index, ty });
    }
    bind_type_matched_term(binder, index, bound, &ty)
}

/// Bare-name shorthand: `where { name }` with `name` a local variable.
fn bind_local_term(
    binder: &mut Binder<'_>,
    name: &str,
    ty: &Type,
) -> CompileResult<BoundExpression> {
    let frame = binder.current_frame();
    let at_id = frame.at_id;
    let by_name: Vec<AttributeRef> = frame
        .attrs
        .find_by_name(name)
        .into_iter()
        .cloned()
        .collect();
    let local = || BoundExpression::Local {
        name: name.to_string(),
        ty: ty.clone(),
    };

    // A single name match of compatible type wins regardless of other
    // attributes sharing the type.
    if by_name.len() == 1 && by_name[0].ty.is_assignable_from(ty) {
        return Ok(BoundExpression::attr_eq(at_id, by_name[0].clone(), local()));
    }

    // No usable name match: a boolean local degrades to a plain predicate
    // before type matching is attempted.
    if by_name.len() < 2 && *ty == Type::Boolean {
        return Ok(local());
    }

    let by_type: Vec<AttributeRef> = frame.attrs.find_by_type(ty).into_iter().cloned().collect();
    if by_type.len() == 1 {
        return Ok(BoundExpression::attr_eq(at_id, by_type[0].clone(), local()));
    }
    if by_name.len() >= 2 {
        return Err(CompileError::AttrNameAmbig {
            name: name.to_string(),
            candidates: by_name
                .iter()
                .map(|a| frame.attrs.candidate_label(a))
                .collect(),
        });
    }
    if by_type.is_empty() {
        return Err(CompileError::VarNoAttrs {
            name: name.to_string(),
            ty: ty.clone(),
        });
    }
    Err(CompileError::AttrTypeAmbig {
        ty: ty.clone(),
        candidates: by_type
            .iter()
            .map(|a| frame.attrs.candidate_label(a))
            .collect(),
    })
}

/// Nameless shorthand: a non-boolean term not reading this frame is matched
/// against attributes by type.
fn bind_type_matched_term(
    binder: &mut Binder<'_>,
    index: usize,
    bound: BoundExpression,
    ty: &Type,
) -> CompileResult<BoundExpression> {
    let frame = binder.current_frame();
    let at_id = frame.at_id;
    let by_type: Vec<AttributeRef> = frame.attrs.find_by_type(ty).into_iter().cloned().collect();
    match by_type.len() {
        1 => Ok(BoundExpression::attr_eq(at_id, by_type[0].clone(), bound)),
        0 => Err(CompileError::WhereTypeNoAttrs {
            index,
            ty: ty.clone(),
        }),
        _ => Err(CompileError::AttrTypeAmbig {
            ty: ty.clone(),
            candidates: by_type
                .iter()
                .map(|a| frame.attrs.candidate_label(a))
                .collect(),
        }),
    }
}
