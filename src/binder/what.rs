//! What-clause binding.
//!
//! Produces the evaluation plan for one row: every column expression in
//! declaration order, which columns make it into the output record, the
//! sort keys, and the summarization mode implied by `@group` and the
//! aggregate annotations.

use crate::ast::{AggregateKind, SortDirection, WhatItem};
use crate::binder::expression::BoundExpression;
use crate::binder::Binder;
use crate::error::{CompileError, CompileResult};
use crate::types::Type;

/// How collected rows are summarized before sorting and limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Summarization {
    /// Plain row collection.
    None,
    /// Rows are grouped by the `@group` columns, in first-seen order.
    Group,
    /// All rows collapse into a single aggregate row.
    All,
}

/// Shape of one result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// A single column, returned bare.
    Simple,
    /// Several columns, returned as a tuple.
    Tuple,
}

/// One what-column after binding.
#[derive(Debug, Clone)]
pub struct WhatField {
    /// Output field name; `None` for positional or suppressed fields.
    pub name: Option<String>,
    pub expr: BoundExpression,
    pub ty: Type,
    /// Evaluated for side effects and sorting but not part of the output.
    pub omit: bool,
    pub sort: Option<SortDirection>,
    pub group: bool,
    pub aggregate: Option<AggregateKind>,
}

/// The bound what-clause of one at-expression.
#[derive(Debug, Clone)]
pub struct WhatPlan {
    /// All columns in declaration order; evaluation order is fixed.
    pub fields: Vec<WhatField>,
    /// Indices of output columns, in declaration order.
    pub selected: Vec<usize>,
    /// Sort keys in declaration order, as field indices.
    pub sorting: Vec<(usize, SortDirection)>,
    pub summarization: Summarization,
    pub shape: RowShape,
    /// Type of one result row.
    pub record_type: Type,
}

pub(crate) fn bind_what(
    binder: &mut Binder<'_>,
    what: Option<&[WhatItem]>,
) -> CompileResult<WhatPlan> {
    match what {
        Some(items) => bind_explicit(binder, items),
        None => Ok(default_what(binder)),
    }
}

/// Without a what-clause the result is the source element itself, or a
/// tuple of all source elements for a multi-source from-clause.
fn default_what(binder: &Binder<'_>) -> WhatPlan {
    let frame = binder.current_frame();
    let fields: Vec<WhatField> = frame
        .sources
        .iter()
        .enumerate()
        .map(|(source, s)| WhatField {
            name: s.explicit_alias.then(|| s.alias.clone()),
            expr: BoundExpression::SourceRef {
                at_id: frame.at_id,
                source,
                ty: s.element_type.clone(),
            },
            ty: s.element_type.clone(),
            omit: false,
            sort: None,
            group: false,
            aggregate: None,
        })
        .collect();
    let selected: Vec<usize> = (0..fields.len()).collect();
    let (shape, record_type) = row_shape(&fields, &selected);
    WhatPlan {
        fields,
        selected,
        sorting: Vec::new(),
        summarization: Summarization::None,
        shape,
        record_type,
    }
}

fn bind_explicit(binder: &mut Binder<'_>, items: &[WhatItem]) -> CompileResult<WhatPlan> {
    let mut fields = Vec::with_capacity(items.len());
    for item in items {
        let expr = binder.bind_expr(&item.expr)?;
        let ty = expr.ty();

        if let Some(kind) = item.aggregate {
            let legal = match kind {
                AggregateKind::Sum => ty.is_summable(),
                AggregateKind::Min | AggregateKind::Max => ty.is_orderable(),
            };
            if !legal {
                return Err(CompileError::AggregateBadType {
                    kind: kind.name(),
                    ty,
                });
            }
        }
        if item.group && !ty.is_groupable() {
            return Err(CompileError::GroupBadType { ty });
        }
        if item.sort.is_some() && !ty.is_orderable() {
            return Err(CompileError::SortBadType { ty });
        }

        // A sort key with no alias and no summarization role only orders the
        // result; it is not an output column.
        let sort_only = item.sort.is_some()
            && item.alias.is_none()
            && !item.group
            && item.aggregate.is_none();
        let name = match &item.alias {
            Some(alias) if alias == "_" => None,
            Some(alias) => Some(alias.clone()),
            None => derived_name(&expr),
        };

        fields.push(WhatField {
            name,
            ty,
            omit: item.omit || sort_only,
            sort: item.sort,
            group: item.group,
            aggregate: item.aggregate,
            expr,
        });
    }

    let summarization = if fields.iter().any(|f| f.group) {
        Summarization::Group
    } else if fields.iter().any(|f| f.aggregate.is_some()) {
        Summarization::All
    } else {
        Summarization::None
    };
    if summarization != Summarization::None {
        for (index, field) in fields.iter().enumerate() {
            if !field.group && field.aggregate.is_none() {
                return Err(CompileError::GroupRequired { index });
            }
        }
    }

    let selected: Vec<usize> = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.omit)
        .map(|(i, _)| i)
        .collect();
    if selected.is_empty() {
        return Err(CompileError::NoFields);
    }

    let mut seen = std::collections::HashSet::new();
    for &index in &selected {
        if let Some(name) = &fields[index].name {
            if !seen.insert(name.clone()) {
                return Err(CompileError::DupFieldName { name: name.clone() });
            }
        }
    }

    let sorting: Vec<(usize, SortDirection)> = fields
        .iter()
        .enumerate()
        .filter_map(|(i, f)| f.sort.map(|d| (i, d)))
        .collect();

    let (shape, record_type) = shaped(&fields, &selected, summarization);
    Ok(WhatPlan {
        fields,
        selected,
        sorting,
        summarization,
        shape,
        record_type,
    })
}

/// Output name derived from an attribute column without an explicit alias.
fn derived_name(expr: &BoundExpression) -> Option<String> {
    match expr {
        BoundExpression::Attr { attr, .. } => Some(attr.simple_name().to_string()),
        BoundExpression::Member { name, .. } => Some(name.clone()),
        _ => None,
    }
}

/// Output type of one column, accounting for whole-set aggregation where
/// `@min`/`@max` over zero rows produce null.
fn output_ty(field: &WhatField, summarization: Summarization) -> Type {
    match (summarization, field.aggregate) {
        (Summarization::All, Some(AggregateKind::Min | AggregateKind::Max)) => {
            field.ty.clone().nullable()
        }
        _ => field.ty.clone(),
    }
}

fn shaped(
    fields: &[WhatField],
    selected: &[usize],
    summarization: Summarization,
) -> (RowShape, Type) {
    if selected.len() == 1 {
        (RowShape::Simple, output_ty(&fields[selected[0]], summarization))
    } else {
        let tuple = selected
            .iter()
            .map(|&i| (fields[i].name.clone(), output_ty(&fields[i], summarization)))
            .collect();
        (RowShape::Tuple, Type::Tuple(tuple))
    }
}

fn row_shape(fields: &[WhatField], selected: &[usize]) -> (RowShape, Type) {
    shaped(fields, selected, Summarization::None)
}
