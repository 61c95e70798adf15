//! Plan construction.
//!
//! A [`Plan`] is the executable form of one at-expression. Building it
//! decides the evaluation strategy: entity-sourced expressions compile into
//! a [`BackendQuery`] and must translate completely, iterable-sourced ones
//! are evaluated on the host.

use crate::ast::Cardinality;
use crate::backend::{translate, BackendField, BackendQuery};
use crate::binder::{BoundExpression, BoundSource, FromRoot, WhatPlan};
use crate::error::CompileResult;
use crate::types::Type;

/// Bound clauses of one at-expression, ready for plan construction.
#[derive(Debug)]
pub struct BoundAt {
    pub at_id: usize,
    pub sources: Vec<BoundSource>,
    pub root: FromRoot,
    pub where_terms: Vec<BoundExpression>,
    pub what: WhatPlan,
    pub limit: Option<BoundExpression>,
    pub offset: Option<BoundExpression>,
    pub cardinality: Cardinality,
}

/// How the rows of a plan are produced.
#[derive(Debug, Clone)]
pub enum EvalStrategy {
    /// The storage backend runs a compiled query.
    Backend(BackendQuery),
    /// The host iterates the in-memory source.
    Host,
}

/// Executable plan for one at-expression.
#[derive(Debug, Clone)]
pub struct Plan {
    pub at_id: usize,
    pub sources: Vec<BoundSource>,
    pub root: FromRoot,
    /// Filter conjuncts; only evaluated on the host for the
    /// [`EvalStrategy::Host`] strategy.
    pub where_terms: Vec<BoundExpression>,
    pub what: WhatPlan,
    pub limit: Option<BoundExpression>,
    pub offset: Option<BoundExpression>,
    pub cardinality: Cardinality,
    pub strategy: EvalStrategy,
    /// Type of the whole at-expression's result, cardinality applied.
    pub result_type: Type,
}

impl Plan {
    /// Builds the plan for bound clauses.
    ///
    /// # Errors
    ///
    /// Fails when an entity-sourced expression cannot be translated to the
    /// backend query language.
    pub fn build(parts: BoundAt) -> CompileResult<Plan> {
        let strategy = match &parts.root {
            FromRoot::Entities(names) => {
                let filter = parts
                    .where_terms
                    .iter()
                    .map(|t| translate::translate(t, parts.at_id))
                    .collect::<CompileResult<Vec<_>>>()?;
                let fields = parts
                    .what
                    .fields
                    .iter()
                    .map(|f| {
                        Ok(BackendField {
                            expr: translate::translate(&f.expr, parts.at_id)?,
                        })
                    })
                    .collect::<CompileResult<Vec<_>>>()?;
                EvalStrategy::Backend(BackendQuery {
                    entities: parts
                        .sources
                        .iter()
                        .zip(names)
                        .map(|(s, n)| (s.alias.clone(), n.clone()))
                        .collect(),
                    filter,
                    fields,
                })
            }
            FromRoot::Iterable(_) => EvalStrategy::Host,
        };

        let record = parts.what.record_type.clone();
        let result_type = match parts.cardinality {
            Cardinality::One => record,
            Cardinality::ZeroOrOne => record.nullable(),
            Cardinality::OneOrMore | Cardinality::Any => record.list_of(),
        };

        Ok(Plan {
            at_id: parts.at_id,
            sources: parts.sources,
            root: parts.root,
            where_terms: parts.where_terms,
            what: parts.what,
            limit: parts.limit,
            offset: parts.offset,
            cardinality: parts.cardinality,
            strategy,
            result_type,
        })
    }

    /// Returns whether this plan reads a source of the given enclosing
    /// at-expression.
    #[must_use]
    pub fn depends_on(&self, at_id: usize) -> bool {
        if let FromRoot::Iterable(expr) = &self.root {
            if expr.depends_on(at_id) {
                return true;
            }
        }
        self.where_terms.iter().any(|t| t.depends_on(at_id))
            || self.what.fields.iter().any(|f| f.expr.depends_on(at_id))
            || self.limit.as_ref().is_some_and(|e| e.depends_on(at_id))
            || self.offset.as_ref().is_some_and(|e| e.depends_on(at_id))
    }
}
