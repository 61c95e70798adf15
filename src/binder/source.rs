//! Source binding: turns the from-clause into an ordered list of bound
//! sources with aliases and kinds.

use crate::ast::{SourceExpr, SourceItem};
use crate::binder::expression::BoundExpression;
use crate::catalog::Catalog;
use crate::error::{CompileError, CompileResult};
use crate::types::Type;

/// Kind of a bound source, a closed union.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Backend-resident entity set.
    Entity,
    /// In-memory sequence.
    Iterable,
}

/// One bound source of an at-expression.
#[derive(Debug, Clone)]
pub struct BoundSource {
    /// Effective alias: explicit, or derived from the entity name.
    pub alias: String,
    /// Whether the alias was written out by the user.
    pub explicit_alias: bool,
    pub kind: SourceKind,
    /// Type of one element of this source.
    pub element_type: Type,
    /// Whether rows live in the storage backend.
    pub backend_resident: bool,
}

/// What the evaluator iterates: entity names, or one compiled iterable.
#[derive(Debug, Clone)]
pub enum FromRoot {
    /// Entity names in declaration order; evaluation is their cross product.
    Entities(Vec<String>),
    /// A single in-memory sequence expression, compiled in the enclosing
    /// scope.
    Iterable(BoundExpression),
}

/// Result of binding a from-clause.
#[derive(Debug)]
pub struct BoundFrom {
    pub sources: Vec<BoundSource>,
    pub root: FromRoot,
    /// Source index usable by the `$` placeholder.
    pub placeholder: Option<usize>,
}

/// Binds the from-clause of one at-expression.
///
/// `bind_iterable` compiles an iterable source expression in the enclosing
/// scope; `is_taken` reports alias collisions with locals and enclosing
/// at-expressions.
///
/// # Errors
///
/// Rejects entity/iterable mixtures, multiple iterables, unknown entities
/// and alias collisions.
pub fn bind_from(
    catalog: &Catalog,
    items: &[SourceItem],
    bind_iterable: &mut dyn FnMut(&crate::ast::Expr) -> CompileResult<BoundExpression>,
    is_taken: &dyn Fn(&str) -> bool,
) -> CompileResult<BoundFrom> {
    let entity_count = items
        .iter()
        .filter(|i| matches!(i.expr, SourceExpr::Entity(_)))
        .count();
    let iterable_count = items.len() - entity_count;

    if entity_count > 0 && iterable_count > 0 {
        return Err(CompileError::MixedSources);
    }
    if iterable_count > 1 {
        return Err(CompileError::ManyIterables {
            count: iterable_count,
        });
    }

    for item in items {
        if let Some(alias) = &item.alias {
            if is_taken(alias) {
                return Err(CompileError::ConflictAlias {
                    alias: alias.clone(),
                });
            }
        }
    }

    if iterable_count == 1 {
        bind_iterable_source(items, bind_iterable)
    } else {
        bind_entity_sources(catalog, items)
    }
}

fn bind_iterable_source(
    items: &[SourceItem],
    bind_iterable: &mut dyn FnMut(&crate::ast::Expr) -> CompileResult<BoundExpression>,
) -> CompileResult<BoundFrom> {
    let item = &items[0];
    let SourceExpr::Iterable(expr) = &item.expr else {
        unreachable!("caller partitioned sources by kind");
    };

    let bound = bind_iterable(expr)?;
    let element_type = match bound.ty() {
        Type::List(elem) => *elem,
        other => {
            return Err(CompileError::TypeMismatch {
                expected: Type::List(Box::new(Type::Integer)),
                actual: other,
            })
        }
    };

    let explicit = item.alias.is_some();
    let source = BoundSource {
        // The unaliased iterable is only reachable through `$`.
        alias: item.alias.clone().unwrap_or_else(|| "$".to_string()),
        explicit_alias: explicit,
        kind: SourceKind::Iterable,
        element_type,
        backend_resident: false,
    };

    Ok(BoundFrom {
        placeholder: if explicit { None } else { Some(0) },
        sources: vec![source],
        root: FromRoot::Iterable(bound),
    })
}

fn bind_entity_sources(catalog: &Catalog, items: &[SourceItem]) -> CompileResult<BoundFrom> {
    let mut sources = Vec::with_capacity(items.len());
    let mut names = Vec::with_capacity(items.len());

    for item in items {
        let SourceExpr::Entity(entity_name) = &item.expr else {
            unreachable!("caller partitioned sources by kind");
        };
        if catalog.entity(entity_name).is_none() {
            return Err(CompileError::UnknownEntity {
                name: entity_name.clone(),
            });
        }

        let alias = item.alias.clone().unwrap_or_else(|| entity_name.clone());
        if sources.iter().any(|s: &BoundSource| s.alias == alias) {
            return Err(CompileError::DuplicateAlias { alias });
        }

        sources.push(BoundSource {
            alias,
            explicit_alias: item.alias.is_some(),
            kind: SourceKind::Entity,
            element_type: Type::Entity(entity_name.clone()),
            backend_resident: true,
        });
        names.push(entity_name.clone());
    }

    let placeholder = if sources.len() == 1 && !sources[0].explicit_alias {
        Some(0)
    } else {
        None
    };

    Ok(BoundFrom {
        sources,
        root: FromRoot::Entities(names),
        placeholder,
    })
}
