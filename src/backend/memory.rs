//! In-memory storage backend.
//!
//! Rows are stored per entity in insertion order; a [`Value::Ref`] is the
//! entity name plus the row's position. Queries run as a nested-loop cross
//! product with host-equivalent operator semantics, which keeps the two
//! evaluation strategies observably identical.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ast::LogicalOp;
use crate::backend::{BackendExpr, BackendQuery, QueryContext, StorageBackend};
use crate::catalog::Catalog;
use crate::error::{RuntimeError, RuntimeResult};
use crate::executor::{apply_arithmetic, apply_comparison, read_field};
use crate::types::Value;

/// Storage backend keeping all rows in memory.
pub struct MemoryBackend {
    catalog: Arc<Catalog>,
    rows: RwLock<HashMap<String, Vec<Vec<Value>>>>,
}

impl MemoryBackend {
    /// Creates an empty backend over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        MemoryBackend {
            catalog,
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts one row, given attribute values in schema order, and returns
    /// its reference.
    ///
    /// # Errors
    ///
    /// Fails for unknown entities and arity mismatches.
    pub fn insert(&self, entity: &str, values: Vec<Value>) -> RuntimeResult<Value> {
        let Some(def) = self.catalog.entity(entity) else {
            return Err(RuntimeError::Backend(format!("unknown entity '{entity}'")));
        };
        if values.len() != def.attrs.len() {
            return Err(RuntimeError::InvalidValue(format!(
                "entity '{entity}' expects {} attribute(s), got {}",
                def.attrs.len(),
                values.len()
            )));
        }
        let mut rows = self.rows.write();
        let stored = rows.entry(entity.to_string()).or_default();
        let row = stored.len() as u64;
        stored.push(values);
        Ok(Value::Ref {
            entity: entity.to_string(),
            row,
        })
    }

    /// Number of stored rows of one entity.
    #[must_use]
    pub fn row_count(&self, entity: &str) -> usize {
        self.rows.read().get(entity).map_or(0, Vec::len)
    }

    fn eval(
        &self,
        expr: &BackendExpr,
        refs: &[Value],
        ctx: &QueryContext,
    ) -> RuntimeResult<Value> {
        match expr {
            BackendExpr::Literal(value) => Ok(value.clone()),
            BackendExpr::Param(name) => ctx
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::MissingBinding { name: name.clone() }),
            BackendExpr::SourceRef { source } => Ok(refs[*source].clone()),
            BackendExpr::Attr { source, path } => {
                let mut value = refs[*source].clone();
                for segment in path {
                    value = read_field(self, &value, segment)?;
                }
                Ok(value)
            }
            BackendExpr::Comparison { left, op, right } => {
                let left = self.eval(left, refs, ctx)?;
                let right = self.eval(right, refs, ctx)?;
                Ok(Value::Bool(apply_comparison(*op, &left, &right)))
            }
            BackendExpr::Arithmetic { left, op, right } => {
                let left = self.eval(left, refs, ctx)?;
                let right = self.eval(right, refs, ctx)?;
                apply_arithmetic(*op, &left, &right)
            }
            BackendExpr::Logical { op, operands } => match op {
                LogicalOp::Not => {
                    let Some(operand) = operands.first() else {
                        return Err(RuntimeError::InvalidValue("empty negation".to_string()));
                    };
                    Ok(Value::Bool(!self.eval(operand, refs, ctx)?.as_bool()?))
                }
                LogicalOp::And => {
                    for operand in operands {
                        if !self.eval(operand, refs, ctx)?.as_bool()? {
                            return Ok(Value::Bool(false));
                        }
                    }
                    Ok(Value::Bool(true))
                }
                LogicalOp::Or => {
                    for operand in operands {
                        if self.eval(operand, refs, ctx)?.as_bool()? {
                            return Ok(Value::Bool(true));
                        }
                    }
                    Ok(Value::Bool(false))
                }
            },
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn execute(&self, query: &BackendQuery, ctx: &QueryContext) -> RuntimeResult<Vec<Vec<Value>>> {
        // Row counts are snapshotted up front; attribute reads re-lock per
        // access, which is fine for concurrent readers.
        let counts: Vec<usize> = {
            let rows = self.rows.read();
            query
                .entities
                .iter()
                .map(|(_, name)| rows.get(name).map_or(0, Vec::len))
                .collect()
        };
        if counts.iter().any(|&c| c == 0) {
            return Ok(Vec::new());
        }

        let offset = ctx.offset.unwrap_or(0);
        let mut skipped = 0;
        let mut out = Vec::new();
        // Cross product in declaration order: first source is the outermost
        // loop.
        let mut indices = vec![0usize; counts.len()];
        'product: loop {
            let refs: Vec<Value> = query
                .entities
                .iter()
                .zip(&indices)
                .map(|((_, name), &row)| Value::Ref {
                    entity: name.clone(),
                    row: row as u64,
                })
                .collect();

            let mut pass = true;
            for conjunct in &query.filter {
                if !self.eval(conjunct, &refs, ctx)?.as_bool()? {
                    pass = false;
                    break;
                }
            }
            if pass {
                if skipped < offset {
                    skipped += 1;
                } else {
                    let row = query
                        .fields
                        .iter()
                        .map(|f| self.eval(&f.expr, &refs, ctx))
                        .collect::<RuntimeResult<Vec<_>>>()?;
                    out.push(row);
                    if ctx.limit == Some(out.len()) {
                        break;
                    }
                }
            }

            for position in (0..indices.len()).rev() {
                indices[position] += 1;
                if indices[position] < counts[position] {
                    continue 'product;
                }
                indices[position] = 0;
            }
            break;
        }
        Ok(out)
    }

    fn fetch_attr(&self, entity: &str, row: u64, attr: &str) -> RuntimeResult<Value> {
        let Some(def) = self.catalog.entity(entity) else {
            return Err(RuntimeError::Backend(format!("unknown entity '{entity}'")));
        };
        let Some(index) = def.attrs.iter().position(|a| a.name == attr) else {
            return Err(RuntimeError::Backend(format!(
                "entity '{entity}' has no attribute '{attr}'"
            )));
        };
        let rows = self.rows.read();
        rows.get(entity)
            .and_then(|stored| stored.get(row as usize))
            .and_then(|values| values.get(index))
            .cloned()
            .ok_or_else(|| RuntimeError::Backend(format!("no row {row} in entity '{entity}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ComparisonOp;
    use crate::backend::BackendField;
    use crate::catalog::{AttrDef, EntityDef};
    use crate::types::Type;

    fn backend() -> MemoryBackend {
        let mut catalog = Catalog::new();
        catalog
            .define_entity(EntityDef::new(
                "user",
                vec![
                    AttrDef::new("name", Type::Text),
                    AttrDef::new("score", Type::Integer),
                ],
            ))
            .unwrap();
        let backend = MemoryBackend::new(Arc::new(catalog));
        for (name, score) in [("alice", 10), ("bob", 7), ("carol", 12)] {
            backend
                .insert("user", vec![Value::Text(name.into()), Value::Int(score)])
                .unwrap();
        }
        backend
    }

    fn name_and_score_query(filter: Vec<BackendExpr>) -> BackendQuery {
        BackendQuery {
            entities: vec![("user".into(), "user".into())],
            filter,
            fields: vec![
                BackendField {
                    expr: BackendExpr::Attr {
                        source: 0,
                        path: vec!["name".into()],
                    },
                },
                BackendField {
                    expr: BackendExpr::Attr {
                        source: 0,
                        path: vec!["score".into()],
                    },
                },
            ],
        }
    }

    #[test]
    fn test_filtered_scan() {
        let backend = backend();
        let query = name_and_score_query(vec![BackendExpr::Comparison {
            left: Box::new(BackendExpr::Attr {
                source: 0,
                path: vec!["score".into()],
            }),
            op: ComparisonOp::Gte,
            right: Box::new(BackendExpr::Literal(Value::Int(10))),
        }]);
        let rows = backend.execute(&query, &QueryContext::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Value::Text("alice".into()));
        assert_eq!(rows[1][0], Value::Text("carol".into()));
    }

    #[test]
    fn test_window_pushdown() {
        let backend = backend();
        let query = name_and_score_query(vec![]);
        let ctx = QueryContext {
            limit: Some(1),
            offset: Some(1),
            ..QueryContext::default()
        };
        let rows = backend.execute(&query, &ctx).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Value::Text("bob".into()));
    }

    #[test]
    fn test_missing_param() {
        let backend = backend();
        let query = name_and_score_query(vec![BackendExpr::Comparison {
            left: Box::new(BackendExpr::Attr {
                source: 0,
                path: vec!["score".into()],
            }),
            op: ComparisonOp::Eq,
            right: Box::new(BackendExpr::Param("threshold".into())),
        }]);
        let err = backend.execute(&query, &QueryContext::default()).unwrap_err();
        assert_eq!(err.code(), "missing_binding:threshold");
    }

    #[test]
    fn test_fetch_attr() {
        let backend = backend();
        assert_eq!(
            backend.fetch_attr("user", 1, "name").unwrap(),
            Value::Text("bob".into())
        );
        assert!(backend.fetch_attr("user", 9, "name").is_err());
    }
}
