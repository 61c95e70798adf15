//! Plan execution.
//!
//! The [`Executor`] runs a compiled [`Plan`] against a storage backend and
//! a set of runtime [`Bindings`], producing one [`Value`] shaped by the
//! plan's cardinality. Row production follows a fixed order: filter, offset,
//! field evaluation, summarization, sorting, limit window, cardinality
//! check.

mod collect;
mod eval;

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::Cardinality;
use crate::backend::{QueryContext, StorageBackend};
use crate::binder::{FromRoot, RowShape, Summarization};
use crate::error::{RuntimeError, RuntimeResult};
use crate::planner::{EvalStrategy, Plan};
use crate::types::Value;

use collect::Collector;
use eval::{EvalContext, FrameValues};

pub(crate) use eval::{apply_arithmetic, apply_comparison, read_field};

/// A host function callable from compiled expressions.
pub type HostFn = Arc<dyn Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync>;

/// Runtime values for the locals and host functions the plan was compiled
/// against.
#[derive(Clone, Default)]
pub struct Bindings {
    locals: HashMap<String, Value>,
    fns: HashMap<String, HostFn>,
}

impl Bindings {
    /// Creates empty bindings.
    #[must_use]
    pub fn new() -> Self {
        Bindings::default()
    }

    /// Adds a local variable value.
    #[must_use]
    pub fn with_local(mut self, name: impl Into<String>, value: Value) -> Self {
        self.locals.insert(name.into(), value);
        self
    }

    /// Adds a host function implementation.
    #[must_use]
    pub fn with_fn(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.fns.insert(name.into(), Arc::new(f));
        self
    }

    /// Looks up a local variable value.
    #[must_use]
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    /// Looks up a host function.
    #[must_use]
    pub fn host_fn(&self, name: &str) -> Option<&HostFn> {
        self.fns.get(name)
    }

    fn params(&self) -> HashMap<String, Value> {
        self.locals.clone()
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("locals", &self.locals)
            .field("fns", &self.fns.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Execution guards.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on collected rows per at-expression.
    pub max_rows: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig { max_rows: 1_000_000 }
    }
}

/// Executes compiled plans.
pub struct Executor<'a> {
    backend: &'a dyn StorageBackend,
    bindings: &'a Bindings,
    config: ExecutorConfig,
}

impl<'a> Executor<'a> {
    /// Creates an executor with default guards.
    #[must_use]
    pub fn new(backend: &'a dyn StorageBackend, bindings: &'a Bindings) -> Self {
        Executor {
            backend,
            bindings,
            config: ExecutorConfig::default(),
        }
    }

    /// Replaces the execution guards.
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs a plan to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeError`] for cardinality violations, negative
    /// limit/offset values, missing bindings, and backend failures.
    pub fn execute(&self, plan: &Plan) -> RuntimeResult<Value> {
        EvalContext::new(self.backend, self.bindings, &self.config).execute_plan(plan)
    }
}

impl EvalContext<'_> {
    pub(crate) fn execute_plan(&mut self, plan: &Plan) -> RuntimeResult<Value> {
        let limit = self.eval_window(plan.limit.as_ref(), "limit")?;
        let offset = self.eval_window(plan.offset.as_ref(), "offset")?;

        // A zero limit never produces rows, whatever the sources hold.
        let rows = if limit == Some(0) {
            Vec::new()
        } else {
            self.produce_rows(plan, limit, offset)?
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(decode_row(plan, row));
        }

        let count = records.len();
        if !plan.cardinality.matches(count) {
            return Err(RuntimeError::WrongCount { count });
        }
        Ok(match plan.cardinality {
            Cardinality::One | Cardinality::ZeroOrOne => records.pop().unwrap_or(Value::Null),
            Cardinality::OneOrMore | Cardinality::Any => Value::List(records),
        })
    }

    fn produce_rows(
        &mut self,
        plan: &Plan,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> RuntimeResult<Vec<Vec<Value>>> {
        // The limit window may only cut off collection when no sorting or
        // summarization could still reorder or merge rows.
        let early =
            plan.what.sorting.is_empty() && plan.what.summarization == Summarization::None;

        match &plan.strategy {
            EvalStrategy::Backend(query) => {
                // In the early case the window is pushed to the backend.
                let ctx = QueryContext {
                    params: self.bindings.params(),
                    limit: if early { limit } else { None },
                    offset: if early { offset } else { None },
                };
                let mut collector = Collector::new(
                    &plan.what,
                    if early { None } else { limit },
                    if early { None } else { offset },
                    self.config.max_rows,
                );
                for row in self.backend.execute(query, &ctx)? {
                    collector.add_row(row)?;
                }
                Ok(collector.finish())
            }
            EvalStrategy::Host => {
                let FromRoot::Iterable(source) = &plan.root else {
                    return Err(RuntimeError::InvalidValue(
                        "host plan without an iterable source".to_string(),
                    ));
                };
                let Value::List(items) = self.eval(source)? else {
                    return Err(RuntimeError::InvalidValue(
                        "iterable source did not produce a list".to_string(),
                    ));
                };

                let mut collector =
                    Collector::new(&plan.what, limit, offset, self.config.max_rows);
                for item in items {
                    if !collector.wants_more() {
                        break;
                    }
                    self.frames.push(FrameValues {
                        at_id: plan.at_id,
                        values: vec![item],
                    });
                    let step = self.collect_row(plan, &mut collector);
                    self.frames.pop();
                    step?;
                }
                Ok(collector.finish())
            }
        }
    }

    /// Filter, offset, then field evaluation for one source element.
    fn collect_row(&mut self, plan: &Plan, collector: &mut Collector) -> RuntimeResult<()> {
        for term in &plan.where_terms {
            if !self.eval(term)?.as_bool()? {
                return Ok(());
            }
        }
        if !collector.pass_offset() {
            return Ok(());
        }
        let row = plan
            .what
            .fields
            .iter()
            .map(|f| self.eval(&f.expr))
            .collect::<RuntimeResult<Vec<_>>>()?;
        collector.add_row(row)
    }

    fn eval_window(
        &mut self,
        expr: Option<&crate::binder::BoundExpression>,
        clause: &'static str,
    ) -> RuntimeResult<Option<usize>> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        let value = self.eval(expr)?.as_int()?;
        if value < 0 {
            return Err(RuntimeError::NegativeBound { clause, value });
        }
        #[allow(clippy::cast_sign_loss)]
        Ok(Some(value as usize))
    }
}

/// Shapes one collected row into a result record.
fn decode_row(plan: &Plan, mut row: Vec<Value>) -> Value {
    match plan.what.shape {
        RowShape::Simple => {
            let index = plan.what.selected[0];
            row.swap_remove(index)
        }
        RowShape::Tuple => Value::Tuple(
            plan.what
                .selected
                .iter()
                .map(|&i| row[i].clone())
                .collect(),
        ),
    }
}
