//! Host-side expression evaluation.
//!
//! [`EvalContext`] carries the stack of current source elements, one frame
//! per at-expression being evaluated, so correlated subqueries can read the
//! enclosing element. Entity references are dereferenced through the
//! storage backend.

use std::cmp::Ordering;

use crate::ast::{ArithmeticOp, ComparisonOp, LogicalOp};
use crate::backend::StorageBackend;
use crate::binder::BoundExpression;
use crate::error::{RuntimeError, RuntimeResult};
use crate::executor::{Bindings, ExecutorConfig};
use crate::types::Value;

/// Current source elements of one at-expression under evaluation.
pub(crate) struct FrameValues {
    pub(crate) at_id: usize,
    /// One element per source, in declaration order.
    pub(crate) values: Vec<Value>,
}

pub(crate) struct EvalContext<'a> {
    pub(crate) backend: &'a dyn StorageBackend,
    pub(crate) bindings: &'a Bindings,
    pub(crate) config: &'a ExecutorConfig,
    pub(crate) frames: Vec<FrameValues>,
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(
        backend: &'a dyn StorageBackend,
        bindings: &'a Bindings,
        config: &'a ExecutorConfig,
    ) -> Self {
        EvalContext {
            backend,
            bindings,
            config,
            frames: Vec::new(),
        }
    }

    pub(crate) fn eval(&mut self, expr: &BoundExpression) -> RuntimeResult<Value> {
        match expr {
            BoundExpression::Literal { value, .. } => Ok(value.clone()),
            BoundExpression::ListLiteral { items, .. } => {
                let values = items
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<RuntimeResult<_>>()?;
                Ok(Value::List(values))
            }
            BoundExpression::Local { name, .. } => self
                .bindings
                .local(name)
                .cloned()
                .ok_or_else(|| RuntimeError::MissingBinding { name: name.clone() }),
            BoundExpression::SourceRef { at_id, source, .. } => {
                Ok(self.frame_value(*at_id, *source)?.clone())
            }
            BoundExpression::Attr { at_id, attr } => {
                let mut value = self.frame_value(*at_id, attr.source)?.clone();
                for segment in &attr.path {
                    value = read_field(self.backend, &value, segment)?;
                }
                Ok(value)
            }
            BoundExpression::Member { base, name, .. } => {
                let value = self.eval(base)?;
                read_field(self.backend, &value, name)
            }
            BoundExpression::Comparison { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(Value::Bool(apply_comparison(*op, &left, &right)))
            }
            BoundExpression::Arithmetic { left, op, right, .. } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                apply_arithmetic(*op, &left, &right)
            }
            BoundExpression::Logical { op, operands } => self.eval_logical(*op, operands),
            BoundExpression::Call { name, args, .. } => {
                let Some(host_fn) = self.bindings.host_fn(name) else {
                    return Err(RuntimeError::HostFunction(format!(
                        "function '{name}' is not bound"
                    )));
                };
                let values: Vec<Value> = args
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<RuntimeResult<_>>()?;
                host_fn(&values)
            }
            BoundExpression::Subquery { plan } => self.execute_plan(plan),
        }
    }

    fn eval_logical(&mut self, op: LogicalOp, operands: &[BoundExpression]) -> RuntimeResult<Value> {
        match op {
            LogicalOp::Not => {
                let Some(operand) = operands.first() else {
                    return Err(RuntimeError::InvalidValue("empty negation".to_string()));
                };
                let value = self.eval(operand)?.as_bool()?;
                Ok(Value::Bool(!value))
            }
            LogicalOp::And => {
                for operand in operands {
                    if !self.eval(operand)?.as_bool()? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            LogicalOp::Or => {
                for operand in operands {
                    if self.eval(operand)?.as_bool()? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
        }
    }

    fn frame_value(&self, at_id: usize, source: usize) -> RuntimeResult<&Value> {
        self.frames
            .iter()
            .rev()
            .find(|f| f.at_id == at_id)
            .and_then(|f| f.values.get(source))
            .ok_or_else(|| {
                RuntimeError::InvalidValue(format!("unbound source {source} of frame {at_id}"))
            })
    }
}

/// Reads one named field of a value: a struct field directly, an entity
/// reference through the backend.
pub(crate) fn read_field(
    backend: &dyn StorageBackend,
    value: &Value,
    name: &str,
) -> RuntimeResult<Value> {
    match value {
        Value::Struct { .. } => value.struct_field(name).cloned().ok_or_else(|| {
            RuntimeError::InvalidValue(format!("no field '{name}' in {}", value.kind_name()))
        }),
        Value::Ref { entity, row } => backend.fetch_attr(entity, *row, name),
        other => Err(RuntimeError::InvalidValue(format!(
            "cannot read field '{name}' of {}",
            other.kind_name()
        ))),
    }
}

/// Applies a comparison operator using the total value order.
pub(crate) fn apply_comparison(op: ComparisonOp, left: &Value, right: &Value) -> bool {
    let ord = left.compare(right);
    match op {
        ComparisonOp::Eq => ord == Ordering::Equal,
        ComparisonOp::Neq => ord != Ordering::Equal,
        ComparisonOp::Lt => ord == Ordering::Less,
        ComparisonOp::Lte => ord != Ordering::Greater,
        ComparisonOp::Gt => ord == Ordering::Greater,
        ComparisonOp::Gte => ord != Ordering::Less,
    }
}

/// Applies an arithmetic operator.
pub(crate) fn apply_arithmetic(
    op: ArithmeticOp,
    left: &Value,
    right: &Value,
) -> RuntimeResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b),
        (Value::Text(a), Value::Text(b)) if op == ArithmeticOp::Add => {
            Ok(Value::Text(format!("{a}{b}")))
        }
        (Value::Int(_) | Value::Decimal(_), Value::Int(_) | Value::Decimal(_)) => {
            let a = as_decimal(left);
            let b = as_decimal(right);
            decimal_arithmetic(op, a, b)
        }
        (a, b) => Err(RuntimeError::InvalidValue(format!(
            "cannot apply arithmetic to {} and {}",
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

fn as_decimal(value: &Value) -> f64 {
    match value {
        Value::Int(v) => *v as f64,
        Value::Decimal(v) => *v,
        _ => f64::NAN,
    }
}

fn int_arithmetic(op: ArithmeticOp, a: i64, b: i64) -> RuntimeResult<Value> {
    let result = match op {
        ArithmeticOp::Add => a.checked_add(b),
        ArithmeticOp::Sub => a.checked_sub(b),
        ArithmeticOp::Mul => a.checked_mul(b),
        ArithmeticOp::Div => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a.checked_div(b)
        }
        ArithmeticOp::Mod => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a.checked_rem(b)
        }
    };
    result
        .map(Value::Int)
        .ok_or_else(|| RuntimeError::InvalidValue("integer overflow".to_string()))
}

fn decimal_arithmetic(op: ArithmeticOp, a: f64, b: f64) -> RuntimeResult<Value> {
    if matches!(op, ArithmeticOp::Div | ArithmeticOp::Mod) && b == 0.0 {
        return Err(RuntimeError::DivisionByZero);
    }
    let result = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Sub => a - b,
        ArithmeticOp::Mul => a * b,
        ArithmeticOp::Div => a / b,
        ArithmeticOp::Mod => a % b,
    };
    Ok(Value::Decimal(result))
}
