//! Error types for at-expression compilation and execution.
//!
//! The two enums are deliberately disjoint: [`CompileError`] is produced
//! while turning an AST into a [`Plan`](crate::planner::Plan) and is always
//! static, [`RuntimeError`] is produced while executing a plan. A failed
//! compilation never yields a partially usable plan, and a failed execution
//! never yields a partial result.

use thiserror::Error;

use crate::types::Type;

/// Result type alias for compilation.
pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Result type alias for execution.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Static errors reported while compiling a single at-expression.
///
/// Every variant carries a stable diagnostic code (see [`CompileError::code`])
/// that tests and embedding compilers match on instead of the display text.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    /// Entity and iterable sources in the same from-clause.
    #[error("Cannot mix entities and collections in at-expression")]
    MixedSources,

    /// More than one iterable source.
    #[error("Only one collection is allowed in at-expression, got {count}")]
    ManyIterables { count: usize },

    /// Two sources resolved to the same alias.
    #[error("Duplicate source alias: '{alias}'")]
    DuplicateAlias { alias: String },

    /// Two catalog definitions share a name.
    #[error("Duplicate definition: '{name}'")]
    DuplicateDefinition { name: String },

    /// A source alias shadows a local variable or an enclosing alias.
    #[error("Alias '{alias}' conflicts with another name in scope")]
    ConflictAlias { alias: String },

    /// Unknown entity name in the from-clause.
    #[error("Unknown entity: '{name}'")]
    UnknownEntity { name: String },

    /// Unknown local variable reference.
    #[error("Unknown name: '{name}'")]
    UnknownName { name: String },

    /// Unknown attribute on a source or member access.
    #[error("Type {owner} has no attribute '{attr}'")]
    UnknownAttribute { owner: String, attr: String },

    /// A bare-name where-term matched nothing by name or by type.
    #[error("No attribute matches name '{name}' or type {ty}")]
    VarNoAttrs { name: String, ty: Type },

    /// Type-based attribute matching found several candidates.
    ///
    /// Candidates are `source.attr` strings in source-declaration order.
    #[error("Multiple attributes match type {ty}: {}", candidates.join(", "))]
    AttrTypeAmbig { ty: Type, candidates: Vec<String> },

    /// Name-based attribute matching found several candidates.
    #[error("Multiple attributes match name '{name}': {}", candidates.join(", "))]
    AttrNameAmbig { name: String, candidates: Vec<String> },

    /// A where-term that references this at-expression has a non-boolean type.
    #[error("Wrong type of where-expression #{}: {ty}, expected boolean", index + 1)]
    WhereTermType { index: usize, ty: Type },

    /// A nameless where-term matched no attribute by type.
    #[error("No attribute matches type of where-expression #{} ({ty})", index + 1)]
    WhereTypeNoAttrs { index: usize, ty: Type },

    /// Placeholder used where no source offers one.
    #[error("Placeholder not defined")]
    PlaceholderNone,

    /// Placeholder offered by more than one enclosing at-expression.
    #[error("Placeholder is ambiguous, can belong to more than one expression; use aliases")]
    PlaceholderAmbiguous,

    /// Non-aggregate column in a grouped what-clause.
    #[error("What-expression #{} must be annotated with @group or an aggregate", index + 1)]
    GroupRequired { index: usize },

    /// Aggregate annotation on a type that cannot be aggregated.
    #[error("Aggregate {kind} is not applicable to type {ty}")]
    AggregateBadType { kind: &'static str, ty: Type },

    /// Group annotation on a type that cannot be a group key.
    #[error("Type {ty} cannot be used for grouping")]
    GroupBadType { ty: Type },

    /// Sort annotation on an unorderable type.
    #[error("Type {ty} is not sortable")]
    SortBadType { ty: Type },

    /// Every what-column was omitted.
    #[error("All fields are excluded from the result")]
    NoFields,

    /// Two what-columns share an explicit alias.
    #[error("Duplicate field name: '{name}'")]
    DupFieldName { name: String },

    /// An expression over backend-resident sources cannot be pushed down.
    #[error("Expression cannot be converted to a database query")]
    NotSqlCompatible,

    /// A host-only function call over backend-resident sources.
    #[error("Function '{name}' cannot be converted to a database query")]
    CallNotSql { name: String },

    /// Limit or offset expression has a non-integer type.
    #[error("Wrong {clause} type: {ty}, expected integer")]
    LimitType { clause: &'static str, ty: Type },

    /// General type mismatch in an expression.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: Type, actual: Type },

    /// Literal value kind not expressible in expressions.
    #[error("Literal of kind {kind} is not allowed here")]
    BadLiteral { kind: &'static str },

    /// Wrong number of arguments to a host function.
    #[error("Function '{name}' expects {expected} argument(s), got {actual}")]
    ArgCount {
        name: String,
        expected: usize,
        actual: usize,
    },
}

impl CompileError {
    /// Stable diagnostic code for this error.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            CompileError::MixedSources => "mix_entity_iterable".into(),
            CompileError::ManyIterables { count } => format!("many_iterables:{count}"),
            CompileError::DuplicateAlias { alias } => format!("dup_alias:{alias}"),
            CompileError::DuplicateDefinition { name } => format!("dup_def:{name}"),
            CompileError::ConflictAlias { alias } => format!("conflict_alias:{alias}"),
            CompileError::UnknownEntity { name } => format!("unknown_entity:{name}"),
            CompileError::UnknownName { name } => format!("unknown_name:{name}"),
            CompileError::UnknownAttribute { owner, attr } => {
                format!("unknown_member:{owner}:{attr}")
            }
            CompileError::VarNoAttrs { name, ty } => format!("var_noattrs:{name}:{ty}"),
            CompileError::AttrTypeAmbig { ty, .. } => format!("attr_type_ambig:{ty}"),
            CompileError::AttrNameAmbig { name, .. } => format!("attr_name_ambig:{name}"),
            CompileError::WhereTermType { index, ty } => format!("at_where:type:{index}:{ty}"),
            CompileError::WhereTypeNoAttrs { index, ty } => format!("at_where_type:{index}:{ty}"),
            CompileError::PlaceholderNone => "placeholder:none".into(),
            CompileError::PlaceholderAmbiguous => "placeholder:ambiguous".into(),
            CompileError::GroupRequired { index } => format!("at:expr:group:{index}"),
            CompileError::AggregateBadType { kind, ty } => {
                format!("at:what:aggr:bad_type:{kind}:{ty}")
            }
            CompileError::GroupBadType { ty } => format!("at:what:group:bad_type:{ty}"),
            CompileError::SortBadType { ty } => format!("at:what:sort:bad_type:{ty}"),
            CompileError::NoFields => "at:no_fields".into(),
            CompileError::DupFieldName { name } => format!("dup_field_name:{name}"),
            CompileError::NotSqlCompatible => "expr_sqlnotallowed".into(),
            CompileError::CallNotSql { name } => format!("expr_call_nosql:{name}"),
            CompileError::LimitType { clause, ty } => format!("expr_at_{clause}_type:{ty}"),
            CompileError::TypeMismatch { .. } => "type_mismatch".into(),
            CompileError::BadLiteral { kind } => format!("bad_literal:{kind}"),
            CompileError::ArgCount { name, .. } => format!("fn_arg_count:{name}"),
        }
    }
}

/// Dynamic errors reported while executing a compiled plan.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    /// Row count after limit/offset violates the cardinality.
    #[error("{}", if *count == 0 { "No records found".to_string() } else { format!("Multiple records found: {count}") })]
    WrongCount { count: usize },

    /// Negative limit or offset value.
    #[error("Negative {clause}: {value}")]
    NegativeBound { clause: &'static str, value: i64 },

    /// The storage backend failed to execute the query.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A runtime binding named at compile time is missing.
    #[error("Missing runtime binding: '{name}'")]
    MissingBinding { name: String },

    /// A host function failed or was not supplied.
    #[error("Host function error: {0}")]
    HostFunction(String),

    /// Division by zero in expression evaluation.
    #[error("Division by zero")]
    DivisionByZero,

    /// A value had a shape the evaluator cannot process.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The configured row-count guard was exceeded.
    #[error("Row limit exceeded: more than {limit} rows collected")]
    RowLimitExceeded { limit: usize },
}

impl RuntimeError {
    /// Stable diagnostic code for this error.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            RuntimeError::WrongCount { count } => format!("wrong_count:{count}"),
            RuntimeError::NegativeBound { clause, value } => {
                format!("expr:at:{clause}:negative:{value}")
            }
            RuntimeError::Backend(_) => "backend".into(),
            RuntimeError::MissingBinding { name } => format!("missing_binding:{name}"),
            RuntimeError::HostFunction(_) => "host_fn".into(),
            RuntimeError::DivisionByZero => "div0".into(),
            RuntimeError::InvalidValue(_) => "invalid_value".into(),
            RuntimeError::RowLimitExceeded { .. } => "row_limit".into(),
        }
    }
}
