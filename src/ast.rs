//! Abstract syntax tree for at-expressions.
//!
//! The crate does not ship a parser; the host language's frontend produces
//! these nodes and hands them to [`compile_at_expr`](crate::compile_at_expr).
//! Builder methods are provided so embedders and tests can assemble trees
//! without a parser.

use crate::types::{Type, Value};

/// Result multiplicity mode, fixed by the `@` / `@?` / `@+` / `@*` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Cardinality {
    /// `@` - exactly one row.
    One,
    /// `@?` - zero or one row.
    ZeroOrOne,
    /// `@+` - at least one row.
    OneOrMore,
    /// `@*` - any number of rows.
    Any,
}

impl Cardinality {
    /// Returns whether a result row count satisfies this cardinality.
    #[must_use]
    pub fn matches(self, count: usize) -> bool {
        match self {
            Cardinality::One => count == 1,
            Cardinality::ZeroOrOne => count <= 1,
            Cardinality::OneOrMore => count >= 1,
            Cardinality::Any => true,
        }
    }

    /// Returns whether the result is a list rather than a single value.
    #[must_use]
    pub fn many(self) -> bool {
        matches!(self, Cardinality::OneOrMore | Cardinality::Any)
    }
}

/// One entry of the from-clause.
#[derive(Debug, Clone)]
pub struct SourceItem {
    /// Explicit `name:` alias, if any.
    pub alias: Option<String>,
    /// The source expression.
    pub expr: SourceExpr,
}

/// What a from-clause entry refers to.
#[derive(Debug, Clone)]
pub enum SourceExpr {
    /// A persistent entity set, by entity name.
    Entity(String),
    /// An in-memory sequence produced by an expression.
    Iterable(Expr),
}

impl SourceItem {
    /// Unaliased entity source.
    #[must_use]
    pub fn entity(name: impl Into<String>) -> Self {
        SourceItem {
            alias: None,
            expr: SourceExpr::Entity(name.into()),
        }
    }

    /// Unaliased iterable source.
    #[must_use]
    pub fn iterable(expr: Expr) -> Self {
        SourceItem {
            alias: None,
            expr: SourceExpr::Iterable(expr),
        }
    }

    /// Attaches an explicit alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Sort direction of a `@sort` / `@sort_desc` annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Aggregate kind of a summarization annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AggregateKind {
    Sum,
    Min,
    Max,
}

impl AggregateKind {
    /// Annotation name for diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AggregateKind::Sum => "sum",
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
        }
    }
}

/// One column of the what-clause with its annotations.
#[derive(Debug, Clone)]
pub struct WhatItem {
    /// Explicit field alias.
    pub alias: Option<String>,
    /// Column expression.
    pub expr: Expr,
    /// `@omit` annotation.
    pub omit: bool,
    /// `@sort` / `@sort_desc` annotation.
    pub sort: Option<SortDirection>,
    /// `@group` annotation.
    pub group: bool,
    /// `@sum` / `@min` / `@max` annotation.
    pub aggregate: Option<AggregateKind>,
}

impl WhatItem {
    /// Plain output column.
    #[must_use]
    pub fn new(expr: Expr) -> Self {
        WhatItem {
            alias: None,
            expr,
            omit: false,
            sort: None,
            group: false,
            aggregate: None,
        }
    }

    /// Attaches an explicit field alias.
    #[must_use]
    pub fn named(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Marks the column `@omit`.
    #[must_use]
    pub fn omitted(mut self) -> Self {
        self.omit = true;
        self
    }

    /// Marks the column as a sort key.
    #[must_use]
    pub fn sorted(mut self, direction: SortDirection) -> Self {
        self.sort = Some(direction);
        self
    }

    /// Marks the column `@group`.
    #[must_use]
    pub fn grouped(mut self) -> Self {
        self.group = true;
        self
    }

    /// Marks the column with an aggregate annotation.
    #[must_use]
    pub fn aggregated(mut self, kind: AggregateKind) -> Self {
        self.aggregate = Some(kind);
        self
    }
}

/// A whole at-expression.
#[derive(Debug, Clone)]
pub struct AtExpr {
    /// From-clause sources, in declaration order.
    pub sources: Vec<SourceItem>,
    /// Cardinality token.
    pub cardinality: Cardinality,
    /// Where-clause terms, implicitly AND-ed.
    pub where_terms: Vec<Expr>,
    /// What-clause columns; `None` selects the source element itself.
    pub what: Option<Vec<WhatItem>>,
    /// `limit` expression.
    pub limit: Option<Expr>,
    /// `offset` expression.
    pub offset: Option<Expr>,
}

impl AtExpr {
    /// At-expression over the given sources with empty where/what clauses.
    #[must_use]
    pub fn new(sources: Vec<SourceItem>, cardinality: Cardinality) -> Self {
        AtExpr {
            sources,
            cardinality,
            where_terms: Vec::new(),
            what: None,
            limit: None,
            offset: None,
        }
    }

    /// Adds a where-term.
    #[must_use]
    pub fn filter(mut self, term: Expr) -> Self {
        self.where_terms.push(term);
        self
    }

    /// Sets the what-clause.
    #[must_use]
    pub fn select(mut self, items: Vec<WhatItem>) -> Self {
        self.what = Some(items);
        self
    }

    /// Sets the limit expression.
    #[must_use]
    pub fn limit(mut self, expr: Expr) -> Self {
        self.limit = Some(expr);
        self
    }

    /// Sets the offset expression.
    #[must_use]
    pub fn offset(mut self, expr: Expr) -> Self {
        self.offset = Some(expr);
        self
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ComparisonOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// Expression tree handed in by the host language's frontend.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Literal constant.
    Literal(Value),
    /// List literal, e.g. `[1,2,3]`; the element type annotation is
    /// required when the literal is empty.
    ListLiteral {
        elem: Option<Type>,
        items: Vec<Expr>,
    },
    /// Simple name: local variable or source alias, resolved by the binder.
    Name(String),
    /// The `$` placeholder.
    Placeholder,
    /// Implicit attribute access `.name`.
    ImplicitAttr(String),
    /// Member access `base.name`.
    Member(Box<Expr>, String),
    /// Comparison.
    Comparison(Box<Expr>, ComparisonOp, Box<Expr>),
    /// Arithmetic.
    Arithmetic(Box<Expr>, ArithmeticOp, Box<Expr>),
    /// Logical combination; `Not` takes a single operand.
    Logical(LogicalOp, Vec<Expr>),
    /// Host function call.
    Call(String, Vec<Expr>),
    /// Nested at-expression.
    At(Box<AtExpr>),
}

impl Expr {
    /// Integer literal shorthand.
    #[must_use]
    pub fn int(v: i64) -> Self {
        Expr::Literal(Value::Int(v))
    }

    /// Text literal shorthand.
    #[must_use]
    pub fn text(v: impl Into<String>) -> Self {
        Expr::Literal(Value::Text(v.into()))
    }

    /// Boolean literal shorthand.
    #[must_use]
    pub fn bool(v: bool) -> Self {
        Expr::Literal(Value::Bool(v))
    }

    /// Name reference shorthand.
    #[must_use]
    pub fn name(n: impl Into<String>) -> Self {
        Expr::Name(n.into())
    }

    /// List literal of integers, the common test fixture shape.
    #[must_use]
    pub fn int_list(items: &[i64]) -> Self {
        Expr::ListLiteral {
            elem: Some(Type::Integer),
            items: items.iter().copied().map(Expr::int).collect(),
        }
    }

    /// List literal with inferred element type.
    #[must_use]
    pub fn list(items: Vec<Expr>) -> Self {
        Expr::ListLiteral { elem: None, items }
    }

    /// Comparison shorthand.
    #[must_use]
    pub fn cmp(self, op: ComparisonOp, rhs: Expr) -> Self {
        Expr::Comparison(Box::new(self), op, Box::new(rhs))
    }

    /// Arithmetic shorthand.
    #[must_use]
    pub fn arith(self, op: ArithmeticOp, rhs: Expr) -> Self {
        Expr::Arithmetic(Box::new(self), op, Box::new(rhs))
    }

    /// Member access shorthand.
    #[must_use]
    pub fn member(self, name: impl Into<String>) -> Self {
        Expr::Member(Box::new(self), name.into())
    }
}
