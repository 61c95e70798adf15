//! End-to-end runs against the in-memory backend: compile, plan, execute.

use std::sync::Arc;

use atquery::ast::{AggregateKind, SortDirection};
use atquery::executor::ExecutorConfig;
use atquery::{
    compile_at_expr, execute_at_expr, AtExpr, AttrDef, Bindings, Cardinality, Catalog,
    ComparisonOp, EntityDef, Executor, Expr, FnSig, MemoryBackend, Scope, SourceItem, Type,
    Value, WhatItem,
};

fn attr(name: &str) -> Expr {
    Expr::ImplicitAttr(name.into())
}

fn texts(values: &[&str]) -> Value {
    Value::List(values.iter().map(|v| Value::Text((*v).into())).collect())
}

fn setup() -> (Arc<Catalog>, MemoryBackend) {
    let mut catalog = Catalog::new();
    catalog
        .define_entity(EntityDef::new(
            "company",
            vec![
                AttrDef::new("name", Type::Text),
                AttrDef::new("city", Type::Text),
            ],
        ))
        .unwrap();
    catalog
        .define_entity(EntityDef::new(
            "user",
            vec![
                AttrDef::new("name", Type::Text),
                AttrDef::new("score", Type::Integer),
                AttrDef::new("employer", Type::Entity("company".into())),
            ],
        ))
        .unwrap();
    catalog
        .define_entity(EntityDef::new(
            "sale",
            vec![
                AttrDef::new("region", Type::Text),
                AttrDef::new("amount", Type::Integer),
            ],
        ))
        .unwrap();
    let catalog = Arc::new(catalog);
    let backend = MemoryBackend::new(Arc::clone(&catalog));

    let acme = backend
        .insert("company", vec![Value::from("acme"), Value::from("paris")])
        .unwrap();
    let globex = backend
        .insert("company", vec![Value::from("globex"), Value::from("london")])
        .unwrap();
    for (name, score, employer) in [
        ("alice", 10, acme.clone()),
        ("bob", 7, globex),
        ("carol", 12, acme),
    ] {
        backend
            .insert("user", vec![Value::from(name), Value::from(score), employer])
            .unwrap();
    }
    for (region, amount) in [("east", 3), ("west", 10), ("east", 4), ("north", 1), ("west", 2)] {
        backend
            .insert("sale", vec![Value::from(region), Value::from(amount)])
            .unwrap();
    }
    (catalog, backend)
}

fn run(
    catalog: &Catalog,
    backend: &MemoryBackend,
    scope: &Scope,
    bindings: &Bindings,
    at: &AtExpr,
) -> Result<Value, atquery::RuntimeError> {
    let plan = compile_at_expr(catalog, scope, at).expect("compile");
    execute_at_expr(&plan, backend, bindings)
}

#[test]
fn test_filter_and_select() {
    let (catalog, backend) = setup();
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .filter(attr("score").cmp(ComparisonOp::Gte, Expr::int(10)))
        .select(vec![WhatItem::new(attr("name"))]);
    let result = run(&catalog, &backend, &Scope::new(), &Bindings::new(), &at).unwrap();
    assert_eq!(result, texts(&["alice", "carol"]));
}

#[test]
fn test_bare_name_filter_through_reference() {
    // `city` resolves one hop away, through user.employer, and the local's
    // value arrives as a query parameter.
    let (catalog, backend) = setup();
    let scope = Scope::new().with_local("city", Type::Text);
    let bindings = Bindings::new().with_local("city", Value::from("paris"));
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .filter(Expr::name("city"))
        .select(vec![WhatItem::new(attr("name"))]);
    let result = run(&catalog, &backend, &scope, &bindings, &at).unwrap();
    assert_eq!(result, texts(&["alice", "carol"]));
}

#[test]
fn test_group_and_sum_with_sort() {
    let (catalog, backend) = setup();
    let at = AtExpr::new(vec![SourceItem::entity("sale")], Cardinality::Any).select(vec![
        WhatItem::new(attr("region")).grouped(),
        WhatItem::new(attr("amount"))
            .aggregated(AggregateKind::Sum)
            .sorted(SortDirection::Desc),
    ]);
    let result = run(&catalog, &backend, &Scope::new(), &Bindings::new(), &at).unwrap();
    assert_eq!(
        result,
        Value::List(vec![
            Value::Tuple(vec![Value::from("west"), Value::Int(12)]),
            Value::Tuple(vec![Value::from("east"), Value::Int(7)]),
            Value::Tuple(vec![Value::from("north"), Value::Int(1)]),
        ])
    );
}

#[test]
fn test_group_order_is_first_seen_without_sort() {
    let (catalog, backend) = setup();
    let at = AtExpr::new(vec![SourceItem::entity("sale")], Cardinality::Any)
        .select(vec![WhatItem::new(attr("region")).grouped()]);
    let result = run(&catalog, &backend, &Scope::new(), &Bindings::new(), &at).unwrap();
    assert_eq!(result, texts(&["east", "west", "north"]));
}

#[test]
fn test_whole_set_aggregation() {
    let (catalog, backend) = setup();
    let at = AtExpr::new(vec![SourceItem::entity("sale")], Cardinality::One).select(vec![
        WhatItem::new(attr("amount")).aggregated(AggregateKind::Sum),
        WhatItem::new(attr("amount")).aggregated(AggregateKind::Max),
    ]);
    let result = run(&catalog, &backend, &Scope::new(), &Bindings::new(), &at).unwrap();
    assert_eq!(result, Value::Tuple(vec![Value::Int(20), Value::Int(10)]));

    // Over an empty input the sum is zero and min/max are null.
    let at = AtExpr::new(vec![SourceItem::entity("sale")], Cardinality::One)
        .filter(attr("amount").cmp(ComparisonOp::Gt, Expr::int(100)))
        .select(vec![
            WhatItem::new(attr("amount")).aggregated(AggregateKind::Sum),
            WhatItem::new(attr("amount")).aggregated(AggregateKind::Min),
        ]);
    let result = run(&catalog, &backend, &Scope::new(), &Bindings::new(), &at).unwrap();
    assert_eq!(result, Value::Tuple(vec![Value::Int(0), Value::Null]));
}

#[test]
fn test_zero_or_one_results() {
    let (catalog, backend) = setup();
    let by_name = |name: &str| {
        AtExpr::new(vec![SourceItem::entity("user")], Cardinality::ZeroOrOne)
            .filter(attr("name").cmp(ComparisonOp::Eq, Expr::text(name)))
            .select(vec![WhatItem::new(attr("score"))])
    };
    let result = run(
        &catalog,
        &backend,
        &Scope::new(),
        &Bindings::new(),
        &by_name("bob"),
    )
    .unwrap();
    assert_eq!(result, Value::Int(7));
    let result = run(
        &catalog,
        &backend,
        &Scope::new(),
        &Bindings::new(),
        &by_name("zed"),
    )
    .unwrap();
    assert_eq!(result, Value::Null);
}

#[test]
fn test_cardinality_failure_reports_row_count() {
    let (catalog, backend) = setup();
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::One)
        .select(vec![WhatItem::new(attr("name"))]);
    let err = run(&catalog, &backend, &Scope::new(), &Bindings::new(), &at).unwrap_err();
    assert_eq!(err.code(), "wrong_count:3");
}

#[test]
fn test_negative_bounds_are_runtime_errors() {
    let (catalog, backend) = setup();
    let scope = Scope::new().with_local("n", Type::Integer);
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .select(vec![WhatItem::new(attr("name"))])
        .limit(Expr::name("n"));
    let bindings = Bindings::new().with_local("n", Value::Int(-2));
    let err = run(&catalog, &backend, &scope, &bindings, &at).unwrap_err();
    assert_eq!(err.code(), "expr:at:limit:negative:-2");

    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .select(vec![WhatItem::new(attr("name"))])
        .offset(Expr::name("n"));
    let bindings = Bindings::new().with_local("n", Value::Int(-1));
    let err = run(&catalog, &backend, &scope, &bindings, &at).unwrap_err();
    assert_eq!(err.code(), "expr:at:offset:negative:-1");
}

#[test]
fn test_limit_and_offset_window() {
    let (catalog, backend) = setup();
    let names = |at: &AtExpr| {
        run(&catalog, &backend, &Scope::new(), &Bindings::new(), at).unwrap()
    };
    let base = || {
        AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
            .select(vec![WhatItem::new(attr("name"))])
    };
    assert_eq!(names(&base().limit(Expr::int(2))), texts(&["alice", "bob"]));
    assert_eq!(names(&base().offset(Expr::int(1))), texts(&["bob", "carol"]));
    assert_eq!(
        names(&base().limit(Expr::int(1)).offset(Expr::int(1))),
        texts(&["bob"])
    );
}

#[test]
fn test_row_guard_stops_runaway_queries() {
    let (catalog, backend) = setup();
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .select(vec![WhatItem::new(attr("name")).sorted(SortDirection::Asc).named("name")]);
    let plan = compile_at_expr(&catalog, &Scope::new(), &at).unwrap();
    let bindings = Bindings::new();
    let executor =
        Executor::new(&backend, &bindings).with_config(ExecutorConfig { max_rows: 2 });
    let err = executor.execute(&plan).unwrap_err();
    assert_eq!(err.code(), "row_limit");
}

#[test]
fn test_missing_parameter_binding() {
    let (catalog, backend) = setup();
    let scope = Scope::new().with_local("city", Type::Text);
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .filter(Expr::name("city"))
        .select(vec![WhatItem::new(attr("name"))]);
    let err = run(&catalog, &backend, &scope, &Bindings::new(), &at).unwrap_err();
    assert_eq!(err.code(), "missing_binding:city");
}

#[test]
fn test_struct_elements_over_iterable() {
    use atquery::StructDef;

    let mut catalog = Catalog::new();
    catalog
        .define_struct(StructDef::new(
            "point",
            vec![
                AttrDef::new("x", Type::Integer),
                AttrDef::new("y", Type::Integer),
            ],
        ))
        .unwrap();
    let catalog = Arc::new(catalog);
    let backend = MemoryBackend::new(Arc::clone(&catalog));

    let point = |x: i64, y: i64| Value::Struct {
        name: "point".into(),
        fields: vec![("x".into(), Value::Int(x)), ("y".into(), Value::Int(y))],
    };
    let scope = Scope::new().with_local(
        "points",
        Type::Struct("point".into()).list_of(),
    );
    let bindings = Bindings::new().with_local(
        "points",
        Value::List(vec![point(1, 4), point(-2, 5), point(3, 0)]),
    );

    // points @* { .x > 0 } ( .y )
    let at = AtExpr::new(
        vec![SourceItem::iterable(Expr::name("points"))],
        Cardinality::Any,
    )
    .filter(attr("x").cmp(ComparisonOp::Gt, Expr::int(0)))
    .select(vec![WhatItem::new(attr("y"))]);
    let plan = compile_at_expr(&catalog, &scope, &at).unwrap();
    let result = execute_at_expr(&plan, &backend, &bindings).unwrap();
    assert_eq!(result, Value::List(vec![Value::Int(4), Value::Int(0)]));
}

#[test]
fn test_host_function_over_iterable() {
    let catalog = Arc::new(Catalog::new());
    let backend = MemoryBackend::new(Arc::clone(&catalog));
    let scope =
        Scope::new().with_fn("double", FnSig::new(vec![Type::Integer], Type::Integer));
    let bindings = Bindings::new().with_fn("double", |args| {
        Ok(Value::Int(args[0].as_int()? * 2))
    });
    let at = AtExpr::new(
        vec![SourceItem::iterable(Expr::int_list(&[1, 2, 3]))],
        Cardinality::Any,
    )
    .select(vec![WhatItem::new(Expr::Call(
        "double".into(),
        vec![Expr::Placeholder],
    ))]);
    let plan = compile_at_expr(&catalog, &scope, &at).unwrap();
    let result = execute_at_expr(&plan, &backend, &bindings).unwrap();
    assert_eq!(
        result,
        Value::List(vec![Value::Int(2), Value::Int(4), Value::Int(6)])
    );
}
