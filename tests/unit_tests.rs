//! Compile-time behavior: source binding, where/what analysis, placeholder
//! resolution, and pushdown checks, all through the public API.

use atquery::ast::{AggregateKind, ArithmeticOp, ComparisonOp, SortDirection};
use atquery::{
    compile_at_expr, AtExpr, AttrDef, Cardinality, Catalog, CompileError, EntityDef, Expr,
    FnSig, Plan, Scope, SourceItem, Type, WhatItem,
};

fn catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .define_entity(EntityDef::new(
            "target",
            vec![AttrDef::new("id", Type::Integer)],
        ))
        .unwrap();
    catalog
        .define_entity(EntityDef::new(
            "single",
            vec![AttrDef::new("t", Type::Entity("target".into()))],
        ))
        .unwrap();
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
}

fn compile(at: &AtExpr, scope: &Scope) -> Result<Plan, CompileError> {
    compile_at_expr(&catalog(), scope, at)
}

fn attr(name: &str) -> Expr {
    Expr::ImplicitAttr(name.into())
}

#[test]
fn test_mixed_sources_rejected() {
    let at = AtExpr::new(
        vec![
            SourceItem::entity("user"),
            SourceItem::iterable(Expr::int_list(&[1])).with_alias("xs"),
        ],
        Cardinality::Any,
    );
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "mix_entity_iterable");
}

#[test]
fn test_many_iterables_rejected() {
    let at = AtExpr::new(
        vec![
            SourceItem::iterable(Expr::int_list(&[1])).with_alias("a"),
            SourceItem::iterable(Expr::int_list(&[2])).with_alias("b"),
        ],
        Cardinality::Any,
    );
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "many_iterables:2");
}

#[test]
fn test_duplicate_alias_rejected() {
    let at = AtExpr::new(
        vec![
            SourceItem::entity("user").with_alias("u"),
            SourceItem::entity("company").with_alias("u"),
        ],
        Cardinality::Any,
    );
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "dup_alias:u");
}

#[test]
fn test_alias_conflicting_with_local_rejected() {
    let scope = Scope::new().with_local("u", Type::Integer);
    let at = AtExpr::new(vec![SourceItem::entity("user").with_alias("u")], Cardinality::Any);
    let err = compile(&at, &scope).unwrap_err();
    assert_eq!(err.code(), "conflict_alias:u");
}

#[test]
fn test_unknown_entity_rejected() {
    let at = AtExpr::new(vec![SourceItem::entity("ghost")], Cardinality::Any);
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "unknown_entity:ghost");
}

#[test]
fn test_bare_name_binds_by_name() {
    // `score` matches user.score by name; other integer attributes are
    // irrelevant.
    let scope = Scope::new().with_local("score", Type::Integer);
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .filter(Expr::name("score"));
    assert!(compile(&at, &scope).is_ok());
}

#[test]
fn test_bare_name_falls_back_to_type_match() {
    // No attribute is named `tgt1`; its entity type matches single.t alone.
    let scope = Scope::new().with_local("tgt1", Type::Entity("target".into()));
    let at = AtExpr::new(vec![SourceItem::entity("single")], Cardinality::Any)
        .filter(Expr::name("tgt1"));
    assert!(compile(&at, &scope).is_ok());
}

#[test]
fn test_bare_name_without_any_match() {
    let scope = Scope::new().with_local("nope", Type::Decimal);
    let at = AtExpr::new(vec![SourceItem::entity("single")], Cardinality::Any)
        .filter(Expr::name("nope"));
    let err = compile(&at, &scope).unwrap_err();
    assert_eq!(err.code(), "var_noattrs:nope:decimal");
}

#[test]
fn test_bare_name_ambiguous_by_name() {
    let scope = Scope::new().with_local("name", Type::Text);
    let at = AtExpr::new(
        vec![SourceItem::entity("user"), SourceItem::entity("company")],
        Cardinality::Any,
    )
    .filter(Expr::name("name"));
    let err = compile(&at, &scope).unwrap_err();
    assert_eq!(
        err,
        CompileError::AttrNameAmbig {
            name: "name".into(),
            candidates: vec!["user.name".into(), "company.name".into()],
        }
    );
}

#[test]
fn test_boolean_local_is_plain_predicate() {
    // No boolean attribute anywhere, so `flag` must pass through as a
    // filter value rather than fail attribute matching.
    let scope = Scope::new().with_local("flag", Type::Boolean);
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .filter(Expr::name("flag"));
    assert!(compile(&at, &scope).is_ok());
}

#[test]
fn test_nameless_term_matches_by_type() {
    // target has exactly one integer attribute, so a bare integer term
    // becomes an equality against it.
    let at = AtExpr::new(vec![SourceItem::entity("target")], Cardinality::Any)
        .filter(Expr::int(7));
    assert!(compile(&at, &Scope::new()).is_ok());

    // company has no integer attribute at all.
    let at = AtExpr::new(vec![SourceItem::entity("company")], Cardinality::Any)
        .filter(Expr::int(7));
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "at_where_type:0:integer");
}

#[test]
fn test_frame_dependent_term_must_be_boolean() {
    let xs = Expr::int_list(&[1, 2, 3]);
    let at = AtExpr::new(vec![SourceItem::iterable(xs)], Cardinality::Any)
        .filter(Expr::Placeholder.arith(ArithmeticOp::Add, Expr::int(1)));
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "at_where:type:0:integer");
}

#[test]
fn test_placeholder_requires_single_unaliased_source() {
    let at = AtExpr::new(
        vec![SourceItem::iterable(Expr::int_list(&[1])).with_alias("xs")],
        Cardinality::Any,
    )
    .select(vec![WhatItem::new(Expr::Placeholder)]);
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "placeholder:none");
}

#[test]
fn test_placeholder_ambiguous_across_frames() {
    let inner = AtExpr::new(
        vec![SourceItem::iterable(Expr::int_list(&[4, 5, 6]))],
        Cardinality::Any,
    )
    .select(vec![WhatItem::new(Expr::Placeholder)]);
    let outer = AtExpr::new(
        vec![SourceItem::iterable(Expr::int_list(&[1, 2, 3]))],
        Cardinality::Any,
    )
    .select(vec![WhatItem::new(Expr::At(Box::new(inner)))]);
    let err = compile(&outer, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "placeholder:ambiguous");
}

#[test]
fn test_placeholder_reaches_outer_past_aliased_inner() {
    // The inner source is aliased, so only the outer frame offers `$`.
    let inner = AtExpr::new(
        vec![SourceItem::iterable(Expr::int_list(&[4, 5, 6])).with_alias("ys")],
        Cardinality::Any,
    )
    .select(vec![WhatItem::new(Expr::Placeholder)]);
    let outer = AtExpr::new(
        vec![SourceItem::iterable(Expr::int_list(&[1, 2, 3]))],
        Cardinality::Any,
    )
    .select(vec![WhatItem::new(Expr::At(Box::new(inner)))]);
    assert!(compile(&outer, &Scope::new()).is_ok());
}

#[test]
fn test_group_requires_annotation_on_every_column() {
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any).select(vec![
        WhatItem::new(attr("name")).grouped(),
        WhatItem::new(attr("score")),
    ]);
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "at:expr:group:1");
}

#[test]
fn test_aggregate_type_legality() {
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .select(vec![WhatItem::new(attr("name")).aggregated(AggregateKind::Sum)]);
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(
        err,
        CompileError::AggregateBadType {
            kind: "sum",
            ty: Type::Text,
        }
    );

    // min/max only need ordering, so text is fine there.
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .select(vec![WhatItem::new(attr("name")).aggregated(AggregateKind::Max)]);
    assert!(compile(&at, &Scope::new()).is_ok());
}

#[test]
fn test_sort_needs_orderable_type() {
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any).select(vec![
        WhatItem::new(Expr::Placeholder).sorted(SortDirection::Asc),
        WhatItem::new(attr("name")),
    ]);
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "at:what:sort:bad_type:user");
}

#[test]
fn test_all_columns_omitted_rejected() {
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .select(vec![WhatItem::new(attr("name")).omitted()]);
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "at:no_fields");
}

#[test]
fn test_duplicate_field_names_rejected() {
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any).select(vec![
        WhatItem::new(attr("name")).named("a"),
        WhatItem::new(attr("score")).named("a"),
    ]);
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "dup_field_name:a");
}

#[test]
fn test_limit_and_offset_must_be_integers() {
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .limit(Expr::text("ten"));
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "expr_at_limit_type:text");

    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .offset(Expr::bool(true));
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "expr_at_offset_type:boolean");
}

#[test]
fn test_host_call_not_pushable_to_backend() {
    let scope = Scope::new().with_fn("hash", FnSig::new(vec![Type::Text], Type::Text));
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any).filter(
        Expr::Call("hash".into(), vec![attr("name")]).cmp(ComparisonOp::Eq, Expr::text("x")),
    );
    let err = compile(&at, &scope).unwrap_err();
    assert_eq!(err.code(), "expr_call_nosql:hash");
}

#[test]
fn test_subquery_not_pushable_to_backend() {
    let inner = AtExpr::new(
        vec![SourceItem::iterable(Expr::int_list(&[1, 2])).with_alias("xs")],
        Cardinality::Any,
    );
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .select(vec![WhatItem::new(Expr::At(Box::new(inner)))]);
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "expr_sqlnotallowed");
}

#[test]
fn test_unknown_attribute_reported() {
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .select(vec![WhatItem::new(attr("salary"))]);
    let err = compile(&at, &Scope::new()).unwrap_err();
    assert_eq!(err.code(), "unknown_member:user:salary");
}

#[test]
fn test_result_type_follows_cardinality() {
    let select_name = |card| {
        AtExpr::new(vec![SourceItem::entity("user")], card)
            .select(vec![WhatItem::new(attr("name"))])
    };
    let plan = compile(&select_name(Cardinality::One), &Scope::new()).unwrap();
    assert_eq!(plan.result_type, Type::Text);
    let plan = compile(&select_name(Cardinality::ZeroOrOne), &Scope::new()).unwrap();
    assert_eq!(plan.result_type, Type::Text.nullable());
    let plan = compile(&select_name(Cardinality::Any), &Scope::new()).unwrap();
    assert_eq!(plan.result_type, Type::Text.list_of());
}

#[test]
fn test_tuple_fields_take_derived_and_explicit_names() {
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any).select(vec![
        WhatItem::new(attr("name")),
        WhatItem::new(attr("score")).named("points"),
        WhatItem::new(attr("score").arith(ArithmeticOp::Mul, Expr::int(2))).named("_"),
    ]);
    let plan = compile(&at, &Scope::new()).unwrap();
    assert_eq!(
        plan.result_type,
        Type::Tuple(vec![
            (Some("name".into()), Type::Text),
            (Some("points".into()), Type::Integer),
            (None, Type::Integer),
        ])
        .list_of()
    );
}

#[test]
fn test_unaliased_sort_key_is_not_an_output_column() {
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any).select(vec![
        WhatItem::new(attr("score")).sorted(SortDirection::Desc),
        WhatItem::new(attr("name")),
    ]);
    let plan = compile(&at, &Scope::new()).unwrap();
    assert_eq!(plan.result_type, Type::Text.list_of());

    // An explicit alias keeps the sort key in the output.
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any).select(vec![
        WhatItem::new(attr("score")).sorted(SortDirection::Desc).named("score"),
        WhatItem::new(attr("name")),
    ]);
    let plan = compile(&at, &Scope::new()).unwrap();
    assert_eq!(
        plan.result_type,
        Type::Tuple(vec![
            (Some("score".into()), Type::Integer),
            (Some("name".into()), Type::Text),
        ])
        .list_of()
    );
}

#[test]
fn test_one_hop_attribute_access() {
    // `city` only exists one step away, through user.employer.
    let scope = Scope::new().with_local("city", Type::Text);
    let at = AtExpr::new(vec![SourceItem::entity("user")], Cardinality::Any)
        .filter(Expr::name("city"));
    assert!(compile(&at, &scope).is_ok());
}
