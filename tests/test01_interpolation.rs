use std::borrow::Cow;

use sqlcap::prelude::*;
use sqlcap::{ArgumentPlan, Bindings, quote_double};

#[derive(Debug)]
struct Colon;

impl InterpolationStrategy for Colon {
    fn placeholder_token(&self, position: usize) -> Cow<'static, str> {
        Cow::Owned(format!(":p{position}"))
    }
}

#[test]
fn repeated_name_is_bound_once_per_occurrence() {
    let q = QueryParams::new("SELECT x WHERE y = :a AND z = :a").bind("a", 5);
    let (sql, args) = q.interpolate(&QUESTION_MARK).unwrap();
    assert_eq!(sql, "SELECT x WHERE y = ? AND z = ?");
    assert_eq!(args, vec![RowValues::Int(5), RowValues::Int(5)]);
}

#[test]
fn arguments_follow_template_order_not_bind_order() {
    let mut q = QueryParams::new("UPDATE t SET b = :b, a = :a WHERE id = :id");
    q.set("id", 9).set(":a", "x").set("b", true);

    let (sql, args) = q.interpolate(&POSTGRES_DOLLAR).unwrap();
    assert_eq!(sql, "UPDATE t SET b = $1, a = $2 WHERE id = $3");
    assert_eq!(
        args,
        vec![
            RowValues::Bool(true),
            RowValues::Text("x".into()),
            RowValues::Int(9)
        ]
    );
}

#[test]
fn each_strategy_produces_its_own_tokens() {
    let q = QueryParams::with_named("INSERT INTO t VALUES (:a, :b)", [("a", 1), ("b", 2)]);
    let cases: [(&dyn InterpolationStrategy, &str); 5] = [
        (&QUESTION_MARK, "INSERT INTO t VALUES (?, ?)"),
        (&SQLITE_NUMBERED, "INSERT INTO t VALUES (?1, ?2)"),
        (&POSTGRES_DOLLAR, "INSERT INTO t VALUES ($1, $2)"),
        (&MSSQL_AT, "INSERT INTO t VALUES (@P1, @P2)"),
        (&Colon, "INSERT INTO t VALUES (:p1, :p2)"),
    ];
    for (strategy, expected) in cases {
        let (sql, args) = q.interpolate(strategy).unwrap();
        assert_eq!(sql, expected, "{strategy:?}");
        assert_eq!(args.len(), 2);
    }
}

#[test]
fn missing_binding_names_the_placeholder() {
    let q = QueryParams::new("SELECT * FROM users WHERE id = :id AND org = :org").bind("id", 1);
    match q.interpolate(&QUESTION_MARK) {
        Err(SqlCapError::MissingBinding(name)) => assert_eq!(name, "org"),
        other => panic!("expected MissingBinding, got {other:?}"),
    }
}

#[test]
fn markers_inside_literals_comments_and_casts_are_left_alone() {
    let q = QueryParams::new(
        "SELECT ':skip', \"col:x\", created::date -- :nope ?\n\
         FROM t /* :gone ? */ WHERE body = $tag$ :kept ? $tag$ AND id = :id",
    )
    .bind("id", 3);

    let (sql, args) = q.interpolate(&POSTGRES_DOLLAR).unwrap();
    assert_eq!(
        sql,
        "SELECT ':skip', \"col:x\", created::date -- :nope ?\n\
         FROM t /* :gone ? */ WHERE body = $tag$ :kept ? $tag$ AND id = $1"
    );
    assert_eq!(args, vec![RowValues::Int(3)]);
}

#[test]
fn positional_markers_consume_appended_values() {
    let q = QueryParams::new("SELECT * FROM t WHERE a = ? AND b = ?")
        .arg(1)
        .arg("two");
    let (sql, args) = q.interpolate(&SQLITE_NUMBERED).unwrap();
    assert_eq!(sql, "SELECT * FROM t WHERE a = ?1 AND b = ?2");
    assert_eq!(args, vec![RowValues::Int(1), RowValues::Text("two".into())]);

    let short = QueryParams::new("SELECT * FROM t WHERE a = ? AND b = ?").arg(1);
    let err = short.interpolate(&SQLITE_NUMBERED).unwrap_err();
    assert!(err.is_binding_error());
}

#[test]
fn native_placeholders_pass_through() {
    let q = QueryParams::with_args(
        "SELECT * FROM t WHERE a = $1 AND b = $2",
        vec![RowValues::Int(1), RowValues::Null],
    );
    let (sql, args) = q.interpolate(&POSTGRES_DOLLAR).unwrap();
    assert_eq!(sql, q.template());
    assert_eq!(args, vec![RowValues::Int(1), RowValues::Null]);

    let sqlite = QueryParams::with_args(
        "SELECT ?1, ?2",
        vec![RowValues::Int(1), RowValues::Int(2)],
    );
    assert_eq!(sqlite.interpolate(&SQLITE_NUMBERED).unwrap().0, "SELECT ?1, ?2");
}

#[test]
fn mixed_markers_are_rejected() {
    let q = QueryParams::new("SELECT * FROM t WHERE a = :a AND b = ?")
        .bind("a", 1)
        .arg(2);
    assert!(matches!(
        q.interpolate(&QUESTION_MARK),
        Err(SqlCapError::BindingError(_))
    ));
}

#[test]
fn render_keeps_the_plan_for_execution_time() {
    let q = QueryParams::new("SELECT * FROM t WHERE a = :a OR b = :b OR c = :a");
    assert_eq!(
        q.render_text(&POSTGRES_DOLLAR),
        "SELECT * FROM t WHERE a = $1 OR b = $2 OR c = $3"
    );

    let rendered = q.render(&POSTGRES_DOLLAR).unwrap();
    assert_eq!(
        rendered.slots,
        ArgumentPlan::Named(vec!["a".into(), "b".into(), "a".into()])
    );

    let mut bindings = Bindings::new();
    bindings.set("a", 1).set("b", 2);
    assert_eq!(
        bindings.resolve(&rendered.slots).unwrap(),
        vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(1)]
    );
}

#[test]
fn quoted_identifiers_escape_embedded_quotes() {
    assert_eq!(quote_double("odd\"name"), "\"odd\"\"name\"");
    assert_eq!(sqlcap::quote_backtick("tbl`x"), "`tbl``x`");
}
