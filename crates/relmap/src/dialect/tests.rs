use super::*;
use crate::args;
use crate::condition::{Condition, Expression};
use crate::entity::EntityInfo;
use crate::error::OrmError;
use crate::sql::{JoinInfo, JoinKind, OrderBy, SetOp, Source};
use crate::testing::{City, Person, Tag, person};
use std::sync::Arc;

fn person_state() -> QueryState {
    QueryState::new(EntityInfo::of::<Person>().unwrap(), "t0")
}

fn city_join(on: Condition) -> JoinInfo {
    JoinInfo {
        kind: JoinKind::Inner,
        source: Source::Table(EntityInfo::of::<City>().unwrap()),
        alias: "c".to_string(),
        on,
    }
}

const PERSON_COLUMNS: &str = "t0.id, t0.\"firstName\", t0.last, t0.age, t0.city_id";

#[test]
fn select_projects_every_column() {
    let stmt = PostgresDialect.select(&person_state()).unwrap();
    assert_eq!(stmt.sql(), format!("SELECT {PERSON_COLUMNS} FROM person t0"));
    assert!(stmt.params().is_empty());
}

#[test]
fn where_composites_are_parenthesized() {
    let mut state = person_state();
    state.where_ = Condition::eq("name.last", "Apple").and(Condition::gt("age", 18));
    let stmt = PostgresDialect.select(&state).unwrap();
    assert_eq!(
        stmt.sql(),
        format!("SELECT {PERSON_COLUMNS} FROM person t0 WHERE (t0.last = $1) AND (t0.age > $2)")
    );
    assert_eq!(stmt.params(), args!["Apple", 18].as_slice());
}

#[test]
fn names_resolve_by_column_name_too() {
    let mut state = person_state();
    state.where_ = Condition::raw("{firstName} IS NOT NULL");
    let stmt = PostgresDialect.select(&state).unwrap();
    assert!(stmt.sql().ends_with("WHERE t0.\"firstName\" IS NOT NULL"));
}

#[test]
fn or_with_a_match_all_child_matches_everything() {
    let mut state = person_state();
    state.where_ = Condition::Or(vec![Condition::raw("{age} > 3"), Condition::All]);
    let stmt = PostgresDialect.select(&state).unwrap();
    assert!(stmt.sql().ends_with("WHERE 1=1"));
}

#[test]
fn match_all_renders_no_where_clause() {
    let mut state = person_state();
    state.where_ = Condition::All;
    let stmt = PostgresDialect.select(&state).unwrap();
    assert!(!stmt.sql().contains("WHERE"));
}

#[test]
fn entity_condition_uses_keys() {
    let mut state = person_state();
    state.where_ = Condition::entity(&person(7, "Ada", "Lovelace")).unwrap();
    let stmt = PostgresDialect.select(&state).unwrap();
    assert!(stmt.sql().ends_with("WHERE t0.id = $1"));
    assert_eq!(stmt.params(), args![7_i64].as_slice());
}

#[test]
fn keyless_entity_condition_uses_every_column_and_is_null() {
    let mut state = QueryState::new(EntityInfo::of::<Tag>().unwrap(), "t0");
    state.where_ = Condition::entity(&Tag {
        person_id: 3,
        label: "x".into(),
        note: None,
    })
    .unwrap();
    let stmt = PostgresDialect.select(&state).unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT t0.person_id, t0.label, t0.note FROM public.tag t0 \
         WHERE t0.person_id = $1 AND t0.label = $2 AND t0.note IS NULL"
    );
    assert_eq!(stmt.params().len(), 2);
}

#[test]
fn joins_add_their_columns_and_on_clause() {
    let mut state = person_state();
    state.joins.push(city_join(Condition::raw("{c.id} = {city_id}")));
    state.where_ = Condition::eq("c.name", "Paris");
    let stmt = PostgresDialect.select(&state).unwrap();
    assert_eq!(
        stmt.sql(),
        format!(
            "SELECT {PERSON_COLUMNS}, c.id, c.name FROM person t0 \
             INNER JOIN city c ON c.id = t0.city_id WHERE c.name = $1"
        )
    );
}

#[test]
fn explicit_columns_resolve_against_joins() {
    let mut state = person_state();
    state.joins.push(city_join(Condition::raw("{c.id} = {city_id}")));
    state.columns = vec!["id".into(), "c.name".into()];
    let stmt = PostgresDialect.select(&state).unwrap();
    assert!(stmt.sql().starts_with("SELECT t0.id, c.name FROM person t0"));

    state.columns = vec!["nope".into()];
    let err = PostgresDialect.select(&state).unwrap_err();
    assert!(matches!(err, OrmError::InvalidState { .. }));
}

#[test]
fn expression_override_replaces_the_column() {
    let mut state = person_state();
    state.columns = vec!["id".into(), "age".into()];
    state
        .expressions
        .push(("age".into(), Expression::new("COALESCE({age}, {})", args![0]).unwrap()));
    let stmt = PostgresDialect.select(&state).unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT t0.id, COALESCE(t0.age, $1) AS age FROM person t0"
    );
}

#[test]
fn placeholder_mismatch_and_unknown_names_fail() {
    let mut state = person_state();
    state.where_ = Condition::expr("{age} > {}", Vec::new());
    assert!(matches!(
        PostgresDialect.select(&state).unwrap_err(),
        OrmError::InvalidState { .. }
    ));

    state.where_ = Condition::raw("{salary} > 0");
    assert!(matches!(
        PostgresDialect.select(&state).unwrap_err(),
        OrmError::InvalidState { .. }
    ));
}

#[test]
fn order_limit_and_lock() {
    let mut state = person_state();
    state.columns = vec!["id".into()];
    state.order_by = vec![
        OrderBy {
            expr: "name.last".into(),
            descending: false,
        },
        OrderBy {
            expr: "id".into(),
            descending: true,
        },
    ];
    state.limit = Some(10);
    state.offset = Some(20);
    state.for_update = Some(Some(0));
    let stmt = PostgresDialect.select(&state).unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT t0.id FROM person t0 ORDER BY t0.last, t0.id DESC LIMIT 10 OFFSET 20 FOR UPDATE NOWAIT"
    );
}

#[test]
fn standard_dialect_uses_question_marks_and_fetch_first() {
    let mut state = person_state();
    state.columns = vec!["id".into()];
    state.where_ = Condition::eq("id", 1_i64);
    state.limit = Some(5);
    state.for_update = Some(Some(3));
    let stmt = StandardDialect.select(&state).unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT t0.id FROM person t0 WHERE t0.id = ? FETCH FIRST 5 ROWS ONLY FOR UPDATE WAIT 3"
    );

    state.offset = Some(2);
    assert!(StandardDialect.select(&state).is_err());
}

#[test]
fn count_wraps_grouped_queries() {
    let mut state = person_state();
    state.order_by = vec![OrderBy {
        expr: "id".into(),
        descending: false,
    }];
    state.limit = Some(1);
    let stmt = PostgresDialect.count(&state).unwrap();
    assert_eq!(stmt.sql(), "SELECT COUNT(*) FROM person t0");

    state.columns = vec!["age".into()];
    state.group_by = vec!["age".into()];
    let stmt = PostgresDialect.count(&state).unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT COUNT(*) FROM (SELECT t0.age FROM person t0 GROUP BY t0.age) t_count"
    );
}

#[test]
fn union_orders_by_output_columns() {
    let mut other = person_state();
    other.columns = vec!["id".into()];
    other.where_ = Condition::eq("age", 1);

    let mut state = person_state();
    state.columns = vec!["id".into()];
    state.where_ = Condition::eq("age", 2);
    state.unions.push((SetOp::UnionAll, Arc::new(other)));
    state.order_by = vec![OrderBy {
        expr: "id".into(),
        descending: false,
    }];
    let stmt = PostgresDialect.select(&state).unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT t0.id FROM person t0 WHERE t0.age = $1 \
         UNION ALL SELECT t0.id FROM person t0 WHERE t0.age = $2 ORDER BY id"
    );
    assert_eq!(stmt.params(), args![2, 1].as_slice());
}

#[test]
fn insert_binds_every_insertable_column() {
    let state = person_state();
    let info = state.info.clone();
    let values = info.values(&person(1, "Ada", "Lovelace")).unwrap();
    let stmt = PostgresDialect.insert(&state, &values).unwrap();
    assert_eq!(
        stmt.sql(),
        "INSERT INTO person (id, \"firstName\", last, age, city_id) VALUES ($1, $2, $3, $4, $5)"
    );
    assert_eq!(stmt.params()[1], Some(Value::new("Ada".to_string())));
    assert_eq!(stmt.params()[3], None);
}

#[test]
fn update_skips_keys_and_appends_where() {
    let mut state = person_state();
    let record = person(1, "Ada", "Lovelace");
    state.where_ = Condition::entity(&record).unwrap();
    state
        .expressions
        .push(("age".into(), Expression::new("{age} + 1", Vec::new()).unwrap()));
    let values = state.info.values(&record).unwrap();
    let stmt = PostgresDialect.update(&state, &values).unwrap();
    assert_eq!(
        stmt.sql(),
        "UPDATE person t0 SET \"firstName\" = $1, last = $2, age = t0.age + 1, city_id = $3 \
         WHERE t0.id = $4"
    );
    assert_eq!(stmt.params().len(), 4);
}

#[test]
fn delete_requires_a_where_decision() {
    let mut state = person_state();
    assert!(PostgresDialect.delete(&state).is_err());

    state.where_ = Condition::All;
    assert_eq!(PostgresDialect.delete(&state).unwrap().sql(), "DELETE FROM person t0");

    state.where_ = Condition::lt("age", 3);
    assert_eq!(
        PostgresDialect.delete(&state).unwrap().sql(),
        "DELETE FROM person t0 WHERE t0.age < $1"
    );
}

#[test]
fn deferred_builder_errors_surface_as_config_errors() {
    let mut state = person_state();
    state.fail("bad alias");
    assert!(matches!(
        PostgresDialect.select(&state).unwrap_err(),
        OrmError::Config(_)
    ));
}

#[test]
fn quoting_rules() {
    assert!(!needs_quotes("person"));
    assert!(needs_quotes("firstName"));
    assert!(needs_quotes("order"));
    assert!(needs_quotes("1a"));
    let mut out = String::new();
    write_quoted(&mut out, "a\"b");
    assert_eq!(out, "\"a\"\"b\"");
}
