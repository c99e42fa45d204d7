//! Statement shapes shared by every dialect.

use super::Dialect;
use crate::condition::{Condition, EntityCondition, Expression, Segment, parse_template};
use crate::entity::{ColumnInfo, OpExpr};
use crate::error::{OrmError, OrmResult};
use crate::sql::{Projected, QueryState, Source};
use crate::statement::{SqlWriter, Statement};
use crate::value::Value;

/// Name resolution for `{name}` placeholders; nested queries see their parents.
struct Scope<'s> {
    state: &'s QueryState,
    parent: Option<&'s Scope<'s>>,
}

impl<'s> Scope<'s> {
    fn root(state: &'s QueryState) -> Self {
        Self {
            state,
            parent: None,
        }
    }

    fn child(&'s self, state: &'s QueryState) -> Scope<'s> {
        Scope {
            state,
            parent: Some(self),
        }
    }

    fn resolve(&self, name: &str) -> Option<(&'s str, &'s ColumnInfo)> {
        let state = self.state;
        if let Some((alias, rest)) = name.split_once('.') {
            if alias == state.alias {
                if let Some(i) = state.info.find(rest) {
                    return Some((&state.alias, state.info.column(i)));
                }
            }
            for join in &state.joins {
                if join.alias == alias {
                    let info = join.source.info();
                    if let Some(i) = info.find(rest) {
                        return Some((&join.alias, info.column(i)));
                    }
                }
            }
        }
        if let Some(i) = state.info.find(name) {
            return Some((&state.alias, state.info.column(i)));
        }
        self.parent.and_then(|parent| parent.resolve(name))
    }
}

/// What `{}` stands for in a template.
#[derive(Clone, Copy)]
enum Args<'a> {
    /// The next positional argument.
    List(&'a [Option<Value>]),
    /// The qualified column (custom select expressions).
    Column(&'a str, &'a ColumnInfo),
    /// The record's value for the column (custom insert/update expressions).
    Value(&'a Option<Value>, Option<&'a str>),
}

fn template<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    content: &str,
    scope: &Scope<'_>,
    args: Args<'_>,
) -> OrmResult<()> {
    let segments = parse_template(content)?;
    if let Args::List(list) = args {
        let expected = segments.iter().filter(|s| matches!(s, Segment::Arg)).count();
        if expected != list.len() {
            return Err(OrmError::invalid_state(format!(
                "expression {content:?} has {expected} placeholder(s) but {} argument(s)",
                list.len()
            )));
        }
    }

    let mut next = 0;
    for segment in segments {
        match segment {
            Segment::Text(text) => {
                w.push(&text);
            }
            Segment::Name(name) => {
                let (alias, column) = scope.resolve(name).ok_or_else(|| {
                    OrmError::invalid_state(format!(
                        "unknown property '{name}' in expression {content:?}"
                    ))
                })?;
                w.push_column(alias, column.column());
            }
            Segment::Arg => match args {
                Args::List(list) => {
                    w.push_bind(list[next].clone(), None);
                    next += 1;
                }
                Args::Column(alias, column) => {
                    w.push_column(alias, column.column());
                }
                Args::Value(value, cast) => {
                    w.push_bind(value.clone(), cast);
                }
            },
        }
    }
    Ok(())
}

fn expression<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    expr: &Expression,
    scope: &Scope<'_>,
) -> OrmResult<()> {
    template(w, expr.content(), scope, Args::List(expr.args()))
}

/// A GROUP BY / ORDER BY item: a bare property name or a template without arguments.
fn item<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    item: &str,
    scope: &Scope<'_>,
    bare: bool,
) -> OrmResult<()> {
    if !item.contains('{') {
        if let Some((alias, column)) = scope.resolve(item.trim()) {
            if bare {
                w.push_ident(column.column());
            } else {
                w.push_column(alias, column.column());
            }
            return Ok(());
        }
    }
    template(w, item, scope, Args::List(&[]))
}

fn has_predicate(condition: &Condition) -> bool {
    !matches!(condition, Condition::Empty | Condition::All)
}

fn condition<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    condition: &Condition,
    scope: &Scope<'_>,
) -> OrmResult<()> {
    match condition {
        Condition::Empty | Condition::All => {
            w.push("1=1");
            Ok(())
        }
        Condition::Expression(expr) => expression(w, expr, scope),
        Condition::Entity(entity) => entity_condition(w, entity, scope),
        Condition::Subquery(sub) => {
            expression(w, sub.expression(), scope)?;
            w.push(" (");
            let inner = scope.child(sub.query());
            subselect_into(w, sub.query(), &inner)?;
            w.push(")");
            Ok(())
        }
        Condition::And(list) => composite(w, list, " AND ", scope),
        Condition::Or(list) => composite(w, list, " OR ", scope),
    }
}

fn composite<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    list: &[Condition],
    separator: &str,
    scope: &Scope<'_>,
) -> OrmResult<()> {
    let is_or = separator == " OR ";
    if is_or && list.iter().any(Condition::is_all) {
        w.push("1=1");
        return Ok(());
    }
    let parts: Vec<&Condition> = list.iter().filter(|c| has_predicate(c)).collect();
    match parts.as_slice() {
        [] => {
            w.push("1=1");
        }
        [single] => condition(w, single, scope)?,
        many => {
            for (i, part) in many.iter().enumerate() {
                if i > 0 {
                    w.push(separator);
                }
                w.push("(");
                condition(w, part, scope)?;
                w.push(")");
            }
        }
    }
    Ok(())
}

fn entity_condition<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    entity: &EntityCondition,
    scope: &Scope<'_>,
) -> OrmResult<()> {
    let state = scope.state;
    let info = entity.info();
    let alias = if **info == *state.info {
        state.alias.as_str()
    } else {
        state
            .joins
            .iter()
            .find(|j| **j.source.info() == **info)
            .map_or(state.alias.as_str(), |j| j.alias.as_str())
    };

    for (i, (index, value)) in entity.values().iter().enumerate() {
        if i > 0 {
            w.push(" AND ");
        }
        let column = info.column(*index);
        w.push_column(alias, column.column());
        match value {
            Some(value) => {
                w.push(" = ");
                w.push_bind(Some(value.clone()), column.column_type());
            }
            None => {
                w.push(" IS NULL");
            }
        }
    }
    Ok(())
}

fn select_item<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    state: &QueryState,
    scope: &Scope<'_>,
    projected: &Projected<'_>,
) -> OrmResult<()> {
    let (alias, _) = state.table(projected.table);
    let column = projected.column;
    if projected.table == 0 {
        if let Some(expr) = state.expression(column.property()) {
            expression(w, expr, scope)?;
            w.push(" AS ").push_ident(column.column());
            return Ok(());
        }
    }
    match column.select_expr() {
        OpExpr::Custom(sql) => {
            template(w, sql, scope, Args::Column(alias, column))?;
            w.push(" AS ").push_ident(column.column());
        }
        OpExpr::Plain | OpExpr::Excluded => {
            w.push_column(alias, column.column());
        }
    }
    Ok(())
}

fn source<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    source: &Source,
    scope: &Scope<'_>,
) -> OrmResult<()> {
    match source {
        Source::Table(info) => {
            w.push_ident(info.table());
        }
        Source::Named { name, .. } => {
            w.push_ident(name);
        }
        Source::Query(query) => {
            w.push("(");
            let inner = scope.child(query);
            subselect_into(w, query, &inner)?;
            w.push(")");
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Projection {
    Columns,
    Count,
}

/// SELECT … HAVING of a single query block.
fn core<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    state: &QueryState,
    scope: &Scope<'_>,
    projection: Projection,
) -> OrmResult<()> {
    state.check()?;
    w.push("SELECT ");
    match projection {
        Projection::Count => {
            w.push("COUNT(*)");
        }
        Projection::Columns => {
            if state.distinct {
                w.push("DISTINCT ");
            }
            for (i, projected) in state.projection()?.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                select_item(w, state, scope, projected)?;
            }
        }
    }

    w.push(" FROM ");
    match &state.from {
        Some(from) => source(w, from, scope)?,
        None => {
            w.push_ident(state.info.table());
        }
    }
    w.push(" ").push_name(&state.alias);

    for join in &state.joins {
        w.push(" ").push(join.kind.keyword()).push(" ");
        source(w, &join.source, scope)?;
        w.push(" ").push_name(&join.alias).push(" ON ");
        condition(w, &join.on, scope)?;
    }

    if has_predicate(&state.where_) {
        w.push(" WHERE ");
        condition(w, &state.where_, scope)?;
    }

    if !state.group_by.is_empty() {
        w.push(" GROUP BY ");
        for (i, group) in state.group_by.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            item(w, group, scope, false)?;
        }
    }

    if has_predicate(&state.having) {
        w.push(" HAVING ");
        condition(w, &state.having, scope)?;
    }
    Ok(())
}

/// The query block followed by its UNION members.
fn compound<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    state: &QueryState,
    scope: &Scope<'_>,
) -> OrmResult<()> {
    core(w, state, scope, Projection::Columns)?;
    for (op, member) in &state.unions {
        w.push(" ").push(op.keyword()).push(" ");
        let member_scope = Scope {
            state: member,
            parent: scope.parent,
        };
        compound(w, member, &member_scope)?;
    }
    Ok(())
}

fn with_clause<D: Dialect + ?Sized>(w: &mut SqlWriter<'_, D>, state: &QueryState) -> OrmResult<()> {
    if state.with.is_empty() {
        return Ok(());
    }
    w.push(if state.recursive {
        "WITH RECURSIVE "
    } else {
        "WITH "
    });
    for (i, cte) in state.with.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.push_ident(&cte.name).push(" AS (");
        compound(w, &cte.query, &Scope::root(&cte.query))?;
        w.push(")");
    }
    w.push(" ");
    Ok(())
}

fn subselect_into<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    state: &QueryState,
    scope: &Scope<'_>,
) -> OrmResult<()> {
    with_clause(w, state)?;
    compound(w, state, scope)
}

pub fn subselect<D: Dialect + ?Sized>(dialect: &D, state: &QueryState) -> OrmResult<Statement> {
    let mut w = SqlWriter::new(dialect);
    subselect_into(&mut w, state, &Scope::root(state))?;
    Ok(w.finish())
}

pub fn select<D: Dialect + ?Sized>(dialect: &D, state: &QueryState) -> OrmResult<Statement> {
    let mut w = SqlWriter::new(dialect);
    let scope = Scope::root(state);
    subselect_into(&mut w, state, &scope)?;

    if !state.order_by.is_empty() {
        // After a UNION only output column names are visible.
        let bare = !state.unions.is_empty();
        w.push(" ORDER BY ");
        for (i, order) in state.order_by.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            item(&mut w, &order.expr, &scope, bare)?;
            if order.descending {
                w.push(" DESC");
            }
        }
    }

    dialect.write_limit(w.sql_mut(), state.limit, state.offset)?;
    if let Some(wait) = state.for_update {
        dialect.write_for_update(w.sql_mut(), wait);
    }
    Ok(w.finish())
}

pub fn count<D: Dialect + ?Sized>(dialect: &D, state: &QueryState) -> OrmResult<Statement> {
    let mut w = SqlWriter::new(dialect);
    let scope = Scope::root(state);
    if state.distinct || !state.group_by.is_empty() || !state.unions.is_empty() {
        w.push("SELECT COUNT(*) FROM (");
        subselect_into(&mut w, state, &scope)?;
        w.push(") ").push_name("t_count");
    } else {
        with_clause(&mut w, state)?;
        core(&mut w, state, &scope, Projection::Count)?;
    }
    Ok(w.finish())
}

fn check_values(state: &QueryState, values: &[Option<Value>]) -> OrmResult<()> {
    if values.len() != state.info.columns().len() {
        return Err(OrmError::invalid_state(format!(
            "{} expects {} column values, got {}",
            state.info.type_key(),
            state.info.columns().len(),
            values.len()
        )));
    }
    Ok(())
}

fn bound_value<D: Dialect + ?Sized>(
    w: &mut SqlWriter<'_, D>,
    expr: &OpExpr,
    column: &ColumnInfo,
    value: &Option<Value>,
    scope: &Scope<'_>,
) -> OrmResult<()> {
    match expr {
        OpExpr::Custom(sql) => template(w, sql, scope, Args::Value(value, column.column_type())),
        OpExpr::Plain | OpExpr::Excluded => {
            w.push_bind(value.clone(), column.column_type());
            Ok(())
        }
    }
}

pub fn insert<D: Dialect + ?Sized>(
    dialect: &D,
    state: &QueryState,
    values: &[Option<Value>],
) -> OrmResult<Statement> {
    state.check()?;
    check_values(state, values)?;
    let info = &state.info;
    let columns: Vec<(usize, &ColumnInfo)> = info
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.insert_expr().is_excluded())
        .collect();
    if columns.is_empty() {
        return Err(OrmError::invalid_state(format!(
            "{} has no insertable columns",
            info.type_key()
        )));
    }

    let mut w = SqlWriter::new(dialect);
    let scope = Scope::root(state);
    w.push("INSERT INTO ").push_ident(info.table()).push(" (");
    for (i, (_, column)) in columns.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.push_ident(column.column());
    }
    w.push(") VALUES (");
    for (i, (index, column)) in columns.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        bound_value(&mut w, column.insert_expr(), column, &values[*index], &scope)?;
    }
    w.push(")");
    Ok(w.finish())
}

pub fn update<D: Dialect + ?Sized>(
    dialect: &D,
    state: &QueryState,
    values: &[Option<Value>],
) -> OrmResult<Statement> {
    state.check()?;
    check_values(state, values)?;
    let info = &state.info;
    if let Some((property, _)) = state
        .expressions
        .iter()
        .find(|(property, _)| info.find(property).is_none())
    {
        return Err(OrmError::invalid_state(format!(
            "expression for unknown property '{property}' of {}",
            info.type_key()
        )));
    }
    let mut w = SqlWriter::new(dialect);
    let scope = Scope::root(state);
    w.push("UPDATE ")
        .push_ident(info.table())
        .push(" ")
        .push_name(&state.alias)
        .push(" SET ");

    let mut assigned = 0;
    for (index, column) in info.columns().iter().enumerate() {
        let overridden = state.expression(column.property());
        if overridden.is_none() && column.update_expr().is_excluded() {
            continue;
        }
        if assigned > 0 {
            w.push(", ");
        }
        w.push_ident(column.column()).push(" = ");
        match overridden {
            Some(expr) => expression(&mut w, expr, &scope)?,
            None => bound_value(&mut w, column.update_expr(), column, &values[index], &scope)?,
        }
        assigned += 1;
    }
    if assigned == 0 {
        return Err(OrmError::invalid_state(format!(
            "{} has no updatable columns",
            info.type_key()
        )));
    }

    if has_predicate(&state.where_) {
        w.push(" WHERE ");
        condition(&mut w, &state.where_, &scope)?;
    }
    Ok(w.finish())
}

pub fn delete<D: Dialect + ?Sized>(dialect: &D, state: &QueryState) -> OrmResult<Statement> {
    state.check()?;
    if state.where_.is_empty() {
        return Err(OrmError::invalid_state(
            "DELETE without a WHERE condition; use Condition::All to delete every row",
        ));
    }
    let mut w = SqlWriter::new(dialect);
    let scope = Scope::root(state);
    w.push("DELETE FROM ")
        .push_ident(state.info.table())
        .push(" ")
        .push_name(&state.alias);
    if has_predicate(&state.where_) {
        w.push(" WHERE ");
        condition(&mut w, &state.where_, &scope)?;
    }
    Ok(w.finish())
}
