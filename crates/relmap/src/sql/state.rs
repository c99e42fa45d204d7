//! Untyped builder state, shared by builders of any record type.

use crate::condition::{Condition, Expression};
use crate::entity::{ColumnInfo, EntityInfo};
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// What a join or FROM clause reads from.
#[derive(Debug, Clone)]
pub enum Source {
    /// The entity's own table.
    Table(Arc<EntityInfo>),
    /// A nested query, rendered in parentheses.
    Query(Arc<QueryState>),
    /// A common table expression declared with `with`, read as rows of `info`.
    Named { name: Ident, info: Arc<EntityInfo> },
}

impl Source {
    /// Metadata of the rows this source yields.
    pub fn info(&self) -> &Arc<EntityInfo> {
        match self {
            Source::Table(info) | Source::Named { info, .. } => info,
            Source::Query(query) => &query.info,
        }
    }
}

/// One joined table.
#[derive(Debug, Clone)]
pub struct JoinInfo {
    pub kind: JoinKind,
    pub source: Source,
    pub alias: String,
    pub on: Condition,
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub expr: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    UnionAll,
}

impl SetOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            SetOp::Union => "UNION",
            SetOp::UnionAll => "UNION ALL",
        }
    }
}

/// A `WITH` entry.
#[derive(Debug, Clone)]
pub struct Cte {
    pub name: Ident,
    pub query: Arc<QueryState>,
}

/// Everything a dialect needs to render a statement.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub info: Arc<EntityInfo>,
    pub alias: String,
    /// Result record metadata for default projections; the main entity when unset.
    pub result: Option<Arc<EntityInfo>>,
    pub distinct: bool,
    pub columns: Vec<String>,
    pub expressions: Vec<(String, Expression)>,
    pub joins: Vec<JoinInfo>,
    pub where_: Condition,
    /// Entity condition of the record the builder was created from.
    pub source: Option<Condition>,
    pub group_by: Vec<String>,
    pub having: Condition,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// `Some(wait)` locks selected rows; `wait` is the lock timeout in seconds.
    pub for_update: Option<Option<u32>>,
    pub from: Option<Source>,
    pub with: Vec<Cte>,
    pub recursive: bool,
    pub unions: Vec<(SetOp, Arc<QueryState>)>,
    /// First configuration error raised by a fluent call, reported on render.
    pub error: Option<String>,
}

impl QueryState {
    pub fn new(info: Arc<EntityInfo>, alias: impl Into<String>) -> Self {
        Self {
            info,
            alias: alias.into(),
            result: None,
            distinct: false,
            columns: Vec::new(),
            expressions: Vec::new(),
            joins: Vec::new(),
            where_: Condition::Empty,
            source: None,
            group_by: Vec::new(),
            having: Condition::Empty,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            for_update: None,
            from: None,
            with: Vec::new(),
            recursive: false,
            unions: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(message.into());
        }
    }

    pub(crate) fn check(&self) -> OrmResult<()> {
        match &self.error {
            Some(message) => Err(OrmError::config(message.clone())),
            None => Ok(()),
        }
    }

    pub fn result_info(&self) -> &Arc<EntityInfo> {
        self.result.as_ref().unwrap_or(&self.info)
    }

    /// The named-expression override for a main-table property.
    pub fn expression(&self, property: &str) -> Option<&Expression> {
        self.expressions
            .iter()
            .rev()
            .find(|(p, _)| p == property)
            .map(|(_, e)| e)
    }

    /// Metadata and alias of table `index` (0 is the main table, `n` the n-th join).
    pub fn table(&self, index: usize) -> (&str, &Arc<EntityInfo>) {
        if index == 0 {
            (&self.alias, self.result_info())
        } else {
            let join = &self.joins[index - 1];
            (&join.alias, join.source.info())
        }
    }

    /// Columns in SELECT order.
    ///
    /// Without explicit columns this is every select-included column of the
    /// result type, followed by those of each joined table when joins exist.
    pub fn projection(&self) -> OrmResult<Vec<Projected<'_>>> {
        let mut items = Vec::new();
        if self.columns.is_empty() {
            let tables = if self.joins.is_empty() { 1 } else { self.joins.len() + 1 };
            for table in 0..tables {
                let (_, info) = self.table(table);
                items.extend(
                    info.columns()
                        .iter()
                        .filter(|c| !c.select_expr().is_excluded())
                        .map(|column| Projected { table, column }),
                );
            }
            if items.is_empty() {
                return Err(OrmError::invalid_state(format!(
                    "{} has no selectable columns",
                    self.result_info().type_key()
                )));
            }
            return Ok(items);
        }

        for name in &self.columns {
            let (table, column) = self.resolve_projected(name).ok_or_else(|| {
                OrmError::invalid_state(format!(
                    "unknown column '{name}' for {}",
                    self.info.type_key()
                ))
            })?;
            items.push(Projected { table, column });
        }
        Ok(items)
    }

    fn resolve_projected(&self, name: &str) -> Option<(usize, &ColumnInfo)> {
        if let Some((alias, rest)) = name.split_once('.') {
            if alias == self.alias {
                return self.find_main(rest).map(|c| (0, c));
            }
            if let Some(i) = self.joins.iter().position(|j| j.alias == alias) {
                let info = self.joins[i].source.info();
                return info.find(rest).map(|c| (i + 1, info.column(c)));
            }
        }
        self.find_main(name).map(|c| (0, c))
    }

    fn find_main(&self, name: &str) -> Option<&ColumnInfo> {
        let info = self.result_info();
        info.find(name)
            .map(|i| info.column(i))
            .or_else(|| self.info.find(name).map(|i| self.info.column(i)))
    }
}

/// One projected column.
#[derive(Debug, Clone, Copy)]
pub struct Projected<'s> {
    /// 0 for the main table, `n` for the n-th join.
    pub table: usize,
    pub column: &'s ColumnInfo,
}
