//! Typed query builder.
//!
//! [`Sql`] collects the pieces of a statement about one entity type and
//! renders them through the bound client's [`Dialect`](crate::Dialect).
//! Fluent calls consume and return the builder; terminal operations borrow
//! it, so one builder can run many times.
//!
//! # Example
//!
//! ```ignore
//! use relmap::{Condition, Sql};
//!
//! let adults = Sql::<Person>::on(&client)?
//!     .where_(Condition::gt("age", 17))
//!     .order_by("name.last")
//!     .limit(20)
//!     .select_all()
//!     .await?;
//! ```

mod execute;
mod state;


pub use state::{Cte, JoinInfo, JoinKind, OrderBy, Projected, QueryState, SetOp, Source};

use crate::client::GenericClient;
use crate::condition::{Condition, Expression};
use crate::config::OrmConfig;
use crate::entity::{Entity, EntityInfo};
use crate::error::OrmResult;
use crate::ident::Ident;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Which clause `and`/`or` extend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Where,
    Having,
}

/// A query builder for entity type `E`, optionally bound to a client.
#[must_use]
pub struct Sql<'c, E: Entity> {
    state: QueryState,
    client: Option<&'c dyn GenericClient>,
    config: OrmConfig,
    target: Target,
    alias_explicit: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Sql<'_, E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            client: self.client,
            config: self.config.clone(),
            target: self.target,
            alias_explicit: self.alias_explicit,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for Sql<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sql")
            .field("state", &self.state)
            .field("bound", &self.client.is_some())
            .finish()
    }
}

impl<'c, E: Entity> Sql<'c, E> {
    /// An unbound builder with the default configuration.
    pub fn new() -> OrmResult<Self> {
        let config = OrmConfig::default();
        let info = EntityInfo::of::<E>()?;
        Ok(Self {
            state: QueryState::new(info, config.default_alias.clone()),
            client: None,
            config,
            target: Target::Where,
            alias_explicit: false,
            _entity: PhantomData,
        })
    }

    /// A builder whose default WHERE is `record`'s entity condition.
    pub fn of(record: &E) -> OrmResult<Self> {
        let mut sql = Self::new()?;
        sql.state.source = Some(Condition::entity(record)?);
        Ok(sql)
    }

    /// A builder bound to `client`.
    pub fn on(client: &'c dyn GenericClient) -> OrmResult<Self> {
        Ok(Self::new()?.connection(client))
    }

    /// Bind the client terminal operations run on.
    pub fn connection(mut self, client: &'c dyn GenericClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn config(mut self, config: OrmConfig) -> Self {
        if !self.alias_explicit {
            self.state.alias = config.default_alias.clone();
        }
        self.config = config;
        self
    }

    /// The untyped state, for embedding in conditions of other builders.
    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn alias(mut self, alias: &str) -> Self {
        match Ident::simple(alias) {
            Ok(_) => {
                self.state.alias = alias.to_string();
                self.alias_explicit = true;
            }
            Err(e) => self.state.fail(e.to_string()),
        }
        self
    }

    pub fn distinct(mut self) -> Self {
        self.state.distinct = true;
        self
    }

    /// Restrict the projection to these property paths (`alias.path` for joined tables).
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Use `expr` in place of `property`'s column in SELECT and UPDATE SET.
    pub fn expression(mut self, property: &str, expr: impl Into<Expression>) -> Self {
        let expr = expr.into();
        if let Err(e) = expr.check() {
            self.state.fail(e.to_string());
        }
        self.state.expressions.push((property.to_string(), expr));
        self
    }

    fn add_join(mut self, kind: JoinKind, alias: &str, source: OrmResult<Source>, on: Condition) -> Self {
        if let Err(e) = Ident::simple(alias) {
            self.state.fail(e.to_string());
            return self;
        }
        if alias == self.state.alias || self.state.joins.iter().any(|j| j.alias == alias) {
            self.state.fail(format!("table alias '{alias}' is used twice"));
            return self;
        }
        match source {
            Ok(source) => self.state.joins.push(JoinInfo {
                kind,
                source,
                alias: alias.to_string(),
                on,
            }),
            Err(e) => self.state.fail(e.to_string()),
        }
        self
    }

    /// `INNER JOIN` the table of `J`.
    pub fn join<J: Entity>(self, alias: &str, on: Condition) -> Self {
        let source = EntityInfo::of::<J>().map(Source::Table);
        self.add_join(JoinKind::Inner, alias, source, on)
    }

    pub fn left_join<J: Entity>(self, alias: &str, on: Condition) -> Self {
        let source = EntityInfo::of::<J>().map(Source::Table);
        self.add_join(JoinKind::Left, alias, source, on)
    }

    pub fn right_join<J: Entity>(self, alias: &str, on: Condition) -> Self {
        let source = EntityInfo::of::<J>().map(Source::Table);
        self.add_join(JoinKind::Right, alias, source, on)
    }

    /// Join a nested query yielding rows of `J`.
    pub fn join_query<J: Entity>(
        self,
        kind: JoinKind,
        alias: &str,
        query: &Sql<'_, J>,
        on: Condition,
    ) -> Self {
        let source = Ok(Source::Query(Arc::new(query.state.clone())));
        self.add_join(kind, alias, source, on)
    }

    /// Join a common table expression declared with [`Sql::with`], read as rows of `J`.
    pub fn join_cte<J: Entity>(self, kind: JoinKind, name: &str, alias: &str, on: Condition) -> Self {
        let source = Ident::parse(name).and_then(|name| {
            Ok(Source::Named {
                name,
                info: EntityInfo::of::<J>()?,
            })
        });
        self.add_join(kind, alias, source, on)
    }

    /// Replace the WHERE condition; later `and`/`or` extend it.
    pub fn where_(mut self, condition: Condition) -> Self {
        self.state.where_ = condition;
        self.target = Target::Where;
        self
    }

    /// WHERE `record`'s entity condition.
    pub fn where_entity(mut self, record: &E) -> Self {
        match Condition::entity(record) {
            Ok(condition) => self.state.where_ = condition,
            Err(e) => self.state.fail(e.to_string()),
        }
        self.target = Target::Where;
        self
    }

    fn target(&mut self) -> &mut Condition {
        match self.target {
            Target::Where => &mut self.state.where_,
            Target::Having => &mut self.state.having,
        }
    }

    /// AND `condition` onto the clause set last (WHERE unless `having` was called).
    pub fn and(mut self, condition: Condition) -> Self {
        let target = self.target();
        *target = std::mem::take(target).and(condition);
        self
    }

    /// OR `condition` onto the clause set last.
    pub fn or(mut self, condition: Condition) -> Self {
        let target = self.target();
        *target = std::mem::take(target).or(condition);
        self
    }

    /// Replace the HAVING condition; later `and`/`or` extend it.
    pub fn having(mut self, condition: Condition) -> Self {
        self.state.having = condition;
        self.target = Target::Having;
        self
    }

    /// Append GROUP BY items: property paths or `{name}` templates.
    pub fn group_by<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.group_by.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.state.order_by.push(OrderBy {
            expr: expr.into(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, expr: impl Into<String>) -> Self {
        self.state.order_by.push(OrderBy {
            expr: expr.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.state.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.state.offset = Some(offset);
        self
    }

    /// Lock the selected rows, waiting as long as the database does by default.
    pub fn for_update(mut self) -> Self {
        self.state.for_update = Some(None);
        self
    }

    /// Lock the selected rows, waiting at most `seconds` (0 fails immediately).
    pub fn for_update_wait(mut self, seconds: u32) -> Self {
        self.state.for_update = Some(Some(seconds));
        self
    }

    /// Read from a nested query producing rows of `E` instead of the table.
    pub fn from_subquery(mut self, query: &Sql<'_, E>) -> Self {
        self.state.from = Some(Source::Query(Arc::new(query.state.clone())));
        self
    }

    /// Read from a common table expression declared with [`Sql::with`].
    pub fn from_cte(mut self, name: &str) -> Self {
        match Ident::parse(name) {
            Ok(name) => {
                self.state.from = Some(Source::Named {
                    name,
                    info: self.state.info.clone(),
                })
            }
            Err(e) => self.state.fail(e.to_string()),
        }
        self
    }

    /// Declare `WITH name AS (query)`.
    pub fn with<F: Entity>(mut self, name: &str, query: &Sql<'_, F>) -> Self {
        match Ident::parse(name) {
            Ok(name) => self.state.with.push(Cte {
                name,
                query: Arc::new(query.state.clone()),
            }),
            Err(e) => self.state.fail(e.to_string()),
        }
        self
    }

    /// Declare `WITH RECURSIVE name AS (query)`.
    pub fn with_recursive<F: Entity>(mut self, name: &str, query: &Sql<'_, F>) -> Self {
        self.state.recursive = true;
        self.with(name, query)
    }

    pub fn union(mut self, other: &Sql<'_, E>) -> Self {
        self.state
            .unions
            .push((SetOp::Union, Arc::new(other.state.clone())));
        self
    }

    pub fn union_all(mut self, other: &Sql<'_, E>) -> Self {
        self.state
            .unions
            .push((SetOp::UnionAll, Arc::new(other.state.clone())));
        self
    }
}
