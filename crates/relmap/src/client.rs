//! Generic client trait for unified database access.

mod postgres;

use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Arc;

/// A trait that unifies database clients and transactions.
///
/// Builders accept `&dyn GenericClient`, so the same code runs on a plain
/// connection, a pooled one or a transaction. Parameters are positional and
/// `None` binds SQL `NULL`.
#[async_trait]
pub trait GenericClient: Send + Sync {
    /// The dialect statements for this client are rendered with.
    fn dialect(&self) -> &dyn Dialect;

    /// Execute a query and return all rows.
    async fn query(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<Vec<Row>>;

    /// Execute a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<u64>;
}

#[async_trait]
impl<C: GenericClient + ?Sized> GenericClient for &C {
    fn dialect(&self) -> &dyn Dialect {
        (**self).dialect()
    }

    async fn query(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<Vec<Row>> {
        (**self).query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<u64> {
        (**self).execute(sql, params).await
    }
}

/// One result row: column names shared across the result set, values in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Option<Value>>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Option<Value>>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value at `index`; `None` for SQL `NULL` or a missing column.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// The value of the first column named `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.get(i))
    }
}
