//! In-memory client shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use relmap::{Dialect, GenericClient, OrmResult, PostgresDialect, Row, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One statement the client received.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub sql: String,
    pub params: Vec<Option<Value>>,
}

/// Records every statement and replays scripted result sets in order.
///
/// Queries without a scripted result return no rows; `execute` reports
/// `affected` rows.
#[derive(Debug)]
pub struct MockClient {
    dialect: Box<dyn Dialect>,
    log: Mutex<Vec<Executed>>,
    results: Mutex<VecDeque<Vec<Row>>>,
    affected: u64,
}

impl MockClient {
    pub fn new() -> Self {
        Self::with_dialect(PostgresDialect)
    }

    pub fn with_dialect(dialect: impl Dialect + 'static) -> Self {
        Self {
            dialect: Box::new(dialect),
            log: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            affected: 1,
        }
    }

    pub fn affected(mut self, rows: u64) -> Self {
        self.affected = rows;
        self
    }

    /// Queue a result set for the next query.
    pub fn returning(self, columns: &[&str], rows: Vec<Vec<Option<Value>>>) -> Self {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(columns.clone(), values))
            .collect();
        self.results.lock().unwrap().push_back(rows);
        self
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.log.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed().into_iter().map(|e| e.sql).collect()
    }

    fn record(&self, sql: &str, params: &[Option<Value>]) {
        self.log.lock().unwrap().push(Executed {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

#[async_trait]
impl GenericClient for MockClient {
    fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    async fn query(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<Vec<Row>> {
        self.record(sql, params);
        Ok(self.results.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<u64> {
        self.record(sql, params);
        Ok(self.affected)
    }
}

/// Shorthand for a non-NULL cell.
pub fn v<T: relmap::ValueType>(value: T) -> Option<Value> {
    Some(Value::new(value))
}
