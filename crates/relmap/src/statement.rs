//! Rendered SQL text plus its ordered parameters.

use crate::dialect::Dialect;
use crate::ident::{Ident, IdentPart};
use crate::value::Value;

/// A rendered statement. Parameters are in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<Value>>,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Option<Value>] {
        &self.params
    }
}

/// Accumulates SQL text and parameters, numbering placeholders as they are bound.
pub struct SqlWriter<'d, D: Dialect + ?Sized> {
    dialect: &'d D,
    sql: String,
    params: Vec<Option<Value>>,
}

impl<'d, D: Dialect + ?Sized> SqlWriter<'d, D> {
    pub fn new(dialect: &'d D) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub fn dialect(&self) -> &'d D {
        self.dialect
    }

    /// Append raw SQL.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a placeholder and bind its value, optionally cast to `cast`.
    pub fn push_bind(&mut self, value: Option<Value>, cast: Option<&str>) -> &mut Self {
        self.params.push(value);
        self.dialect
            .write_param(&mut self.sql, self.params.len(), cast);
        self
    }

    /// Append a (possibly dotted) identifier, quoted as the dialect requires.
    pub fn push_ident(&mut self, ident: &Ident) -> &mut Self {
        for (i, part) in ident.parts().iter().enumerate() {
            if i > 0 {
                self.sql.push('.');
            }
            self.dialect.write_ident(&mut self.sql, part);
        }
        self
    }

    /// Append a single validated name such as a table alias.
    pub fn push_name(&mut self, name: &str) -> &mut Self {
        self.dialect
            .write_ident(&mut self.sql, &IdentPart::Unquoted(name.to_string()));
        self
    }

    /// Append an `alias.column` reference.
    pub fn push_column(&mut self, alias: &str, column: &Ident) -> &mut Self {
        self.push_name(alias).push(".").push_ident(column)
    }

    pub(crate) fn sql_mut(&mut self) -> &mut String {
        &mut self.sql
    }

    pub fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}
