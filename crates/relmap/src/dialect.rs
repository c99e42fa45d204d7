//! SQL dialects.
//!
//! A [`Dialect`] owns the vendor-specific pieces of SQL text: placeholders,
//! identifier quoting, pagination and row locking. Statement shapes are shared
//! through the default methods, which a vendor dialect may override.

mod postgres;
pub(crate) mod render;
mod standard;

#[cfg(test)]
mod tests;

pub use postgres::PostgresDialect;
pub use standard::StandardDialect;

use crate::convert::TypeConverter;
use crate::error::OrmResult;
use crate::ident::IdentPart;
use crate::sql::QueryState;
use crate::statement::Statement;
use crate::value::{TypeKey, Value};
use std::fmt;

/// Words that must be quoted when used as bare identifiers.
const RESERVED: &[&str] = &[
    "all", "and", "any", "as", "asc", "between", "both", "case", "cast", "check", "column",
    "constraint", "create", "cross", "default", "delete", "desc", "distinct", "do", "else",
    "end", "except", "false", "fetch", "for", "foreign", "from", "grant", "group", "having",
    "in", "inner", "insert", "intersect", "into", "is", "join", "left", "like", "limit",
    "not", "null", "offset", "on", "only", "or", "order", "outer", "primary", "references",
    "right", "select", "set", "some", "table", "then", "to", "true", "union", "unique",
    "update", "user", "using", "values", "when", "where", "with",
];

/// Whether a bare name would be folded or misparsed without quotes.
pub fn needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_lowercase());
    !first_ok
        || !chars.all(|c| c == '_' || c == '$' || c.is_ascii_lowercase() || c.is_ascii_digit())
        || RESERVED.contains(&name)
}

/// Write `name` in double quotes, doubling embedded quotes.
pub fn write_quoted(out: &mut String, name: &str) {
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

pub trait Dialect: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Write the placeholder for the `index`-th (1-based) parameter.
    fn write_param(&self, out: &mut String, index: usize, cast: Option<&str>);

    /// Write one identifier part. Quoted parts are always quoted.
    fn write_ident(&self, out: &mut String, part: &IdentPart) {
        match part {
            IdentPart::Unquoted(name) if !needs_quotes(name) => out.push_str(name),
            other => write_quoted(out, other.name()),
        }
    }

    /// Whether the dialect can skip rows server-side.
    fn supports_offset(&self) -> bool;

    /// Write the pagination clause, including its leading space.
    fn write_limit(&self, out: &mut String, limit: Option<u64>, offset: Option<u64>) -> OrmResult<()>;

    /// Write the row-lock clause, including its leading space.
    fn write_for_update(&self, out: &mut String, wait: Option<u32>);

    /// Full SELECT, with ordering, pagination and locking.
    fn select(&self, state: &QueryState) -> OrmResult<Statement> {
        render::select(self, state)
    }

    /// SELECT without ORDER BY, pagination or locking.
    fn subselect(&self, state: &QueryState) -> OrmResult<Statement> {
        render::subselect(self, state)
    }

    fn count(&self, state: &QueryState) -> OrmResult<Statement> {
        render::count(self, state)
    }

    /// INSERT of one record; `values` holds every column's value in column order.
    fn insert(&self, state: &QueryState, values: &[Option<Value>]) -> OrmResult<Statement> {
        render::insert(self, state, values)
    }

    /// UPDATE of the rows matched by the state's WHERE; `values` as for [`Dialect::insert`].
    fn update(&self, state: &QueryState, values: &[Option<Value>]) -> OrmResult<Statement> {
        render::update(self, state, values)
    }

    fn delete(&self, state: &QueryState) -> OrmResult<Statement> {
        render::delete(self, state)
    }

    /// Convert a value read from a row into the requested type.
    fn read_value(&self, value: Option<Value>, target: TypeKey) -> OrmResult<Option<Value>> {
        TypeConverter::convert(value, target)
    }
}
