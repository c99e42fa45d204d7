//! # relmap
//!
//! A typed relational mapper: record types map to tables, and a fluent
//! builder renders portable SQL for them.
//!
//! ## Features
//!
//! - **Derived metadata**: `#[derive(Entity)]` maps nested records onto flat columns
//!   through dotted property paths (`name.first`)
//! - **Typed builder**: [`Sql`] covers select, count, insert, update and delete with
//!   joins, grouping, ordering, pagination, sub-queries, CTEs and unions
//! - **Conditions**: raw templates with `{}` placeholders and `{name}` references,
//!   conditions derived from a record's identity, nested sub-query predicates
//! - **Conversions**: a global [`TypeConverter`] registry bridges record and driver types
//! - **Dialects**: PostgreSQL and a standard-SQL fallback, with offset emulation
//! - **Transaction-friendly**: pass a transaction anywhere a [`GenericClient`] is expected
//! - **Safe defaults**: DELETE without a condition does nothing, UPDATE requires a SET
//!
//! ## Example
//!
//! ```ignore
//! use relmap::{Condition, Entity, Record, Sql};
//!
//! #[derive(Record, Debug, Default, Clone, PartialEq)]
//! struct Name {
//!     first: String,
//!     last: String,
//! }
//!
//! #[derive(Entity, Debug, Default, Clone, PartialEq)]
//! #[orm(table = "person")]
//! struct Person {
//!     #[orm(key)]
//!     id: i64,
//!     name: Name,
//!     age: Option<i32>,
//! }
//!
//! let people = Sql::<Person>::on(&client)?
//!     .where_(Condition::eq("name.last", "Smith"))
//!     .order_by("name.first")
//!     .select_all()
//!     .await?;
//! ```

extern crate self as relmap;

pub mod accessor;
pub mod client;
pub mod condition;
pub mod config;
pub mod convert;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod hooks;
pub mod ident;
pub mod prelude;
pub mod sql;
pub mod statement;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod testing;

#[cfg(feature = "pool")]
pub mod pool;

pub use accessor::{
    Accessor, AccessorBuilder, Lens, MAX_NESTING_DEPTH, Property, PropertyInfo, PropertyKind,
    join_path,
};
pub use client::{GenericClient, Row};
pub use condition::{Condition, EntityCondition, Expression, Op, SubqueryCondition};
pub use config::{OrmConfig, SqlLogConfig};
pub use convert::{ConverterRegistration, TypeConverter};
pub use dialect::{Dialect, PostgresDialect, StandardDialect};
pub use entity::{ColumnInfo, Entity, EntityInfo, FieldMeta, OpExpr};
pub use error::{OrmError, OrmResult};
pub use hooks::{PostDelete, PostInsert, PostLoad, PostUpdate, PreInsert, PreStore};
pub use ident::{Ident, IdentPart};
pub use sql::{JoinKind, QueryState, Sql};
pub use statement::Statement;
pub use transaction::{Savepoint, TransactionExt, __next_savepoint_name};
pub use value::{IntoValue, TypeKey, Value, ValueType};

#[cfg(feature = "pool")]
pub use pool::{PoolConfig, create_pool, create_pool_with_config, create_pool_with_tls};

#[cfg(feature = "derive")]
pub use relmap_derive::{Entity, Record, ValueEnum};

// Used by `#[derive(ValueEnum)]` to register converters.
#[doc(hidden)]
pub use inventory;
