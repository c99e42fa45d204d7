//! Convenient imports for typical `relmap` usage.
//!
//! ```ignore
//! use relmap::prelude::*;
//! ```

pub use crate::{
    Condition, Entity, GenericClient, IntoValue, JoinKind, OrmConfig, OrmError, OrmResult,
    Sql, TransactionExt, Value,
};
pub use crate::hooks::{PostDelete, PostInsert, PostLoad, PostUpdate, PreInsert, PreStore};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};

#[cfg(feature = "derive")]
pub use crate::{Record, ValueEnum};
