//! Opt-in lifecycle hooks.
//!
//! A record type implements any subset of these traits and lists them in
//! `#[orm(hooks(...))]`; the derive then exposes them through the
//! `Entity::as_*` capability accessors, which the builder checks before
//! each write or after each read.
//!
//! ```ignore
//! #[derive(Default, Entity)]
//! #[orm(table = "orders", hooks(pre_store, post_insert))]
//! struct Order { #[orm(key)] id: i64, code: String, lines: Vec<u8> }
//!
//! impl PreStore for Order {
//!     fn pre_store(&mut self) -> OrmResult<()> {
//!         self.code = self.code.trim().to_uppercase();
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl PostInsert for Order {
//!     async fn post_insert(&mut self, client: &dyn GenericClient) -> OrmResult<u64> {
//!         // insert child rows, report how many
//!         Ok(0)
//!     }
//! }
//! ```

use crate::client::GenericClient;
use crate::error::OrmResult;
use async_trait::async_trait;

/// Normalize a record before any insert or update.
pub trait PreStore: Send {
    fn pre_store(&mut self) -> OrmResult<()>;
}

/// Runs before the INSERT; the returned count is added to the operation's total.
#[async_trait]
pub trait PreInsert: Send {
    async fn pre_insert(&mut self, client: &dyn GenericClient) -> OrmResult<u64>;
}

/// Runs after the INSERT; the returned count is added to the operation's total.
#[async_trait]
pub trait PostInsert: Send {
    async fn post_insert(&mut self, client: &dyn GenericClient) -> OrmResult<u64>;
}

/// Runs after the UPDATE; the returned count is added to the operation's total.
#[async_trait]
pub trait PostUpdate: Send {
    async fn post_update(&mut self, client: &dyn GenericClient) -> OrmResult<u64>;
}

/// Runs after a record's DELETE; the returned count is added to the operation's total.
#[async_trait]
pub trait PostDelete: Sync {
    async fn post_delete(&self, client: &dyn GenericClient) -> OrmResult<u64>;
}

/// Normalize a record after it has been read from a row.
pub trait PostLoad: Send {
    fn post_load(&mut self) -> OrmResult<()>;
}
