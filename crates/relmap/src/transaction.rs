//! Transaction helpers: macros and Savepoint API.
//!
//! A unit of work runs on one transaction: `tokio_postgres::Transaction` or
//! `deadpool_postgres::Transaction`, both of which are [`GenericClient`]s, so
//! builders run inside it by binding the transaction instead of the client.
//!
//! For ergonomic commit/rollback handling, use the [`transaction!`] macro.
//!
//! # Example
//!
//! ```ignore
//! use relmap::{OrmResult, Sql};
//! use tokio_postgres::NoTls;
//!
//! # async fn demo(mut order: Order) -> OrmResult<()> {
//! let (mut client, connection) = tokio_postgres::connect("postgres://...", NoTls).await?;
//! tokio::spawn(async move { let _ = connection.await; });
//!
//! relmap::transaction!(&mut client, tx, {
//!     Sql::<Order>::on(&tx)?.insert(&mut order).await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```
//!
//! [`GenericClient`]: crate::GenericClient

use crate::client::{GenericClient, Row};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for anonymous savepoint naming.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Runs `$body` on a transaction begun from `$client`, bound to `$tx`.
///
/// The block evaluates to `OrmResult<T>`. `Ok` commits and `Err` rolls back;
/// a failed rollback is reported as [`OrmError::Other`] carrying both errors.
///
/// ```ignore
/// let saved: OrmResult<u64> = relmap::transaction!(&mut client, tx, {
///     let orders = Sql::<Order>::on(&tx)?;
///     let count = orders.insert(&mut order).await?;
///     Ok(count + Sql::<OrderItem>::on(&tx)?.insert_all(&mut items).await?)
/// });
/// ```
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let mut $tx = ($client)
            .transaction()
            .await
            .map_err($crate::OrmError::from_db_error)?;
        let __relmap_result = async { $body }.await;
        $crate::transaction::Finish::finish($tx, "transaction", __relmap_result).await
    }};
}

/// Runs `$body` inside a savepoint of the open transaction `$tx`.
///
/// `Ok` releases the savepoint, `Err` rolls back to it; the outer transaction
/// stays usable either way. Without a name the savepoint is auto-numbered.
///
/// ```ignore
/// relmap::transaction!(&mut client, tx, {
///     Sql::<Order>::on(&tx)?.insert(&mut order).await?;
///
///     let audit: OrmResult<u64> = relmap::savepoint!(tx, "audit", sp, {
///         Sql::<AuditEntry>::on(&sp)?.insert(&mut entry).await
///     });
///     if let Err(e) = audit {
///         tracing::warn!(error = %e, "audit entry skipped");
///     }
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! savepoint {
    ($tx:expr, $name:expr, $sp:ident, $body:block) => {{
        let mut $sp = ($tx)
            .savepoint($name)
            .await
            .map_err($crate::OrmError::from_db_error)?;
        let __relmap_result = async { $body }.await;
        $crate::transaction::Finish::finish($sp, "savepoint", __relmap_result).await
    }};
    ($tx:expr, $sp:ident, $body:block) => {{
        let __relmap_sp_name = $crate::__next_savepoint_name();
        $crate::savepoint!($tx, &__relmap_sp_name, $sp, $body)
    }};
}

/// Commits or rolls back a unit of work according to the result of its body.
///
/// Used by [`transaction!`] and [`savepoint!`].
#[doc(hidden)]
pub trait Finish: Sized {
    fn finish<T: Send>(
        self,
        unit: &'static str,
        result: OrmResult<T>,
    ) -> impl std::future::Future<Output = OrmResult<T>> + Send;
}

impl Finish for tokio_postgres::Transaction<'_> {
    async fn finish<T: Send>(self, unit: &'static str, result: OrmResult<T>) -> OrmResult<T> {
        match result {
            Ok(value) => {
                self.commit().await.map_err(OrmError::from_db_error)?;
                Ok(value)
            }
            Err(error) => rolled_back(unit, error, self.rollback().await),
        }
    }
}

#[cfg(feature = "pool")]
impl Finish for deadpool_postgres::Transaction<'_> {
    async fn finish<T: Send>(self, unit: &'static str, result: OrmResult<T>) -> OrmResult<T> {
        match result {
            Ok(value) => {
                self.commit().await.map_err(OrmError::from_db_error)?;
                Ok(value)
            }
            Err(error) => rolled_back(unit, error, self.rollback().await),
        }
    }
}

fn rolled_back<T>(
    unit: &'static str,
    error: OrmError,
    rollback: Result<(), tokio_postgres::Error>,
) -> OrmResult<T> {
    match rollback {
        Ok(()) => {
            tracing::debug!(target: "relmap.transaction", unit, %error, "rolled back");
            Err(error)
        }
        Err(rollback_err) => Err(OrmError::Other(format!(
            "{error} ({unit} rollback failed: {rollback_err})"
        ))),
    }
}

/// Runs the given block inside a nested transaction (savepoint).
///
/// Use this when you want to create a sub-transaction within an existing transaction.
/// The inner block gets its own savepoint that can be rolled back without
/// affecting the outer transaction.
///
/// # Example
///
/// ```ignore
/// relmap::transaction!(&mut client, tx, {
///     Sql::<Order>::on(&tx)?.insert(&mut order).await?;
///
///     // A failure here leaves the order in place.
///     relmap::nested_transaction!(tx, inner, {
///         Sql::<OrderItem>::on(&inner)?.insert_all(&mut items).await?;
///         Ok(())
///     })?;
///
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! nested_transaction {
    ($tx:expr, $inner:ident, $body:block) => {{
        let __relmap_sp_name = $crate::__next_savepoint_name();
        $crate::savepoint!($tx, &__relmap_sp_name, $inner, $body)
    }};
}

/// Generate a unique anonymous savepoint name.
///
/// This is a public helper used by the `savepoint!` and `nested_transaction!` macros.
/// Not intended for direct use.
#[doc(hidden)]
pub fn __next_savepoint_name() -> String {
    let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("relmap_sp_{n}")
}

// ─── Savepoint wrapper ──────────────────────────────────────────────────────

/// A named savepoint within a transaction.
///
/// Wraps a nested `tokio_postgres::Transaction` created via `savepoint()`.
/// Provides explicit `release()` and `rollback()` methods, and implements
/// [`GenericClient`](crate::GenericClient) for query execution within the
/// savepoint scope.
///
/// # Example
///
/// ```ignore
/// use relmap::TransactionExt;
///
/// relmap::transaction!(&mut client, tx, {
///     Sql::<Order>::on(&tx)?.insert(&mut order).await?;
///
///     let sp = tx.begin_savepoint("before_items").await?;
///
///     match Sql::<OrderItem>::on(&sp)?.insert_all(&mut items).await {
///         Ok(_) => sp.release().await?,
///         Err(e) => {
///             sp.rollback().await?;
///             tracing::warn!("Failed to insert items: {}", e);
///         }
///     }
///
///     Ok(())
/// })?;
/// ```
pub struct Savepoint<'a> {
    inner: Option<tokio_postgres::Transaction<'a>>,
    name: String,
}

impl<'a> Savepoint<'a> {
    fn new(inner: tokio_postgres::Transaction<'a>, name: String) -> Self {
        Self {
            inner: Some(inner),
            name,
        }
    }

    /// Returns the savepoint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the savepoint (make changes permanent within the transaction).
    ///
    /// Equivalent to `RELEASE SAVEPOINT name`.
    pub async fn release(mut self) -> OrmResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.commit().await.map_err(OrmError::from_db_error)?;
        }
        Ok(())
    }

    /// Roll back to this savepoint (undo changes made since the savepoint).
    ///
    /// Equivalent to `ROLLBACK TO SAVEPOINT name`.
    pub async fn rollback(mut self) -> OrmResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.rollback().await.map_err(OrmError::from_db_error)?;
        }
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            // The inner transaction rolls back on drop.
            tracing::warn!(
                savepoint = %self.name,
                "savepoint dropped without explicit release or rollback"
            );
        }
    }
}

impl Savepoint<'_> {
    fn active(&self) -> OrmResult<&tokio_postgres::Transaction<'_>> {
        self.inner
            .as_ref()
            .ok_or_else(|| OrmError::invalid_state("savepoint already consumed"))
    }
}

#[async_trait]
impl GenericClient for Savepoint<'_> {
    fn dialect(&self) -> &dyn Dialect {
        static DIALECT: crate::dialect::PostgresDialect = crate::dialect::PostgresDialect;
        &DIALECT
    }

    async fn query(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<Vec<Row>> {
        GenericClient::query(self.active()?, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<u64> {
        GenericClient::execute(self.active()?, sql, params).await
    }
}

// ─── TransactionExt ─────────────────────────────────────────────────────────

/// Extension trait adding savepoint support to transactions.
///
/// # Example
///
/// ```ignore
/// use relmap::TransactionExt;
///
/// relmap::transaction!(&mut client, tx, {
///     let sp = tx.begin_savepoint("before_risky_op").await?;
///     // ... do work ...
///     sp.release().await?;
///     Ok(())
/// })?;
/// ```
pub trait TransactionExt {
    /// Create a named savepoint within this transaction.
    fn begin_savepoint(
        &mut self,
        name: &str,
    ) -> impl std::future::Future<Output = OrmResult<Savepoint<'_>>> + Send;

    /// Create an anonymous savepoint (auto-numbered) within this transaction.
    fn begin_savepoint_anon(
        &mut self,
    ) -> impl std::future::Future<Output = OrmResult<Savepoint<'_>>> + Send;
}

impl TransactionExt for tokio_postgres::Transaction<'_> {
    async fn begin_savepoint(&mut self, name: &str) -> OrmResult<Savepoint<'_>> {
        let inner = self
            .savepoint(name)
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(Savepoint::new(inner, name.to_string()))
    }

    async fn begin_savepoint_anon(&mut self) -> OrmResult<Savepoint<'_>> {
        let name = __next_savepoint_name();
        let inner = self
            .savepoint(&name)
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(Savepoint::new(inner, name))
    }
}

#[cfg(feature = "pool")]
impl TransactionExt for deadpool_postgres::Transaction<'_> {
    async fn begin_savepoint(&mut self, name: &str) -> OrmResult<Savepoint<'_>> {
        // Access the inner tokio_postgres::Transaction via DerefMut to get a
        // tokio_postgres::Transaction savepoint (not the deadpool wrapper).
        let inner_tx: &mut tokio_postgres::Transaction<'_> =
            std::ops::DerefMut::deref_mut(self);
        let inner = inner_tx
            .savepoint(name)
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(Savepoint::new(inner, name.to_string()))
    }

    async fn begin_savepoint_anon(&mut self) -> OrmResult<Savepoint<'_>> {
        let name = __next_savepoint_name();
        let inner_tx: &mut tokio_postgres::Transaction<'_> =
            std::ops::DerefMut::deref_mut(self);
        let inner = inner_tx
            .savepoint(&name)
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(Savepoint::new(inner, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_savepoint_names_are_unique() {
        let a = __next_savepoint_name();
        let b = __next_savepoint_name();
        assert!(a.starts_with("relmap_sp_"));
        assert_ne!(a, b);
    }

    #[test]
    fn successful_rollback_returns_the_body_error() {
        let err = rolled_back::<()>("transaction", OrmError::not_found("gone"), Ok(())).unwrap_err();
        assert!(err.is_not_found());
    }
}
