//! Terminal operations: rendering, execution and row mapping.

use super::{Projected, QueryState, Sql};
use crate::accessor::Accessor;
use crate::client::{GenericClient, Row};
use crate::condition::Condition;
use crate::dialect::Dialect;
use crate::entity::{Entity, EntityInfo};
use crate::error::{OrmError, OrmResult};
use crate::statement::Statement;
use crate::value::{TypeKey, Value};
use std::sync::Arc;

/// Where one projected column lands in the target record.
struct Slot {
    index: usize,
    path: String,
    value_type: TypeKey,
}

/// Row-to-record mapping for one table of a projection.
struct Mapping<R: Entity> {
    accessor: Arc<Accessor<R>>,
    slots: Vec<Slot>,
}

impl<R: Entity> Mapping<R> {
    /// Map the columns projected from `table` onto `R` by property path, then by column name.
    fn new(projection: &[Projected<'_>], table: usize) -> OrmResult<Self> {
        let info = EntityInfo::of::<R>()?;
        let accessor = info.accessor::<R>()?;
        let slots = projection
            .iter()
            .enumerate()
            .filter(|(_, p)| p.table == table)
            .filter_map(|(index, p)| {
                let target = info
                    .find(p.column.property())
                    .or_else(|| info.find(p.column.column_name()))?;
                let column = info.column(target);
                Some(Slot {
                    index,
                    path: column.property().to_string(),
                    value_type: column.value_type(),
                })
            })
            .collect();
        Ok(Self { accessor, slots })
    }

    fn load(&self, dialect: &dyn Dialect, row: &Row) -> OrmResult<R> {
        let mut record = R::default();
        for slot in &self.slots {
            let Some(value) = dialect.read_value(row.get(slot.index).cloned(), slot.value_type)?
            else {
                continue;
            };
            self.accessor.materialize(&mut record, &slot.path);
            self.accessor.set_value(&mut record, &slot.path, Some(value))?;
        }
        if let Some(hook) = record.as_post_load() {
            hook.post_load()?;
        }
        Ok(record)
    }

    /// `None` when every mapped column of the row is NULL.
    fn load_optional(&self, dialect: &dyn Dialect, row: &Row) -> OrmResult<Option<R>> {
        if self.slots.iter().all(|slot| row.get(slot.index).is_none()) {
            return Ok(None);
        }
        self.load(dialect, row).map(Some)
    }
}

/// Generates `select_join*` for a number of joined record types.
macro_rules! impl_select_join {
    ($(#[$doc:meta])* $name:ident, $($join:ident / $var:ident = $index:literal),+) => {
        $(#[$doc])*
        pub async fn $name<$($join: Entity),+>(
            &self,
            mut callback: impl FnMut(E, $(Option<$join>),+) -> OrmResult<()>,
        ) -> OrmResult<u64> {
            let mut state = self.prepared();
            $( Self::check_join::<$join>(&state, $index)?; )+
            let (dialect, rows) = self.query_rows(&mut state).await?;
            let projection = state.projection()?;
            let main = Mapping::<E>::new(&projection, 0)?;
            $( let $var = Mapping::<$join>::new(&projection, $index)?; )+
            let mut count = 0;
            for row in &rows {
                callback(main.load(dialect, row)?, $($var.load_optional(dialect, row)?),+)?;
                count += 1;
            }
            Ok(count)
        }
    };
}

impl<'c, E: Entity> Sql<'c, E> {
    fn client(&self) -> OrmResult<&'c dyn GenericClient> {
        self.client.ok_or_else(|| {
            OrmError::invalid_state("no connection bound; call Sql::connection or Sql::on first")
        })
    }

    /// A private copy with the source record's condition as the default WHERE.
    fn prepared(&self) -> QueryState {
        let mut state = self.state.clone();
        if state.where_.is_empty() {
            if let Some(source) = &state.source {
                state.where_ = source.clone();
            }
        }
        state
    }

    fn check_join<J: Entity>(state: &QueryState, index: usize) -> OrmResult<()> {
        let Some(join) = state.joins.get(index - 1) else {
            return Err(OrmError::invalid_state(format!(
                "select_join needs {index} join(s), {} configured",
                state.joins.len()
            )));
        };
        let expected = TypeKey::of::<J>();
        if join.source.info().type_key() != expected {
            return Err(OrmError::invalid_state(format!(
                "join '{}' reads {}, not {expected}",
                join.alias,
                join.source.info().type_key()
            )));
        }
        Ok(())
    }

    /// Rewrite the pagination for dialects without OFFSET; returns the rows to skip.
    fn paginate(&self, state: &mut QueryState, dialect: &dyn Dialect) -> OrmResult<usize> {
        let offset = state.offset.unwrap_or(0);
        if offset == 0 || dialect.supports_offset() {
            return Ok(0);
        }
        if !self.config.emulate_offset {
            return Err(OrmError::invalid_state(format!(
                "the {} dialect has no OFFSET and offset emulation is disabled",
                dialect.name()
            )));
        }
        state.limit = state.limit.map(|limit| limit.saturating_add(offset));
        state.offset = None;
        tracing::debug!(target: "relmap.sql", offset, "emulating OFFSET by skipping rows");
        usize::try_from(offset).map_err(|_| OrmError::invalid_state(format!("offset {offset} is too large")))
    }

    async fn query_rows(&self, state: &mut QueryState) -> OrmResult<(&'c dyn Dialect, Vec<Row>)> {
        let client = self.client()?;
        let dialect = client.dialect();
        let skip = self.paginate(state, dialect)?;
        let stmt = dialect.select(state)?;
        self.config.sql_log.emit("select", stmt.sql(), stmt.params().len());
        let rows = client.query(stmt.sql(), stmt.params()).await?;
        Ok((dialect, rows.into_iter().skip(skip).collect()))
    }

    async fn run(&self, client: &dyn GenericClient, kind: &str, stmt: &Statement) -> OrmResult<u64> {
        self.config.sql_log.emit(kind, stmt.sql(), stmt.params().len());
        client.execute(stmt.sql(), stmt.params()).await
    }

    /// Run the query and pass each row, mapped to `E`, to `callback`.
    pub async fn select(&self, callback: impl FnMut(E) -> OrmResult<()>) -> OrmResult<u64> {
        self.select_as::<E>(callback).await
    }

    /// Run the query and pass each row, mapped to `R`, to `callback`.
    ///
    /// Without explicit columns the projection is `R`'s selectable columns,
    /// read from the main table or from named expressions.
    pub async fn select_as<R: Entity>(
        &self,
        mut callback: impl FnMut(R) -> OrmResult<()>,
    ) -> OrmResult<u64> {
        let mut state = self.prepared();
        state.result = Some(EntityInfo::of::<R>()?);
        let (dialect, rows) = self.query_rows(&mut state).await?;
        let projection = state.projection()?;
        let main = Mapping::<R>::new(&projection, 0)?;
        let mut count = 0;
        for row in &rows {
            callback(main.load(dialect, row)?)?;
            count += 1;
        }
        Ok(count)
    }

    impl_select_join!(
        /// Like [`Sql::select`], also mapping the first joined table.
        ///
        /// A joined record is `None` when all of its columns are NULL (an
        /// unmatched outer join).
        select_join, J1 / j1 = 1
    );
    impl_select_join!(select_join2, J1 / j1 = 1, J2 / j2 = 2);
    impl_select_join!(select_join3, J1 / j1 = 1, J2 / j2 = 2, J3 / j3 = 3);
    impl_select_join!(
        select_join4,
        J1 / j1 = 1,
        J2 / j2 = 2,
        J3 / j3 = 3,
        J4 / j4 = 4
    );

    pub async fn select_all(&self) -> OrmResult<Vec<E>> {
        self.select_all_as::<E>().await
    }

    pub async fn select_all_as<R: Entity>(&self) -> OrmResult<Vec<R>> {
        let mut records = Vec::new();
        self.select_as::<R>(|record| {
            records.push(record);
            Ok(())
        })
        .await?;
        Ok(records)
    }

    /// At most one row; more than one is [`OrmError::TooMany`].
    pub async fn select_one(&self) -> OrmResult<Option<E>> {
        self.select_one_as::<E>().await
    }

    /// Rows are counted before any is mapped, so a second row is reported
    /// as [`OrmError::TooMany`] even when a later row would fail to convert.
    pub async fn select_one_as<R: Entity>(&self) -> OrmResult<Option<R>> {
        let mut state = self.prepared();
        state.result = Some(EntityInfo::of::<R>()?);
        let (dialect, rows) = self.query_rows(&mut state).await?;
        if rows.len() > 1 {
            return Err(OrmError::too_many(1, rows.len()));
        }
        let projection = state.projection()?;
        let main = Mapping::<R>::new(&projection, 0)?;
        rows.first().map(|row| main.load(dialect, row)).transpose()
    }

    /// Exactly one row; none is [`OrmError::NotFound`].
    pub async fn select_one_strict(&self) -> OrmResult<E> {
        self.select_one().await?.ok_or_else(|| {
            OrmError::not_found(format!("no {} row matched", self.state.info.type_key()))
        })
    }

    pub async fn select_count(&self) -> OrmResult<i64> {
        let client = self.client()?;
        let stmt = client.dialect().count(&self.prepared())?;
        self.config.sql_log.emit("count", stmt.sql(), stmt.params().len());
        let rows = client.query(stmt.sql(), stmt.params()).await?;
        let raw = rows.first().and_then(|row| row.get(0)).cloned();
        let count = client.dialect().read_value(raw, TypeKey::of::<i64>())?;
        Ok(count
            .as_ref()
            .and_then(Value::downcast_ref::<i64>)
            .copied()
            .unwrap_or(0))
    }

    /// Insert `record`, running its pre-store, pre-insert and post-insert hooks.
    ///
    /// Returns the inserted rows plus the counts the hooks report.
    pub async fn insert(&self, record: &mut E) -> OrmResult<u64> {
        let client = self.client()?;
        let mut count = 0;
        if let Some(hook) = record.as_pre_store() {
            hook.pre_store()?;
        }
        if let Some(hook) = record.as_pre_insert() {
            count += hook.pre_insert(client).await?;
        }
        let values = self.state.info.values(record)?;
        let stmt = client.dialect().insert(&self.state, &values)?;
        count += self.run(client, "insert", &stmt).await?;
        if let Some(hook) = record.as_post_insert() {
            count += hook.post_insert(client).await?;
        }
        Ok(count)
    }

    pub async fn insert_all(&self, records: &mut [E]) -> OrmResult<u64> {
        let mut count = 0;
        for record in records {
            count += self.insert(record).await?;
        }
        Ok(count)
    }

    /// Update the rows matched by WHERE, or `record`'s own row when WHERE is unset.
    pub async fn update(&self, record: &mut E) -> OrmResult<u64> {
        let client = self.client()?;
        if let Some(hook) = record.as_pre_store() {
            hook.pre_store()?;
        }
        let mut state = self.state.clone();
        if state.where_.is_empty() {
            state.where_ = Condition::entity(record)?;
        }
        self.update_with(client, &state, record).await
    }

    /// Update each record's own row, ignoring the builder's WHERE.
    pub async fn update_all(&self, records: &mut [E]) -> OrmResult<u64> {
        let client = self.client()?;
        let mut count = 0;
        for record in records {
            if let Some(hook) = record.as_pre_store() {
                hook.pre_store()?;
            }
            let mut state = self.state.clone();
            state.where_ = Condition::entity(record)?;
            count += self.update_with(client, &state, record).await?;
        }
        Ok(count)
    }

    async fn update_with(
        &self,
        client: &dyn GenericClient,
        state: &QueryState,
        record: &mut E,
    ) -> OrmResult<u64> {
        let values = state.info.values(record)?;
        let stmt = client.dialect().update(state, &values)?;
        let mut count = self.run(client, "update", &stmt).await?;
        if let Some(hook) = record.as_post_update() {
            count += hook.post_update(client).await?;
        }
        Ok(count)
    }

    /// Delete the rows matched by WHERE.
    ///
    /// Without a WHERE condition nothing is sent and 0 is returned; use
    /// [`Condition::All`] to delete every row.
    pub async fn delete(&self) -> OrmResult<u64> {
        let state = self.prepared();
        if state.where_.is_empty() {
            tracing::warn!(
                target: "relmap.sql",
                entity = %state.info.type_key(),
                "refusing DELETE without a WHERE condition"
            );
            return Ok(0);
        }
        let client = self.client()?;
        let stmt = client.dialect().delete(&state)?;
        self.run(client, "delete", &stmt).await
    }

    /// Delete `record`'s own row and run its post-delete hook.
    pub async fn delete_record(&self, record: &E) -> OrmResult<u64> {
        let client = self.client()?;
        let mut state = self.state.clone();
        state.where_ = Condition::entity(record)?;
        let stmt = client.dialect().delete(&state)?;
        let mut count = self.run(client, "delete", &stmt).await?;
        if let Some(hook) = record.as_post_delete() {
            count += hook.post_delete(client).await?;
        }
        Ok(count)
    }

    pub async fn delete_all(&self, records: &[E]) -> OrmResult<u64> {
        let mut count = 0;
        for record in records {
            count += self.delete_record(record).await?;
        }
        Ok(count)
    }

    /// Render the SELECT [`Sql::select`] would run.
    pub fn to_select_sql(&self, dialect: &dyn Dialect) -> OrmResult<Statement> {
        let mut state = self.prepared();
        self.paginate(&mut state, dialect)?;
        dialect.select(&state)
    }

    pub fn to_count_sql(&self, dialect: &dyn Dialect) -> OrmResult<Statement> {
        dialect.count(&self.prepared())
    }

    pub fn to_delete_sql(&self, dialect: &dyn Dialect) -> OrmResult<Statement> {
        dialect.delete(&self.prepared())
    }

    pub fn to_insert_sql(&self, dialect: &dyn Dialect, record: &E) -> OrmResult<Statement> {
        let values = self.state.info.values(record)?;
        dialect.insert(&self.state, &values)
    }

    pub fn to_update_sql(&self, dialect: &dyn Dialect, record: &E) -> OrmResult<Statement> {
        let mut state = self.state.clone();
        if state.where_.is_empty() {
            state.where_ = Condition::entity(record)?;
        }
        let values = state.info.values(record)?;
        dialect.update(&state, &values)
    }
}
