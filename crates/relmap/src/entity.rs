//! Entity and column metadata.
//!
//! [`EntityInfo`] is derived once per record type from its [`Accessor`] and
//! declarative metadata, then cached for the life of the process. Metadata
//! precedence per column: a type-level `property(path = ...)` override, then
//! the field's own `#[orm(...)]` tag, then the structural default.


use crate::accessor::{Accessor, Property, PropertyKind};
use crate::error::{OrmError, OrmResult};
use crate::hooks::{PostDelete, PostInsert, PostLoad, PostUpdate, PreInsert, PreStore};
use crate::ident::Ident;
use crate::value::{TypeKey, Value};
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};

/// A record type mapped to a table.
///
/// Implemented by `#[derive(Entity)]`. The `as_*` methods expose the
/// lifecycle hooks the type opted into; the defaults report none.
pub trait Entity: Property + Default {
    /// Table name, possibly schema-qualified.
    fn table_name() -> String;

    /// Type-level metadata overrides, keyed by property path.
    fn overrides() -> Vec<(&'static str, FieldMeta)> {
        Vec::new()
    }

    fn as_pre_store(&mut self) -> Option<&mut dyn PreStore> {
        None
    }

    fn as_pre_insert(&mut self) -> Option<&mut dyn PreInsert> {
        None
    }

    fn as_post_insert(&mut self) -> Option<&mut dyn PostInsert> {
        None
    }

    fn as_post_update(&mut self) -> Option<&mut dyn PostUpdate> {
        None
    }

    fn as_post_delete(&self) -> Option<&dyn PostDelete> {
        None
    }

    fn as_post_load(&mut self) -> Option<&mut dyn PostLoad> {
        None
    }
}

/// How a column takes part in one kind of statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpExpr {
    /// Left out of the statement.
    Excluded,
    /// Plain column reference (select) or bound value (insert/update).
    Plain,
    /// Custom SQL; `{}` stands for the column reference (select) or the bound value (insert/update).
    Custom(String),
}

impl OpExpr {
    pub fn is_excluded(&self) -> bool {
        matches!(self, OpExpr::Excluded)
    }
}

/// Declarative metadata for one property. Unset fields defer to lower-precedence sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMeta {
    pub column: Option<String>,
    pub column_type: Option<String>,
    pub key: Option<bool>,
    pub select: Option<OpExpr>,
    pub insert: Option<OpExpr>,
    pub update: Option<OpExpr>,
    pub transient: Option<bool>,
}

impl FieldMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column = Some(name.into());
        self
    }

    pub fn column_type(mut self, ty: impl Into<String>) -> Self {
        self.column_type = Some(ty.into());
        self
    }

    pub fn key(mut self, key: bool) -> Self {
        self.key = Some(key);
        self
    }

    pub fn select(mut self, expr: OpExpr) -> Self {
        self.select = Some(expr);
        self
    }

    pub fn insert(mut self, expr: OpExpr) -> Self {
        self.insert = Some(expr);
        self
    }

    pub fn update(mut self, expr: OpExpr) -> Self {
        self.update = Some(expr);
        self
    }

    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = Some(transient);
        self
    }

    /// Fill every unset field from `lower`.
    pub fn or(self, lower: &FieldMeta) -> FieldMeta {
        FieldMeta {
            column: self.column.or_else(|| lower.column.clone()),
            column_type: self.column_type.or_else(|| lower.column_type.clone()),
            key: self.key.or(lower.key),
            select: self.select.or_else(|| lower.select.clone()),
            insert: self.insert.or_else(|| lower.insert.clone()),
            update: self.update.or_else(|| lower.update.clone()),
            transient: self.transient.or(lower.transient),
        }
    }
}

/// Metadata for one value property mapped to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    property: String,
    column: Ident,
    column_type: Option<String>,
    key: bool,
    value_type: TypeKey,
    nullable: bool,
    select: OpExpr,
    insert: OpExpr,
    update: OpExpr,
}

impl ColumnInfo {
    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn column(&self) -> &Ident {
        &self.column
    }

    pub fn column_name(&self) -> &str {
        self.column.last_name()
    }

    /// Declared database type, used to cast bound values.
    pub fn column_type(&self) -> Option<&str> {
        self.column_type.as_deref()
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    pub fn value_type(&self) -> TypeKey {
        self.value_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn select_expr(&self) -> &OpExpr {
        &self.select
    }

    pub fn insert_expr(&self) -> &OpExpr {
        &self.insert
    }

    pub fn update_expr(&self) -> &OpExpr {
        &self.update
    }
}

/// Table and column metadata for a record type.
pub struct EntityInfo {
    type_key: TypeKey,
    table: Ident,
    columns: Vec<ColumnInfo>,
    keys: Vec<usize>,
    by_property: HashMap<String, usize>,
    by_column: HashMap<String, usize>,
    accessor: Arc<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for EntityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityInfo")
            .field("type", &self.type_key)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .finish()
    }
}

impl PartialEq for EntityInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_key == other.type_key
    }
}

fn entity_cache() -> &'static RwLock<HashMap<TypeId, Arc<EntityInfo>>> {
    static CACHE: OnceLock<RwLock<HashMap<TypeId, Arc<EntityInfo>>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

fn leaf(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn is_under(path: &str, prefix: &str) -> bool {
    path == prefix
        || (path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'.')
}

impl EntityInfo {
    /// The cached metadata for `E`, built on first use.
    pub fn of<E: Entity>() -> OrmResult<Arc<EntityInfo>> {
        let key = TypeId::of::<E>();
        if let Some(info) = entity_cache()
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(info.clone());
        }

        let built = Arc::new(Self::build::<E>()?);
        let mut cache = entity_cache().write().unwrap_or_else(|e| e.into_inner());
        Ok(cache.entry(key).or_insert(built).clone())
    }

    fn build<E: Entity>() -> OrmResult<EntityInfo> {
        let accessor = Accessor::<E>::of()?;
        let type_name = std::any::type_name::<E>();
        let table_name = E::table_name();
        let table = Ident::parse(&table_name)?;

        let mut overrides: HashMap<String, FieldMeta> = HashMap::new();
        for (path, meta) in E::overrides() {
            if accessor.property(path).is_none() {
                return Err(OrmError::config(format!(
                    "{type_name}: override for unknown property '{path}'"
                )));
            }
            overrides.insert(path.to_string(), meta);
        }

        let transient: Vec<String> = accessor
            .tags()
            .map(|(path, meta)| (path.clone(), overrides.get(path).cloned().unwrap_or_default().or(meta)))
            .chain(overrides.iter().map(|(path, meta)| (path.clone(), meta.clone())))
            .filter(|(_, meta)| meta.transient == Some(true))
            .map(|(path, _)| path)
            .collect();

        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        for path in accessor.value_paths() {
            if transient.iter().any(|t| is_under(path, t)) {
                continue;
            }
            let Some(PropertyKind::Value {
                value_type,
                nullable,
            }) = accessor.property(path).map(|p| p.kind)
            else {
                continue;
            };

            let tag = accessor.tag(path).cloned().unwrap_or_default();
            let meta = overrides.get(path).cloned().unwrap_or_default().or(&tag);

            let column_name = meta.column.clone().unwrap_or_else(|| leaf(path).to_string());
            let column = Ident::simple(&column_name)?;
            if !seen.insert(column.last_name().to_string()) {
                return Err(OrmError::config(format!(
                    "{type_name}: column '{column_name}' is mapped more than once"
                )));
            }

            let key = meta.key.unwrap_or(false);
            let default_update = if key { OpExpr::Excluded } else { OpExpr::Plain };
            columns.push(ColumnInfo {
                property: path.clone(),
                column,
                column_type: meta.column_type.clone(),
                key,
                value_type,
                nullable,
                select: meta.select.clone().unwrap_or(OpExpr::Plain),
                insert: meta.insert.clone().unwrap_or(OpExpr::Plain),
                update: meta.update.clone().unwrap_or(default_update),
            });
        }

        if columns.is_empty() {
            return Err(OrmError::config(format!("{type_name} has no column properties")));
        }

        let keys = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.key)
            .map(|(i, _)| i)
            .collect();
        let by_property = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.property.clone(), i))
            .collect();
        let by_column = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.column_name().to_string(), i))
            .collect();

        tracing::debug!(
            target: "relmap.entity",
            entity = type_name,
            table = %table_name,
            columns = columns.len(),
            "built entity metadata"
        );

        Ok(EntityInfo {
            type_key: TypeKey::of::<E>(),
            table,
            columns,
            keys,
            by_property,
            by_column,
            accessor,
        })
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn table(&self) -> &Ident {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> &ColumnInfo {
        &self.columns[index]
    }

    /// Key columns, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.keys.iter().map(|&i| &self.columns[i])
    }

    pub fn has_keys(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Find a column by property path, falling back to the column name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_property
            .get(name)
            .or_else(|| self.by_column.get(name))
            .copied()
    }

    /// The typed accessor this metadata was built from.
    pub fn accessor<E: Entity>(&self) -> OrmResult<Arc<Accessor<E>>> {
        self.accessor.clone().downcast::<Accessor<E>>().map_err(|_| {
            OrmError::invalid_state(format!(
                "{} metadata used with record type {}",
                self.type_key,
                std::any::type_name::<E>()
            ))
        })
    }

    /// Values of the columns that identify `record`: its keys, or every column without keys.
    pub fn identity_values<E: Entity>(&self, record: &E) -> OrmResult<Vec<(usize, Option<Value>)>> {
        let accessor = self.accessor::<E>()?;
        let indices: Vec<usize> = if self.keys.is_empty() {
            (0..self.columns.len()).collect()
        } else {
            self.keys.clone()
        };
        indices
            .into_iter()
            .map(|i| Ok((i, accessor.get_value(record, &self.columns[i].property)?)))
            .collect()
    }

    /// Current values of every column of `record`.
    pub fn values<E: Entity>(&self, record: &E) -> OrmResult<Vec<Option<Value>>> {
        let accessor = self.accessor::<E>()?;
        self.columns
            .iter()
            .map(|c| accessor.get_value(record, &c.property))
            .collect()
    }
}
