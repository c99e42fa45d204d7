//! Property accessors for record types.
//!
//! A record type describes its field graph once through [`Property::collect`]
//! (normally generated by `#[derive(Record)]` / `#[derive(Entity)]`). The
//! resulting [`Accessor`] maps dotted property paths such as `name.first` to
//! getter/setter pairs and is cached process-wide per type.

#[cfg(test)]
mod tests;

use crate::convert::TypeConverter;
use crate::entity::FieldMeta;
use crate::error::{OrmError, OrmResult};
use crate::value::{TypeKey, Value, ValueType};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Deepest property path (in segments) a record graph may produce.
pub const MAX_NESTING_DEPTH: usize = 8;

type GetFn<R, F> = Arc<dyn Fn(&R) -> Option<&F> + Send + Sync>;
type GetMutFn<R, F> = Arc<dyn Fn(&mut R) -> Option<&mut F> + Send + Sync>;

/// A path from a root record `R` down to a field of type `F`.
///
/// Resolution yields `None` when an optional record along the way is absent.
pub struct Lens<R, F> {
    get: GetFn<R, F>,
    get_mut: GetMutFn<R, F>,
}

impl<R, F> Clone for Lens<R, F> {
    fn clone(&self) -> Self {
        Self {
            get: self.get.clone(),
            get_mut: self.get_mut.clone(),
        }
    }
}

impl<R: 'static> Lens<R, R> {
    pub fn root() -> Self {
        Lens::new(|r: &R| Some(r), |r: &mut R| Some(r))
    }
}

impl<R: 'static, F: 'static> Lens<R, F> {
    pub fn new<G, M>(get: G, get_mut: M) -> Self
    where
        G: Fn(&R) -> Option<&F> + Send + Sync + 'static,
        M: Fn(&mut R) -> Option<&mut F> + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(get),
            get_mut: Arc::new(get_mut),
        }
    }

    pub fn get<'a>(&self, record: &'a R) -> Option<&'a F> {
        (self.get)(record)
    }

    pub fn get_mut<'a>(&self, record: &'a mut R) -> Option<&'a mut F> {
        (self.get_mut)(record)
    }

    /// Extend the lens by one field projection.
    pub fn field<G: 'static>(&self, get: fn(&F) -> &G, get_mut: fn(&mut F) -> &mut G) -> Lens<R, G> {
        let outer = self.get.clone();
        let outer_mut = self.get_mut.clone();
        Lens::new(
            move |r: &R| outer(r).map(get),
            move |r: &mut R| outer_mut(r).map(get_mut),
        )
    }
}

impl<R: 'static, F: 'static> Lens<R, Option<F>> {
    /// Step into an optional field; resolves to `None` while it is absent.
    pub fn some(&self) -> Lens<R, F> {
        let outer = self.get.clone();
        let outer_mut = self.get_mut.clone();
        Lens::new(
            move |r: &R| outer(r).and_then(Option::as_ref),
            move |r: &mut R| outer_mut(r).and_then(Option::as_mut),
        )
    }
}

/// Join a parent path and a field name into a dotted path.
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// A type that can appear in a record's field graph.
///
/// Scalars register themselves as value properties; records register a
/// structural entry and recurse into their fields.
pub trait Property: Sized + Send + Sync + 'static {
    /// Whether this type registers a nested record rather than a scalar.
    const RECORD: bool = false;

    fn collect<R: 'static>(
        builder: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Self>,
        depth: usize,
    ) -> OrmResult<()>;

    /// Register `Option<Self>` at `path`.
    fn collect_optional<R: 'static>(
        builder: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Option<Self>>,
        depth: usize,
    ) -> OrmResult<()>;
}

macro_rules! impl_scalar_property {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Property for $ty {
                fn collect<R: 'static>(
                    builder: &mut AccessorBuilder<R>,
                    path: &str,
                    lens: Lens<R, Self>,
                    depth: usize,
                ) -> OrmResult<()> {
                    builder.value(path, lens, depth)
                }

                fn collect_optional<R: 'static>(
                    builder: &mut AccessorBuilder<R>,
                    path: &str,
                    lens: Lens<R, Option<Self>>,
                    depth: usize,
                ) -> OrmResult<()> {
                    builder.nullable_value(path, lens, depth)
                }
            }
        )*
    };
}

impl_scalar_property!(
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    Vec<u8>,
    rust_decimal::Decimal,
    uuid::Uuid,
    serde_json::Value,
    std::time::SystemTime,
    chrono::NaiveDate,
    chrono::NaiveTime,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
    chrono::DateTime<chrono::FixedOffset>,
    chrono::DateTime<chrono::Local>,
);

impl<T: Property> Property for Option<T> {
    fn collect<R: 'static>(
        builder: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Self>,
        depth: usize,
    ) -> OrmResult<()> {
        T::collect_optional(builder, path, lens, depth)
    }

    fn collect_optional<R: 'static>(
        builder: &mut AccessorBuilder<R>,
        path: &str,
        _lens: Lens<R, Option<Self>>,
        _depth: usize,
    ) -> OrmResult<()> {
        Err(OrmError::config(format!(
            "{}.{path}: nested Option properties are not supported",
            builder.type_name
        )))
    }
}

impl<T: Property + Default> Property for Box<T> {
    const RECORD: bool = T::RECORD;

    fn collect<R: 'static>(
        builder: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Self>,
        depth: usize,
    ) -> OrmResult<()> {
        T::collect(builder, path, lens.field(|b| &**b, |b| &mut **b), depth)
    }

    fn collect_optional<R: 'static>(
        builder: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Option<Self>>,
        depth: usize,
    ) -> OrmResult<()> {
        if T::RECORD {
            builder.optional_boxed_record(path, lens.clone(), depth)?;
        }
        T::collect(
            builder,
            path,
            lens.some().field(|b| &**b, |b| &mut **b),
            depth,
        )
    }
}

/// What kind of property a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// A scalar leaf, mapped to a column.
    Value { value_type: TypeKey, nullable: bool },
    /// A nested record; its fields appear under `path.`.
    Record { optional: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub path: String,
    pub depth: usize,
    pub kind: PropertyKind,
}

impl PropertyInfo {
    pub fn is_value(&self) -> bool {
        matches!(self.kind, PropertyKind::Value { .. })
    }
}

type ReadFn<R> = Arc<dyn Fn(&R) -> Option<Value> + Send + Sync>;
type WriteFn<R> = Arc<dyn Fn(&mut R, Option<Value>) -> OrmResult<()> + Send + Sync>;
type FillFn<R> = Arc<dyn Fn(&mut R) + Send + Sync>;

enum Slot<R> {
    Value { get: ReadFn<R>, set: WriteFn<R> },
    Record { fill: Option<FillFn<R>> },
}

/// Collects properties while a record type walks its field graph.
pub struct AccessorBuilder<R> {
    type_name: &'static str,
    properties: Vec<PropertyInfo>,
    slots: Vec<Slot<R>>,
    index: HashMap<String, usize>,
    tags: HashMap<String, FieldMeta>,
}

impl<R: 'static> AccessorBuilder<R> {
    fn new() -> Self {
        Self {
            type_name: std::any::type_name::<R>(),
            properties: Vec::new(),
            slots: Vec::new(),
            index: HashMap::new(),
            tags: HashMap::new(),
        }
    }

    fn check_depth(&self, path: &str, depth: usize) -> OrmResult<()> {
        if depth > MAX_NESTING_DEPTH {
            return Err(OrmError::config(format!(
                "{}: property '{path}' exceeds the maximum nesting depth of {MAX_NESTING_DEPTH}",
                self.type_name
            )));
        }
        Ok(())
    }

    fn push(&mut self, info: PropertyInfo, slot: Slot<R>) {
        self.index.insert(info.path.clone(), self.properties.len());
        self.properties.push(info);
        self.slots.push(slot);
    }

    /// Attach declarative field metadata to `path`.
    pub fn tag(&mut self, path: &str, meta: FieldMeta) {
        self.tags.insert(path.to_string(), meta);
    }

    /// Register a non-optional scalar.
    pub fn value<T: ValueType>(&mut self, path: &str, lens: Lens<R, T>, depth: usize) -> OrmResult<()> {
        self.check_depth(path, depth)?;
        let read = lens.clone();
        let name = path.to_string();
        let get: ReadFn<R> = Arc::new(move |r: &R| read.get(r).map(|v| Value::new(v.clone())));
        let set: WriteFn<R> = Arc::new(move |r: &mut R, value: Option<Value>| {
            let Some(value) = value else {
                tracing::warn!(
                    target: "relmap.accessor",
                    property = %name,
                    "ignoring null for a non-optional property"
                );
                return Ok(());
            };
            let value = TypeConverter::convert_to::<T>(value)?;
            match lens.get_mut(r) {
                Some(slot) => *slot = value,
                None => absent(&name),
            }
            Ok(())
        });
        self.push(
            PropertyInfo {
                path: path.to_string(),
                depth,
                kind: PropertyKind::Value {
                    value_type: TypeKey::of::<T>(),
                    nullable: false,
                },
            },
            Slot::Value { get, set },
        );
        Ok(())
    }

    /// Register an `Option` scalar.
    pub fn nullable_value<T: ValueType>(
        &mut self,
        path: &str,
        lens: Lens<R, Option<T>>,
        depth: usize,
    ) -> OrmResult<()> {
        self.check_depth(path, depth)?;
        let read = lens.clone();
        let name = path.to_string();
        let get: ReadFn<R> = Arc::new(move |r: &R| {
            read.get(r)
                .and_then(Option::as_ref)
                .map(|v| Value::new(v.clone()))
        });
        let set: WriteFn<R> = Arc::new(move |r: &mut R, value: Option<Value>| {
            let value = match value {
                Some(value) => Some(TypeConverter::convert_to::<T>(value)?),
                None => None,
            };
            match lens.get_mut(r) {
                Some(slot) => *slot = value,
                None => absent(&name),
            }
            Ok(())
        });
        self.push(
            PropertyInfo {
                path: path.to_string(),
                depth,
                kind: PropertyKind::Value {
                    value_type: TypeKey::of::<T>(),
                    nullable: true,
                },
            },
            Slot::Value { get, set },
        );
        Ok(())
    }

    /// Register a nested record. The root record (empty path) registers nothing.
    pub fn record<T: 'static>(&mut self, path: &str, _lens: Lens<R, T>, depth: usize) -> OrmResult<()> {
        if path.is_empty() || self.index.contains_key(path) {
            return Ok(());
        }
        self.check_depth(path, depth)?;
        self.push(
            PropertyInfo {
                path: path.to_string(),
                depth,
                kind: PropertyKind::Record { optional: false },
            },
            Slot::Record { fill: None },
        );
        Ok(())
    }

    /// Register an optional nested record that can be filled with `T::default()`.
    pub fn optional_record<T: Default + 'static>(
        &mut self,
        path: &str,
        lens: Lens<R, Option<T>>,
        depth: usize,
    ) -> OrmResult<()> {
        if self.index.contains_key(path) {
            return Ok(());
        }
        let fill: FillFn<R> = Arc::new(move |r: &mut R| {
            if let Some(slot) = lens.get_mut(r) {
                slot.get_or_insert_with(T::default);
            }
        });
        self.optional_with(path, depth, fill)
    }

    /// Register an optional boxed record, filled with `Box::new(T::default())`.
    pub fn optional_boxed_record<T: Default + 'static>(
        &mut self,
        path: &str,
        lens: Lens<R, Option<Box<T>>>,
        depth: usize,
    ) -> OrmResult<()> {
        if self.index.contains_key(path) {
            return Ok(());
        }
        let fill: FillFn<R> = Arc::new(move |r: &mut R| {
            if let Some(slot) = lens.get_mut(r) {
                slot.get_or_insert_with(Box::default);
            }
        });
        self.optional_with(path, depth, fill)
    }

    fn optional_with(&mut self, path: &str, depth: usize, fill: FillFn<R>) -> OrmResult<()> {
        self.check_depth(path, depth)?;
        self.push(
            PropertyInfo {
                path: path.to_string(),
                depth,
                kind: PropertyKind::Record { optional: true },
            },
            Slot::Record { fill: Some(fill) },
        );
        Ok(())
    }

    fn finish(self) -> Accessor<R> {
        let value_paths = self
            .properties
            .iter()
            .filter(|p| p.is_value())
            .map(|p| p.path.clone())
            .collect();
        Accessor {
            type_name: self.type_name,
            properties: self.properties,
            slots: self.slots,
            index: self.index,
            value_paths,
            tags: self.tags,
        }
    }
}

fn absent(path: &str) {
    tracing::debug!(
        target: "relmap.accessor",
        property = %path,
        "intermediate record is absent, skipping"
    );
}

/// Getter/setter table for a record type, keyed by dotted property path.
pub struct Accessor<R> {
    type_name: &'static str,
    properties: Vec<PropertyInfo>,
    slots: Vec<Slot<R>>,
    index: HashMap<String, usize>,
    value_paths: Vec<String>,
    tags: HashMap<String, FieldMeta>,
}

fn accessor_cache() -> &'static RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>> {
    static CACHE: OnceLock<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

impl<R: Property> Accessor<R> {
    /// The cached accessor for `R`, built on first use.
    pub fn of() -> OrmResult<Arc<Self>> {
        let key = TypeId::of::<R>();
        let cached = accessor_cache()
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        if let Some(cached) = cached {
            return downcast(cached);
        }

        let mut builder = AccessorBuilder::<R>::new();
        R::collect(&mut builder, "", Lens::root(), 0)?;
        let built: Arc<dyn Any + Send + Sync> = Arc::new(builder.finish());

        let mut cache = accessor_cache().write().unwrap_or_else(|e| e.into_inner());
        let entry = cache.entry(key).or_insert(built).clone();
        drop(cache);
        downcast(entry)
    }
}

fn downcast<T: Any + Send + Sync>(entry: Arc<dyn Any + Send + Sync>) -> OrmResult<Arc<T>> {
    entry.downcast::<T>().map_err(|_| {
        OrmError::Other(format!(
            "metadata cache holds a different type for {}",
            std::any::type_name::<T>()
        ))
    })
}

impl<R> Accessor<R> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Every registered path (records and values) in declaration order.
    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    pub fn property(&self, path: &str) -> Option<&PropertyInfo> {
        self.index.get(path).map(|&i| &self.properties[i])
    }

    /// Scalar leaf paths in declaration order.
    pub fn value_paths(&self) -> &[String] {
        &self.value_paths
    }

    pub(crate) fn tag(&self, path: &str) -> Option<&FieldMeta> {
        self.tags.get(path)
    }

    pub(crate) fn tags(&self) -> impl Iterator<Item = (&String, &FieldMeta)> {
        self.tags.iter()
    }

    fn slot(&self, path: &str) -> OrmResult<&Slot<R>> {
        self.index
            .get(path)
            .map(|&i| &self.slots[i])
            .ok_or_else(|| OrmError::property_not_found(self.type_name, path))
    }

    /// Read a value property. `None` means NULL or an absent intermediate record.
    pub fn get_value(&self, record: &R, path: &str) -> OrmResult<Option<Value>> {
        match self.slot(path)? {
            Slot::Value { get, .. } => Ok(get(record)),
            Slot::Record { .. } => Err(OrmError::invalid_state(format!(
                "{}.{path} is a nested record, not a value property",
                self.type_name
            ))),
        }
    }

    /// Write a value property, converting the value to the property's type first.
    pub fn set_value(&self, record: &mut R, path: &str, value: Option<Value>) -> OrmResult<()> {
        match self.slot(path)? {
            Slot::Value { set, .. } => set(record, value),
            Slot::Record { .. } => Err(OrmError::invalid_state(format!(
                "{}.{path} is a nested record, not a value property",
                self.type_name
            ))),
        }
    }

    /// Fill absent optional records along `path` with their defaults.
    pub fn materialize(&self, record: &mut R, path: &str) {
        let mut end = 0;
        while let Some(pos) = path[end..].find('.') {
            end += pos;
            if let Some(&i) = self.index.get(&path[..end]) {
                if let Slot::Record { fill: Some(fill) } = &self.slots[i] {
                    fill(record);
                }
            }
            end += 1;
        }
    }
}
