//! Global type-conversion registry.
//!
//! Converters are keyed by `"<source>-><destination>"` using canonical type
//! names. A lookup miss walks the source type's declared lineage (interfaces
//! first, then the superclass chain); a path found that way is composed into a
//! direct converter and cached under the requested key.
//!
//! ```ignore
//! use relmap::{TypeConverter, TypeKey, Value};
//!
//! let v = TypeConverter::convert(Some(Value::new(5_i32)), TypeKey::of::<String>())?;
//! assert_eq!(v, Some(Value::new("5".to_string())));
//! ```

mod builtin;
mod temporal;

#[cfg(test)]
mod tests;

use crate::error::{OrmError, OrmResult};
use crate::value::{TypeKey, Value, ValueType};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

pub use temporal::{format_fraction, fraction_digits};

type ConvertFn = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// A conversion function between two concrete types.
#[derive(Clone)]
pub struct TypeConverter {
    source: TypeKey,
    destination: TypeKey,
    func: ConvertFn,
}

impl fmt::Debug for TypeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeConverter")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .finish()
    }
}

/// Registers extra converters when the registry is first built.
///
/// `#[derive(ValueEnum)]` submits one of these for every enum.
pub struct ConverterRegistration {
    pub converters: fn() -> Vec<TypeConverter>,
}

inventory::collect!(ConverterRegistration);

/// Registry key for a converter between two types.
pub fn converter_key(source: TypeKey, destination: TypeKey) -> String {
    format!("{}->{}", source.name(), destination.name())
}

impl TypeConverter {
    /// Build a converter from a typed function.
    pub fn new<S, D, F>(func: F) -> Self
    where
        S: ValueType,
        D: ValueType,
        F: Fn(S) -> Result<D, String> + Send + Sync + 'static,
    {
        Self {
            source: TypeKey::of::<S>(),
            destination: TypeKey::of::<D>(),
            func: Arc::new(move |value: Value| match value.take::<S>() {
                Ok(source) => func(source).map(Value::new),
                Err(other) => Err(format!(
                    "expected {}, got {}",
                    std::any::type_name::<S>(),
                    other.type_name()
                )),
            }),
        }
    }

    /// Converter that returns its input unchanged.
    pub fn identity(key: TypeKey) -> Self {
        Self {
            source: key,
            destination: key,
            func: Arc::new(|value: Value| Ok::<Value, String>(value)),
        }
    }

    pub fn source(&self) -> TypeKey {
        self.source
    }

    pub fn destination(&self) -> TypeKey {
        self.destination
    }

    pub fn key(&self) -> String {
        converter_key(self.source, self.destination)
    }

    /// Apply the converter, reporting failures with both type names and the value.
    pub fn apply(&self, value: Value) -> OrmResult<Value> {
        let shown = format!("{value:?}");
        (self.func)(value).map_err(|reason| OrmError::ConversionFailed {
            from: self.source.name().to_string(),
            to: self.destination.name().to_string(),
            value: shown,
            reason,
        })
    }

    /// Compose `self` with `next`: the result converts `self.source` to `next.destination`.
    pub fn then(&self, next: &TypeConverter) -> TypeConverter {
        let first = self.func.clone();
        let second = next.func.clone();
        TypeConverter {
            source: self.source,
            destination: next.destination,
            func: Arc::new(move |value: Value| -> Result<Value, String> {
                second(first(value)?)
            }),
        }
    }

    /// Add a converter to the global registry, replacing any entry for the same key.
    pub fn register(self) {
        let reg = registry();
        let mut converters = reg.converters.write().unwrap_or_else(|e| e.into_inner());
        converters.insert(self.key(), self);
    }

    /// Whether a converter is currently registered under the exact key.
    pub fn is_registered(source: TypeKey, destination: TypeKey) -> bool {
        exact(source, destination).is_some()
    }

    /// Resolve a converter, falling back to the source type's lineage.
    pub fn get(source: TypeKey, destination: TypeKey) -> OrmResult<TypeConverter> {
        if source == destination {
            return Ok(TypeConverter::identity(source));
        }
        if let Some(found) = exact(source, destination) {
            return Ok(found);
        }

        let mut visited = HashSet::new();
        match search_lineage(source, destination, &mut visited) {
            Some(found) => {
                tracing::debug!(
                    target: "relmap.convert",
                    key = %converter_key(source, destination),
                    "cached converter found through type lineage"
                );
                let reg = registry();
                let mut converters = reg.converters.write().unwrap_or_else(|e| e.into_inner());
                let entry = converters
                    .entry(converter_key(source, destination))
                    .or_insert(found);
                Ok(entry.clone())
            }
            None => Err(OrmError::ConversionNotFound {
                from: source.name().to_string(),
                to: destination.name().to_string(),
            }),
        }
    }

    /// Typed form of [`TypeConverter::get`].
    pub fn get_for<S: ValueType, D: ValueType>() -> OrmResult<TypeConverter> {
        Self::get(TypeKey::of::<S>(), TypeKey::of::<D>())
    }

    /// Convert a nullable value to `destination`.
    ///
    /// `None` stays `None`; a value already of the destination type is returned as is.
    pub fn convert(value: Option<Value>, destination: TypeKey) -> OrmResult<Option<Value>> {
        let Some(value) = value else {
            return Ok(None);
        };
        if value.type_key() == destination {
            return Ok(Some(value));
        }
        let converter = match Self::get(value.type_key(), destination) {
            Ok(converter) => converter,
            Err(OrmError::ConversionNotFound { from, to }) => {
                return Err(OrmError::ConversionFailed {
                    from,
                    to,
                    value: format!("{value:?}"),
                    reason: "no converter registered".to_string(),
                });
            }
            Err(other) => return Err(other),
        };
        converter.apply(value).map(Some)
    }

    /// Convert a value into a concrete type.
    pub fn convert_to<D: ValueType>(value: Value) -> OrmResult<D> {
        let source = value.type_key();
        let converted = Self::convert(Some(value), TypeKey::of::<D>())?;
        match converted.map(Value::take::<D>) {
            Some(Ok(value)) => Ok(value),
            _ => Err(OrmError::ConversionFailed {
                from: source.name().to_string(),
                to: std::any::type_name::<D>().to_string(),
                value: String::new(),
                reason: "converter produced a different type".to_string(),
            }),
        }
    }

    /// Compose `A -> B -> C` out of registered converters through the explicit middle type `B`.
    pub fn chain<A: ValueType, B: ValueType, C: ValueType>() -> OrmResult<TypeConverter> {
        let first = Self::get_for::<A, B>()?;
        let second = Self::get_for::<B, C>()?;
        Ok(first.then(&second))
    }
}

/// Declare that `S` implements the interface `I`; lookups from `S` may go through `I`.
pub fn register_interface<S, I, F>(upcast: F)
where
    S: ValueType,
    I: ValueType,
    F: Fn(S) -> I + Send + Sync + 'static,
{
    let up = TypeConverter::new(move |value: S| Ok(upcast(value)));
    let reg = registry();
    let mut interfaces = reg.interfaces.write().unwrap_or_else(|e| e.into_inner());
    push_interface(&mut interfaces, up);
}

/// Declare `P` as the superclass of `S`; searched after `S`'s interfaces.
pub fn register_superclass<S, P, F>(upcast: F)
where
    S: ValueType,
    P: ValueType,
    F: Fn(S) -> P + Send + Sync + 'static,
{
    let up = TypeConverter::new(move |value: S| Ok(upcast(value)));
    let reg = registry();
    let mut superclasses = reg.superclasses.write().unwrap_or_else(|e| e.into_inner());
    superclasses.insert(up.source, up);
}

fn push_interface(interfaces: &mut HashMap<TypeKey, Vec<TypeConverter>>, up: TypeConverter) {
    let list = interfaces.entry(up.source).or_default();
    list.retain(|existing| existing.destination != up.destination);
    list.push(up);
}

struct Registry {
    converters: RwLock<HashMap<String, TypeConverter>>,
    interfaces: RwLock<HashMap<TypeKey, Vec<TypeConverter>>>,
    superclasses: RwLock<HashMap<TypeKey, TypeConverter>>,
}

/// Builder-side view of the tables while built-ins are loaded.
pub(crate) struct Tables {
    converters: HashMap<String, TypeConverter>,
    interfaces: HashMap<TypeKey, Vec<TypeConverter>>,
    superclasses: HashMap<TypeKey, TypeConverter>,
}

impl Tables {
    pub(crate) fn add(&mut self, converter: TypeConverter) {
        self.converters.insert(converter.key(), converter);
    }

    pub(crate) fn interface<S, I, F>(&mut self, upcast: F)
    where
        S: ValueType,
        I: ValueType,
        F: Fn(S) -> I + Send + Sync + 'static,
    {
        push_interface(
            &mut self.interfaces,
            TypeConverter::new(move |value: S| Ok(upcast(value))),
        );
    }

    pub(crate) fn superclass<S, P, F>(&mut self, upcast: F)
    where
        S: ValueType,
        P: ValueType,
        F: Fn(S) -> P + Send + Sync + 'static,
    {
        let up = TypeConverter::new(move |value: S| Ok(upcast(value)));
        self.superclasses.insert(up.source, up);
    }

    /// Compose two already-loaded converters through `B`.
    pub(crate) fn chain<A: ValueType, B: ValueType, C: ValueType>(&mut self) {
        let first = self
            .converters
            .get(&converter_key(TypeKey::of::<A>(), TypeKey::of::<B>()))
            .cloned();
        let second = self
            .converters
            .get(&converter_key(TypeKey::of::<B>(), TypeKey::of::<C>()))
            .cloned();
        if let (Some(first), Some(second)) = (first, second) {
            self.add(first.then(&second));
        }
    }
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut tables = Tables {
            converters: HashMap::new(),
            interfaces: HashMap::new(),
            superclasses: HashMap::new(),
        };
        builtin::load(&mut tables);
        temporal::load(&mut tables);
        for registration in inventory::iter::<ConverterRegistration> {
            for converter in (registration.converters)() {
                tables.add(converter);
            }
        }
        Registry {
            converters: RwLock::new(tables.converters),
            interfaces: RwLock::new(tables.interfaces),
            superclasses: RwLock::new(tables.superclasses),
        }
    })
}

fn exact(source: TypeKey, destination: TypeKey) -> Option<TypeConverter> {
    let reg = registry();
    let converters = reg.converters.read().unwrap_or_else(|e| e.into_inner());
    converters.get(&converter_key(source, destination)).cloned()
}

fn lineage(source: TypeKey) -> (Vec<TypeConverter>, Option<TypeConverter>) {
    let reg = registry();
    let interfaces = reg
        .interfaces
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&source)
        .cloned()
        .unwrap_or_default();
    let superclass = reg
        .superclasses
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&source)
        .cloned();
    (interfaces, superclass)
}

/// Depth-first search: every interface (recursively) before the superclass chain.
fn search_lineage(
    source: TypeKey,
    destination: TypeKey,
    visited: &mut HashSet<TypeKey>,
) -> Option<TypeConverter> {
    if !visited.insert(source) {
        return None;
    }
    let (interfaces, superclass) = lineage(source);
    for up in interfaces.iter().chain(superclass.iter()) {
        if up.destination == destination {
            return Some(up.clone());
        }
        if let Some(next) = exact(up.destination, destination) {
            return Some(up.then(&next));
        }
        if let Some(next) = search_lineage(up.destination, destination, visited) {
            return Some(up.then(&next));
        }
    }
    None
}
