//! Type-erased scalar values.
//!
//! [`Value`] is what flows between record accessors, converters, statement
//! parameters and result rows. SQL `NULL` is represented as `Option::None`
//! around a `Value`, never as a value of its own.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Bounds every concrete type stored inside a [`Value`] must satisfy.
pub trait ValueType: Any + Clone + PartialEq + fmt::Debug + Send + Sync {}

impl<T> ValueType for T where T: Any + Clone + PartialEq + fmt::Debug + Send + Sync {}

/// Identity of a Rust type, with its canonical name for messages and registry keys.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Canonical (fully qualified) type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this key identifies `T`.
    pub fn is<T: Any + ?Sized>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

trait ValueObject: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn clone_box(&self) -> Box<dyn ValueObject>;
    fn eq_dyn(&self, other: &dyn ValueObject) -> bool;
    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
    fn type_key(&self) -> TypeKey;
}

impl<T: ValueType> ValueObject for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_box(&self) -> Box<dyn ValueObject> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn ValueObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }

    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }
}

/// A cloneable, comparable, type-erased scalar.
pub struct Value(Box<dyn ValueObject>);

impl Value {
    /// Wrap a concrete value. Wrapping a `Value` returns it unchanged.
    pub fn new<T: ValueType>(value: T) -> Self {
        let boxed: Box<dyn ValueObject> = Box::new(value);
        match boxed.as_any().downcast_ref::<Value>() {
            Some(inner) => inner.clone(),
            None => Value(boxed),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.0.type_key()
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_key().name()
    }

    pub fn is<T: ValueType>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    pub fn downcast_ref<T: ValueType>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Move the concrete value out, or hand the `Value` back if it holds another type.
    pub fn take<T: ValueType>(self) -> Result<T, Value> {
        if self.is::<T>() {
            match self.0.into_any().downcast::<T>() {
                Ok(value) => Ok(*value),
                // `is::<T>()` just succeeded, so the downcast cannot fail.
                Err(_) => unreachable!("value type changed during downcast"),
            }
        } else {
            Err(self)
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        Value(self.0.clone_box())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_dyn(other.0.as_ref())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.debug(f)
    }
}

/// Conversion into a bindable argument (`None` binds SQL `NULL`).
pub trait IntoValue {
    fn into_value(self) -> Option<Value>;
}

impl IntoValue for Value {
    fn into_value(self) -> Option<Value> {
        Some(self)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Option<Value> {
        self.and_then(IntoValue::into_value)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Option<Value> {
        Some(Value::new(self.to_string()))
    }
}

impl IntoValue for &[u8] {
    fn into_value(self) -> Option<Value> {
        Some(Value::new(self.to_vec()))
    }
}

macro_rules! impl_into_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Option<Value> {
                    Some(Value::new(self))
                }
            }
        )*
    };
}

impl_into_value!(
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

/// Build a `Vec<Option<Value>>` from heterogeneous arguments.
///
/// ```ignore
/// let args = relmap::args![1_i64, "Apple", None::<String>];
/// ```
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<::std::option::Option<$crate::Value>>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::IntoValue::into_value($arg)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_and_compares() {
        let a = Value::new(5_i32);
        assert_eq!(a, Value::new(5_i32));
        assert_ne!(a, Value::new(5_i64));
        assert_eq!(a.downcast_ref::<i32>(), Some(&5));
        assert!(a.type_key().is::<i32>());
    }

    #[test]
    fn wrapping_a_value_does_not_nest() {
        let inner = Value::new(String::from("x"));
        let outer = Value::new(inner.clone());
        assert!(outer.is::<String>());
        assert_eq!(outer, inner);
    }

    #[test]
    fn take_returns_original_on_mismatch() {
        let v = Value::new(1_u8);
        let v = v.take::<i64>().unwrap_err();
        assert_eq!(v.take::<u8>().unwrap(), 1);
    }

    #[test]
    fn args_macro_maps_none_to_null() {
        let args = args![1_i64, "a", None::<i32>];
        assert_eq!(args.len(), 3);
        assert_eq!(args[1], Some(Value::new(String::from("a"))));
        assert!(args[2].is_none());
    }
}
