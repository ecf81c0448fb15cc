use core::hash::{BuildHasher, Hash};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use crate::Error;
use crate::data::{Data, DataRef, FromValue, SharedData, Typed, Value};
use crate::info::{Primitive, TypeDescriptor};
use crate::metadata::ClassCatalog;

// -----------------------------------------------------------------------------
// Opaque types

/// Implements [`Data`](crate::data::Data), [`Typed`](crate::data::Typed) and
/// [`FromValue`](crate::data::FromValue) for a type that only a registered
/// handler can read or write.
///
/// The type is declared as the custom descriptor `$tag`, so a handler must
/// be registered under that tag, for example with
/// [`HandlerRegistry::register_serde`](crate::handler::HandlerRegistry::register_serde).
///
/// # Examples
///
/// ```
/// use vl_serial::data::{Data, DataRef, Typed};
/// use vl_serial::info::TypeDescriptor;
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Money { cents: i64, currency: String }
///
/// vl_serial::impl_opaque_data!(Money => "Money");
///
/// assert_eq!(Money::type_descriptor(), TypeDescriptor::custom("Money"));
/// let value = Money { cents: 100, currency: "EUR".into() };
/// assert!(matches!(value.data_ref(), DataRef::Opaque));
/// ```
#[macro_export]
macro_rules! impl_opaque_data {
    ($ty:ty => $tag:literal) => {
        impl $crate::data::Data for $ty {
            #[inline]
            fn data_ref(&self) -> $crate::data::DataRef<'_> {
                $crate::data::DataRef::Opaque
            }
        }

        impl $crate::data::Typed for $ty {
            #[inline]
            fn type_descriptor() -> $crate::info::TypeDescriptor {
                $crate::info::TypeDescriptor::custom($tag)
            }
        }

        impl $crate::data::FromValue for $ty {
            fn from_value(value: $crate::data::Value) -> ::core::result::Result<Self, $crate::Error> {
                match value {
                    $crate::data::Value::Opaque(opaque) => opaque
                        .downcast::<$ty>()
                        .map_err(|opaque| $crate::Error::mismatch("$", $tag, opaque.type_name())),
                    other => ::core::result::Result::Err(other.mismatch($tag)),
                }
            }
        }
    };
}

crate::impl_opaque_data!(NaiveDate => "NaiveDate");
crate::impl_opaque_data!(NaiveDateTime => "NaiveDateTime");
crate::impl_opaque_data!(DateTime<FixedOffset> => "DateTime");

impl Data for DateTime<Utc> {
    #[inline]
    fn data_ref(&self) -> DataRef<'_> {
        DataRef::Opaque
    }
}

impl Typed for DateTime<Utc> {
    #[inline]
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::custom("DateTime")
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, Error> {
        let opaque = match value {
            Value::Opaque(opaque) => opaque,
            other => return Err(other.mismatch("DateTime")),
        };
        match opaque.downcast::<DateTime<FixedOffset>>() {
            Ok(date) => Ok(date.with_timezone(&Utc)),
            Err(opaque) => opaque
                .downcast::<DateTime<Utc>>()
                .map_err(|opaque| Error::mismatch("$", "DateTime", opaque.type_name())),
        }
    }
}

// -----------------------------------------------------------------------------
// Primitives

macro_rules! impl_integer {
    ($variant:ident, $wide:ty: $($ty:ty => $primitive:ident),* $(,)?) => {$(
        impl Data for $ty {
            #[inline]
            fn data_ref(&self) -> DataRef<'_> {
                DataRef::$variant(*self as $wide)
            }
        }

        impl Typed for $ty {
            #[inline]
            fn type_descriptor() -> TypeDescriptor {
                TypeDescriptor::Primitive(Primitive::$primitive)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, Error> {
                let converted = match &value {
                    Value::I64(v) => <$ty>::try_from(*v).ok(),
                    Value::U64(v) => <$ty>::try_from(*v).ok(),
                    _ => None,
                };
                converted.ok_or_else(|| value.mismatch(stringify!($ty)))
            }
        }
    )*};
}

impl_integer!(I64, i64: i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => I64);
impl_integer!(U64, u64: u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => U64);

macro_rules! impl_float {
    ($($ty:ty => $primitive:ident),* $(,)?) => {$(
        impl Data for $ty {
            #[inline]
            fn data_ref(&self) -> DataRef<'_> {
                DataRef::F64(*self as f64)
            }
        }

        impl Typed for $ty {
            #[inline]
            fn type_descriptor() -> TypeDescriptor {
                TypeDescriptor::Primitive(Primitive::$primitive)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, Error> {
                match value {
                    Value::F64(v) => Ok(v as $ty),
                    Value::I64(v) => Ok(v as $ty),
                    Value::U64(v) => Ok(v as $ty),
                    other => Err(other.mismatch(stringify!($ty))),
                }
            }
        }
    )*};
}

impl_float!(f32 => F32, f64 => F64);

impl Data for bool {
    #[inline]
    fn data_ref(&self) -> DataRef<'_> {
        DataRef::Bool(*self)
    }
}

impl Typed for bool {
    #[inline]
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Primitive(Primitive::Bool)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl Data for char {
    #[inline]
    fn data_ref(&self) -> DataRef<'_> {
        DataRef::Char(*self)
    }
}

impl Typed for char {
    #[inline]
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Primitive(Primitive::Char)
    }
}

impl FromValue for char {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Char(v) => Ok(v),
            other => Err(other.mismatch("char")),
        }
    }
}

impl Data for String {
    #[inline]
    fn data_ref(&self) -> DataRef<'_> {
        DataRef::Str(self)
    }
}

impl Typed for String {
    #[inline]
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Primitive(Primitive::String)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::String(v) => Ok(v),
            Value::Char(v) => Ok(v.into()),
            other => Err(other.mismatch("string")),
        }
    }
}

// -----------------------------------------------------------------------------
// Option & pointers

impl<T: Data> Data for Option<T> {
    #[inline]
    fn data_ref(&self) -> DataRef<'_> {
        match self {
            Some(value) => value.data_ref(),
            None => DataRef::Null,
        }
    }

    #[inline]
    fn is_null(&self) -> bool {
        self.as_ref().is_none_or(Data::is_null)
    }
}

impl<T: Typed> Typed for Option<T> {
    #[inline]
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(T::type_descriptor())
    }

    #[inline]
    fn register_classes(catalog: &mut ClassCatalog) {
        T::register_classes(catalog);
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }

    #[inline]
    fn from_missing() -> Option<Self> {
        Some(None)
    }
}

impl<T: Data> Data for Box<T> {
    #[inline]
    fn data_ref(&self) -> DataRef<'_> {
        (**self).data_ref()
    }

    #[inline]
    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

impl<T: Typed> Typed for Box<T> {
    #[inline]
    fn type_descriptor() -> TypeDescriptor {
        T::type_descriptor()
    }

    #[inline]
    fn register_classes(catalog: &mut ClassCatalog) {
        T::register_classes(catalog);
    }
}

impl<T: FromValue> FromValue for Box<T> {
    #[inline]
    fn from_value(value: Value) -> Result<Self, Error> {
        T::from_value(value).map(Box::new)
    }

    #[inline]
    fn from_missing() -> Option<Self> {
        T::from_missing().map(Box::new)
    }
}

impl<T: Data> SharedData for Arc<RwLock<T>> {
    #[inline]
    fn address(&self) -> usize {
        Arc::as_ptr(self) as *const () as usize
    }

    fn with_inner(&self, func: &mut dyn FnMut(&dyn Data) -> Result<(), Error>) -> Result<(), Error> {
        let guard = self.read().unwrap_or_else(PoisonError::into_inner);
        func(&*guard)
    }
}

impl<T: Data> Data for Arc<RwLock<T>> {
    #[inline]
    fn data_ref(&self) -> DataRef<'_> {
        DataRef::Shared(self)
    }
}

impl<T: Typed> Typed for Arc<RwLock<T>> {
    #[inline]
    fn type_descriptor() -> TypeDescriptor {
        T::type_descriptor()
    }

    #[inline]
    fn register_classes(catalog: &mut ClassCatalog) {
        T::register_classes(catalog);
    }
}

impl<T: FromValue> FromValue for Arc<RwLock<T>> {
    #[inline]
    fn from_value(value: Value) -> Result<Self, Error> {
        T::from_value(value).map(|inner| Arc::new(RwLock::new(inner)))
    }

    #[inline]
    fn from_missing() -> Option<Self> {
        T::from_missing().map(|inner| Arc::new(RwLock::new(inner)))
    }
}

// -----------------------------------------------------------------------------
// Collections

impl<T: Data> Data for Vec<T> {
    fn data_ref(&self) -> DataRef<'_> {
        DataRef::Seq(self.iter().map(|item| item as &dyn Data).collect())
    }
}

impl<T: Typed> Typed for Vec<T> {
    #[inline]
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::array(T::type_descriptor())
    }

    #[inline]
    fn register_classes(catalog: &mut ClassCatalog) {
        T::register_classes(catalog);
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(other.mismatch("array")),
        }
    }
}

fn map_entries<K: FromValue, V: FromValue, C: FromIterator<(K, V)>>(value: Value) -> Result<C, Error> {
    match value {
        Value::Map(entries) => entries
            .into_iter()
            .map(|(key, value)| -> Result<(K, V), Error> {
                Ok((K::from_value(key)?, V::from_value(value)?))
            })
            .collect(),
        other => Err(other.mismatch("map")),
    }
}

impl<K, V, S> Data for HashMap<K, V, S>
where
    K: Data,
    V: Data,
    S: Send + Sync + 'static,
{
    fn data_ref(&self) -> DataRef<'_> {
        DataRef::Map(
            self.iter()
                .map(|(key, value)| (key as &dyn Data, value as &dyn Data))
                .collect(),
        )
    }
}

impl<K: Typed, V: Typed, S: 'static> Typed for HashMap<K, V, S> {
    #[inline]
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::map(K::type_descriptor(), V::type_descriptor())
    }

    fn register_classes(catalog: &mut ClassCatalog) {
        K::register_classes(catalog);
        V::register_classes(catalog);
    }
}

impl<K, V, S> FromValue for HashMap<K, V, S>
where
    K: FromValue + Eq + Hash,
    V: FromValue,
    S: BuildHasher + Default,
{
    #[inline]
    fn from_value(value: Value) -> Result<Self, Error> {
        map_entries(value)
    }
}

impl<K: Data, V: Data> Data for BTreeMap<K, V> {
    fn data_ref(&self) -> DataRef<'_> {
        DataRef::Map(
            self.iter()
                .map(|(key, value)| (key as &dyn Data, value as &dyn Data))
                .collect(),
        )
    }
}

impl<K: Typed, V: Typed> Typed for BTreeMap<K, V> {
    #[inline]
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::map(K::type_descriptor(), V::type_descriptor())
    }

    fn register_classes(catalog: &mut ClassCatalog) {
        K::register_classes(catalog);
        V::register_classes(catalog);
    }
}

impl<K: FromValue + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
    #[inline]
    fn from_value(value: Value) -> Result<Self, Error> {
        map_entries(value)
    }
}

// -----------------------------------------------------------------------------
// Tests
