use core::any::{Any, type_name};
use core::fmt;

use crate::Error;
use crate::data::FromValue;
use crate::error::ROOT_PATH;
use crate::info::ClassId;

// -----------------------------------------------------------------------------
// Value

/// A dynamically typed value produced by deserialization.
#[derive(Debug)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Char(char),
    String(String),
    Array(Vec<Value>),
    /// Key and value pairs in input order.
    Map(Vec<(Value, Value)>),
    Object(DynamicObject),
    /// A value built by a handler, such as a date.
    Opaque(OpaqueValue),
}

impl Value {
    /// A short description used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I64(_) | Self::U64(_) => "integer",
            Self::F64(_) => "float",
            Self::Char(_) => "char",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Opaque(_) => "opaque value",
        }
    }

    /// Builds a [`Error::TypeMismatch`] against this value.
    #[inline]
    pub fn mismatch(&self, expected: impl Into<String>) -> Error {
        Error::mismatch(ROOT_PATH, expected, self.kind_name())
    }
}

// -----------------------------------------------------------------------------
// DynamicObject

/// The fields of a deserialized class instance, keyed by field name.
///
/// # Examples
///
/// ```
/// use vl_serial::data::{DynamicObject, Value};
/// use vl_serial::info::ClassId;
///
/// let mut object = DynamicObject::new(ClassId::from_static("app::User"));
/// object.insert("id", Value::U64(7));
///
/// let id: u64 = object.take_field("id").unwrap();
/// assert_eq!(id, 7);
///
/// let email: Option<String> = object.take_field("email").unwrap();
/// assert_eq!(email, None);
///
/// assert!(object.take_field::<u64>("id").is_err());
/// ```
#[derive(Debug)]
pub struct DynamicObject {
    class: ClassId,
    fields: Vec<(String, Value)>,
}

impl DynamicObject {
    #[inline]
    pub fn new(class: ClassId) -> Self {
        Self {
            class,
            fields: Vec::new(),
        }
    }

    /// Unwraps an object of class `expected` out of `value`.
    pub fn expect(value: Value, expected: &str) -> Result<Self, Error> {
        match value {
            Value::Object(object) if object.class == *expected => Ok(object),
            Value::Object(object) => Err(Error::mismatch(
                ROOT_PATH,
                expected,
                object.class.to_string(),
            )),
            other => Err(other.mismatch(expected)),
        }
    }

    #[inline]
    pub fn class(&self) -> &ClassId {
        &self.class
    }

    /// Sets field `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Removes and returns field `name`.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(field, _)| field == name)?;
        Some(self.fields.swap_remove(index).1)
    }

    /// Removes field `name` and converts it.
    ///
    /// An absent field falls back to [`FromValue::from_missing`], so
    /// `Option` fields become `None` and everything else is an error.
    pub fn take_field<T: FromValue>(&mut self, name: &str) -> Result<T, Error> {
        match self.take(name) {
            Some(value) => T::from_value(value).map_err(|err| err.within(name)),
            None => T::from_missing().ok_or_else(|| Error::missing_field(name)),
        }
    }

    /// Removes field `name` and converts it, calling `fallback` when absent.
    pub fn take_field_or_else<T: FromValue>(
        &mut self,
        name: &str,
        fallback: impl FnOnce() -> T,
    ) -> Result<T, Error> {
        match self.take(name) {
            Some(value) => T::from_value(value).map_err(|err| err.within(name)),
            None => Ok(fallback()),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

// -----------------------------------------------------------------------------
// OpaqueValue

/// A type-erased value built by a deserialization handler.
pub struct OpaqueValue {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl OpaqueValue {
    #[inline]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// The name of the stored type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Takes the stored value out if it is a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self { value, type_name }),
        }
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueValue").field(&self.type_name).finish()
    }
}

// -----------------------------------------------------------------------------
// Tests
