//! The object model seen by the serializer.
//!
//! - [`Data`]: a read view over any serializable value.
//! - [`Mapped`]: a class instance whose properties are reached by name.
//! - [`Typed`]: the static [`TypeDescriptor`] of a Rust type.
//! - [`Describe`]: the declarative mapping table of a class, usually
//!   generated by [`#[derive(Mapped)]`](crate::derive::Mapped).
//! - [`FromValue`]: builds a Rust value from the dynamic [`Value`] tree
//!   produced by deserialization.
//!
//! Serialization borrows the object graph through [`Data`]; deserialization
//! first builds a [`Value`] tree and converts it once, at the end.

use core::any::Any;

use crate::Error;
use crate::info::{ClassId, ClassMetadata, TypeDescriptor};
use crate::metadata::ClassCatalog;

// -----------------------------------------------------------------------------
// Modules

mod impls;
mod value;

// -----------------------------------------------------------------------------
// Exports

pub use value::{DynamicObject, OpaqueValue, Value};

// -----------------------------------------------------------------------------
// DataRef

/// A borrowed, one level deep view of a value.
pub enum DataRef<'a> {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Char(char),
    Str(&'a str),
    Seq(Vec<&'a dyn Data>),
    Map(Vec<(&'a dyn Data, &'a dyn Data)>),
    Object(&'a dyn Mapped),
    /// A node that may be reached through several paths.
    Shared(&'a dyn SharedData),
    /// A value only a registered handler knows how to write.
    Opaque,
}

impl DataRef<'_> {
    /// A short description used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I64(_) | Self::U64(_) => "integer",
            Self::F64(_) => "float",
            Self::Char(_) => "char",
            Self::Str(_) => "string",
            Self::Seq(_) => "array",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Shared(_) => "shared object",
            Self::Opaque => "opaque value",
        }
    }
}

// -----------------------------------------------------------------------------
// Data

/// A value the serializer can read.
///
/// Implemented for primitives, strings, collections, `Option`, smart
/// pointers, `chrono` dates and every `#[derive(Mapped)]` type.
///
/// Handlers receive values as `&dyn Data` and recover the concrete type
/// with [`downcast_ref`](<dyn Data>::downcast_ref).
pub trait Data: Any + Send + Sync {
    /// Returns a view of this value.
    fn data_ref(&self) -> DataRef<'_>;

    /// Returns `true` if the value serializes as null.
    ///
    /// Cheaper than matching on [`data_ref`](Data::data_ref).
    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

impl dyn Data {
    /// Returns the concrete value if it is a `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vl_serial::data::Data;
    ///
    /// let value: &dyn Data = &42_u32;
    /// assert_eq!(value.downcast_ref::<u32>(), Some(&42));
    /// assert_eq!(value.downcast_ref::<i32>(), None);
    /// ```
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref()
    }
}

// -----------------------------------------------------------------------------
// SharedData

/// A node behind shared ownership, such as `Arc<RwLock<T>>`.
///
/// Shared nodes are what makes cyclic graphs expressible; the serializer
/// tracks their [`address`](SharedData::address) on the current path.
pub trait SharedData: Send + Sync {
    /// Identifies the shared allocation.
    fn address(&self) -> usize;

    /// Runs `func` with the inner value.
    fn with_inner(&self, func: &mut dyn FnMut(&dyn Data) -> Result<(), Error>) -> Result<(), Error>;
}

// -----------------------------------------------------------------------------
// Mapped

/// An instance of a mapped class.
pub trait Mapped: Data {
    /// The class of this instance.
    ///
    /// For a polymorphic base this is the concrete class.
    fn class_id(&self) -> ClassId;

    /// Returns the field named `name`.
    fn property(&self, name: &str) -> Option<&dyn Data>;
}

// -----------------------------------------------------------------------------
// Typed

/// The static type description of a Rust type.
pub trait Typed: 'static {
    /// The descriptor properties of this type are declared with.
    fn type_descriptor() -> TypeDescriptor;

    /// Registers every class this type refers to.
    #[inline]
    fn register_classes(_catalog: &mut ClassCatalog) {}
}

// -----------------------------------------------------------------------------
// Describe

/// A class with a declarative mapping table.
///
/// Generated by [`#[derive(Mapped)]`](crate::derive::Mapped) and read by the
/// [`AttributeDriver`](crate::metadata::AttributeDriver).
pub trait Describe: Mapped + Typed + FromValue + Sized {
    /// The class id, by default `module::path::Type`.
    const CLASS: &'static str;

    /// Builds the metadata of this class.
    fn describe() -> Result<ClassMetadata, Error>;

    /// Registers the classes referred to by the fields.
    fn register_dependencies(_catalog: &mut ClassCatalog) {}

    /// The class id as a [`ClassId`].
    #[inline]
    fn class() -> ClassId {
        ClassId::from_static(Self::CLASS)
    }
}

// -----------------------------------------------------------------------------
// FromValue

/// Builds a value from a deserialized [`Value`].
pub trait FromValue: Sized {
    /// Converts `value`, failing with [`Error::TypeMismatch`] on a shape
    /// mismatch.
    fn from_value(value: Value) -> Result<Self, Error>;

    /// The value used when the input omits the field entirely.
    ///
    /// `None` (the default) makes an absent field an error.
    #[inline]
    fn from_missing() -> Option<Self> {
        None
    }
}
