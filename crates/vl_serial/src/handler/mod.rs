//! Custom (de)serialization of specific types.
//!
//! A handler takes over a value whose descriptor carries its tag:
//!
//! 1. a custom descriptor (`DateTime<'%Y'>`, `Money`) always goes to the
//!    handler of its name, and fails with [`Error::HandlerNotFound`] if
//!    there is none;
//! 2. otherwise a handler registered under the canonical tag of the
//!    descriptor (`array`, `map`, a primitive name or a class id) replaces
//!    the structural traversal;
//! 3. otherwise the navigator walks the value structurally.
//!
//! `option<T>` descriptors are unwrapped first; `null` never reaches a
//! handler.

use core::any::type_name;
use core::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use vl_utils::hash::HashMap;

use crate::Error;
use crate::data::{Data, OpaqueValue, Value};
use crate::info::{TypeDescriptor, XmlCollection};
use crate::serializer::{Context, Format};
use crate::visitor::{InputNode, SerializationVisitor};

// -----------------------------------------------------------------------------
// Modules

mod date;

// -----------------------------------------------------------------------------
// Exports

pub use date::DateHandler;

// -----------------------------------------------------------------------------
// Direction

/// Which way a handler converts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Serialize,
    Deserialize,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serialize => "serialization",
            Self::Deserialize => "deserialization",
        })
    }
}

// -----------------------------------------------------------------------------
// HandlerContext

/// What a handler knows about the value it converts.
pub struct HandlerContext<'a> {
    descriptor: &'a TypeDescriptor,
    format: Format,
    path: &'a str,
    context: &'a Context,
}

impl<'a> HandlerContext<'a> {
    #[inline]
    pub(crate) fn new(
        descriptor: &'a TypeDescriptor,
        format: Format,
        path: &'a str,
        context: &'a Context,
    ) -> Self {
        Self {
            descriptor,
            format,
            path,
            context,
        }
    }

    /// The declared type, with parameters such as a date format.
    #[inline]
    pub fn descriptor(&self) -> &TypeDescriptor {
        self.descriptor
    }

    /// The `index`th parameter of a custom descriptor.
    #[inline]
    pub fn param(&self, index: usize) -> Option<&str> {
        self.descriptor.params().get(index).map(String::as_str)
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Where in the graph the value sits.
    #[inline]
    pub fn path(&self) -> &str {
        self.path
    }

    /// The per-call context, with its custom attributes.
    #[inline]
    pub fn context(&self) -> &Context {
        self.context
    }

    /// Builds an [`Error::Handler`] for the current value.
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::Handler {
            type_name: self.descriptor.handler_tag().into_owned(),
            path: self.path.to_owned(),
            message: message.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// Handler

/// A serialization handler: writes `data` to the visitor.
pub type SerializeFn = dyn Fn(&mut dyn SerializationVisitor, &dyn Data, &HandlerContext<'_>) -> Result<(), Error>
    + Send
    + Sync;

/// A deserialization handler: builds a [`Value`] from the input node.
pub type DeserializeFn =
    dyn Fn(&dyn InputNode, &HandlerContext<'_>) -> Result<Value, Error> + Send + Sync;

/// A handler of either direction.
#[derive(Clone)]
pub enum Handler {
    Serialize(Arc<SerializeFn>),
    Deserialize(Arc<DeserializeFn>),
}

impl Handler {
    /// Wraps a serialization handler.
    pub fn serialize<F>(func: F) -> Self
    where
        F: Fn(&mut dyn SerializationVisitor, &dyn Data, &HandlerContext<'_>) -> Result<(), Error>
            + Send
            + Sync
            + 'static,
    {
        Self::Serialize(Arc::new(func))
    }

    /// Wraps a deserialization handler.
    pub fn deserialize<F>(func: F) -> Self
    where
        F: Fn(&dyn InputNode, &HandlerContext<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self::Deserialize(Arc::new(func))
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        match self {
            Self::Serialize(_) => Direction::Serialize,
            Self::Deserialize(_) => Direction::Deserialize,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.direction()).finish()
    }
}

// -----------------------------------------------------------------------------
// HandlerRegistry

/// Handlers by type tag and direction.
///
/// There is at most one handler per `(tag, direction)`; registering again
/// replaces the previous handler.
///
/// # Examples
///
/// ```
/// use vl_serial::data::Value;
/// use vl_serial::handler::{Direction, HandlerRegistry};
///
/// let mut registry = HandlerRegistry::new();
/// registry.register_serialize("Money", |visitor, data, _ctx| {
///     let cents = data.downcast_ref::<i64>().copied().unwrap_or_default();
///     visitor.visit_str(&format!("{}.{:02}", cents / 100, cents % 100))
/// });
/// registry.register_deserialize("Money", |_node, _ctx| Ok(Value::I64(0)));
///
/// assert!(registry.contains("Money", Direction::Serialize));
/// assert!(registry.lookup("Money", Direction::Deserialize).is_some());
/// assert!(registry.lookup("Euro", Direction::Serialize).is_none());
/// ```
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    serializers: HashMap<String, Arc<SerializeFn>>,
    deserializers: HashMap<String, Arc<DeserializeFn>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `tag`, returning the one it replaces.
    pub fn register(&mut self, tag: impl Into<String>, handler: Handler) -> Option<Handler> {
        let tag = tag.into();
        let replaced = match handler {
            Handler::Serialize(func) => self.serializers.insert(tag.clone(), func).map(Handler::Serialize),
            Handler::Deserialize(func) => self.deserializers.insert(tag.clone(), func).map(Handler::Deserialize),
        };
        if let Some(replaced) = &replaced {
            log::debug!("replaced the {} handler of `{tag}`", replaced.direction());
        }
        replaced
    }

    /// Registers a serialization handler for `tag`.
    pub fn register_serialize<F>(&mut self, tag: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&mut dyn SerializationVisitor, &dyn Data, &HandlerContext<'_>) -> Result<(), Error>
            + Send
            + Sync
            + 'static,
    {
        self.register(tag, Handler::serialize(func));
        self
    }

    /// Registers a deserialization handler for `tag`.
    pub fn register_deserialize<F>(&mut self, tag: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&dyn InputNode, &HandlerContext<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.register(tag, Handler::deserialize(func));
        self
    }

    /// Registers both directions for `T` through its `serde` implementation.
    ///
    /// The value travels through `serde_json::Value`, so XML input reaches
    /// `T` as strings and nested objects.
    ///
    /// # Examples
    ///
    /// ```
    /// use vl_serial::handler::{Direction, HandlerRegistry};
    ///
    /// #[derive(serde::Serialize, serde::Deserialize)]
    /// struct Money { cents: i64, currency: String }
    ///
    /// vl_serial::impl_opaque_data!(Money => "Money");
    ///
    /// let mut registry = HandlerRegistry::new();
    /// registry.register_serde::<Money>("Money");
    /// assert!(registry.contains("Money", Direction::Serialize));
    /// assert!(registry.contains("Money", Direction::Deserialize));
    /// ```
    pub fn register_serde<T>(&mut self, tag: impl Into<String>) -> &mut Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let tag = tag.into();
        self.register_serialize(tag.clone(), |visitor, data, ctx| {
            let value = data
                .downcast_ref::<T>()
                .ok_or_else(|| ctx.error(format!("expected a `{}`", type_name::<T>())))?;
            let json = serde_json::to_value(value).map_err(|err| ctx.error(err.to_string()))?;
            write_json(visitor, &json)
        });
        self.register_deserialize(tag, |node, ctx| {
            let value: T = serde_json::from_value(node.to_json()).map_err(|err| ctx.error(err.to_string()))?;
            Ok(Value::Opaque(OpaqueValue::new(value)))
        });
        self
    }

    /// Returns the handler registered for `(tag, direction)`.
    pub fn lookup(&self, tag: &str, direction: Direction) -> Option<Handler> {
        match direction {
            Direction::Serialize => self.serializer(tag).cloned().map(Handler::Serialize),
            Direction::Deserialize => self.deserializer(tag).cloned().map(Handler::Deserialize),
        }
    }

    #[inline]
    pub fn contains(&self, tag: &str, direction: Direction) -> bool {
        match direction {
            Direction::Serialize => self.serializers.contains_key(tag),
            Direction::Deserialize => self.deserializers.contains_key(tag),
        }
    }

    #[inline]
    pub fn serializer(&self, tag: &str) -> Option<&Arc<SerializeFn>> {
        self.serializers.get(tag)
    }

    #[inline]
    pub fn deserializer(&self, tag: &str) -> Option<&Arc<DeserializeFn>> {
        self.deserializers.get(tag)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("serializers", &self.serializers.keys().collect::<Vec<_>>())
            .field("deserializers", &self.deserializers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Replays a JSON value into `visitor`.
pub fn write_json(visitor: &mut dyn SerializationVisitor, value: &serde_json::Value) -> Result<(), Error> {
    use serde_json::Value as Json;

    match value {
        Json::Null => visitor.visit_null(),
        Json::Bool(value) => visitor.visit_bool(*value),
        Json::Number(number) => match (number.as_u64(), number.as_i64()) {
            (Some(value), _) => visitor.visit_u64(value),
            (None, Some(value)) => visitor.visit_i64(value),
            (None, None) => visitor.visit_f64(number.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(value) => visitor.visit_str(value),
        Json::Array(items) => {
            visitor.begin_array(&XmlCollection::DEFAULT)?;
            for item in items {
                visitor.begin_item()?;
                write_json(visitor, item)?;
                visitor.end_item()?;
            }
            visitor.end_array()
        }
        Json::Object(entries) => {
            visitor.begin_map(&XmlCollection::DEFAULT)?;
            for (key, value) in entries {
                visitor.begin_entry(key)?;
                write_json(visitor, value)?;
                visitor.end_entry()?;
            }
            visitor.end_map()
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
