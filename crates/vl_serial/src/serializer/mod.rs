//! The entry point: serializes objects to bytes and back.
//!
//! A [`Serializer`] owns the metadata factory, the handler registry and the
//! per-format options. Every call runs a fresh [`GraphNavigator`] with a
//! fresh visitor, so a single serializer can be shared between threads.

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use vl_utils::hash::HashMap;

use crate::Error;
use crate::data::{Data, FromValue, Typed, Value};
use crate::event::EventDispatcher;
use crate::handler::HandlerRegistry;
use crate::info::{PropertyMetadata, TypeDescriptor, Version};
use crate::metadata::{ClassCatalogArc, MetadataFactory};
use crate::visitor::{
    GraphNavigator, JsonOptions, JsonSerializationVisitor, SerializationVisitor, XmlOptions,
    XmlSerializationVisitor, parse_json, parse_xml,
};

// -----------------------------------------------------------------------------
// Modules

mod builder;

#[cfg(test)]
mod tests;

// -----------------------------------------------------------------------------
// Exports

pub use builder::SerializerBuilder;

// -----------------------------------------------------------------------------
// Format

/// A wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Json,
    Xml,
}

impl Format {
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    /// Parses `json` or `xml`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else if s.eq_ignore_ascii_case("xml") {
            Ok(Self::Xml)
        } else {
            Err(Error::configuration(format!("unknown format `{s}`")))
        }
    }
}

// -----------------------------------------------------------------------------
// Context

/// Per-call options.
///
/// # Examples
///
/// ```
/// use vl_serial::info::Version;
/// use vl_serial::serializer::Context;
///
/// let context = Context::new()
///     .with_groups(["details"])
///     .with_version("1.2".parse::<Version>().unwrap())
///     .serialize_null(true)
///     .with_attribute("locale", "fr");
///
/// assert_eq!(context.groups(), ["details"]);
/// assert!(context.is_serializing_null());
/// assert_eq!(context.attribute("locale"), Some(&serde_json::json!("fr")));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Context {
    groups: Vec<String>,
    exclude_groups: Vec<String>,
    version: Option<Version>,
    serialize_null: bool,
    strict: bool,
    attributes: HashMap<String, Json>,
}

impl Context {
    /// All properties, nulls skipped, unknown input fields ignored.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only properties of these groups. Properties without groups
    /// belong to `Default`.
    pub fn with_groups<S: Into<String>>(mut self, groups: impl IntoIterator<Item = S>) -> Self {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Drops properties of these groups.
    pub fn with_exclude_groups<S: Into<String>>(mut self, groups: impl IntoIterator<Item = S>) -> Self {
        self.exclude_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Keeps only properties whose `since`/`until` range covers `version`.
    #[inline]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Writes null properties instead of omitting them.
    #[inline]
    pub fn serialize_null(mut self, serialize_null: bool) -> Self {
        self.serialize_null = serialize_null;
        self
    }

    /// Rejects input keys that map to no property.
    #[inline]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets a custom attribute, readable by handlers.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    #[inline]
    pub fn exclude_groups(&self) -> &[String] {
        &self.exclude_groups
    }

    #[inline]
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    #[inline]
    pub fn is_serializing_null(&self) -> bool {
        self.serialize_null
    }

    #[inline]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    #[inline]
    pub fn attribute(&self, key: &str) -> Option<&Json> {
        self.attributes.get(key)
    }

    /// Whether `property` passes the group and version exclusions.
    pub fn includes(&self, property: &PropertyMetadata) -> bool {
        if !self.groups.is_empty() && !property.in_groups(&self.groups) {
            return false;
        }
        if !self.exclude_groups.is_empty() && property.in_groups(&self.exclude_groups) {
            return false;
        }
        self.version.as_ref().is_none_or(|version| property.in_version(version))
    }
}

// -----------------------------------------------------------------------------
// Serializer

/// Serializes object graphs to JSON or XML and back.
///
/// Built by [`SerializerBuilder`]. `Serializer` is `Send + Sync`; share it
/// behind an `Arc`.
///
/// # Examples
///
/// ```
/// use vl_serial::derive::Mapped;
/// use vl_serial::serializer::{Context, Format, Serializer};
///
/// #[derive(Mapped, Debug, PartialEq)]
/// #[serial(xml_root = "point")]
/// struct Point {
///     x: i32,
///     #[serial(xml_attribute)]
///     label: String,
/// }
///
/// let serializer = Serializer::builder()
///     .register::<Point>()
///     .xml_options(vl_serial::visitor::XmlOptions { format_output: false, ..Default::default() })
///     .build()
///     .unwrap();
///
/// let point = Point { x: -3, label: "origin".into() };
/// let xml = serializer.to_string(&point, Format::Xml, &Context::new()).unwrap();
/// assert_eq!(xml, r#"<?xml version="1.0" encoding="UTF-8"?><point label="origin"><x>-3</x></point>"#);
///
/// let back: Point = serializer.deserialize(xml.as_bytes(), Format::Xml, &Context::new()).unwrap();
/// assert_eq!(back, point);
/// ```
pub struct Serializer {
    factory: Arc<MetadataFactory>,
    handlers: HandlerRegistry,
    events: EventDispatcher,
    catalog: ClassCatalogArc,
    json: JsonOptions,
    xml: XmlOptions,
}

impl Serializer {
    /// Starts a [`SerializerBuilder`].
    #[inline]
    pub fn builder() -> SerializerBuilder {
        SerializerBuilder::new()
    }

    /// Serializes `value` to bytes.
    ///
    /// Classes reachable from `T` are registered on first use.
    pub fn serialize<T: Data + Typed>(&self, value: &T, format: Format, context: &Context) -> Result<Vec<u8>, Error> {
        self.register::<T>();
        self.serialize_data(value, &T::type_descriptor(), format, context)
    }

    /// Serializes a type-erased `value` declared as `descriptor`.
    pub fn serialize_data(
        &self,
        value: &dyn Data,
        descriptor: &TypeDescriptor,
        format: Format,
        context: &Context,
    ) -> Result<Vec<u8>, Error> {
        let mut visitor: Box<dyn SerializationVisitor> = match format {
            Format::Json => Box::new(JsonSerializationVisitor::new(self.json.clone())),
            Format::Xml => Box::new(XmlSerializationVisitor::new(self.xml.clone())),
        };
        let mut navigator = GraphNavigator::new(&self.factory, &self.handlers, &self.events, context, format);
        navigator.serialize(visitor.as_mut(), value, descriptor)?;
        visitor.finish()
    }

    /// Serializes `value` to a string.
    pub fn to_string<T: Data + Typed>(&self, value: &T, format: Format, context: &Context) -> Result<String, Error> {
        let bytes = self.serialize(value, format, context)?;
        String::from_utf8(bytes).map_err(|err| Error::configuration(format!("output is not UTF-8: {err}")))
    }

    /// Deserializes a `T` from `input`.
    pub fn deserialize<T: FromValue + Typed>(&self, input: &[u8], format: Format, context: &Context) -> Result<T, Error> {
        self.register::<T>();
        let value = self.deserialize_value(input, &T::type_descriptor(), format, context)?;
        T::from_value(value)
    }

    /// Deserializes `input` as `descriptor` into a dynamic [`Value`].
    pub fn deserialize_value(
        &self,
        input: &[u8],
        descriptor: &TypeDescriptor,
        format: Format,
        context: &Context,
    ) -> Result<Value, Error> {
        let mut navigator = GraphNavigator::new(&self.factory, &self.handlers, &self.events, context, format);
        match format {
            Format::Json => navigator.deserialize(&parse_json(input)?, descriptor),
            Format::Xml => navigator.deserialize(&parse_xml(input, &self.xml)?, descriptor),
        }
    }

    /// Registers the classes reachable from `T` with the attribute driver.
    pub fn register<T: Typed>(&self) {
        if let TypeDescriptor::Object(class) = T::type_descriptor().non_optional()
            && self.catalog.read().contains(class.as_str())
        {
            return;
        }
        T::register_classes(&mut self.catalog.write());
    }

    #[inline]
    pub fn metadata_factory(&self) -> &MetadataFactory {
        &self.factory
    }

    #[inline]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    #[inline]
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// The classes known to the attribute driver.
    #[inline]
    pub fn catalog(&self) -> &ClassCatalogArc {
        &self.catalog
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("fingerprint", &format_args!("{:016x}", self.factory.fingerprint()))
            .field("handlers", &self.handlers)
            .field("events", &self.events)
            .field("json", &self.json)
            .field("xml", &self.xml)
            .finish()
    }
}
