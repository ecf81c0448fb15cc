//! Format specific readers and writers, and the navigator driving them.
//!
//! Serialization walks an object graph and reports it to a
//! [`SerializationVisitor`] as a stream of begin/end calls. Deserialization
//! parses the input into a tree and reads it through [`InputNode`].
//!
//! | format | writer                        | reader                |
//! |--------|-------------------------------|-----------------------|
//! | JSON   | [`JsonSerializationVisitor`]  | `serde_json::Value`   |
//! | XML    | [`XmlSerializationVisitor`]   | [`XmlElement`]        |

use std::borrow::Cow;

use crate::Error;
use crate::info::{ClassMetadata, PropertyMetadata, XmlCollection};

// -----------------------------------------------------------------------------
// Modules

mod json;
mod navigator;
mod xml;

// -----------------------------------------------------------------------------
// Exports

pub use json::{JsonOptions, JsonSerializationVisitor};
pub use xml::{XmlElement, XmlOptions, XmlSerializationVisitor, XmlText};

pub(crate) use json::parse_json;
pub(crate) use navigator::GraphNavigator;
pub(crate) use xml::parse_xml;

// -----------------------------------------------------------------------------
// SerializationVisitor

/// Receives an object graph as a stream of calls and renders it.
///
/// The navigator guarantees balanced calls: every `begin_*` is matched by
/// the corresponding `end_*`, array items are wrapped in
/// `begin_item`/`end_item`, map values in `begin_entry`/`end_entry` and
/// object fields in `begin_property`/`end_property`. Exactly one value is
/// written at the root.
pub trait SerializationVisitor {
    fn visit_null(&mut self) -> Result<(), Error>;

    fn visit_bool(&mut self, value: bool) -> Result<(), Error>;

    fn visit_i64(&mut self, value: i64) -> Result<(), Error>;

    fn visit_u64(&mut self, value: u64) -> Result<(), Error>;

    fn visit_f64(&mut self, value: f64) -> Result<(), Error>;

    fn visit_str(&mut self, value: &str) -> Result<(), Error>;

    /// Starts an array laid out as `xml` describes.
    fn begin_array(&mut self, xml: &XmlCollection) -> Result<(), Error>;

    fn begin_item(&mut self) -> Result<(), Error>;

    fn end_item(&mut self) -> Result<(), Error>;

    fn end_array(&mut self) -> Result<(), Error>;

    /// Starts a map laid out as `xml` describes.
    fn begin_map(&mut self, xml: &XmlCollection) -> Result<(), Error>;

    fn begin_entry(&mut self, key: &str) -> Result<(), Error>;

    fn end_entry(&mut self) -> Result<(), Error>;

    fn end_map(&mut self) -> Result<(), Error>;

    /// Starts an instance of `metadata`'s class.
    fn begin_object(&mut self, metadata: &ClassMetadata) -> Result<(), Error>;

    fn begin_property(&mut self, property: &PropertyMetadata) -> Result<(), Error>;

    fn end_property(&mut self, property: &PropertyMetadata) -> Result<(), Error>;

    fn end_object(&mut self, metadata: &ClassMetadata) -> Result<(), Error>;

    /// Returns the rendered document.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error>;
}

// -----------------------------------------------------------------------------
// InputNode

/// A scalar read from the input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar<'a> {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    /// A JSON string, which never converts to a number or bool.
    Str(&'a str),
    /// Untyped text, such as XML content, parsed as the target requires.
    Text(&'a str),
}

/// A read view over a parsed document.
pub trait InputNode {
    /// A short description used in error messages.
    fn kind(&self) -> &'static str;

    fn is_null(&self) -> bool;

    /// Returns `true` if the node can hold named members.
    fn is_object(&self) -> bool;

    /// The node as a scalar, if it is one.
    fn scalar(&self) -> Option<Scalar<'_>>;

    /// The node as an array laid out as `xml` describes.
    fn items(&self, xml: &XmlCollection) -> Option<Vec<&dyn InputNode>>;

    /// The node as a map laid out as `xml` describes.
    fn entries(&self, xml: &XmlCollection) -> Option<Vec<(Cow<'_, str>, &dyn InputNode)>>;

    /// The value of `property` inside this object node.
    fn member(&self, property: &PropertyMetadata) -> Option<&dyn InputNode>;

    /// The keys present in this object node.
    fn member_names(&self) -> Vec<Cow<'_, str>>;

    /// Converts the node into JSON, for handlers bridging to `serde`.
    fn to_json(&self) -> serde_json::Value;
}
