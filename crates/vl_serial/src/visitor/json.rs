use std::borrow::Cow;
use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Number, Value as Json};

use crate::Error;
use crate::info::{ClassMetadata, PropertyMetadata, XmlCollection};
use crate::serializer::Format;
use crate::visitor::{InputNode, Scalar, SerializationVisitor};

// -----------------------------------------------------------------------------
// JsonOptions

/// Output options of [`JsonSerializationVisitor`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    /// Indents the output.
    pub pretty: bool,
    /// Spaces per level when `pretty` is set.
    pub indent: usize,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: 4,
        }
    }
}

// -----------------------------------------------------------------------------
// JsonSerializationVisitor

enum Frame {
    Array(Vec<Json>),
    /// An object or map, and the key of the value being written.
    Object(Map<String, Json>, Option<String>),
}

/// Renders a graph as JSON.
///
/// Objects keep their property order and map entries their iteration
/// order. Non-finite floats are written as `null`.
///
/// # Examples
///
/// ```
/// use vl_serial::info::XmlCollection;
/// use vl_serial::visitor::{JsonOptions, JsonSerializationVisitor, SerializationVisitor};
///
/// let mut visitor = Box::new(JsonSerializationVisitor::new(JsonOptions::default()));
/// visitor.begin_array(&XmlCollection::DEFAULT).unwrap();
/// for value in [1, 2] {
///     visitor.begin_item().unwrap();
///     visitor.visit_u64(value).unwrap();
///     visitor.end_item().unwrap();
/// }
/// visitor.end_array().unwrap();
///
/// assert_eq!(visitor.finish().unwrap(), b"[1,2]");
/// ```
pub struct JsonSerializationVisitor {
    options: JsonOptions,
    stack: Vec<Frame>,
    root: Option<Json>,
}

impl JsonSerializationVisitor {
    #[inline]
    pub fn new(options: JsonOptions) -> Self {
        Self {
            options,
            stack: Vec::new(),
            root: None,
        }
    }

    fn emit(&mut self, value: Json) -> Result<(), Error> {
        match self.stack.last_mut() {
            None if self.root.is_none() => {
                self.root = Some(value);
                Ok(())
            }
            None => Err(Error::configuration("a document has a single root value")),
            Some(Frame::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(Frame::Object(map, key)) => match key.take() {
                Some(key) if map.contains_key(&key) => {
                    Err(Error::configuration(format!("key `{key}` written twice into one object")))
                }
                Some(key) => {
                    map.insert(key, value);
                    Ok(())
                }
                None => Err(Error::configuration("object value written without a key")),
            },
        }
    }

    fn set_key(&mut self, name: &str) -> Result<(), Error> {
        match self.stack.last_mut() {
            Some(Frame::Object(_, key)) => {
                *key = Some(name.to_owned());
                Ok(())
            }
            _ => Err(Error::configuration(format!("key `{name}` written outside of an object"))),
        }
    }

    fn close_object(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(Frame::Object(map, _)) => self.emit(Json::Object(map)),
            _ => Err(Error::configuration("unbalanced end of object")),
        }
    }
}

impl SerializationVisitor for JsonSerializationVisitor {
    fn visit_null(&mut self) -> Result<(), Error> {
        self.emit(Json::Null)
    }

    fn visit_bool(&mut self, value: bool) -> Result<(), Error> {
        self.emit(Json::Bool(value))
    }

    fn visit_i64(&mut self, value: i64) -> Result<(), Error> {
        self.emit(Json::Number(value.into()))
    }

    fn visit_u64(&mut self, value: u64) -> Result<(), Error> {
        self.emit(Json::Number(value.into()))
    }

    fn visit_f64(&mut self, value: f64) -> Result<(), Error> {
        self.emit(Number::from_f64(value).map_or(Json::Null, Json::Number))
    }

    fn visit_str(&mut self, value: &str) -> Result<(), Error> {
        self.emit(Json::String(value.to_owned()))
    }

    fn begin_array(&mut self, _xml: &XmlCollection) -> Result<(), Error> {
        self.stack.push(Frame::Array(Vec::new()));
        Ok(())
    }

    fn begin_item(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn end_item(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.emit(Json::Array(items)),
            _ => Err(Error::configuration("unbalanced end of array")),
        }
    }

    fn begin_map(&mut self, _xml: &XmlCollection) -> Result<(), Error> {
        self.stack.push(Frame::Object(Map::new(), None));
        Ok(())
    }

    fn begin_entry(&mut self, key: &str) -> Result<(), Error> {
        self.set_key(key)
    }

    fn end_entry(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn end_map(&mut self) -> Result<(), Error> {
        self.close_object()
    }

    fn begin_object(&mut self, _metadata: &ClassMetadata) -> Result<(), Error> {
        self.stack.push(Frame::Object(Map::new(), None));
        Ok(())
    }

    fn begin_property(&mut self, property: &PropertyMetadata) -> Result<(), Error> {
        self.set_key(property.serialized_name())
    }

    fn end_property(&mut self, _property: &PropertyMetadata) -> Result<(), Error> {
        Ok(())
    }

    fn end_object(&mut self, _metadata: &ClassMetadata) -> Result<(), Error> {
        self.close_object()
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        if !self.stack.is_empty() {
            return Err(Error::configuration("document finished inside an open value"));
        }
        let root = self.root.unwrap_or(Json::Null);
        if !self.options.pretty {
            return serde_json::to_vec(&root).map_err(|err| Error::Io(io::Error::from(err)));
        }

        let indent = vec![b' '; self.options.indent];
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
        root.serialize(&mut ser)
            .map_err(|err| Error::Io(io::Error::from(err)))?;
        Ok(out)
    }
}

// -----------------------------------------------------------------------------
// Input

/// Parses a JSON document.
pub(crate) fn parse_json(input: &[u8]) -> Result<Json, Error> {
    serde_json::from_slice(input).map_err(|err| Error::Syntax {
        format: Format::Json,
        message: err.to_string(),
    })
}

impl InputNode for Json {
    fn kind(&self) -> &'static str {
        match self {
            Json::Null => "null",
            Json::Bool(_) => "bool",
            Json::Number(_) => "number",
            Json::String(_) => "string",
            Json::Array(_) => "array",
            Json::Object(_) => "object",
        }
    }

    #[inline]
    fn is_null(&self) -> bool {
        matches!(self, Json::Null)
    }

    #[inline]
    fn is_object(&self) -> bool {
        matches!(self, Json::Object(_))
    }

    fn scalar(&self) -> Option<Scalar<'_>> {
        match self {
            Json::Bool(value) => Some(Scalar::Bool(*value)),
            Json::Number(number) => number
                .as_u64()
                .map(Scalar::U64)
                .or_else(|| number.as_i64().map(Scalar::I64))
                .or_else(|| number.as_f64().map(Scalar::F64)),
            Json::String(value) => Some(Scalar::Str(value)),
            _ => None,
        }
    }

    fn items(&self, _xml: &XmlCollection) -> Option<Vec<&dyn InputNode>> {
        let items = self.as_array()?;
        Some(items.iter().map(|item| item as &dyn InputNode).collect())
    }

    fn entries(&self, _xml: &XmlCollection) -> Option<Vec<(Cow<'_, str>, &dyn InputNode)>> {
        let map = self.as_object()?;
        Some(
            map.iter()
                .map(|(key, value)| (Cow::Borrowed(key.as_str()), value as &dyn InputNode))
                .collect(),
        )
    }

    fn member(&self, property: &PropertyMetadata) -> Option<&dyn InputNode> {
        let value = self.as_object()?.get(property.serialized_name())?;
        Some(value)
    }

    fn member_names(&self) -> Vec<Cow<'_, str>> {
        self.as_object()
            .map(|map| map.keys().map(|key| Cow::Borrowed(key.as_str())).collect())
            .unwrap_or_default()
    }

    #[inline]
    fn to_json(&self) -> Json {
        self.clone()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{JsonOptions, JsonSerializationVisitor, parse_json};
    use crate::Error;
    use crate::info::{ClassId, ClassMetadata, Primitive, PropertyMetadata, TypeDescriptor, XmlCollection};
    use crate::visitor::{InputNode, Scalar, SerializationVisitor};

    fn user() -> ClassMetadata {
        ClassMetadata::new(ClassId::from_static("app::User"))
            .with_property(PropertyMetadata::new("id", TypeDescriptor::Primitive(Primitive::U64)))
            .with_property(PropertyMetadata::new(
                "tags",
                TypeDescriptor::array(TypeDescriptor::Primitive(Primitive::String)),
            ))
    }

    fn write_user(visitor: &mut dyn SerializationVisitor, metadata: &ClassMetadata) {
        let [id, tags] = metadata.properties() else {
            unreachable!()
        };
        visitor.begin_object(metadata).unwrap();
        visitor.begin_property(id).unwrap();
        visitor.visit_u64(7).unwrap();
        visitor.end_property(id).unwrap();
        visitor.begin_property(tags).unwrap();
        visitor.begin_array(&XmlCollection::DEFAULT).unwrap();
        visitor.begin_item().unwrap();
        visitor.visit_str("admin").unwrap();
        visitor.end_item().unwrap();
        visitor.end_array().unwrap();
        visitor.end_property(tags).unwrap();
        visitor.end_object(metadata).unwrap();
    }

    #[test]
    fn writes_objects_in_property_order() {
        let metadata = user();
        let mut visitor = Box::new(JsonSerializationVisitor::new(JsonOptions::default()));
        write_user(visitor.as_mut(), &metadata);
        let out = visitor.finish().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"{"id":7,"tags":["admin"]}"#);
    }

    #[test]
    fn pretty_output_uses_indent() {
        let metadata = user();
        let options = JsonOptions {
            pretty: true,
            indent: 2,
        };
        let mut visitor = Box::new(JsonSerializationVisitor::new(options));
        write_user(visitor.as_mut(), &metadata);
        let out = String::from_utf8(visitor.finish().unwrap()).unwrap();
        assert_eq!(out, "{\n  \"id\": 7,\n  \"tags\": [\n    \"admin\"\n  ]\n}");
    }

    #[test]
    fn non_finite_floats_become_null() {
        let mut visitor = Box::new(JsonSerializationVisitor::new(JsonOptions::default()));
        visitor.visit_f64(f64::NAN).unwrap();
        assert_eq!(visitor.finish().unwrap(), b"null");
    }

    #[test]
    fn keys_are_written_once() {
        let metadata = user();
        let id = &metadata.properties()[0];
        let mut visitor = JsonSerializationVisitor::new(JsonOptions::default());
        visitor.begin_object(&metadata).unwrap();
        visitor.begin_property(id).unwrap();
        visitor.visit_u64(1).unwrap();
        visitor.end_property(id).unwrap();
        visitor.begin_property(id).unwrap();
        assert!(matches!(visitor.visit_u64(2), Err(Error::Configuration(_))));
    }

    #[test]
    fn unbalanced_calls_are_rejected() {
        let mut visitor = JsonSerializationVisitor::new(JsonOptions::default());
        assert!(visitor.end_array().is_err());
        assert!(visitor.begin_entry("key").is_err());
    }

    #[test]
    fn input_nodes_expose_json_shapes() {
        let doc = json!({ "id": 7, "delta": -3, "ratio": 0.5, "name": "Ada", "tags": ["a", "b"] });
        let id = PropertyMetadata::new("id", TypeDescriptor::Primitive(Primitive::U64));

        assert!(doc.is_object());
        assert_eq!(doc.member(&id).unwrap().scalar(), Some(Scalar::U64(7)));
        assert_eq!(doc["delta"].scalar(), Some(Scalar::I64(-3)));
        assert_eq!(doc["ratio"].scalar(), Some(Scalar::F64(0.5)));
        assert_eq!(doc["name"].scalar(), Some(Scalar::Str("Ada")));
        assert_eq!(doc["tags"].items(&XmlCollection::DEFAULT).unwrap().len(), 2);
        assert_eq!(doc.member_names(), ["id", "delta", "ratio", "name", "tags"]);
    }

    #[test]
    fn malformed_input_is_a_syntax_error() {
        let err = parse_json(b"{\"id\": ").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }
}
