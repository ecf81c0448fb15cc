use core::fmt;
use std::sync::Arc;

use vl_utils::hash::{HashMap, HashSet};

use crate::Error;
use crate::data::{Data, DataRef, DynamicObject, Mapped, Value};
use crate::error::ROOT_PATH;
use crate::event::{EventDispatcher, EventKind, ObjectEvent};
use crate::handler::{Direction, HandlerContext, HandlerRegistry};
use crate::info::{ClassId, ClassMetadata, Primitive, PropertyMetadata, TypeDescriptor, XmlCollection};
use crate::metadata::MetadataFactory;
use crate::serializer::{Context, Format};
use crate::visitor::{InputNode, Scalar, SerializationVisitor};

// -----------------------------------------------------------------------------
// PathStack

enum Segment {
    Field(String),
    Index(usize),
    Key(String),
}

/// The location of the value being visited, rendered as `$.user.tags[2]`.
#[derive(Default)]
struct PathStack {
    stack: Vec<Segment>,
}

impl PathStack {
    #[inline]
    fn push(&mut self, segment: Segment) {
        self.stack.push(segment);
    }

    #[inline]
    fn pop(&mut self) {
        self.stack.pop();
    }
}

impl fmt::Display for PathStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT_PATH)?;
        for segment in &self.stack {
            match segment {
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Key(key) => write!(f, "[{key}]")?,
            }
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// GraphNavigator

/// Walks an object graph for one (de)serialization call.
///
/// Serialization reports the graph to a [`SerializationVisitor`];
/// deserialization reads an [`InputNode`] tree into a [`Value`]. Each call
/// gets a fresh navigator, so the path, the cycle guard and the metadata
/// memo never leak between calls.
pub(crate) struct GraphNavigator<'a> {
    factory: &'a MetadataFactory,
    handlers: &'a HandlerRegistry,
    events: &'a EventDispatcher,
    context: &'a Context,
    format: Format,
    path: PathStack,
    /// Objects on the current path, by address and class.
    visited: HashSet<(usize, ClassId)>,
    /// Shared nodes on the current path, by address.
    shared: HashSet<usize>,
    memo: HashMap<ClassId, Arc<ClassMetadata>>,
}

impl<'a> GraphNavigator<'a> {
    pub(crate) fn new(
        factory: &'a MetadataFactory,
        handlers: &'a HandlerRegistry,
        events: &'a EventDispatcher,
        context: &'a Context,
        format: Format,
    ) -> Self {
        Self {
            factory,
            handlers,
            events,
            context,
            format,
            path: PathStack::default(),
            visited: HashSet::default(),
            shared: HashSet::default(),
            memo: HashMap::default(),
        }
    }

    fn metadata(&mut self, class: &ClassId) -> Result<Arc<ClassMetadata>, Error> {
        if let Some(metadata) = self.memo.get(class) {
            return Ok(metadata.clone());
        }
        let metadata = self.factory.metadata_for(class)?;
        self.memo.insert(class.clone(), metadata.clone());
        Ok(metadata)
    }

    fn path(&self) -> String {
        self.path.to_string()
    }

    fn mismatch(&self, expected: impl Into<String>, found: impl Into<String>) -> Error {
        Error::mismatch(self.path(), expected, found)
    }

    fn handler_not_found(&self, descriptor: &TypeDescriptor, direction: Direction) -> Error {
        Error::HandlerNotFound {
            type_name: descriptor.handler_tag().into_owned(),
            direction,
            path: self.path(),
        }
    }

    fn fire_serialize(&self, kind: EventKind, class: &ClassId, object: &dyn Mapped) -> Result<(), Error> {
        if self.events.len(kind) == 0 {
            return Ok(());
        }
        let path = self.path();
        let event = ObjectEvent::new(kind, class, &path, self.format, self.context);
        self.events.dispatch_serialize(&event, object)
    }

    fn fire_deserialize(&self, object: &mut DynamicObject) -> Result<(), Error> {
        if self.events.len(EventKind::PostDeserialize) == 0 {
            return Ok(());
        }
        let class = object.class().clone();
        let path = self.path();
        let event = ObjectEvent::new(EventKind::PostDeserialize, &class, &path, self.format, self.context);
        self.events.dispatch_deserialize(&event, object)
    }

    /// Whether `property` takes part in this call.
    fn includes(&self, property: &PropertyMetadata, direction: Direction) -> bool {
        if property.is_skipped() {
            return false;
        }
        if direction == Direction::Deserialize && property.is_read_only() {
            return false;
        }
        self.context.includes(property)
    }

    // -------------------------------------------------------------------------
    // Serialization

    /// Writes `data`, declared as `descriptor`, to `visitor`.
    pub(crate) fn serialize(
        &mut self,
        visitor: &mut dyn SerializationVisitor,
        data: &dyn Data,
        descriptor: &TypeDescriptor,
    ) -> Result<(), Error> {
        self.write(visitor, data, descriptor, &XmlCollection::DEFAULT)
    }

    fn write(
        &mut self,
        visitor: &mut dyn SerializationVisitor,
        data: &dyn Data,
        descriptor: &TypeDescriptor,
        xml: &XmlCollection,
    ) -> Result<(), Error> {
        if data.is_null() {
            return visitor.visit_null();
        }
        let descriptor = descriptor.non_optional();

        if let Some(handler) = self.handlers.serializer(&descriptor.handler_tag()) {
            let path = self.path();
            let ctx = HandlerContext::new(descriptor, self.format, &path, self.context);
            return handler(visitor, data, &ctx);
        }
        if let TypeDescriptor::Custom { .. } = descriptor {
            return Err(self.handler_not_found(descriptor, Direction::Serialize));
        }

        match data.data_ref() {
            DataRef::Null => visitor.visit_null(),
            DataRef::Bool(value) => visitor.visit_bool(value),
            DataRef::I64(value) => visitor.visit_i64(value),
            DataRef::U64(value) => visitor.visit_u64(value),
            DataRef::F64(value) => visitor.visit_f64(value),
            DataRef::Char(value) => visitor.visit_str(value.encode_utf8(&mut [0; 4])),
            DataRef::Str(value) => visitor.visit_str(value),
            DataRef::Seq(items) => {
                let TypeDescriptor::Array(element) = descriptor else {
                    return Err(self.mismatch(descriptor.to_string(), "array"));
                };
                visitor.begin_array(xml)?;
                for (index, item) in items.into_iter().enumerate() {
                    self.path.push(Segment::Index(index));
                    visitor.begin_item()?;
                    self.write(visitor, item, element, &XmlCollection::DEFAULT)?;
                    visitor.end_item()?;
                    self.path.pop();
                }
                visitor.end_array()
            }
            DataRef::Map(entries) => {
                let TypeDescriptor::Map(_, value_type) = descriptor else {
                    return Err(self.mismatch(descriptor.to_string(), "map"));
                };
                visitor.begin_map(xml)?;
                for (key, value) in entries {
                    let key = self.map_key(key)?;
                    self.path.push(Segment::Key(key.clone()));
                    visitor.begin_entry(&key)?;
                    self.write(visitor, value, value_type, &XmlCollection::DEFAULT)?;
                    visitor.end_entry()?;
                    self.path.pop();
                }
                visitor.end_map()
            }
            DataRef::Object(object) => self.write_object(visitor, object, descriptor),
            DataRef::Shared(shared) => {
                let address = shared.address();
                if !self.shared.insert(address) {
                    return Err(Error::CyclicReference {
                        class: declared_class(descriptor),
                        path: self.path(),
                    });
                }
                let result = shared.with_inner(&mut |inner| self.write(visitor, inner, descriptor, xml));
                self.shared.remove(&address);
                result
            }
            DataRef::Opaque => Err(self.handler_not_found(descriptor, Direction::Serialize)),
        }
    }

    fn map_key(&self, key: &dyn Data) -> Result<String, Error> {
        match key.data_ref() {
            DataRef::Str(key) => Ok(key.to_owned()),
            DataRef::Char(key) => Ok(key.to_string()),
            DataRef::Bool(key) => Ok(key.to_string()),
            DataRef::I64(key) => Ok(key.to_string()),
            DataRef::U64(key) => Ok(key.to_string()),
            other => Err(self.mismatch("scalar map key", other.kind_name())),
        }
    }

    fn write_object(
        &mut self,
        visitor: &mut dyn SerializationVisitor,
        object: &dyn Mapped,
        descriptor: &TypeDescriptor,
    ) -> Result<(), Error> {
        let TypeDescriptor::Object(declared) = descriptor else {
            return Err(self.mismatch(descriptor.to_string(), "object"));
        };
        let actual = object.class_id();
        let key = (core::ptr::from_ref(object).cast::<()>().addr(), actual.clone());
        if self.visited.contains(&key) {
            return Err(Error::CyclicReference {
                class: actual,
                path: self.path(),
            });
        }

        let declared_metadata = self.metadata(declared)?;
        let metadata = if *declared == actual {
            declared_metadata.clone()
        } else {
            self.metadata(&actual)?
        };
        let tag = declared_metadata
            .discriminator()
            .and_then(|discriminator| Some((discriminator, discriminator.tag_of(&actual)?)));
        if declared_metadata.discriminator().is_some() && tag.is_none() {
            return Err(self.mismatch(format!("a subclass of `{declared}`"), actual.to_string()));
        }

        self.visited.insert(key.clone());
        self.fire_serialize(EventKind::PreSerialize, metadata.class(), object)?;
        visitor.begin_object(&metadata)?;
        if let Some((discriminator, tag)) = tag {
            let property = discriminator.property();
            visitor.begin_property(property)?;
            visitor.visit_str(tag)?;
            visitor.end_property(property)?;
        }
        self.write_properties(visitor, object, &metadata)?;
        visitor.end_object(&metadata)?;
        self.fire_serialize(EventKind::PostSerialize, metadata.class(), object)?;
        self.visited.remove(&key);
        Ok(())
    }

    fn write_properties(
        &mut self,
        visitor: &mut dyn SerializationVisitor,
        object: &dyn Mapped,
        metadata: &ClassMetadata,
    ) -> Result<(), Error> {
        for property in metadata.properties() {
            if !self.includes(property, Direction::Serialize) {
                continue;
            }
            let value = object.property(property.name()).ok_or_else(|| {
                Error::configuration(format!(
                    "class `{}` has no field `{}`",
                    metadata.class(),
                    property.name()
                ))
            })?;
            if value.is_null() && !self.context.is_serializing_null() {
                continue;
            }

            if property.is_inline() {
                self.path.push(Segment::Field(property.name().to_owned()));
                self.write_inline(visitor, value)?;
                self.path.pop();
                continue;
            }

            self.path.push(Segment::Field(property.serialized_name().to_owned()));
            visitor.begin_property(property)?;
            self.write(visitor, value, property.descriptor(), property.xml_collection())?;
            visitor.end_property(property)?;
            self.path.pop();
        }
        Ok(())
    }

    /// Writes the properties of an inline object into the enclosing object.
    fn write_inline(&mut self, visitor: &mut dyn SerializationVisitor, value: &dyn Data) -> Result<(), Error> {
        match value.data_ref() {
            DataRef::Null => Ok(()),
            DataRef::Object(object) => {
                let class = object.class_id();
                let key = (core::ptr::from_ref(object).cast::<()>().addr(), class.clone());
                if !self.visited.insert(key.clone()) {
                    return Err(Error::CyclicReference {
                        class,
                        path: self.path(),
                    });
                }
                let metadata = self.metadata(&class)?;
                self.fire_serialize(EventKind::PreSerialize, &class, object)?;
                self.write_properties(visitor, object, &metadata)?;
                self.fire_serialize(EventKind::PostSerialize, &class, object)?;
                self.visited.remove(&key);
                Ok(())
            }
            DataRef::Shared(shared) => shared.with_inner(&mut |inner| self.write_inline(visitor, inner)),
            other => Err(self.mismatch("inline object", other.kind_name())),
        }
    }

    // -------------------------------------------------------------------------
    // Deserialization

    /// Reads `node` as `descriptor`.
    pub(crate) fn deserialize(&mut self, node: &dyn InputNode, descriptor: &TypeDescriptor) -> Result<Value, Error> {
        self.read(node, descriptor, &XmlCollection::DEFAULT)
    }

    fn read(&mut self, node: &dyn InputNode, descriptor: &TypeDescriptor, xml: &XmlCollection) -> Result<Value, Error> {
        if node.is_null() {
            return if descriptor.is_optional() {
                Ok(Value::Null)
            } else {
                Err(self.mismatch(descriptor.to_string(), "null"))
            };
        }
        let descriptor = descriptor.non_optional();

        if let Some(handler) = self.handlers.deserializer(&descriptor.handler_tag()) {
            let path = self.path();
            let ctx = HandlerContext::new(descriptor, self.format, &path, self.context);
            return handler(node, &ctx);
        }

        match descriptor {
            TypeDescriptor::Custom { .. } => Err(self.handler_not_found(descriptor, Direction::Deserialize)),
            TypeDescriptor::Primitive(primitive) => {
                let scalar = node
                    .scalar()
                    .ok_or_else(|| self.mismatch(primitive.name(), node.kind()))?;
                self.convert(scalar, *primitive)
            }
            TypeDescriptor::Array(element) => {
                let items = node
                    .items(xml)
                    .ok_or_else(|| self.mismatch("array", node.kind()))?;
                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    self.path.push(Segment::Index(index));
                    values.push(self.read(item, element, &XmlCollection::DEFAULT)?);
                    self.path.pop();
                }
                Ok(Value::Array(values))
            }
            TypeDescriptor::Map(key_type, value_type) => {
                let entries = node
                    .entries(xml)
                    .ok_or_else(|| self.mismatch("map", node.kind()))?;
                let mut values = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    self.path.push(Segment::Key(key.to_string()));
                    let key = self.read_key(&key, key_type)?;
                    values.push((key, self.read(item, value_type, &XmlCollection::DEFAULT)?));
                    self.path.pop();
                }
                Ok(Value::Map(values))
            }
            TypeDescriptor::Object(class) => self.read_object(node, class),
            TypeDescriptor::Optional(inner) => self.read(node, inner, xml),
        }
    }

    fn read_key(&self, key: &str, descriptor: &TypeDescriptor) -> Result<Value, Error> {
        match descriptor.non_optional() {
            TypeDescriptor::Primitive(primitive) => self.convert(Scalar::Text(key), *primitive),
            other => Err(Error::configuration(format!(
                "map keys must be primitives, `{other}` declared at `{}`",
                self.path
            ))),
        }
    }

    /// Converts a scalar to `primitive`.
    ///
    /// JSON strings never convert to numbers or booleans; untyped text is
    /// parsed as the target requires. Integers are range checked.
    fn convert(&self, scalar: Scalar<'_>, primitive: Primitive) -> Result<Value, Error> {
        let integer = |value: i128| -> Result<Value, Error> {
            if !primitive.fits(value) {
                return Err(self.mismatch(primitive.name(), format!("out of range value {value}")));
            }
            Ok(match i64::try_from(value) {
                Ok(value) if primitive.is_signed() => Value::I64(value),
                _ => Value::U64(value as u64),
            })
        };

        match (primitive, scalar) {
            (Primitive::Bool, Scalar::Bool(value)) => Ok(Value::Bool(value)),
            (Primitive::Bool, Scalar::Text(text)) => match text.trim() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(self.mismatch("bool", format!("`{text}`"))),
            },
            (Primitive::String, Scalar::Str(text) | Scalar::Text(text)) => Ok(Value::String(text.to_owned())),
            (Primitive::Char, Scalar::Str(text) | Scalar::Text(text)) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(Value::Char(ch)),
                    _ => Err(self.mismatch("char", format!("`{text}`"))),
                }
            }
            (p, Scalar::I64(value)) if p.is_float() => Ok(Value::F64(value as f64)),
            (p, Scalar::U64(value)) if p.is_float() => Ok(Value::F64(value as f64)),
            (p, Scalar::F64(value)) if p.is_float() => Ok(Value::F64(value)),
            (p, Scalar::Text(text)) if p.is_float() => text
                .trim()
                .parse::<f64>()
                .map(Value::F64)
                .map_err(|_| self.mismatch(p.name(), format!("`{text}`"))),
            (p, Scalar::I64(value)) if p.is_signed() || p.is_unsigned() => integer(i128::from(value)),
            (p, Scalar::U64(value)) if p.is_signed() || p.is_unsigned() => integer(i128::from(value)),
            (p, Scalar::Text(text)) if p.is_signed() || p.is_unsigned() => match text.trim().parse::<i128>() {
                Ok(value) => integer(value),
                Err(_) => Err(self.mismatch(p.name(), format!("`{text}`"))),
            },
            (p, scalar) => Err(self.mismatch(p.name(), scalar_kind(&scalar))),
        }
    }

    fn read_object(&mut self, node: &dyn InputNode, declared: &ClassId) -> Result<Value, Error> {
        if !node.is_object() {
            return Err(self.mismatch(format!("object `{declared}`"), node.kind()));
        }
        let declared_metadata = self.metadata(declared)?;

        let metadata = match declared_metadata.discriminator() {
            None => declared_metadata.clone(),
            Some(discriminator) => {
                let field = discriminator.field();
                let tag_node = node.member(discriminator.property()).ok_or_else(|| Error::MissingField {
                    field: field.to_owned(),
                    path: self.path(),
                })?;
                let tag = match tag_node.scalar() {
                    Some(Scalar::Str(tag) | Scalar::Text(tag)) => tag,
                    _ => return Err(self.mismatch(format!("`{field}` tag"), tag_node.kind())),
                };
                let class = discriminator.class_of(tag).ok_or_else(|| {
                    self.mismatch(format!("a `{field}` tag of `{declared}`"), format!("`{tag}`"))
                })?;
                if class == declared {
                    declared_metadata.clone()
                } else {
                    self.metadata(class)?
                }
            }
        };

        let mut object = DynamicObject::new(metadata.class().clone());
        let mut known: HashSet<String> = HashSet::default();
        if let Some(discriminator) = declared_metadata.discriminator() {
            known.insert(discriminator.field().to_owned());
        }
        self.read_properties(node, &metadata, &mut object, &mut known)?;

        for name in node.member_names() {
            if known.contains(name.as_ref()) {
                continue;
            }
            if self.context.is_strict() {
                return Err(Error::UnknownField {
                    field: name.into_owned(),
                    path: self.path(),
                });
            }
            log::debug!("ignoring unknown field `{name}` of `{}` at `{}`", metadata.class(), self.path);
        }
        self.fire_deserialize(&mut object)?;
        Ok(Value::Object(object))
    }

    fn read_properties(
        &mut self,
        node: &dyn InputNode,
        metadata: &ClassMetadata,
        object: &mut DynamicObject,
        known: &mut HashSet<String>,
    ) -> Result<(), Error> {
        for property in metadata.properties() {
            if property.is_skipped() {
                continue;
            }

            if property.is_inline() {
                if !self.includes(property, Direction::Deserialize) {
                    continue;
                }
                let TypeDescriptor::Object(class) = property.descriptor().non_optional() else {
                    return Err(Error::configuration(format!(
                        "inline property `{}` of `{}` is not an object",
                        property.name(),
                        metadata.class()
                    )));
                };
                let inner_metadata = self.metadata(class)?;
                let mut inner = DynamicObject::new(class.clone());
                self.path.push(Segment::Field(property.name().to_owned()));
                self.read_properties(node, &inner_metadata, &mut inner, known)?;
                self.fire_deserialize(&mut inner)?;
                self.path.pop();
                object.insert(property.name(), Value::Object(inner));
                continue;
            }

            known.insert(property.serialized_name().to_owned());
            let xml = property.xml_collection();
            if xml.inline {
                known.insert(xml.entry.to_string());
            }
            if !self.includes(property, Direction::Deserialize) {
                continue;
            }

            match node.member(property) {
                Some(member) => {
                    self.path.push(Segment::Field(property.serialized_name().to_owned()));
                    let value = self.read(member, property.descriptor(), xml)?;
                    self.path.pop();
                    object.insert(property.name(), value);
                }
                None if property.is_required() => {
                    return Err(Error::MissingField {
                        field: property.serialized_name().to_owned(),
                        path: self.path(),
                    });
                }
                None => {}
            }
        }
        Ok(())
    }
}

fn declared_class(descriptor: &TypeDescriptor) -> ClassId {
    match descriptor.non_optional() {
        TypeDescriptor::Object(class) => class.clone(),
        other => ClassId::new(other.to_string()),
    }
}

fn scalar_kind(scalar: &Scalar<'_>) -> &'static str {
    match scalar {
        Scalar::Bool(_) => "bool",
        Scalar::I64(_) | Scalar::U64(_) => "integer",
        Scalar::F64(_) => "float",
        Scalar::Str(_) | Scalar::Text(_) => "string",
    }
}
