use core::fmt::Display;
use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::Error;
use crate::info::{ClassMetadata, PropertyFlags, PropertyMetadata, TypeDescriptor, XmlCollection};
use crate::serializer::Format;
use crate::visitor::{InputNode, Scalar, SerializationVisitor};

const XSI_NIL: &str = "xsi:nil";
const XSI_NAMESPACE: (&str, &str) = ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance");

// -----------------------------------------------------------------------------
// XmlOptions

/// Output and input options of the XML format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlOptions {
    /// Indents the output by four spaces per level.
    pub format_output: bool,
    /// The root element of documents whose root is not a class with its
    /// own root name.
    pub root_name: String,
    /// DOCTYPE declarations accepted on input, compared after collapsing
    /// whitespace. Any other DOCTYPE rejects the document.
    pub doctype_whitelist: Vec<String>,
    /// Wraps every text value in a CDATA section.
    pub cdata: bool,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            format_output: true,
            root_name: "result".into(),
            doctype_whitelist: Vec::new(),
            cdata: false,
        }
    }
}

// -----------------------------------------------------------------------------
// XmlText

/// Text content of an element or an attribute value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlText(pub String);

impl XmlText {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl InputNode for XmlText {
    fn kind(&self) -> &'static str {
        "text"
    }

    fn is_null(&self) -> bool {
        false
    }

    fn is_object(&self) -> bool {
        false
    }

    fn scalar(&self) -> Option<Scalar<'_>> {
        Some(Scalar::Text(&self.0))
    }

    fn items(&self, _xml: &XmlCollection) -> Option<Vec<&dyn InputNode>> {
        None
    }

    fn entries(&self, _xml: &XmlCollection) -> Option<Vec<(Cow<'_, str>, &dyn InputNode)>> {
        None
    }

    fn member(&self, _property: &PropertyMetadata) -> Option<&dyn InputNode> {
        None
    }

    fn member_names(&self) -> Vec<Cow<'_, str>> {
        Vec::new()
    }

    fn to_json(&self) -> Json {
        Json::String(self.0.clone())
    }
}

// -----------------------------------------------------------------------------
// XmlElement

/// An element of an XML document, as written by
/// [`XmlSerializationVisitor`] and read by the deserializer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, XmlText)>,
    pub children: Vec<XmlElement>,
    pub text: XmlText,
    /// The text is written as, or was read from, a CDATA section.
    pub cdata: bool,
}

impl XmlElement {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the value of attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets attribute `name`, replacing any previous value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = XmlText(value.into());
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Returns the first child named `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.attributes.is_empty()
    }
}

fn is_namespace_attribute(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:") || name.starts_with("xsi:")
}

impl InputNode for XmlElement {
    fn kind(&self) -> &'static str {
        "element"
    }

    fn is_null(&self) -> bool {
        self.attribute(XSI_NIL) == Some("true")
    }

    fn is_object(&self) -> bool {
        true
    }

    fn scalar(&self) -> Option<Scalar<'_>> {
        self.children
            .is_empty()
            .then_some(Scalar::Text(self.text.as_str()))
    }

    fn items(&self, xml: &XmlCollection) -> Option<Vec<&dyn InputNode>> {
        Some(
            self.children
                .iter()
                .filter(|child| !xml.inline || child.name == xml.entry)
                .map(|child| child as &dyn InputNode)
                .collect(),
        )
    }

    fn entries(&self, xml: &XmlCollection) -> Option<Vec<(Cow<'_, str>, &dyn InputNode)>> {
        Some(
            self.children
                .iter()
                .filter(|child| !xml.inline || child.name == xml.entry)
                .map(|child| {
                    let key = child.attribute(&xml.key_attribute).unwrap_or(child.name.as_str());
                    (Cow::Borrowed(key), child as &dyn InputNode)
                })
                .collect(),
        )
    }

    fn member(&self, property: &PropertyMetadata) -> Option<&dyn InputNode> {
        let name = property.serialized_name();
        let flags = property.flags();
        if flags.contains(PropertyFlags::XML_ATTRIBUTE) {
            return self
                .attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value as &dyn InputNode);
        }
        if flags.contains(PropertyFlags::XML_VALUE) {
            return Some(&self.text);
        }
        let collection = matches!(
            property.descriptor().non_optional(),
            TypeDescriptor::Array(_) | TypeDescriptor::Map(..)
        );
        if collection && property.xml_collection().inline {
            return Some(self);
        }
        self.child(name).map(|child| child as &dyn InputNode)
    }

    fn member_names(&self) -> Vec<Cow<'_, str>> {
        let mut names: Vec<Cow<'_, str>> = self
            .attributes
            .iter()
            .filter(|(key, _)| !is_namespace_attribute(key))
            .map(|(key, _)| Cow::Borrowed(key.as_str()))
            .collect();
        for child in &self.children {
            if !names.iter().any(|name| *name == child.name) {
                names.push(Cow::Borrowed(child.name.as_str()));
            }
        }
        names
    }

    fn to_json(&self) -> Json {
        if self.is_leaf() {
            return Json::String(self.text.0.clone());
        }

        let mut map = Map::new();
        for (key, value) in &self.attributes {
            if !is_namespace_attribute(key) {
                map.insert(format!("@{key}"), Json::String(value.0.clone()));
            }
        }
        for child in &self.children {
            let value = child.to_json();
            match map.get_mut(&child.name) {
                Some(Json::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Json::Array(vec![first, value]);
                }
                None => {
                    map.insert(child.name.clone(), value);
                }
            }
        }
        if !self.text.is_empty() {
            map.insert("#text".into(), Json::String(self.text.0.clone()));
        }
        Json::Object(map)
    }
}

// -----------------------------------------------------------------------------
// XmlSerializationVisitor

enum Frame {
    /// An open element receiving content.
    Element(XmlElement),
    /// The next scalar becomes an attribute of the enclosing element.
    Attribute(String),
    /// The next scalar becomes the text of the enclosing element.
    Text { cdata: bool },
    /// An inline collection writing its entries into the enclosing element.
    Inline,
    /// Entries of an array or map.
    Collection { entry: String, key_attribute: String },
}

/// Renders a graph as XML.
///
/// Objects and collections become elements, scalars become text. Property
/// metadata turns values into attributes, element text or CDATA, and
/// collections into `<entry>` children, inline or wrapped in the property
/// element. Null values carry `xsi:nil="true"`.
///
/// # Examples
///
/// ```
/// use vl_serial::info::XmlCollection;
/// use vl_serial::visitor::{SerializationVisitor, XmlOptions, XmlSerializationVisitor};
///
/// let options = XmlOptions { format_output: false, ..XmlOptions::default() };
/// let mut visitor = Box::new(XmlSerializationVisitor::new(options));
/// visitor.begin_array(&XmlCollection::DEFAULT).unwrap();
/// visitor.begin_item().unwrap();
/// visitor.visit_str("a & b").unwrap();
/// visitor.end_item().unwrap();
/// visitor.end_array().unwrap();
///
/// let xml = String::from_utf8(visitor.finish().unwrap()).unwrap();
/// assert_eq!(xml, r#"<?xml version="1.0" encoding="UTF-8"?><result><entry>a &amp; b</entry></result>"#);
/// ```
pub struct XmlSerializationVisitor {
    options: XmlOptions,
    stack: Vec<Frame>,
    root: Option<XmlElement>,
    uses_nil: bool,
}

impl XmlSerializationVisitor {
    #[inline]
    pub fn new(options: XmlOptions) -> Self {
        Self {
            options,
            stack: Vec::new(),
            root: None,
            uses_nil: false,
        }
    }

    fn open_root(&mut self, name: Option<&str>) {
        if self.stack.is_empty() {
            let name = name.unwrap_or(&self.options.root_name);
            let mut element = XmlElement::new(name);
            element.cdata = self.options.cdata;
            self.stack.push(Frame::Element(element));
        }
    }

    fn element_mut(&mut self) -> Result<&mut XmlElement, Error> {
        self.stack
            .iter_mut()
            .rev()
            .find_map(|frame| match frame {
                Frame::Element(element) => Some(element),
                _ => None,
            })
            .ok_or_else(|| Error::configuration("no open XML element"))
    }

    fn entry_names(&self) -> Result<(&str, &str), Error> {
        self.stack
            .iter()
            .rev()
            .find_map(|frame| match frame {
                Frame::Collection { entry, key_attribute } => Some((entry.as_str(), key_attribute.as_str())),
                _ => None,
            })
            .ok_or_else(|| Error::configuration("entry written outside of a collection"))
    }

    /// Pops the top element into its parent, or into the root slot.
    fn close_element(&mut self) -> Result<(), Error> {
        let Some(Frame::Element(element)) = self.stack.pop() else {
            return Err(Error::configuration("unbalanced end of XML element"));
        };
        if self.stack.is_empty() {
            self.root = Some(element);
        } else {
            self.element_mut()?.children.push(element);
        }
        Ok(())
    }

    /// Closes the root element once the value it was opened for ends.
    fn close_root(&mut self) -> Result<(), Error> {
        if self.stack.len() == 1 {
            self.close_element()?;
        }
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> Result<(), Error> {
        if self.stack.is_empty() {
            self.open_root(None);
            self.element_mut()?.text = XmlText(text.to_owned());
            return self.close_element();
        }
        match self.stack.last() {
            Some(Frame::Attribute(name)) => {
                let name = name.clone();
                self.element_mut()?.set_attribute(name, text);
            }
            Some(Frame::Text { cdata }) => {
                let cdata = *cdata;
                let element = self.element_mut()?;
                element.text = XmlText(text.to_owned());
                element.cdata |= cdata;
            }
            Some(Frame::Element(_)) => self.element_mut()?.text = XmlText(text.to_owned()),
            _ => return Err(Error::configuration("text written directly into a collection")),
        }
        Ok(())
    }

    fn open_collection(&mut self, xml: &XmlCollection) {
        self.open_root(None);
        self.stack.push(Frame::Collection {
            entry: xml.entry.to_string(),
            key_attribute: xml.key_attribute.to_string(),
        });
    }

    fn close_collection(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(Frame::Collection { .. }) => self.close_root(),
            _ => Err(Error::configuration("unbalanced end of XML collection")),
        }
    }
}

impl SerializationVisitor for XmlSerializationVisitor {
    fn visit_null(&mut self) -> Result<(), Error> {
        match self.stack.last() {
            Some(Frame::Attribute(_) | Frame::Text { .. }) => Ok(()),
            None => {
                self.open_root(None);
                self.uses_nil = true;
                self.element_mut()?.set_attribute(XSI_NIL, "true");
                self.close_element()
            }
            _ => {
                self.uses_nil = true;
                self.element_mut()?.set_attribute(XSI_NIL, "true");
                Ok(())
            }
        }
    }

    fn visit_bool(&mut self, value: bool) -> Result<(), Error> {
        self.write_text(if value { "true" } else { "false" })
    }

    fn visit_i64(&mut self, value: i64) -> Result<(), Error> {
        self.write_text(&value.to_string())
    }

    fn visit_u64(&mut self, value: u64) -> Result<(), Error> {
        self.write_text(&value.to_string())
    }

    fn visit_f64(&mut self, value: f64) -> Result<(), Error> {
        self.write_text(&value.to_string())
    }

    fn visit_str(&mut self, value: &str) -> Result<(), Error> {
        self.write_text(value)
    }

    fn begin_array(&mut self, xml: &XmlCollection) -> Result<(), Error> {
        self.open_collection(xml);
        Ok(())
    }

    fn begin_item(&mut self) -> Result<(), Error> {
        let (entry, _) = self.entry_names()?;
        let mut element = XmlElement::new(entry);
        element.cdata = self.options.cdata;
        self.stack.push(Frame::Element(element));
        Ok(())
    }

    fn end_item(&mut self) -> Result<(), Error> {
        self.close_element()
    }

    fn end_array(&mut self) -> Result<(), Error> {
        self.close_collection()
    }

    fn begin_map(&mut self, xml: &XmlCollection) -> Result<(), Error> {
        self.open_collection(xml);
        Ok(())
    }

    fn begin_entry(&mut self, key: &str) -> Result<(), Error> {
        let (entry, key_attribute) = self.entry_names()?;
        let mut element = XmlElement::new(entry);
        element.set_attribute(key_attribute, key);
        element.cdata = self.options.cdata;
        self.stack.push(Frame::Element(element));
        Ok(())
    }

    fn end_entry(&mut self) -> Result<(), Error> {
        self.close_element()
    }

    fn end_map(&mut self) -> Result<(), Error> {
        self.close_collection()
    }

    fn begin_object(&mut self, metadata: &ClassMetadata) -> Result<(), Error> {
        self.open_root(metadata.xml_root_name());
        let element = self.element_mut()?;
        for namespace in metadata.xml_namespaces() {
            element.set_attribute(namespace.attribute_name(), namespace.uri.as_str());
        }
        Ok(())
    }

    fn begin_property(&mut self, property: &PropertyMetadata) -> Result<(), Error> {
        let flags = property.flags();
        let collection = matches!(
            property.descriptor().non_optional(),
            TypeDescriptor::Array(_) | TypeDescriptor::Map(..)
        );
        let frame = if flags.contains(PropertyFlags::XML_ATTRIBUTE) {
            Frame::Attribute(property.serialized_name().to_owned())
        } else if flags.contains(PropertyFlags::XML_VALUE) {
            Frame::Text {
                cdata: flags.contains(PropertyFlags::XML_CDATA),
            }
        } else if collection && property.xml_collection().inline {
            Frame::Inline
        } else {
            let mut element = XmlElement::new(property.serialized_name());
            element.cdata = self.options.cdata || flags.contains(PropertyFlags::XML_CDATA);
            Frame::Element(element)
        };
        self.stack.push(frame);
        Ok(())
    }

    fn end_property(&mut self, _property: &PropertyMetadata) -> Result<(), Error> {
        match self.stack.last() {
            Some(Frame::Element(_)) => self.close_element(),
            Some(Frame::Attribute(_) | Frame::Text { .. } | Frame::Inline) => {
                self.stack.pop();
                Ok(())
            }
            _ => Err(Error::configuration("unbalanced end of XML property")),
        }
    }

    fn end_object(&mut self, _metadata: &ClassMetadata) -> Result<(), Error> {
        self.close_root()
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        if !self.stack.is_empty() {
            return Err(Error::configuration("document finished inside an open element"));
        }
        let mut root = match self.root {
            Some(root) => root,
            None => XmlElement::new(self.options.root_name.as_str()),
        };
        if self.uses_nil && root.attribute(XSI_NAMESPACE.0).is_none() {
            root.attributes.insert(0, (XSI_NAMESPACE.0.into(), XmlText(XSI_NAMESPACE.1.into())));
        }

        let mut writer = if self.options.format_output {
            Writer::new_with_indent(Vec::new(), b' ', 4)
        } else {
            Writer::new(Vec::new())
        };
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(output_error)?;
        write_element(&mut writer, &root)?;
        Ok(writer.into_inner())
    }
}

fn output_error(err: impl Display) -> Error {
    Error::configuration(format!("failed to write XML: {err}"))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<(), Error> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() && element.text.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(output_error);
    }

    writer.write_event(Event::Start(start)).map_err(output_error)?;
    if !element.text.is_empty() {
        let text = element.text.as_str();
        // `]]>` cannot appear inside a CDATA section.
        let event = if element.cdata && !text.contains("]]>") {
            Event::CData(BytesCData::new(text))
        } else {
            Event::Text(BytesText::new(text))
        };
        writer.write_event(event).map_err(output_error)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(output_error)
}

// -----------------------------------------------------------------------------
// Input

fn syntax(err: impl Display) -> Error {
    Error::Syntax {
        format: Format::Xml,
        message: err.to_string(),
    }
}

fn normalize_doctype(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, Error> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(syntax)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(syntax)?.into_owned();
        element.attributes.push((key, XmlText(value)));
    }
    Ok(element)
}

fn attach(element: XmlElement, stack: &mut [XmlElement], root: &mut Option<XmlElement>) -> Result<(), Error> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(syntax("more than one root element")),
    }
    Ok(())
}

/// Leaf text is kept as written. Around child elements, text is only the
/// indentation of formatted output.
fn drop_indentation(element: &mut XmlElement) {
    if !element.children.is_empty() {
        let trimmed = element.text.0.trim();
        if trimmed.len() != element.text.0.len() {
            element.text = XmlText(trimmed.to_owned());
        }
    }
}

/// Parses an XML document into its root element.
///
/// A DOCTYPE outside of `options.doctype_whitelist` rejects the document
/// before any element is accepted. Only the predefined entities and
/// character references are resolved; any other entity reference is a
/// syntax error.
pub(crate) fn parse_xml(input: &[u8], options: &XmlOptions) -> Result<XmlElement, Error> {
    let text = core::str::from_utf8(input).map_err(syntax)?;
    let mut reader = Reader::from_str(text);

    let allowed: Vec<String> = options
        .doctype_whitelist
        .iter()
        .map(|doctype| normalize_doctype(doctype))
        .collect();

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event().map_err(syntax)? {
            Event::DocType(doctype) => {
                let declared = normalize_doctype(&String::from_utf8_lossy(&doctype));
                if !allowed.contains(&declared) {
                    return Err(Error::DisallowedDoctype(declared));
                }
            }
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => attach(element_from(&start)?, &mut stack, &mut root)?,
            Event::End(_) => {
                let mut element = stack.pop().ok_or_else(|| syntax("unexpected closing tag"))?;
                drop_indentation(&mut element);
                attach(element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(syntax)?;
                if let Some(element) = stack.last_mut() {
                    element.text.0.push_str(&text);
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned()).map_err(syntax)?;
                if let Some(element) = stack.last_mut() {
                    element.text.0.push_str(&text);
                    element.cdata = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(syntax(format!("element `{}` is never closed", open.name)));
    }
    root.ok_or_else(|| syntax("the document has no root element"))
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{XmlElement, XmlOptions, XmlSerializationVisitor, parse_xml};
    use crate::Error;
    use crate::info::{
        ClassId, ClassMetadata, Primitive, PropertyFlags, PropertyMetadata, TypeDescriptor, XmlCollection,
    };
    use crate::visitor::{InputNode, Scalar, SerializationVisitor};

    fn compact() -> XmlOptions {
        XmlOptions {
            format_output: false,
            ..XmlOptions::default()
        }
    }

    fn render(write: impl FnOnce(&mut dyn SerializationVisitor)) -> String {
        let mut visitor = Box::new(XmlSerializationVisitor::new(compact()));
        write(visitor.as_mut());
        let out = String::from_utf8(visitor.finish().unwrap()).unwrap();
        out.trim_start_matches(r#"<?xml version="1.0" encoding="UTF-8"?>"#).to_owned()
    }

    #[test]
    fn properties_become_elements_attributes_and_text() {
        let string = || TypeDescriptor::Primitive(Primitive::String);
        let metadata = ClassMetadata::new(ClassId::from_static("app::Link"))
            .with_xml_root("link")
            .with_xml_namespace("atom", "http://www.w3.org/2005/Atom");
        let href = PropertyMetadata::new("href", string()).with_flags(PropertyFlags::XML_ATTRIBUTE);
        let label = PropertyMetadata::new("label", string()).with_flags(PropertyFlags::XML_VALUE);

        let xml = render(|visitor| {
            visitor.begin_object(&metadata).unwrap();
            visitor.begin_property(&href).unwrap();
            visitor.visit_str("/home").unwrap();
            visitor.end_property(&href).unwrap();
            visitor.begin_property(&label).unwrap();
            visitor.visit_str("Home").unwrap();
            visitor.end_property(&label).unwrap();
            visitor.end_object(&metadata).unwrap();
        });
        assert_eq!(
            xml,
            r#"<link xmlns:atom="http://www.w3.org/2005/Atom" href="/home">Home</link>"#
        );
    }

    #[test]
    fn nulls_and_maps() {
        let metadata = ClassMetadata::new(ClassId::from_static("app::Doc"));
        let note = PropertyMetadata::new("note", TypeDescriptor::optional(TypeDescriptor::Primitive(Primitive::String)));
        let prices = PropertyMetadata::new(
            "prices",
            TypeDescriptor::map(
                TypeDescriptor::Primitive(Primitive::String),
                TypeDescriptor::Primitive(Primitive::U32),
            ),
        );

        let xml = render(|visitor| {
            visitor.begin_object(&metadata).unwrap();
            visitor.begin_property(&note).unwrap();
            visitor.visit_null().unwrap();
            visitor.end_property(&note).unwrap();
            visitor.begin_property(&prices).unwrap();
            visitor.begin_map(prices.xml_collection()).unwrap();
            visitor.begin_entry("EUR").unwrap();
            visitor.visit_u64(3).unwrap();
            visitor.end_entry().unwrap();
            visitor.end_map().unwrap();
            visitor.end_property(&prices).unwrap();
            visitor.end_object(&metadata).unwrap();
        });
        assert_eq!(
            xml,
            concat!(
                r#"<result xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
                r#"<note xsi:nil="true"/><prices><entry key="EUR">3</entry></prices></result>"#
            )
        );
    }

    #[test]
    fn inline_collections_write_into_parent() {
        let metadata = ClassMetadata::new(ClassId::from_static("app::Post"));
        let xml_layout = XmlCollection {
            entry: "tag".into(),
            inline: true,
            ..XmlCollection::DEFAULT
        };
        let tags = PropertyMetadata::new("tags", TypeDescriptor::array(TypeDescriptor::Primitive(Primitive::String)))
            .with_xml_collection(xml_layout.clone());

        let xml = render(|visitor| {
            visitor.begin_object(&metadata).unwrap();
            visitor.begin_property(&tags).unwrap();
            visitor.begin_array(&xml_layout).unwrap();
            for tag in ["a", "b"] {
                visitor.begin_item().unwrap();
                visitor.visit_str(tag).unwrap();
                visitor.end_item().unwrap();
            }
            visitor.end_array().unwrap();
            visitor.end_property(&tags).unwrap();
            visitor.end_object(&metadata).unwrap();
        });
        assert_eq!(xml, "<result><tag>a</tag><tag>b</tag></result>");

        let parsed = parse_xml(xml.as_bytes(), &compact()).unwrap();
        let items = parsed.member(&tags).unwrap().items(&xml_layout).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].scalar(), Some(Scalar::Text("b")));
    }

    #[test]
    fn cdata_sections() {
        let metadata = ClassMetadata::new(ClassId::from_static("app::Note"));
        let body = PropertyMetadata::new("body", TypeDescriptor::Primitive(Primitive::String))
            .with_flags(PropertyFlags::XML_CDATA);

        let xml = render(|visitor| {
            visitor.begin_object(&metadata).unwrap();
            visitor.begin_property(&body).unwrap();
            visitor.visit_str("<b>hi</b>").unwrap();
            visitor.end_property(&body).unwrap();
            visitor.end_object(&metadata).unwrap();
        });
        assert_eq!(xml, "<result><body><![CDATA[<b>hi</b>]]></body></result>");

        let parsed = parse_xml(xml.as_bytes(), &compact()).unwrap();
        let body = parsed.child("body").unwrap();
        assert!(body.cdata);
        assert_eq!(body.text.as_str(), "<b>hi</b>");
    }

    #[test]
    fn parses_attributes_and_escapes() {
        let doc = parse_xml(
            br#"<?xml version="1.0"?><user id="7" xmlns:a="urn:a"><name>A &amp; B</name><tag>x</tag><tag>y</tag></user>"#,
            &compact(),
        )
        .unwrap();

        assert_eq!(doc.name, "user");
        assert_eq!(doc.attribute("id"), Some("7"));
        assert_eq!(doc.child("name").unwrap().text.as_str(), "A & B");
        assert_eq!(doc.member_names(), ["id", "name", "tag"]);
        assert_eq!(
            doc.to_json(),
            serde_json::json!({ "@id": "7", "name": "A & B", "tag": ["x", "y"] })
        );
    }

    #[test]
    fn doctypes_must_be_allowed() {
        let input = br#"<!DOCTYPE note SYSTEM "note.dtd"><note/>"#;
        let err = parse_xml(input, &compact()).unwrap_err();
        assert!(matches!(err, Error::DisallowedDoctype(ref doctype) if doctype == r#"note SYSTEM "note.dtd""#));

        let options = XmlOptions {
            doctype_whitelist: vec![r#"note   SYSTEM "note.dtd""#.into()],
            ..compact()
        };
        assert_eq!(parse_xml(input, &options).unwrap(), XmlElement::new("note"));
    }

    #[test]
    fn entities_are_never_expanded() {
        let input = br#"<!DOCTYPE x [<!ENTITY xxe SYSTEM "file:///etc/passwd">]><x>&xxe;</x>"#;
        assert!(matches!(parse_xml(input, &compact()), Err(Error::DisallowedDoctype(_))));

        let options = XmlOptions {
            doctype_whitelist: vec![r#"x [<!ENTITY xxe SYSTEM "file:///etc/passwd">]"#.into()],
            ..compact()
        };
        assert!(matches!(parse_xml(input, &options), Err(Error::Syntax { .. })));
    }

    #[test]
    fn malformed_documents_are_syntax_errors() {
        for input in [&b"<a><b></a>"[..], b"<a>", b"", b"<a/><b/>"] {
            assert!(
                matches!(parse_xml(input, &compact()), Err(Error::Syntax { .. })),
                "{}",
                String::from_utf8_lossy(input)
            );
        }
    }
}
