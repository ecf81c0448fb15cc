use std::borrow::Cow;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::info::{TypeDescriptor, Version};

/// The group a property belongs to when it declares none.
pub const DEFAULT_GROUP: &str = "Default";

// -----------------------------------------------------------------------------
// PropertyFlags

bitflags! {
    /// Access and layout flags of a [`PropertyMetadata`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PropertyFlags: u16 {
        /// Never serialized or deserialized.
        const SKIP = 1;
        /// Serialized but ignored on deserialization.
        const READ_ONLY = 1 << 1;
        /// An object property whose fields are merged into the parent.
        const INLINE = 1 << 2;
        /// Deserialization fails when the property is absent.
        const REQUIRED = 1 << 3;
        /// XML: written as an attribute of the parent element.
        const XML_ATTRIBUTE = 1 << 4;
        /// XML: written as the text content of the parent element.
        const XML_VALUE = 1 << 5;
        /// XML: text is wrapped in a CDATA section.
        const XML_CDATA = 1 << 6;
    }
}

// -----------------------------------------------------------------------------
// XmlCollection

/// XML layout of array and map properties.
///
/// Items are written as `<entry>` children of the property element, or of
/// the parent element when `inline` is set. Map entries carry their key in
/// the `key` attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlCollection {
    pub entry: Cow<'static, str>,
    pub inline: bool,
    pub key_attribute: Cow<'static, str>,
}

impl XmlCollection {
    /// The layout used when a property declares nothing.
    pub const DEFAULT: Self = Self {
        entry: Cow::Borrowed("entry"),
        inline: false,
        key_attribute: Cow::Borrowed("key"),
    };
}

impl Default for XmlCollection {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

// -----------------------------------------------------------------------------
// PropertyMetadata

/// The mapping of one property of a class.
///
/// `serialized_name` is filled by the naming strategy when the metadata
/// factory resolves the class; before that it equals `name`.
///
/// # Examples
///
/// ```
/// use vl_serial::info::{PropertyFlags, PropertyMetadata, Primitive, TypeDescriptor};
///
/// let prop = PropertyMetadata::new("birthDate", TypeDescriptor::Primitive(Primitive::String))
///     .with_groups(["details"])
///     .with_flags(PropertyFlags::READ_ONLY);
///
/// assert!(prop.is_required());
/// assert!(prop.in_groups(&["details".to_string()]));
/// assert!(!prop.in_groups(&["Default".to_string()]));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    name: Cow<'static, str>,
    serialized_name: String,
    explicit_name: Option<String>,
    descriptor: TypeDescriptor,
    flags: PropertyFlags,
    groups: Vec<String>,
    since: Option<Version>,
    until: Option<Version>,
    xml: XmlCollection,
}

impl PropertyMetadata {
    /// Creates a property.
    ///
    /// The property is [required](PropertyFlags::REQUIRED) unless the
    /// descriptor is optional.
    pub fn new(name: impl Into<Cow<'static, str>>, descriptor: TypeDescriptor) -> Self {
        let name = name.into();
        let flags = if descriptor.is_optional() {
            PropertyFlags::empty()
        } else {
            PropertyFlags::REQUIRED
        };
        Self {
            serialized_name: name.to_string(),
            name,
            explicit_name: None,
            descriptor,
            flags,
            groups: Vec::new(),
            since: None,
            until: None,
            xml: XmlCollection::DEFAULT,
        }
    }

    /// Sets an explicit serialized name, which naming strategies honor.
    pub fn with_serialized_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.serialized_name.clone_from(&name);
        self.explicit_name = Some(name);
        self
    }

    /// Adds flags.
    #[inline]
    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Clears the [`REQUIRED`](PropertyFlags::REQUIRED) flag.
    #[inline]
    pub fn optional(mut self) -> Self {
        self.flags.remove(PropertyFlags::REQUIRED);
        self
    }

    /// Sets the exclusion groups.
    pub fn with_groups<S: Into<String>>(mut self, groups: impl IntoIterator<Item = S>) -> Self {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the first version the property exists in.
    #[inline]
    pub fn with_since(mut self, version: Version) -> Self {
        self.since = Some(version);
        self
    }

    /// Sets the last version the property exists in.
    #[inline]
    pub fn with_until(mut self, version: Version) -> Self {
        self.until = Some(version);
        self
    }

    /// Sets the XML collection layout.
    #[inline]
    pub fn with_xml_collection(mut self, xml: XmlCollection) -> Self {
        self.xml = xml;
        self
    }

    /// The field name in the object model.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key used in the serialized output.
    #[inline]
    pub fn serialized_name(&self) -> &str {
        &self.serialized_name
    }

    /// The explicitly declared serialized name, if any.
    #[inline]
    pub fn explicit_name(&self) -> Option<&str> {
        self.explicit_name.as_deref()
    }

    #[inline]
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    #[inline]
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    #[inline]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    #[inline]
    pub fn since(&self) -> Option<&Version> {
        self.since.as_ref()
    }

    #[inline]
    pub fn until(&self) -> Option<&Version> {
        self.until.as_ref()
    }

    #[inline]
    pub fn xml_collection(&self) -> &XmlCollection {
        &self.xml
    }

    #[inline]
    pub fn is_skipped(&self) -> bool {
        self.flags.contains(PropertyFlags::SKIP)
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.flags.contains(PropertyFlags::READ_ONLY)
    }

    #[inline]
    pub fn is_inline(&self) -> bool {
        self.flags.contains(PropertyFlags::INLINE)
    }

    #[inline]
    pub fn is_required(&self) -> bool {
        self.flags.contains(PropertyFlags::REQUIRED)
    }

    /// Returns `true` if the property belongs to one of `groups`.
    ///
    /// A property without groups belongs to [`DEFAULT_GROUP`].
    pub fn in_groups(&self, groups: &[String]) -> bool {
        if self.groups.is_empty() {
            groups.iter().any(|group| group == DEFAULT_GROUP)
        } else {
            self.groups.iter().any(|own| groups.contains(own))
        }
    }

    /// Returns `true` if the property exists in `version`.
    pub fn in_version(&self, version: &Version) -> bool {
        self.since.as_ref().is_none_or(|since| version >= since)
            && self.until.as_ref().is_none_or(|until| version <= until)
    }

    #[inline]
    pub(crate) fn set_serialized_name(&mut self, name: String) {
        self.serialized_name = name;
    }
}

// -----------------------------------------------------------------------------
// Tests
