//! The schema of mapping files.
//!
//! ```toml
//! class = "app::model::User"
//! xml_root_name = "user"
//!
//! [[properties]]
//! name = "id"
//! type = "u64"
//! xml_attribute = true
//!
//! [[properties]]
//! name = "birthDate"
//! type = "NaiveDate"
//! serialized_name = "born"
//! groups = ["details"]
//! since = "1.1"
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::Error;
use crate::info::{
    ClassId, ClassMetadata, Discriminator, PropertyFlags, PropertyMetadata, TypeDescriptor,
    Version, XmlCollection,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ClassMapping {
    class: Option<String>,
    xml_root_name: Option<String>,
    #[serde(default)]
    xml_namespaces: Vec<NamespaceMapping>,
    discriminator: Option<DiscriminatorMapping>,
    #[serde(default)]
    properties: Vec<PropertyMapping>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NamespaceMapping {
    #[serde(default)]
    prefix: String,
    uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DiscriminatorMapping {
    field: String,
    map: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertyMapping {
    name: String,
    #[serde(rename = "type")]
    descriptor: TypeDescriptor,
    serialized_name: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    since: Option<Version>,
    until: Option<Version>,
    #[serde(default)]
    skip: bool,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    inline: bool,
    required: Option<bool>,
    #[serde(default)]
    xml_attribute: bool,
    #[serde(default)]
    xml_value: bool,
    #[serde(default)]
    xml_cdata: bool,
    xml_entry: Option<String>,
    #[serde(default)]
    xml_inline: bool,
    xml_key_attribute: Option<String>,
}

impl ClassMapping {
    /// Converts the mapping of `class`, read from `file`.
    pub(crate) fn into_metadata(self, class: &ClassId, file: &Path) -> Result<ClassMetadata, Error> {
        if let Some(declared) = &self.class
            && class != declared.as_str()
        {
            return Err(Error::configuration(format!(
                "expected metadata for class `{class}` in `{}`, found `{declared}`",
                file.display()
            )));
        }

        let mut metadata = ClassMetadata::new(class.clone()).with_resource(file);
        if let Some(root) = self.xml_root_name {
            metadata = metadata.with_xml_root(root);
        }
        for namespace in self.xml_namespaces {
            metadata = metadata.with_xml_namespace(namespace.prefix, namespace.uri);
        }
        if let Some(mapping) = self.discriminator {
            let discriminator = mapping
                .map
                .into_iter()
                .fold(Discriminator::new(mapping.field), |disc, (tag, class)| {
                    disc.with_class(tag, ClassId::from(class))
                });
            metadata = metadata.with_discriminator(discriminator);
        }
        for property in self.properties {
            metadata = metadata.with_property(property.into_metadata());
        }
        Ok(metadata)
    }
}

impl PropertyMapping {
    fn into_metadata(self) -> PropertyMetadata {
        let mut flags = PropertyFlags::empty();
        flags.set(PropertyFlags::SKIP, self.skip);
        flags.set(PropertyFlags::READ_ONLY, self.read_only);
        flags.set(PropertyFlags::INLINE, self.inline);
        flags.set(PropertyFlags::XML_ATTRIBUTE, self.xml_attribute);
        flags.set(PropertyFlags::XML_VALUE, self.xml_value);
        flags.set(PropertyFlags::XML_CDATA, self.xml_cdata);

        let mut property = PropertyMetadata::new(self.name, self.descriptor)
            .with_flags(flags)
            .with_groups(self.groups)
            .with_xml_collection(XmlCollection {
                entry: self.xml_entry.map_or(XmlCollection::DEFAULT.entry, Cow::Owned),
                inline: self.xml_inline,
                key_attribute: self
                    .xml_key_attribute
                    .map_or(XmlCollection::DEFAULT.key_attribute, Cow::Owned),
            });
        match self.required {
            Some(true) => property = property.with_flags(PropertyFlags::REQUIRED),
            Some(false) => property = property.optional(),
            None => {}
        }
        if let Some(name) = self.serialized_name {
            property = property.with_serialized_name(name);
        }
        if let Some(since) = self.since {
            property = property.with_since(since);
        }
        if let Some(until) = self.until {
            property = property.with_until(until);
        }
        property
    }
}

// -----------------------------------------------------------------------------
// Tests
