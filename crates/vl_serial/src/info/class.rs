use core::hash::Hasher;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use vl_utils::hash::HashSet;

use crate::Error;
use crate::info::{ClassId, Primitive, PropertyMetadata, TypeDescriptor};
use crate::naming::NamingStrategy;

// -----------------------------------------------------------------------------
// Discriminator

/// Polymorphic mapping of a base class: a type field and its tag table.
///
/// # Examples
///
/// ```
/// use vl_serial::info::{ClassId, Discriminator};
///
/// let disc = Discriminator::new("type")
///     .with_class("circle", ClassId::from_static("app::Circle"))
///     .with_class("square", ClassId::from_static("app::Square"));
///
/// assert_eq!(disc.tag_of(&ClassId::from_static("app::Square")), Some("square"));
/// assert_eq!(disc.class_of("circle").map(|c| c.as_str()), Some("app::Circle"));
/// assert_eq!(disc.class_of("triangle"), None);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    field: String,
    map: Vec<(String, ClassId)>,
    property: PropertyMetadata,
}

impl Discriminator {
    /// Creates a discriminator stored in `field`.
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        let property = PropertyMetadata::new(field.clone(), TypeDescriptor::Primitive(Primitive::String));
        Self {
            field,
            map: Vec::new(),
            property,
        }
    }

    /// Maps `tag` to `class`.
    pub fn with_class(mut self, tag: impl Into<String>, class: ClassId) -> Self {
        self.map.push((tag.into(), class));
        self
    }

    /// The serialized name of the type field.
    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Tag and class pairs in declaration order.
    #[inline]
    pub fn map(&self) -> &[(String, ClassId)] {
        &self.map
    }

    /// A string property standing for the type field, used by visitors.
    #[inline]
    pub fn property(&self) -> &PropertyMetadata {
        &self.property
    }

    pub fn tag_of(&self, class: &ClassId) -> Option<&str> {
        self.map
            .iter()
            .find(|(_, candidate)| candidate == class)
            .map(|(tag, _)| tag.as_str())
    }

    pub fn class_of(&self, tag: &str) -> Option<&ClassId> {
        self.map
            .iter()
            .find(|(candidate, _)| candidate == tag)
            .map(|(_, class)| class)
    }
}

// -----------------------------------------------------------------------------
// XmlNamespace

/// A namespace declared on the XML element of a class.
///
/// An empty `prefix` declares the default namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlNamespace {
    pub prefix: String,
    pub uri: String,
}

impl XmlNamespace {
    /// The attribute declaring this namespace, `xmlns` or `xmlns:prefix`.
    pub fn attribute_name(&self) -> String {
        if self.prefix.is_empty() {
            "xmlns".into()
        } else {
            format!("xmlns:{}", self.prefix)
        }
    }
}

// -----------------------------------------------------------------------------
// ClassMetadata

/// The resolved mapping of a class.
///
/// Once a [`MetadataFactory`](crate::metadata::MetadataFactory) caches it,
/// a `ClassMetadata` is shared behind an `Arc` and never mutated.
///
/// # Examples
///
/// ```
/// use vl_serial::info::{ClassId, ClassMetadata, PropertyMetadata, Primitive, TypeDescriptor};
///
/// let metadata = ClassMetadata::new(ClassId::from_static("app::User"))
///     .with_property(PropertyMetadata::new("id", TypeDescriptor::Primitive(Primitive::U64)))
///     .with_xml_root("user");
///
/// assert_eq!(metadata.property("id").unwrap().serialized_name(), "id");
/// assert_eq!(metadata.xml_root_name(), Some("user"));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassMetadata {
    class: ClassId,
    properties: Vec<PropertyMetadata>,
    discriminator: Option<Discriminator>,
    xml_root_name: Option<String>,
    xml_namespaces: Vec<XmlNamespace>,
    resources: Vec<PathBuf>,
    created_at: u128,
}

impl ClassMetadata {
    /// Creates an empty description of `class`.
    pub fn new(class: ClassId) -> Self {
        Self {
            class,
            properties: Vec::new(),
            discriminator: None,
            xml_root_name: None,
            xml_namespaces: Vec::new(),
            resources: Vec::new(),
            created_at: now_millis(),
        }
    }

    /// Appends a property; declaration order is serialization order.
    #[inline]
    pub fn with_property(mut self, property: PropertyMetadata) -> Self {
        self.properties.push(property);
        self
    }

    #[inline]
    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    /// Sets the name of the XML root element.
    #[inline]
    pub fn with_xml_root(mut self, name: impl Into<String>) -> Self {
        self.xml_root_name = Some(name.into());
        self
    }

    /// Declares an XML namespace on the class element.
    pub fn with_xml_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.xml_namespaces.push(XmlNamespace {
            prefix: prefix.into(),
            uri: uri.into(),
        });
        self
    }

    /// Records a file the metadata was built from.
    #[inline]
    pub fn with_resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.resources.push(path.into());
        self
    }

    #[inline]
    pub fn class(&self) -> &ClassId {
        &self.class
    }

    #[inline]
    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    /// Finds a property by field name.
    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|prop| prop.name() == name)
    }

    #[inline]
    pub fn discriminator(&self) -> Option<&Discriminator> {
        self.discriminator.as_ref()
    }

    #[inline]
    pub fn xml_root_name(&self) -> Option<&str> {
        self.xml_root_name.as_deref()
    }

    #[inline]
    pub fn xml_namespaces(&self) -> &[XmlNamespace] {
        &self.xml_namespaces
    }

    #[inline]
    pub fn resources(&self) -> &[PathBuf] {
        &self.resources
    }

    /// Returns `false` if a resource file changed (or vanished) after this
    /// metadata was built.
    pub fn is_fresh(&self) -> bool {
        self.resources
            .iter()
            .all(|path| modified_millis(path).is_some_and(|modified| modified <= self.created_at))
    }

    /// Writes the mapping into `state`, leaving out when and from which
    /// files it was built.
    pub fn content_fingerprint(&self, state: &mut dyn Hasher) {
        let content = (
            &self.class,
            &self.properties,
            &self.discriminator,
            &self.xml_root_name,
            &self.xml_namespaces,
        );
        match serde_json::to_vec(&content) {
            Ok(bytes) => state.write(&bytes),
            Err(err) => log::warn!("failed to fingerprint metadata of `{}`: {err}", self.class),
        }
    }

    /// Applies `naming` to every property and validates the result.
    ///
    /// Serialized names (and the discriminator field) must be unique among
    /// the properties that are not skipped. Inline properties write the keys
    /// of their own class; the factory checks those.
    pub(crate) fn apply_naming(&mut self, naming: &dyn NamingStrategy) -> Result<(), Error> {
        let mut seen = HashSet::default();
        if let Some(discriminator) = &self.discriminator {
            seen.insert(discriminator.field().to_owned());
        }
        for property in &mut self.properties {
            let key = naming.property_key(property);
            let written = !property.is_skipped() && !property.is_inline();
            if written && !seen.insert(key.clone()) {
                return Err(Error::configuration(format!(
                    "class `{}` maps more than one property to `{key}`",
                    self.class
                )));
            }
            property.set_serialized_name(key);
        }
        Ok(())
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

fn modified_millis(path: &Path) -> Option<u128> {
    let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
    modified
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|elapsed| elapsed.as_millis())
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::ClassMetadata;
    use crate::Error;
    use crate::info::{ClassId, Discriminator, Primitive, PropertyFlags, PropertyMetadata, TypeDescriptor};
    use crate::naming::{CaseNaming, IdenticalNaming};
    use vl_utils::hash::fingerprint;

    fn prop(name: &'static str) -> PropertyMetadata {
        PropertyMetadata::new(name, TypeDescriptor::Primitive(Primitive::String))
    }

    #[test]
    fn naming_is_applied_in_order() {
        let mut metadata = ClassMetadata::new(ClassId::from_static("app::User"))
            .with_property(prop("birthDate"))
            .with_property(prop("id"));
        metadata.apply_naming(&CaseNaming::default()).unwrap();

        let names: Vec<_> = metadata.properties().iter().map(|p| p.serialized_name()).collect();
        assert_eq!(names, ["birth_date", "id"]);
    }

    #[test]
    fn duplicate_serialized_names_are_rejected() {
        let mut metadata = ClassMetadata::new(ClassId::from_static("app::User"))
            .with_property(prop("birthDate"))
            .with_property(prop("birth_date"));
        let err = metadata.apply_naming(&CaseNaming::default()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        // skipped properties never reach the output
        let mut metadata = ClassMetadata::new(ClassId::from_static("app::User"))
            .with_property(prop("birthDate"))
            .with_property(prop("birth_date").with_flags(PropertyFlags::SKIP));
        assert!(metadata.apply_naming(&CaseNaming::default()).is_ok());
    }

    #[test]
    fn discriminator_field_is_reserved() {
        let mut metadata = ClassMetadata::new(ClassId::from_static("app::Shape"))
            .with_property(prop("type"))
            .with_discriminator(Discriminator::new("type"));
        assert!(metadata.apply_naming(&IdenticalNaming).is_err());
    }

    #[test]
    fn content_fingerprint_ignores_build_time() {
        let first = ClassMetadata::new(ClassId::from_static("app::User")).with_property(prop("id"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = ClassMetadata::new(ClassId::from_static("app::User")).with_property(prop("id"));
        let wider = second.clone().with_property(prop("name"));

        let hash = |metadata: &ClassMetadata| fingerprint(|state| metadata.content_fingerprint(state));
        assert_eq!(hash(&first), hash(&second));
        assert_ne!(hash(&first), hash(&wider));
    }

    #[test]
    fn freshness_tracks_resources() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("User.toml");
        std::fs::write(&file, "").unwrap();

        let metadata = ClassMetadata::new(ClassId::from_static("app::User")).with_resource(&file);
        assert!(metadata.is_fresh());

        std::fs::remove_file(&file).unwrap();
        assert!(!metadata.is_fresh());
        assert!(ClassMetadata::new(ClassId::from_static("app::User")).is_fresh());
    }
}
