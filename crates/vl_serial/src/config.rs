//! Declarative serializer configuration.
//!
//! [`SerializerConfig`] mirrors every knob of
//! [`SerializerBuilder`](crate::serializer::SerializerBuilder) as plain data,
//! so applications can keep it in a TOML file:
//!
//! ```toml
//! naming_strategy = "camel_case"
//!
//! [metadata]
//! debug = true
//! drivers = ["toml", "attribute"]
//! cache = { backend = "file", directory = "target/metadata" }
//!
//! [[metadata.directories]]
//! path = "config/serializer"
//! namespace_prefix = "app::model"
//!
//! [visitors.json]
//! pretty = true
//!
//! [handlers.datetime]
//! default_format = "%Y-%m-%d %H:%M:%S"
//! default_timezone = "+01:00"
//! ```
//!
//! Loading the file is up to the caller.

use core::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::visitor::{JsonOptions, XmlOptions};

// -----------------------------------------------------------------------------
// SerializerConfig

/// The whole configuration of a serializer.
///
/// # Examples
///
/// ```
/// use vl_serial::config::{CacheConfig, DriverKind, NamingStrategyKind, SerializerConfig};
///
/// let config = SerializerConfig::from_toml_str(r#"
///     naming_strategy = "identical"
///
///     [metadata]
///     drivers = ["json", "attribute"]
///     cache = { backend = "memory" }
/// "#).unwrap();
///
/// assert_eq!(config.naming_strategy, NamingStrategyKind::Identical);
/// assert_eq!(config.metadata.drivers, [DriverKind::Json, DriverKind::Attribute]);
/// assert_eq!(config.metadata.cache, CacheConfig::Memory);
/// assert_eq!(config.handlers.datetime.default_timezone, "UTC");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerializerConfig {
    pub metadata: MetadataConfig,
    pub naming_strategy: NamingStrategyKind,
    pub property_naming: PropertyNamingConfig,
    pub visitors: VisitorsConfig,
    pub handlers: HandlersConfig,
}

impl SerializerConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|err| Error::configuration(format!("invalid serializer config: {err}")))
    }
}

// -----------------------------------------------------------------------------
// Metadata

/// Where class metadata comes from and where it is kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub cache: CacheConfig,
    /// Re-resolve metadata whose mapping files changed.
    pub debug: bool,
    /// Drivers in the order they are consulted.
    pub drivers: Vec<DriverKind>,
    /// Directories holding mapping files.
    pub directories: Vec<DirectoryConfig>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::None,
            debug: false,
            drivers: DriverKind::DEFAULT_ORDER.to_vec(),
            directories: Vec::new(),
        }
    }
}

/// The second level metadata cache.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CacheConfig {
    /// Only the in-process map of the factory.
    #[default]
    None,
    /// A [`MemoryCache`](crate::metadata::MemoryCache).
    Memory,
    /// A [`FileCache`](crate::metadata::FileCache) in `directory`.
    File { directory: PathBuf },
}

/// A metadata driver of the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// TOML mapping files.
    Toml,
    /// JSON mapping files.
    Json,
    /// `#[derive(Mapped)]` declarations.
    Attribute,
}

impl DriverKind {
    /// Mapping files first, so they override declarations.
    pub const DEFAULT_ORDER: [Self; 3] = [Self::Toml, Self::Json, Self::Attribute];
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Toml => "toml",
            Self::Json => "json",
            Self::Attribute => "attribute",
        })
    }
}

/// A directory of mapping files for the classes under a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    pub path: PathBuf,
    pub namespace_prefix: String,
}

// -----------------------------------------------------------------------------
// Naming

/// The base naming strategy. Explicit serialized names always win.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategyKind {
    /// [`CaseNaming`](crate::naming::CaseNaming) with [`PropertyNamingConfig`].
    #[default]
    CamelCase,
    /// [`IdenticalNaming`](crate::naming::IdenticalNaming).
    Identical,
}

/// Options of the case converting strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropertyNamingConfig {
    pub separator: String,
    pub lowercase: bool,
}

impl Default for PropertyNamingConfig {
    fn default() -> Self {
        Self {
            separator: "_".into(),
            lowercase: true,
        }
    }
}

// -----------------------------------------------------------------------------
// Visitors and handlers

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisitorsConfig {
    pub json: JsonOptions,
    pub xml: XmlOptions,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandlersConfig {
    pub datetime: DateTimeConfig,
}

/// Defaults of the built-in [`DateHandler`](crate::handler::DateHandler).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateTimeConfig {
    /// A `chrono` format string.
    pub default_format: String,
    /// `UTC` or a fixed offset such as `+02:00`.
    pub default_timezone: String,
}

impl Default for DateTimeConfig {
    fn default() -> Self {
        Self {
            default_format: "%Y-%m-%dT%H:%M:%S%:z".into(),
            default_timezone: "UTC".into(),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{CacheConfig, DriverKind, SerializerConfig};
    use crate::Error;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SerializerConfig::from_toml_str("").unwrap();
        assert_eq!(config, SerializerConfig::default());
        assert_eq!(config.metadata.drivers, DriverKind::DEFAULT_ORDER);
        assert_eq!(config.property_naming.separator, "_");
        assert!(config.visitors.xml.format_output);
    }

    #[test]
    fn parses_nested_sections() {
        let config = SerializerConfig::from_toml_str(
            r#"
            [metadata]
            debug = true
            cache = { backend = "file", directory = "/tmp/meta" }

            [[metadata.directories]]
            path = "config/serializer/"
            namespace_prefix = "app::model"

            [property_naming]
            separator = "-"

            [visitors.xml]
            root_name = "response"
            doctype_whitelist = ['html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN"']
            "#,
        )
        .unwrap();

        assert!(config.metadata.debug);
        assert_eq!(
            config.metadata.cache,
            CacheConfig::File {
                directory: PathBuf::from("/tmp/meta")
            }
        );
        assert_eq!(config.metadata.directories[0].namespace_prefix, "app::model");
        assert_eq!(config.property_naming.separator, "-");
        assert!(config.property_naming.lowercase);
        assert_eq!(config.visitors.xml.root_name, "response");
        assert_eq!(config.visitors.xml.doctype_whitelist.len(), 1);
    }

    #[test]
    fn rejects_unknown_keys_and_incomplete_directories() {
        let unknown = SerializerConfig::from_toml_str("[metadata]\nauto_detection = true");
        assert!(matches!(unknown, Err(Error::Configuration(_))));

        let incomplete = SerializerConfig::from_toml_str("[[metadata.directories]]\npath = \"config\"");
        assert!(matches!(incomplete, Err(Error::Configuration(_))));

        let bad_backend = SerializerConfig::from_toml_str("[metadata]\ncache = { backend = \"redis\" }");
        assert!(bad_backend.is_err());
    }
}
