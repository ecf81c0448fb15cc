use core::fmt;
use core::hash::Hasher;
use std::fs;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::info::{ClassId, ClassMetadata};
use crate::metadata::mapping::ClassMapping;
use crate::metadata::{FileLocator, MetadataDriver};

// -----------------------------------------------------------------------------
// MappingFormat

/// The syntax of mapping files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingFormat {
    Toml,
    Json,
}

impl MappingFormat {
    /// The file extension, without the dot.
    #[inline]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    fn parse(self, text: &str) -> Result<ClassMapping, String> {
        match self {
            Self::Toml => toml::from_str(text).map_err(|err| err.to_string()),
            Self::Json => serde_json::from_str(text).map_err(|err| err.to_string()),
        }
    }
}

impl fmt::Display for MappingFormat {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// -----------------------------------------------------------------------------
// FileDriver

/// Reads mapping files of one format.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use vl_serial::info::ClassId;
/// use vl_serial::metadata::{FileDriver, FileLocator, MappingFormat, MetadataDriver};
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(
///     dir.path().join("User.toml"),
///     "[[properties]]\nname = 'id'\ntype = 'u64'\n",
/// ).unwrap();
///
/// let locator = Arc::new(FileLocator::new([("app", dir.path())]).unwrap());
/// let driver = FileDriver::new(locator, MappingFormat::Toml);
///
/// let metadata = driver.load_metadata(&ClassId::from_static("app::User")).unwrap().unwrap();
/// assert_eq!(metadata.properties().len(), 1);
/// assert!(driver.load_metadata(&ClassId::from_static("app::Admin")).unwrap().is_none());
/// ```
#[derive(Clone, Debug)]
pub struct FileDriver {
    locator: Arc<FileLocator>,
    format: MappingFormat,
}

impl FileDriver {
    #[inline]
    pub fn new(locator: Arc<FileLocator>, format: MappingFormat) -> Self {
        Self { locator, format }
    }

    #[inline]
    pub fn format(&self) -> MappingFormat {
        self.format
    }
}

impl MetadataDriver for FileDriver {
    fn name(&self) -> &str {
        self.format.extension()
    }

    fn load_metadata(&self, class: &ClassId) -> Result<Option<ClassMetadata>, Error> {
        let Some(file) = self.locator.find_file(class, self.format.extension()) else {
            return Ok(None);
        };
        let text = fs::read_to_string(&file)?;
        let mapping = self.format.parse(&text).map_err(|message| {
            Error::configuration(format!("invalid mapping file `{}`: {message}", file.display()))
        })?;
        mapping.into_metadata(class, &file).map(Some)
    }

    fn fingerprint(&self, state: &mut dyn Hasher) {
        state.write(self.format.extension().as_bytes());
        self.locator.fingerprint(state);
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use super::{FileDriver, MappingFormat};
    use crate::Error;
    use crate::info::ClassId;
    use crate::metadata::{FileLocator, MetadataDriver};

    #[test]
    fn json_driver_reads_json_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("model.Tag.json"),
            r#"{ "xml_root_name": "tag", "properties": [{ "name": "label", "type": "string" }] }"#,
        )
        .unwrap();

        let locator = Arc::new(FileLocator::new([("app", dir.path())]).unwrap());
        let driver = FileDriver::new(locator, MappingFormat::Json);
        let metadata = driver
            .load_metadata(&ClassId::from_static("app::model::Tag"))
            .unwrap()
            .unwrap();
        assert_eq!(metadata.xml_root_name(), Some("tag"));
        assert_eq!(metadata.resources()[0], dir.path().join("model.Tag.json"));
    }

    #[test]
    fn malformed_files_are_configuration_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Tag.toml"), "[[properties]\n").unwrap();

        let locator = Arc::new(FileLocator::new([("app", dir.path())]).unwrap());
        let driver = FileDriver::new(locator, MappingFormat::Toml);
        let err = driver.load_metadata(&ClassId::from_static("app::Tag")).unwrap_err();
        assert!(matches!(err, Error::Configuration(message) if message.contains("Tag.toml")));
    }
}
