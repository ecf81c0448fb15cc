use core::hash::Hasher;
use std::path::{Path, PathBuf};

use crate::Error;
use crate::info::ClassId;

// -----------------------------------------------------------------------------
// FileLocator

/// Finds mapping files for classes.
///
/// Each directory is registered under a namespace prefix. The file of a
/// class is named after the class id with the prefix removed and `::`
/// replaced by `.`:
///
/// | prefix | class              | file                       |
/// |--------|--------------------|----------------------------|
/// | `app`  | `app::model::User` | `<dir>/model.User.toml`    |
/// | (none) | `app::model::User` | `<dir>/app.model.User.toml`|
///
/// Directories are searched in registration order.
///
/// # Examples
///
/// ```
/// use vl_serial::info::ClassId;
/// use vl_serial::metadata::FileLocator;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("model.User.toml"), "").unwrap();
///
/// let locator = FileLocator::new([("app::", dir.path())]).unwrap();
/// let file = locator.find_file(&ClassId::from_static("app::model::User"), "toml");
/// assert_eq!(file, Some(dir.path().join("model.User.toml")));
/// assert_eq!(locator.find_file(&ClassId::from_static("lib::User"), "toml"), None);
/// ```
#[derive(Clone, Debug, Default)]
pub struct FileLocator {
    directories: Vec<(String, PathBuf)>,
}

impl FileLocator {
    /// Creates a locator from `(namespace prefix, directory)` pairs.
    ///
    /// Trailing `::` of prefixes and trailing separators of directories
    /// are trimmed. An empty directory is a configuration error.
    pub fn new<P, D>(directories: impl IntoIterator<Item = (P, D)>) -> Result<Self, Error>
    where
        P: AsRef<str>,
        D: AsRef<Path>,
    {
        let mut locator = Self::default();
        for (prefix, dir) in directories {
            locator.add_directory(prefix.as_ref(), dir.as_ref())?;
        }
        Ok(locator)
    }

    /// Registers one more directory with the lowest priority.
    pub fn add_directory(&mut self, prefix: &str, dir: &Path) -> Result<(), Error> {
        let text = dir.to_string_lossy();
        let trimmed = text.trim_end_matches(['/', '\\']);
        if trimmed.is_empty() && !text.starts_with('/') {
            return Err(Error::configuration(format!(
                "metadata directory for prefix `{prefix}` must not be empty"
            )));
        }
        let dir = if trimmed.is_empty() { "/" } else { trimmed };
        let prefix = prefix.trim().trim_end_matches(ClassId::SEPARATOR);
        self.directories.push((prefix.to_owned(), PathBuf::from(dir)));
        Ok(())
    }

    /// The registered `(prefix, directory)` pairs.
    #[inline]
    pub fn directories(&self) -> &[(String, PathBuf)] {
        &self.directories
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// Returns the first existing file for `class` with `extension`.
    pub fn find_file(&self, class: &ClassId, extension: &str) -> Option<PathBuf> {
        let id = class.as_str();
        self.directories.iter().find_map(|(prefix, dir)| {
            let relative = if prefix.is_empty() {
                id
            } else {
                id.strip_prefix(prefix.as_str())?
                    .strip_prefix(ClassId::SEPARATOR)?
            };
            let file = dir.join(format!("{}.{extension}", relative.replace(ClassId::SEPARATOR, ".")));
            file.is_file().then_some(file)
        })
    }

    pub(crate) fn fingerprint(&self, state: &mut dyn Hasher) {
        for (prefix, dir) in &self.directories {
            state.write(prefix.as_bytes());
            state.write(dir.as_os_str().as_encoded_bytes());
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::FileLocator;
    use crate::info::ClassId;

    #[test]
    fn trims_prefixes_and_directories() {
        let locator = FileLocator::new([("app::", "/etc/mappings/"), ("", "rel\\")]).unwrap();
        assert_eq!(locator.directories()[0].0, "app");
        assert_eq!(locator.directories()[0].1, Path::new("/etc/mappings"));
        assert_eq!(locator.directories()[1].1, Path::new("rel"));
        assert!(FileLocator::new([("app", "")]).is_err());
    }

    #[test]
    fn prefix_must_match_a_whole_segment() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("User.toml"), "").unwrap();
        fs::write(dir.path().join("app.User.json"), "").unwrap();

        let scoped = FileLocator::new([("app", dir.path())]).unwrap();
        assert!(scoped.find_file(&ClassId::from_static("app::User"), "toml").is_some());
        assert!(scoped.find_file(&ClassId::from_static("apple::User"), "toml").is_none());
        assert!(scoped.find_file(&ClassId::from_static("app::User"), "json").is_none());

        let global = FileLocator::new([("", dir.path())]).unwrap();
        assert_eq!(
            global.find_file(&ClassId::from_static("app::User"), "json"),
            Some(dir.path().join("app.User.json"))
        );
    }

    #[test]
    fn earlier_directories_win() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("User.toml"), "").unwrap();
        fs::write(second.path().join("User.toml"), "").unwrap();

        let locator = FileLocator::new([("app", first.path()), ("app", second.path())]).unwrap();
        assert_eq!(
            locator.find_file(&ClassId::from_static("app::User"), "toml"),
            Some(first.path().join("User.toml"))
        );
    }
}
