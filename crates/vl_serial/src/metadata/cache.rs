use core::fmt::Write;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use vl_utils::hash::HashMap;

use crate::info::ClassMetadata;

// -----------------------------------------------------------------------------
// MetadataCache

/// A backend storing resolved metadata by cache key.
///
/// Keys already encode the driver and naming configuration, so a backend
/// may be shared between differently configured factories. Backends never
/// fail: an unreadable entry is a miss.
pub trait MetadataCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<ClassMetadata>>;

    fn put(&self, key: &str, metadata: &Arc<ClassMetadata>);

    fn evict(&self, key: &str);

    fn clear(&self);
}

// -----------------------------------------------------------------------------
// MemoryCache

/// An in-memory backend, shareable between factories.
#[derive(Default, Debug)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Arc<ClassMetadata>>>,
}

impl MemoryCache {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Arc<ClassMetadata>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn put(&self, key: &str, metadata: &Arc<ClassMetadata>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), metadata.clone());
    }

    fn evict(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }

    fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }
}

// -----------------------------------------------------------------------------
// FileCache

/// A backend writing one JSON file per entry into a directory.
///
/// Entries survive process restarts. Writes go through a temporary file
/// and a rename, so readers never observe half written entries.
#[derive(Clone, Debug)]
pub struct FileCache {
    directory: PathBuf,
}

impl FileCache {
    /// Creates a cache in `directory`, which is created on first write.
    #[inline]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Maps a key to a file name. Bytes outside `[A-Za-z0-9.@-]` become
    /// `_xx` hex escapes, so distinct keys never share a file.
    fn path_of(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 8);
        for byte in key.bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'@' => name.push(char::from(byte)),
                _ => {
                    let _ = write!(name, "_{byte:02x}");
                }
            }
        }
        self.directory.join(format!("{name}.json"))
    }

    fn write(&self, path: &Path, metadata: &ClassMetadata) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        let bytes = serde_json::to_vec(metadata)?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, bytes)?;
        fs::rename(&temp, path)
    }
}

impl MetadataCache for FileCache {
    fn get(&self, key: &str) -> Option<Arc<ClassMetadata>> {
        let path = self.path_of(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                log::warn!("failed to read metadata cache `{}`: {err}", path.display());
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Some(Arc::new(metadata)),
            Err(err) => {
                log::warn!("ignoring corrupt metadata cache `{}`: {err}", path.display());
                None
            }
        }
    }

    fn put(&self, key: &str, metadata: &Arc<ClassMetadata>) {
        let path = self.path_of(key);
        if let Err(err) = self.write(&path, metadata) {
            log::warn!("failed to write metadata cache `{}`: {err}", path.display());
        }
    }

    fn evict(&self, key: &str) {
        let path = self.path_of(key);
        match fs::remove_file(&path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                log::warn!("failed to evict metadata cache `{}`: {err}", path.display());
            }
            _ => {}
        }
    }

    fn clear(&self) {
        let Ok(entries) = fs::read_dir(&self.directory) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Err(err) = fs::remove_file(&path)
            {
                log::warn!("failed to clear metadata cache `{}`: {err}", path.display());
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
