use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;
use std::{env, fs};

use toml_edit::{Document, Item, Table};

/// Locate an accessible [`syn::Path`] for another crate as seen from the
/// caller's Cargo.toml.
///
/// Generated code must name `vl_serial` by a path that is valid from the
/// crate invoking the derive, which may depend on `vl_serial` directly or
/// only on the `vellum` umbrella crate.
///
/// # Example
///
/// ```rust
/// # use vl_macro_utils::Manifest;
/// let p: syn::Path = Manifest::shared(|m| m.get_crate_path("vl_serial"));
/// ```
///
/// Reading the manifest is not cheap, callers should resolve a path once per
/// macro invocation and pass it around.
///
/// # Resolution rules
///
/// 1. If the requested crate is listed in `dependencies`, return `::crate_name`.
/// 2. If the requested crate name begins with `vl_` and the target crate depends
///    on the umbrella crate `vellum`, return `::vellum::short_name`
///    (e.g. `vl_serial` -> `::vellum::serial`).
/// 3. Repeat step 1-2 in `dev-dependencies`.
/// 4. Otherwise, fall back to the absolute path `::crate_name`.
///
/// ## Note
/// A crate that derives on its own types should add
/// `extern crate self as vl_serial;` so that `::vl_serial` resolves.
#[derive(Debug)]
pub struct Manifest {
    pub manifest: Document<Box<str>>,
    pub modified_time: SystemTime,
}

const UMBRELLA_NAME: &str = "vellum";
const CRATE_PREFIX: &str = "vl_";

impl Manifest {
    /// The caller's `Cargo.toml` and its modification time.
    ///
    /// Proc-macros always run under cargo, a missing manifest is a broken
    /// build environment.
    #[inline(never)]
    fn locate() -> (PathBuf, SystemTime) {
        let Some(dir) = env::var_os("CARGO_MANIFEST_DIR") else {
            panic!("`CARGO_MANIFEST_DIR` is not set, proc-macros must run under cargo");
        };
        let path = Path::new(&dir).join("Cargo.toml");
        let modified = fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .unwrap_or_else(|err| panic!("cannot stat `{}`: {err}", path.display()));
        (path, modified)
    }

    #[inline(never)]
    fn load(path: &Path, modified_time: SystemTime) -> Self {
        let source = fs::read_to_string(path)
            .unwrap_or_else(|err| panic!("cannot read `{}`: {err}", path.display()));
        let manifest = Document::parse(source.into_boxed_str())
            .unwrap_or_else(|err| panic!("cannot parse `{}`: {err}", path.display()));
        Self {
            manifest,
            modified_time,
        }
    }

    #[inline]
    fn parse_path(path: &str) -> syn::Path {
        syn::parse_str(path)
            .unwrap_or_else(|_| panic!("`{path}` is not a valid crate path"))
    }

    fn find_in_deps(deps: &Table, name: &str) -> Option<syn::Path> {
        if deps.contains_key(name) {
            return Some(Self::parse_path(&format!("::{name}")));
        }

        let module = name.strip_prefix(CRATE_PREFIX)?;
        if deps.contains_key(UMBRELLA_NAME) {
            return Some(Self::parse_path(&format!("::{UMBRELLA_NAME}::{module}")));
        }
        None
    }

    /// Return a [`syn::Path`] for the package named `name` as resolved from this
    /// crate's Cargo.toml. See the top-level documentation for the resolution
    /// order.
    #[inline(never)]
    pub fn get_crate_path(&self, name: &str) -> syn::Path {
        for table in ["dependencies", "dev-dependencies"] {
            if let Some(Item::Table(deps)) = self.manifest.get(table)
                && let Some(val) = Self::find_in_deps(deps, name)
            {
                return val;
            }
        }

        Self::parse_path(&format!("::{name}"))
    }

    /// Obtain the [Manifest] of the caller's Cargo.toml.
    ///
    /// Manifests are cached per path and re-read when the file's modification
    /// time changes.
    pub fn shared<R>(func: impl FnOnce(&Self) -> R) -> R {
        static CACHE: RwLock<BTreeMap<PathBuf, Manifest>> = RwLock::new(BTreeMap::new());

        let (path, modified) = Self::locate();
        {
            let cache = CACHE.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(manifest) = cache.get(&path).filter(|m| m.modified_time == modified) {
                return func(manifest);
            }
        }

        let manifest = Self::load(&path, modified);
        let result = func(&manifest);
        CACHE
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, manifest);
        result
    }
}

// -----------------------------------------------------------------------------
// Tests
