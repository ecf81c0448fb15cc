use core::any::type_name;
use core::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use vl_utils::hash::HashMap;

use crate::Error;
use crate::data::Describe;
use crate::info::{ClassId, ClassMetadata};

// -----------------------------------------------------------------------------
// ClassEntry

/// A registered class: its id, Rust type name and mapping table.
#[derive(Clone, Copy)]
pub struct ClassEntry {
    class: &'static str,
    type_name: &'static str,
    describe: fn() -> Result<ClassMetadata, Error>,
}

impl ClassEntry {
    /// Creates the entry of `T`.
    #[inline]
    pub fn of<T: Describe>() -> Self {
        Self {
            class: T::CLASS,
            type_name: type_name::<T>(),
            describe: T::describe,
        }
    }

    #[inline]
    pub fn class(&self) -> ClassId {
        ClassId::from_static(self.class)
    }

    /// The Rust type the class was derived on.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Builds the metadata from the declarative table.
    #[inline]
    pub fn describe(&self) -> Result<ClassMetadata, Error> {
        (self.describe)()
    }
}

impl fmt::Debug for ClassEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassEntry")
            .field("class", &self.class)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ClassCatalog

/// The classes known to the [`AttributeDriver`](crate::metadata::AttributeDriver).
///
/// [Registering](ClassCatalog::register) a class also registers every class
/// its fields refer to.
///
/// # Examples
///
/// ```
/// use vl_serial::derive::Mapped;
/// use vl_serial::data::Describe;
/// use vl_serial::metadata::ClassCatalog;
///
/// #[derive(Mapped)]
/// struct Address { city: String }
///
/// #[derive(Mapped)]
/// struct User { name: String, address: Option<Address> }
///
/// let mut catalog = ClassCatalog::new();
/// catalog.register::<User>();
///
/// assert!(catalog.contains(User::CLASS));
/// assert!(catalog.contains(Address::CLASS));
/// assert_eq!(catalog.len(), 2);
/// ```
#[derive(Default, Debug)]
pub struct ClassCatalog {
    entries: HashMap<ClassId, ClassEntry>,
}

impl ClassCatalog {
    /// Creates an empty catalog.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` if it is not registered yet, then its dependencies.
    ///
    /// Returns `false` if the class id was already taken, in which case
    /// neither `T` nor its dependencies are registered again.
    pub fn register<T: Describe>(&mut self) -> bool {
        let class = T::class();
        if self.entries.contains_key(&class) {
            return false;
        }
        self.entries.insert(class, ClassEntry::of::<T>());
        T::register_dependencies(self);
        true
    }

    /// Inserts or overwrites an entry without touching dependencies.
    #[inline]
    pub fn insert(&mut self, entry: ClassEntry) -> Option<ClassEntry> {
        self.entries.insert(entry.class(), entry)
    }

    #[inline]
    pub fn contains(&self, class: &str) -> bool {
        self.entries.contains_key(class)
    }

    #[inline]
    pub fn get(&self, class: &str) -> Option<&ClassEntry> {
        self.entries.get(class)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the registered entries, in no particular order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &ClassEntry> {
        self.entries.values()
    }

    /// Registers every type declared with `#[serial(auto_register)]`.
    ///
    /// Repeated calls are cheap and will not insert duplicates. Returns the
    /// number of newly registered classes.
    ///
    /// ## Feature Dependency
    ///
    /// Requires the `auto_register` feature, without it this is a no-op.
    ///
    /// # Examples
    ///
    /// ```
    /// use vl_serial::derive::Mapped;
    /// use vl_serial::data::Describe;
    /// use vl_serial::metadata::ClassCatalog;
    ///
    /// #[derive(Mapped)]
    /// #[serial(auto_register)]
    /// struct Tag { label: String }
    ///
    /// let mut catalog = ClassCatalog::new();
    /// catalog.auto_register();
    /// assert!(catalog.contains(Tag::CLASS));
    /// ```
    pub fn auto_register(&mut self) -> usize {
        let before = self.len();
        #[cfg(feature = "auto_register")]
        for registration in inventory::iter::<AutoRegistration> {
            (registration.0)(self);
        }
        self.len() - before
    }
}

// -----------------------------------------------------------------------------
// AutoRegistration

/// A static registration collected by `inventory`.
#[cfg(feature = "auto_register")]
pub struct AutoRegistration(pub fn(&mut ClassCatalog));

#[cfg(feature = "auto_register")]
inventory::collect!(AutoRegistration);

// -----------------------------------------------------------------------------
// ClassCatalogArc

/// A thread-safe shared [`ClassCatalog`].
#[derive(Clone, Default, Debug)]
pub struct ClassCatalogArc {
    /// The wrapped [`ClassCatalog`].
    pub internal: Arc<RwLock<ClassCatalog>>,
}

impl ClassCatalogArc {
    #[inline]
    pub fn new(catalog: ClassCatalog) -> Self {
        Self {
            internal: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Takes a read lock on the underlying [`ClassCatalog`].
    pub fn read(&self) -> RwLockReadGuard<'_, ClassCatalog> {
        self.internal.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a write lock on the underlying [`ClassCatalog`].
    pub fn write(&self) -> RwLockWriteGuard<'_, ClassCatalog> {
        self.internal.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// -----------------------------------------------------------------------------
// Tests
