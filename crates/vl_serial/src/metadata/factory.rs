use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use vl_utils::hash::{HashMap, HashSet, fingerprint};

use crate::Error;
use crate::info::{ClassId, ClassMetadata, TypeDescriptor};
use crate::metadata::{MetadataCache, MetadataDriver};
use crate::naming::NamingStrategy;

// -----------------------------------------------------------------------------
// MetadataFactory

/// Resolves and caches class metadata.
///
/// Resolution is lazy: the first request for a class asks the driver, applies
/// the naming strategy and validates the result. Later requests are served
/// from an in-process map and, behind it, an optional [`MetadataCache`].
///
/// Concurrent requests for the same unresolved class resolve it once; the
/// other callers wait and share the result.
///
/// Cache keys have the form `{class}@{fingerprint:016x}`, where the
/// fingerprint covers the driver chain, the naming strategy and the
/// compiled-in table of the class, if any.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use vl_serial::derive::Mapped;
/// use vl_serial::data::Describe;
/// use vl_serial::metadata::{AttributeDriver, ClassCatalogArc, MetadataFactory};
/// use vl_serial::naming::CaseNaming;
///
/// #[derive(Mapped)]
/// struct User { firstName: String }
///
/// let catalog = ClassCatalogArc::default();
/// catalog.write().register::<User>();
///
/// let factory = MetadataFactory::new(AttributeDriver::new(catalog), Arc::new(CaseNaming::default()));
/// let metadata = factory.metadata_for(&User::class()).unwrap();
/// assert_eq!(metadata.properties()[0].serialized_name(), "first_name");
///
/// let again = factory.metadata_for(&User::class()).unwrap();
/// assert!(Arc::ptr_eq(&metadata, &again));
/// assert_eq!(factory.resolution_count(), 1);
/// ```
pub struct MetadataFactory {
    driver: Box<dyn MetadataDriver>,
    naming: Arc<dyn NamingStrategy>,
    cache: Option<Arc<dyn MetadataCache>>,
    fingerprint: u64,
    debug: bool,
    loaded: RwLock<HashMap<ClassId, Arc<ClassMetadata>>>,
    in_flight: Mutex<HashMap<ClassId, Arc<Mutex<()>>>>,
    resolutions: AtomicUsize,
}

impl MetadataFactory {
    /// Creates a factory resolving through `driver` with `naming`.
    pub fn new(driver: impl MetadataDriver + 'static, naming: Arc<dyn NamingStrategy>) -> Self {
        Self::from_boxed(Box::new(driver), naming)
    }

    /// Creates a factory from a boxed driver.
    pub fn from_boxed(driver: Box<dyn MetadataDriver>, naming: Arc<dyn NamingStrategy>) -> Self {
        let fingerprint = fingerprint(|state| {
            driver.fingerprint(state);
            naming.fingerprint(state);
        });
        Self {
            driver,
            naming,
            cache: None,
            fingerprint,
            debug: false,
            loaded: RwLock::default(),
            in_flight: Mutex::default(),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Adds a second level cache backend.
    #[inline]
    pub fn with_cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// In debug mode, entries whose mapping files changed are resolved again.
    #[inline]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The fingerprint of the driver chain and naming strategy.
    #[inline]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// The key `class` is stored under in the cache backend.
    pub fn cache_key(&self, class: &ClassId) -> String {
        let key = fingerprint(|state| {
            state.write_u64(self.fingerprint);
            self.driver.class_fingerprint(class, state);
        });
        format!("{class}@{key:016x}")
    }

    #[inline]
    pub fn naming(&self) -> &dyn NamingStrategy {
        &*self.naming
    }

    /// How many times a driver was asked to describe a class.
    #[inline]
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Returns the metadata of `class`, resolving it on first use.
    ///
    /// Failures are not cached; the next call tries again.
    pub fn metadata_for(&self, class: &ClassId) -> Result<Arc<ClassMetadata>, Error> {
        if let Some(metadata) = self.lookup_loaded(class) {
            return Ok(metadata);
        }

        let gate = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            in_flight.entry(class.clone()).or_default().clone()
        };
        let result = {
            let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.resolve_gated(class)
        };
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(class).is_some_and(|current| Arc::ptr_eq(current, &gate)) {
            in_flight.remove(class);
        }
        result
    }

    /// Resolves every class in `classes` ahead of time.
    pub fn warm_up<'a>(&self, classes: impl IntoIterator<Item = &'a ClassId>) -> Result<(), Error> {
        for class in classes {
            self.metadata_for(class)?;
        }
        Ok(())
    }

    /// Drops `class` from both cache levels.
    pub fn evict(&self, class: &ClassId) {
        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(class);
        if let Some(cache) = &self.cache {
            cache.evict(&self.cache_key(class));
        }
    }

    /// Drops every entry from both cache levels.
    pub fn clear(&self) {
        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    fn lookup_loaded(&self, class: &ClassId) -> Option<Arc<ClassMetadata>> {
        let metadata = self
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class)
            .cloned()?;
        if self.debug && !metadata.is_fresh() {
            log::debug!("metadata of `{class}` is stale");
            self.evict(class);
            return None;
        }
        Some(metadata)
    }

    fn resolve_gated(&self, class: &ClassId) -> Result<Arc<ClassMetadata>, Error> {
        if let Some(metadata) = self.lookup_loaded(class) {
            return Ok(metadata);
        }

        let key = self.cache_key(class);
        let cached = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get(&key))
            .filter(|metadata| !self.debug || metadata.is_fresh());

        let metadata = match cached {
            Some(metadata) => {
                log::trace!("metadata of `{class}` served from the cache backend");
                metadata
            }
            None => {
                let metadata = self.resolve(class)?;
                if let Some(cache) = &self.cache {
                    cache.put(&key, &metadata);
                }
                metadata
            }
        };

        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class.clone(), metadata.clone());
        Ok(metadata)
    }

    fn resolve(&self, class: &ClassId) -> Result<Arc<ClassMetadata>, Error> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        log::debug!("resolving metadata of `{class}`");

        let metadata = self.describe(class)?;
        let mut keys = HashSet::default();
        if let Some(discriminator) = metadata.discriminator() {
            keys.insert(discriminator.field().to_owned());
        }
        self.collect_keys(&metadata, &mut vec![class.clone()], &mut keys)?;
        Ok(Arc::new(metadata))
    }

    /// Loads `class` from the driver and applies the naming strategy.
    fn describe(&self, class: &ClassId) -> Result<ClassMetadata, Error> {
        let Some(mut metadata) = self.driver.load_metadata(class)? else {
            return Err(Error::MetadataNotFound(class.clone()));
        };
        if metadata.class() != class {
            return Err(Error::configuration(format!(
                "driver {} returned metadata of `{}` for `{class}`",
                self.driver.name(),
                metadata.class()
            )));
        }
        metadata.apply_naming(&*self.naming)?;
        Ok(metadata)
    }

    /// Collects the keys an object of `chain[0]` is written with, following
    /// inline properties into their classes.
    fn collect_keys(
        &self,
        metadata: &ClassMetadata,
        chain: &mut Vec<ClassId>,
        keys: &mut HashSet<String>,
    ) -> Result<(), Error> {
        for property in metadata.properties() {
            if property.is_skipped() {
                continue;
            }
            if !property.is_inline() {
                if !keys.insert(property.serialized_name().to_owned()) {
                    return Err(Error::configuration(format!(
                        "class `{}` writes `{}` more than once through its inline properties",
                        chain[0],
                        property.serialized_name()
                    )));
                }
                continue;
            }

            let TypeDescriptor::Object(nested) = property.descriptor().non_optional() else {
                return Err(Error::configuration(format!(
                    "inline property `{}` of `{}` is not an object",
                    property.name(),
                    metadata.class()
                )));
            };
            if chain.contains(nested) {
                return Err(Error::configuration(format!(
                    "inline property `{}` of `{}` inlines `{nested}` into itself",
                    property.name(),
                    metadata.class()
                )));
            }
            let nested_metadata = match self.lookup_loaded(nested) {
                Some(loaded) => loaded,
                None => Arc::new(self.describe(nested)?),
            };
            chain.push(nested.clone());
            self.collect_keys(&nested_metadata, chain, keys)?;
            chain.pop();
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use core::hash::Hasher;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use core::time::Duration;
    use std::sync::{Arc, Mutex, OnceLock, Weak};
    use std::{fs, thread};

    use super::MetadataFactory;
    use crate::Error;
    use crate::info::{ClassId, ClassMetadata, Primitive, PropertyFlags, PropertyMetadata, TypeDescriptor};
    use crate::metadata::{FileDriver, FileLocator, MappingFormat, MemoryCache, MetadataCache, MetadataDriver};
    use crate::naming::{CaseNaming, IdenticalNaming};

    /// Describes `app::*` classes with one `userName` property, slowly.
    #[derive(Default)]
    struct SlowDriver {
        calls: AtomicUsize,
    }

    impl MetadataDriver for SlowDriver {
        fn name(&self) -> &str {
            "slow"
        }

        fn load_metadata(&self, class: &ClassId) -> Result<Option<ClassMetadata>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            if !class.as_str().starts_with("app::") {
                return Ok(None);
            }
            Ok(Some(ClassMetadata::new(class.clone()).with_property(
                PropertyMetadata::new("userName", TypeDescriptor::Primitive(Primitive::String)),
            )))
        }

        fn fingerprint(&self, state: &mut dyn Hasher) {
            state.write(b"slow");
        }
    }

    fn user() -> ClassId {
        ClassId::from_static("app::User")
    }

    #[test]
    fn concurrent_requests_resolve_once() {
        let factory = MetadataFactory::new(SlowDriver::default(), Arc::new(CaseNaming::default()));

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| factory.metadata_for(&user()).unwrap()))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(factory.resolution_count(), 1);
        assert!(results.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(results[0].properties()[0].serialized_name(), "user_name");
    }

    #[test]
    fn unknown_classes_are_not_cached() {
        let factory = MetadataFactory::new(SlowDriver::default(), Arc::new(IdenticalNaming));
        let missing = ClassId::from_static("lib::Missing");

        assert!(matches!(factory.metadata_for(&missing), Err(Error::MetadataNotFound(_))));
        assert!(factory.metadata_for(&missing).is_err());
        assert_eq!(factory.resolution_count(), 2);
    }

    #[test]
    fn evict_forces_resolution() {
        let factory = MetadataFactory::new(SlowDriver::default(), Arc::new(IdenticalNaming));
        factory.warm_up([&user()]).unwrap();
        factory.metadata_for(&user()).unwrap();
        assert_eq!(factory.resolution_count(), 1);

        factory.evict(&user());
        factory.metadata_for(&user()).unwrap();
        assert_eq!(factory.resolution_count(), 2);

        factory.clear();
        factory.metadata_for(&user()).unwrap();
        assert_eq!(factory.resolution_count(), 3);
    }

    #[test]
    fn cache_keys_follow_configuration() {
        let snake = MetadataFactory::new(SlowDriver::default(), Arc::new(CaseNaming::default()));
        let same = MetadataFactory::new(SlowDriver::default(), Arc::new(CaseNaming::default()));
        let identical = MetadataFactory::new(SlowDriver::default(), Arc::new(IdenticalNaming));

        assert_eq!(snake.cache_key(&user()), same.cache_key(&user()));
        assert_ne!(snake.cache_key(&user()), identical.cache_key(&user()));
        assert!(snake.cache_key(&user()).starts_with("app::User@"));
    }

    #[test]
    fn backend_is_shared_between_factories() {
        let backend = Arc::new(MemoryCache::new());
        let first = MetadataFactory::new(SlowDriver::default(), Arc::new(CaseNaming::default()))
            .with_cache(backend.clone());
        let second = MetadataFactory::new(SlowDriver::default(), Arc::new(CaseNaming::default()))
            .with_cache(backend.clone());
        let other = MetadataFactory::new(SlowDriver::default(), Arc::new(IdenticalNaming))
            .with_cache(backend.clone());

        first.metadata_for(&user()).unwrap();
        second.metadata_for(&user()).unwrap();
        assert_eq!(second.resolution_count(), 0);

        let metadata = other.metadata_for(&user()).unwrap();
        assert_eq!(other.resolution_count(), 1);
        assert_eq!(metadata.properties()[0].serialized_name(), "userName");
        assert_eq!(backend.len(), 2);

        second.evict(&user());
        assert!(backend.get(&first.cache_key(&user())).is_none());
    }

    #[test]
    fn debug_mode_reloads_changed_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("User.toml");
        fs::write(&file, "[[properties]]\nname = 'id'\ntype = 'u64'\n").unwrap();

        let locator = Arc::new(FileLocator::new([("app", dir.path())]).unwrap());
        let factory = MetadataFactory::new(
            FileDriver::new(locator, MappingFormat::Toml),
            Arc::new(IdenticalNaming),
        )
        .with_debug(true);

        assert_eq!(factory.metadata_for(&user()).unwrap().properties().len(), 1);

        thread::sleep(Duration::from_millis(20));
        fs::write(
            &file,
            "[[properties]]\nname = 'id'\ntype = 'u64'\n[[properties]]\nname = 'name'\ntype = 'string'\n",
        )
        .unwrap();

        assert_eq!(factory.metadata_for(&user()).unwrap().properties().len(), 2);
        assert_eq!(factory.resolution_count(), 2);
    }

    #[test]
    fn duplicate_names_after_naming_fail() {
        struct Clashing;

        impl MetadataDriver for Clashing {
            fn name(&self) -> &str {
                "clashing"
            }

            fn load_metadata(&self, class: &ClassId) -> Result<Option<ClassMetadata>, Error> {
                let string = || TypeDescriptor::Primitive(Primitive::String);
                Ok(Some(
                    ClassMetadata::new(class.clone())
                        .with_property(PropertyMetadata::new("userName", string()))
                        .with_property(PropertyMetadata::new("user_name", string())),
                ))
            }

            fn fingerprint(&self, _state: &mut dyn Hasher) {}
        }

        let identical = MetadataFactory::new(Clashing, Arc::new(IdenticalNaming));
        assert!(identical.metadata_for(&user()).is_ok());

        let snake = MetadataFactory::new(Clashing, Arc::new(CaseNaming::default()));
        assert!(matches!(snake.metadata_for(&user()), Err(Error::Configuration(_))));
    }

    /// Hands the class's in-flight slot to a later caller while resolving.
    struct Overtaken {
        factory: Arc<OnceLock<Weak<MetadataFactory>>>,
        later: Arc<Mutex<()>>,
    }

    impl MetadataDriver for Overtaken {
        fn name(&self) -> &str {
            "overtaken"
        }

        fn load_metadata(&self, class: &ClassId) -> Result<Option<ClassMetadata>, Error> {
            if let Some(factory) = self.factory.get().and_then(Weak::upgrade) {
                factory
                    .in_flight
                    .lock()
                    .unwrap()
                    .insert(class.clone(), self.later.clone());
            }
            Ok(Some(ClassMetadata::new(class.clone())))
        }

        fn fingerprint(&self, _state: &mut dyn Hasher) {}
    }

    #[test]
    fn gates_of_later_callers_are_kept() {
        let slot = Arc::new(OnceLock::new());
        let later = Arc::new(Mutex::new(()));
        let driver = Overtaken {
            factory: slot.clone(),
            later: later.clone(),
        };
        let factory = Arc::new(MetadataFactory::new(driver, Arc::new(IdenticalNaming)));
        slot.set(Arc::downgrade(&factory)).unwrap();

        factory.metadata_for(&user()).unwrap();
        let in_flight = factory.in_flight.lock().unwrap();
        assert!(in_flight.get(&user()).is_some_and(|gate| Arc::ptr_eq(gate, &later)));
    }

    #[test]
    fn inline_keys_join_the_parent() {
        struct Nested;

        impl MetadataDriver for Nested {
            fn name(&self) -> &str {
                "nested"
            }

            fn load_metadata(&self, class: &ClassId) -> Result<Option<ClassMetadata>, Error> {
                let string = || TypeDescriptor::Primitive(Primitive::String);
                let inner = || ClassId::from_static("app::Audit");
                let metadata = match class.as_str() {
                    "app::Audit" => {
                        ClassMetadata::new(inner()).with_property(PropertyMetadata::new("createdBy", string()))
                    }
                    "app::Page" => ClassMetadata::new(class.clone())
                        .with_property(PropertyMetadata::new("title", string()))
                        .with_property(
                            PropertyMetadata::new("audit", TypeDescriptor::Object(inner()))
                                .with_flags(PropertyFlags::INLINE),
                        ),
                    "app::Clash" => ClassMetadata::new(class.clone())
                        .with_property(PropertyMetadata::new("created_by", string()))
                        .with_property(
                            PropertyMetadata::new("audit", TypeDescriptor::optional(TypeDescriptor::Object(inner())))
                                .with_flags(PropertyFlags::INLINE),
                        ),
                    "app::Loop" => ClassMetadata::new(class.clone()).with_property(
                        PropertyMetadata::new("again", TypeDescriptor::Object(class.clone()))
                            .with_flags(PropertyFlags::INLINE),
                    ),
                    _ => return Ok(None),
                };
                Ok(Some(metadata))
            }

            fn fingerprint(&self, _state: &mut dyn Hasher) {}
        }

        let factory = MetadataFactory::new(Nested, Arc::new(CaseNaming::default()));
        assert!(factory.metadata_for(&ClassId::from_static("app::Page")).is_ok());
        assert!(matches!(
            factory.metadata_for(&ClassId::from_static("app::Clash")),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            factory.metadata_for(&ClassId::from_static("app::Loop")),
            Err(Error::Configuration(_))
        ));

        let identical = MetadataFactory::new(Nested, Arc::new(IdenticalNaming));
        assert!(identical.metadata_for(&ClassId::from_static("app::Clash")).is_ok());
    }
}
