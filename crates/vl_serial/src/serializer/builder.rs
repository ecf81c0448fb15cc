use std::path::PathBuf;
use std::sync::Arc;

use crate::Error;
use crate::config::{CacheConfig, DriverKind, NamingStrategyKind, SerializerConfig};
use crate::data::Describe;
use crate::event::EventDispatcher;
use crate::handler::{DateHandler, HandlerRegistry};
use crate::metadata::{
    AttributeDriver, ClassCatalog, ClassCatalogArc, DriverChain, FileCache, FileDriver, FileLocator, MappingFormat,
    MemoryCache, MetadataCache, MetadataDriver, MetadataFactory,
};
use crate::naming::{AnnotatedNaming, CaseNaming, IdenticalNaming, NamingStrategy};
use crate::serializer::Serializer;
use crate::visitor::{JsonOptions, XmlOptions};

// -----------------------------------------------------------------------------
// SerializerBuilder

/// Assembles a [`Serializer`].
///
/// Defaults:
///
/// - naming: explicit names, then `camelCase` to `snake_case`;
/// - drivers: `toml`, `json` (only with metadata directories), `attribute`;
/// - handlers: the [`DateHandler`] in RFC 3339 and UTC;
/// - classes declared with `#[serial(auto_register)]` are registered.
///
/// # Examples
///
/// ```
/// use vl_serial::naming::IdenticalNaming;
/// use vl_serial::serializer::Serializer;
///
/// let serializer = Serializer::builder()
///     .naming_strategy(IdenticalNaming)
///     .debug(true)
///     .build()
///     .unwrap();
/// assert_eq!(serializer.metadata_factory().resolution_count(), 0);
/// ```
pub struct SerializerBuilder {
    catalog: ClassCatalog,
    auto_register: bool,
    naming: Arc<dyn NamingStrategy>,
    directories: Vec<(String, PathBuf)>,
    drivers: Vec<DriverKind>,
    custom_drivers: Vec<Box<dyn MetadataDriver>>,
    cache: Option<Arc<dyn MetadataCache>>,
    debug: bool,
    handlers: HandlerRegistry,
    events: EventDispatcher,
    json: JsonOptions,
    xml: XmlOptions,
}

impl Default for SerializerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializerBuilder {
    pub fn new() -> Self {
        let mut handlers = HandlerRegistry::new();
        DateHandler::default().register(&mut handlers);
        Self {
            catalog: ClassCatalog::new(),
            auto_register: true,
            naming: Arc::new(AnnotatedNaming::new(CaseNaming::default())),
            directories: Vec::new(),
            drivers: DriverKind::DEFAULT_ORDER.to_vec(),
            custom_drivers: Vec::new(),
            cache: None,
            debug: false,
            handlers,
            events: EventDispatcher::new(),
            json: JsonOptions::default(),
            xml: XmlOptions::default(),
        }
    }

    /// Creates a builder from declarative configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use vl_serial::config::SerializerConfig;
    /// use vl_serial::serializer::SerializerBuilder;
    ///
    /// let config = SerializerConfig::from_toml_str(r#"
    ///     [handlers.datetime]
    ///     default_timezone = "Europe/Paris"
    /// "#).unwrap();
    /// assert!(SerializerBuilder::from_config(&config).is_err());
    /// ```
    pub fn from_config(config: &SerializerConfig) -> Result<Self, Error> {
        let datetime = &config.handlers.datetime;
        let date_handler = DateHandler::new(datetime.default_format.as_str(), &datetime.default_timezone)?;

        let naming = &config.property_naming;
        let mut builder = match config.naming_strategy {
            NamingStrategyKind::CamelCase => {
                Self::new().naming_strategy(CaseNaming::new(naming.separator.as_str(), naming.lowercase))
            }
            NamingStrategyKind::Identical => Self::new().naming_strategy(IdenticalNaming),
        };

        let metadata = &config.metadata;
        for directory in &metadata.directories {
            builder = builder.metadata_dir(directory.namespace_prefix.as_str(), directory.path.as_path());
        }
        builder = builder.driver_order(metadata.drivers.iter().copied()).debug(metadata.debug);
        builder.cache = match &metadata.cache {
            CacheConfig::None => None,
            CacheConfig::Memory => Some(Arc::new(MemoryCache::new())),
            CacheConfig::File { directory } => Some(Arc::new(FileCache::new(directory))),
        };

        Ok(builder
            .date_handler(date_handler)
            .json_options(config.visitors.json.clone())
            .xml_options(config.visitors.xml.clone()))
    }

    /// Registers `T` and the classes it refers to with the attribute driver.
    pub fn register<T: Describe>(mut self) -> Self {
        self.catalog.register::<T>();
        self
    }

    /// Whether [`build`](Self::build) registers `#[serial(auto_register)]`
    /// classes. On by default.
    #[inline]
    pub fn auto_register(mut self, enabled: bool) -> Self {
        self.auto_register = enabled;
        self
    }

    /// Sets the naming strategy.
    ///
    /// The strategy is wrapped so explicit serialized names keep priority.
    pub fn naming_strategy<S: NamingStrategy + 'static>(mut self, naming: S) -> Self {
        self.naming = Arc::new(AnnotatedNaming::new(naming));
        self
    }

    /// Sets a naming strategy as is, without honoring explicit names.
    pub fn raw_naming_strategy(mut self, naming: Arc<dyn NamingStrategy>) -> Self {
        self.naming = naming;
        self
    }

    /// Looks up mapping files of classes under `namespace_prefix` in
    /// `directory`.
    pub fn metadata_dir(mut self, namespace_prefix: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        self.directories.push((namespace_prefix.into(), directory.into()));
        self
    }

    /// Sets which built-in drivers are consulted, and in which order.
    pub fn driver_order(mut self, order: impl IntoIterator<Item = DriverKind>) -> Self {
        self.drivers = order.into_iter().collect();
        self
    }

    /// Adds a driver consulted before the built-in ones.
    pub fn add_driver(mut self, driver: impl MetadataDriver + 'static) -> Self {
        self.custom_drivers.push(Box::new(driver));
        self
    }

    /// Adds a second level metadata cache.
    pub fn cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Re-resolves metadata whose mapping files changed.
    #[inline]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Replaces the built-in date handler.
    pub fn date_handler(mut self, handler: DateHandler) -> Self {
        handler.register(&mut self.handlers);
        self
    }

    /// Registers custom handlers.
    ///
    /// # Examples
    ///
    /// ```
    /// use vl_serial::handler::Direction;
    /// use vl_serial::serializer::Serializer;
    ///
    /// let serializer = Serializer::builder()
    ///     .configure_handlers(|handlers| {
    ///         handlers.register_serialize("Secret", |visitor, _, _| visitor.visit_str("***"));
    ///     })
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(serializer.handlers().contains("Secret", Direction::Serialize));
    /// assert!(serializer.handlers().contains("DateTime", Direction::Deserialize));
    /// ```
    pub fn configure_handlers(mut self, configure: impl FnOnce(&mut HandlerRegistry)) -> Self {
        configure(&mut self.handlers);
        self
    }

    /// Registers object event listeners.
    ///
    /// # Examples
    ///
    /// ```
    /// use vl_serial::event::EventKind;
    /// use vl_serial::serializer::Serializer;
    ///
    /// let serializer = Serializer::builder()
    ///     .configure_events(|events| {
    ///         events.on_post_serialize(None, |_, _| Ok(()));
    ///     })
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(serializer.events().len(EventKind::PostSerialize), 1);
    /// ```
    pub fn configure_events(mut self, configure: impl FnOnce(&mut EventDispatcher)) -> Self {
        configure(&mut self.events);
        self
    }

    #[inline]
    pub fn json_options(mut self, options: JsonOptions) -> Self {
        self.json = options;
        self
    }

    #[inline]
    pub fn xml_options(mut self, options: XmlOptions) -> Self {
        self.xml = options;
        self
    }

    /// Builds the serializer.
    ///
    /// Fails if a metadata directory is invalid or the driver chain ends up
    /// empty.
    pub fn build(mut self) -> Result<Serializer, Error> {
        if self.auto_register {
            let registered = self.catalog.auto_register();
            log::debug!("auto registered {registered} classes");
        }
        let catalog = ClassCatalogArc::new(self.catalog);

        let locator = if self.directories.is_empty() {
            None
        } else {
            Some(Arc::new(FileLocator::new(self.directories)?))
        };

        let mut chain = DriverChain::new();
        for driver in self.custom_drivers {
            chain.push(driver);
        }
        for kind in self.drivers {
            match (kind, &locator) {
                (DriverKind::Toml, Some(locator)) => {
                    chain.push(Box::new(FileDriver::new(locator.clone(), MappingFormat::Toml)));
                }
                (DriverKind::Json, Some(locator)) => {
                    chain.push(Box::new(FileDriver::new(locator.clone(), MappingFormat::Json)));
                }
                (DriverKind::Toml | DriverKind::Json, None) => {
                    log::trace!("skipping the {kind} driver, no metadata directory is configured");
                }
                (DriverKind::Attribute, _) => chain.push(Box::new(AttributeDriver::new(catalog.clone()))),
            }
        }
        if chain.is_empty() {
            return Err(Error::configuration("the metadata driver chain is empty"));
        }

        let mut factory = MetadataFactory::new(chain, self.naming).with_debug(self.debug);
        if let Some(cache) = self.cache {
            factory = factory.with_cache(cache);
        }

        Ok(Serializer {
            factory: Arc::new(factory),
            handlers: self.handlers,
            events: self.events,
            catalog,
            json: self.json,
            xml: self.xml,
        })
    }
}
