use core::hash::Hasher;

use crate::Error;
use crate::info::{ClassId, ClassMetadata};
use crate::metadata::ClassCatalogArc;

// -----------------------------------------------------------------------------
// MetadataDriver

/// A source of class metadata.
pub trait MetadataDriver: Send + Sync {
    /// A short name used in logs and fingerprints.
    fn name(&self) -> &str;

    /// Describes `class`, or returns `Ok(None)` if this driver has no
    /// mapping for it.
    fn load_metadata(&self, class: &ClassId) -> Result<Option<ClassMetadata>, Error>;

    /// Writes everything that influences what this driver returns.
    fn fingerprint(&self, state: &mut dyn Hasher);

    /// Writes what influences the description of `class` beyond
    /// [`fingerprint`](MetadataDriver::fingerprint).
    ///
    /// Drivers whose tables are compiled into the program hash the table
    /// here, so a persistent cache never serves metadata of an older build.
    /// Drivers with file resources rely on freshness checks instead.
    fn class_fingerprint(&self, class: &ClassId, state: &mut dyn Hasher) {
        let _ = (class, state);
    }
}

// -----------------------------------------------------------------------------
// DriverChain

/// Consults drivers in order; the first one that knows a class wins.
///
/// Results are never merged: a class described by a mapping file ignores
/// whatever its derive declares.
#[derive(Default)]
pub struct DriverChain {
    drivers: Vec<Box<dyn MetadataDriver>>,
}

impl DriverChain {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a driver with the lowest priority so far.
    #[inline]
    pub fn with(mut self, driver: impl MetadataDriver + 'static) -> Self {
        self.drivers.push(Box::new(driver));
        self
    }

    /// Appends a boxed driver.
    #[inline]
    pub fn push(&mut self, driver: Box<dyn MetadataDriver>) {
        self.drivers.push(driver);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl MetadataDriver for DriverChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn load_metadata(&self, class: &ClassId) -> Result<Option<ClassMetadata>, Error> {
        for driver in &self.drivers {
            if let Some(metadata) = driver.load_metadata(class)? {
                log::debug!("metadata of `{class}` loaded by the {} driver", driver.name());
                return Ok(Some(metadata));
            }
        }
        Ok(None)
    }

    fn fingerprint(&self, state: &mut dyn Hasher) {
        state.write_usize(self.drivers.len());
        for driver in &self.drivers {
            state.write(driver.name().as_bytes());
            driver.fingerprint(state);
        }
    }

    fn class_fingerprint(&self, class: &ClassId, state: &mut dyn Hasher) {
        for driver in &self.drivers {
            driver.class_fingerprint(class, state);
        }
    }
}

// -----------------------------------------------------------------------------
// AttributeDriver

/// Reads the declarative tables of `#[derive(Mapped)]` types.
///
/// Only classes registered in the catalog are known; registration may
/// happen after the driver is built.
#[derive(Clone, Default)]
pub struct AttributeDriver {
    catalog: ClassCatalogArc,
}

impl AttributeDriver {
    #[inline]
    pub fn new(catalog: ClassCatalogArc) -> Self {
        Self { catalog }
    }

    #[inline]
    pub fn catalog(&self) -> &ClassCatalogArc {
        &self.catalog
    }
}

impl MetadataDriver for AttributeDriver {
    fn name(&self) -> &str {
        "attribute"
    }

    fn load_metadata(&self, class: &ClassId) -> Result<Option<ClassMetadata>, Error> {
        let entry = self.catalog.read().get(class.as_str()).copied();
        entry.map(|entry| entry.describe()).transpose()
    }

    fn fingerprint(&self, state: &mut dyn Hasher) {
        state.write(b"derive");
    }

    fn class_fingerprint(&self, class: &ClassId, state: &mut dyn Hasher) {
        let entry = self.catalog.read().get(class.as_str()).copied();
        match entry.map(|entry| entry.describe()) {
            Some(Ok(metadata)) => metadata.content_fingerprint(state),
            Some(Err(_)) => state.write(b"invalid"),
            None => state.write(b"unknown"),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use core::hash::Hasher;

    use super::{AttributeDriver, DriverChain, MetadataDriver};
    use crate::Error;
    use crate::data::Describe;
    use crate::derive::Mapped;
    use crate::info::{ClassId, ClassMetadata};
    use crate::metadata::ClassCatalogArc;
    use vl_utils::hash::fingerprint;

    #[derive(Mapped)]
    struct Point {
        x: i32,
        y: i32,
    }

    struct Fixed(&'static str);

    impl MetadataDriver for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn load_metadata(&self, class: &ClassId) -> Result<Option<ClassMetadata>, Error> {
            Ok((class == "app::Fixed").then(|| ClassMetadata::new(class.clone()).with_xml_root(self.0)))
        }

        fn fingerprint(&self, _state: &mut dyn Hasher) {}
    }

    #[test]
    fn attribute_driver_reads_registered_classes() {
        let catalog = ClassCatalogArc::default();
        let driver = AttributeDriver::new(catalog.clone());
        assert!(driver.load_metadata(&Point::class()).unwrap().is_none());

        catalog.write().register::<Point>();
        let metadata = driver.load_metadata(&Point::class()).unwrap().unwrap();
        let names: Vec<_> = metadata.properties().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["x", "y"]);
    }

    #[derive(Mapped)]
    #[serial(class = "test::Point")]
    struct FlatPoint {
        x: i32,
    }

    #[derive(Mapped)]
    #[serial(class = "test::Point")]
    struct WidePoint {
        x: i32,
        y: i32,
    }

    #[test]
    fn class_fingerprint_follows_the_derived_table() {
        let catalog = ClassCatalogArc::default();
        let driver = AttributeDriver::new(catalog.clone());
        let class = ClassId::from_static("test::Point");
        let unknown = fingerprint(|state| driver.class_fingerprint(&class, state));

        catalog.write().register::<FlatPoint>();
        let flat = fingerprint(|state| driver.class_fingerprint(&class, state));
        assert_ne!(flat, unknown);
        assert_eq!(flat, fingerprint(|state| driver.class_fingerprint(&class, state)));

        let wide_catalog = ClassCatalogArc::default();
        wide_catalog.write().register::<WidePoint>();
        let wide = AttributeDriver::new(wide_catalog);
        assert_ne!(flat, fingerprint(|state| wide.class_fingerprint(&class, state)));
    }

    #[test]
    fn first_driver_wins() {
        let chain = DriverChain::new().with(Fixed("first")).with(Fixed("second"));
        let metadata = chain
            .load_metadata(&ClassId::from_static("app::Fixed"))
            .unwrap()
            .unwrap();
        assert_eq!(metadata.xml_root_name(), Some("first"));
        assert!(chain.load_metadata(&ClassId::from_static("app::Other")).unwrap().is_none());
    }

    #[test]
    fn chain_fingerprint_depends_on_order() {
        let ab = DriverChain::new().with(Fixed("a")).with(Fixed("b"));
        let ba = DriverChain::new().with(Fixed("b")).with(Fixed("a"));
        assert_ne!(
            fingerprint(|state| ab.fingerprint(state)),
            fingerprint(|state| ba.fingerprint(state))
        );
    }
}
