//! Metadata resolution.
//!
//! A [`MetadataFactory`] resolves the [`ClassMetadata`](crate::info::ClassMetadata)
//! of a class on first use by asking a [`DriverChain`], applies the naming
//! strategy, and caches the result in process and, optionally, in a
//! [`MetadataCache`] backend.
//!
//! Drivers:
//! - [`AttributeDriver`]: the declarative tables of `#[derive(Mapped)]`
//!   types registered in a [`ClassCatalog`].
//! - [`FileDriver`]: TOML or JSON mapping files found by a [`FileLocator`].

// -----------------------------------------------------------------------------
// Modules

mod cache;
mod catalog;
mod driver;
mod factory;
mod file_driver;
mod locator;
mod mapping;

// -----------------------------------------------------------------------------
// Exports

pub use cache::{FileCache, MemoryCache, MetadataCache};
pub use catalog::{ClassCatalog, ClassCatalogArc, ClassEntry};
pub use driver::{AttributeDriver, DriverChain, MetadataDriver};
pub use factory::MetadataFactory;
pub use file_driver::{FileDriver, MappingFormat};
pub use locator::FileLocator;

#[cfg(feature = "auto_register")]
pub use catalog::AutoRegistration;
