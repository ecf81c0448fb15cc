//! Static descriptions of mapped classes.
//!
//! - [`ClassId`]: the identifier of a class (`module::path::Type`).
//! - [`TypeDescriptor`]: the declared type of a property, with a textual
//!   syntax used by mapping files.
//! - [`PropertyMetadata`] and [`ClassMetadata`]: what the metadata factory
//!   resolves and caches.

// -----------------------------------------------------------------------------
// Modules

mod class;
mod class_id;
mod property;
mod type_descriptor;
mod version;

// -----------------------------------------------------------------------------
// Exports

pub use class::{ClassMetadata, Discriminator, XmlNamespace};
pub use class_id::ClassId;
pub use property::{DEFAULT_GROUP, PropertyFlags, PropertyMetadata, XmlCollection};
pub use type_descriptor::{Primitive, TypeDescriptor};
pub use version::Version;
