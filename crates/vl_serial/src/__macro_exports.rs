//! Items used by `#[derive(Mapped)]` generated code. Not public API.

use crate::data::Describe;
use crate::metadata::ClassCatalog;

#[cfg(feature = "auto_register")]
pub use inventory;

#[cfg(feature = "auto_register")]
pub use crate::metadata::AutoRegistration;

/// Registers `T` (and its dependencies) into `catalog`.
///
/// A plain function so that it can be stored as a `fn` pointer in
/// `inventory` statics.
#[inline]
pub fn register_class<T: Describe>(catalog: &mut ClassCatalog) {
    catalog.register::<T>();
}
