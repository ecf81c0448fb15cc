//! Provide `FixedHasher`.
//!
//! `FixedHasher` based on `foldhash` crate,
//! Provide stable hash results through a fixed hash seed.

use core::hash::{BuildHasher, Hasher};

use foldhash::fast::{FixedState, FoldHasher};

// -----------------------------------------------------------------------------
// FixedHasher

/// A fixed hash seed.
const FIXED_HASH_STATE: FixedState = FixedState::with_seed(0x5E1A_11CE_D0C5_7A7E);

/// A fixed hasher provided hash results that only related on the input.
///
/// A type alias for [`foldhash::fast::FoldHasher`] .
///
/// Which can be created through [`FixedHashState::build_hasher`].
pub type FixedHasher = FoldHasher<'static>;

/// Fixed Hash State based upon a random but fixed seed.
///
/// # Examples
///
/// ```
/// use core::hash::{Hash, Hasher, BuildHasher};
/// use vl_utils::hash::FixedHashState;
///
/// let mut a = FixedHashState.build_hasher();
/// "app::User".hash(&mut a);
///
/// let mut b = FixedHashState.build_hasher();
/// "app::User".hash(&mut b);
///
/// assert_eq!(a.finish(), b.finish());
/// ```
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHashState;

impl BuildHasher for FixedHashState {
    type Hasher = FixedHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        FIXED_HASH_STATE.build_hasher()
    }
}

/// Runs `func` against a fresh [`FixedHasher`] and returns the final hash.
///
/// The hasher is handed out as `&mut dyn Hasher` so that trait objects
/// (e.g. configuration components) can contribute to a shared fingerprint.
///
/// # Examples
///
/// ```
/// use vl_utils::hash::fingerprint;
///
/// let a = fingerprint(|state| state.write(b"toml"));
/// let b = fingerprint(|state| state.write(b"json"));
/// assert_ne!(a, b);
/// ```
pub fn fingerprint(func: impl FnOnce(&mut dyn Hasher)) -> u64 {
    let mut hasher = FixedHashState.build_hasher();
    func(&mut hasher);
    hasher.finish()
}

// -----------------------------------------------------------------------------
// Tests
