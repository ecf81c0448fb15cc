//! Property naming strategies.
//!
//! A [`NamingStrategy`] maps a property to the key used in the serialized
//! output. The metadata factory applies it once per class, when the class
//! is resolved, so a strategy never runs on the hot path.

use core::hash::Hasher;

use crate::info::PropertyMetadata;

// -----------------------------------------------------------------------------
// NamingStrategy

/// Maps properties to serialized keys.
///
/// Implementations must be deterministic: the same property always maps to
/// the same key. [`fingerprint`](NamingStrategy::fingerprint) feeds the
/// metadata cache key, so two strategies producing different keys must
/// produce different fingerprints.
pub trait NamingStrategy: Send + Sync {
    /// Returns the serialized key of `property`.
    fn property_key(&self, property: &PropertyMetadata) -> String;

    /// Writes everything that influences [`property_key`](Self::property_key).
    fn fingerprint(&self, state: &mut dyn Hasher);
}

// -----------------------------------------------------------------------------
// IdenticalNaming

/// Uses the field name unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdenticalNaming;

impl NamingStrategy for IdenticalNaming {
    #[inline]
    fn property_key(&self, property: &PropertyMetadata) -> String {
        property.name().to_owned()
    }

    fn fingerprint(&self, state: &mut dyn Hasher) {
        state.write(b"identical");
    }
}

// -----------------------------------------------------------------------------
// CaseNaming

/// Splits names into words and joins them with a separator.
///
/// Word boundaries are existing `_` and `-` characters and a lowercase
/// letter (or digit) followed by an uppercase letter.
///
/// # Examples
///
/// ```
/// use vl_serial::info::{Primitive, PropertyMetadata, TypeDescriptor};
/// use vl_serial::naming::{CaseNaming, NamingStrategy};
///
/// let prop = PropertyMetadata::new("birthDate", TypeDescriptor::Primitive(Primitive::String));
///
/// assert_eq!(CaseNaming::default().property_key(&prop), "birth_date");
/// assert_eq!(CaseNaming::new("-", false).property_key(&prop), "birth-Date");
/// ```
#[derive(Debug, Clone)]
pub struct CaseNaming {
    separator: String,
    lowercase: bool,
}

impl CaseNaming {
    /// Creates a strategy joining words with `separator`.
    #[inline]
    pub fn new(separator: impl Into<String>, lowercase: bool) -> Self {
        Self {
            separator: separator.into(),
            lowercase,
        }
    }

    /// Splits `name` into words.
    fn words(name: &str) -> Vec<&str> {
        let mut words = Vec::new();
        let mut start = 0;
        let mut prev: Option<char> = None;

        for (index, ch) in name.char_indices() {
            if ch == '_' || ch == '-' {
                if start < index {
                    words.push(&name[start..index]);
                }
                start = index + ch.len_utf8();
                prev = None;
                continue;
            }
            if ch.is_uppercase()
                && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit())
                && start < index
            {
                words.push(&name[start..index]);
                start = index;
            }
            prev = Some(ch);
        }
        if start < name.len() {
            words.push(&name[start..]);
        }
        words
    }
}

impl Default for CaseNaming {
    /// `snake_case`: `_` separator, lowercase words.
    #[inline]
    fn default() -> Self {
        Self::new("_", true)
    }
}

impl NamingStrategy for CaseNaming {
    fn property_key(&self, property: &PropertyMetadata) -> String {
        let words = Self::words(property.name());
        if words.is_empty() {
            return property.name().to_owned();
        }
        let mut key = String::with_capacity(property.name().len() + words.len());
        for (index, word) in words.iter().enumerate() {
            if index > 0 {
                key.push_str(&self.separator);
            }
            if self.lowercase {
                key.extend(word.chars().flat_map(char::to_lowercase));
            } else {
                key.push_str(word);
            }
        }
        key
    }

    fn fingerprint(&self, state: &mut dyn Hasher) {
        state.write(b"case");
        state.write(self.separator.as_bytes());
        state.write_u8(self.lowercase as u8);
    }
}

// -----------------------------------------------------------------------------
// AnnotatedNaming

/// Honors explicitly declared names, delegating the rest.
///
/// # Examples
///
/// ```
/// use vl_serial::info::{Primitive, PropertyMetadata, TypeDescriptor};
/// use vl_serial::naming::{AnnotatedNaming, CaseNaming, NamingStrategy};
///
/// let naming = AnnotatedNaming::new(CaseNaming::default());
///
/// let plain = PropertyMetadata::new("birthDate", TypeDescriptor::Primitive(Primitive::String));
/// let named = plain.clone().with_serialized_name("born");
///
/// assert_eq!(naming.property_key(&plain), "birth_date");
/// assert_eq!(naming.property_key(&named), "born");
/// ```
#[derive(Debug, Clone, Default)]
pub struct AnnotatedNaming<S = CaseNaming> {
    inner: S,
}

impl<S: NamingStrategy> AnnotatedNaming<S> {
    #[inline]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped strategy.
    #[inline]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: NamingStrategy> NamingStrategy for AnnotatedNaming<S> {
    fn property_key(&self, property: &PropertyMetadata) -> String {
        match property.explicit_name() {
            Some(name) => name.to_owned(),
            None => self.inner.property_key(property),
        }
    }

    fn fingerprint(&self, state: &mut dyn Hasher) {
        state.write(b"annotated");
        self.inner.fingerprint(state);
    }
}

// -----------------------------------------------------------------------------
// Tests
