use core::borrow::Borrow;
use core::fmt;
use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// -----------------------------------------------------------------------------
// ClassId

/// The identifier of a mapped class, e.g. `app::model::User`.
///
/// Identifiers generated by `#[derive(Mapped)]` are `'static` and cloning
/// them is free; identifiers read from mapping files own their text.
///
/// # Examples
///
/// ```
/// use vl_serial::info::ClassId;
///
/// let id = ClassId::from_static("app::model::User");
/// assert_eq!(id.short_name(), "User");
/// assert_eq!(id.namespace(), Some("app::model"));
/// assert_eq!(id, ClassId::from(String::from("app::model::User")));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(Cow<'static, str>);

impl ClassId {
    /// Separator between path segments.
    pub const SEPARATOR: &'static str = "::";

    /// Creates an identifier from a static string.
    #[inline]
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    /// Creates an identifier from any string.
    #[inline]
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    /// Returns the full identifier.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last path segment.
    pub fn short_name(&self) -> &str {
        match self.0.rfind(Self::SEPARATOR) {
            Some(index) => &self.0[index + Self::SEPARATOR.len()..],
            None => &self.0,
        }
    }

    /// Returns everything before the last path segment.
    pub fn namespace(&self) -> Option<&str> {
        self.0.rfind(Self::SEPARATOR).map(|index| &self.0[..index])
    }
}

impl From<&'static str> for ClassId {
    #[inline]
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

impl From<String> for ClassId {
    #[inline]
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl Borrow<str> for ClassId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ClassId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ClassId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        *self.0 == *other
    }
}

impl PartialEq<&str> for ClassId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        *self.0 == **other
    }
}

impl fmt::Display for ClassId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClassId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl Serialize for ClassId {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ClassId {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}
