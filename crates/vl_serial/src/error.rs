use std::io;

use thiserror::Error;

use crate::handler::Direction;
use crate::info::ClassId;
use crate::serializer::Format;

/// The root of a path reported by [`Error`].
pub(crate) const ROOT_PATH: &str = "$";

/// A specialized [`Result`](core::result::Result) for serialization operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;

// -----------------------------------------------------------------------------
// Error

/// Errors produced while resolving metadata or (de)serializing a graph.
///
/// Every error aborts the whole call. Variants that carry a `path` report
/// where in the graph the failure happened, such as `$.user.tags[2]`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No metadata driver could describe the class.
    #[error("no metadata driver could describe class `{0}`")]
    MetadataNotFound(ClassId),
    /// Invalid metadata, mapping file or serializer configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A type requires a handler but none is registered for the direction.
    #[error("no {direction} handler registered for type `{type_name}` at `{path}`")]
    HandlerNotFound {
        type_name: String,
        direction: Direction,
        path: String,
    },
    /// An object was reached again while it was still being serialized.
    #[error("cyclic reference to `{class}` detected at `{path}`")]
    CyclicReference { class: ClassId, path: String },
    /// A required property is absent from the input.
    #[error("missing required field `{field}` at `{path}`")]
    MissingField { field: String, path: String },
    /// The input (or the object) does not have the declared shape.
    #[error("type mismatch at `{path}`: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },
    /// The input contains a key the class does not declare (strict mode).
    #[error("unknown field `{field}` at `{path}`")]
    UnknownField { field: String, path: String },
    /// The input is not well-formed.
    #[error("malformed {format} input: {message}")]
    Syntax { format: Format, message: String },
    /// The XML document declares a DOCTYPE outside of the allow-list.
    #[error("doctype `{0}` is not allowed")]
    DisallowedDoctype(String),
    /// A registered handler reported a failure.
    #[error("handler for `{type_name}` failed at `{path}`: {message}")]
    Handler {
        type_name: String,
        path: String,
        message: String,
    },
    /// Reading a mapping file failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Creates a [`Error::Configuration`].
    #[inline]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a [`Error::TypeMismatch`].
    #[inline]
    pub fn mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a [`Error::MissingField`] at the root path.
    #[inline]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            path: ROOT_PATH.into(),
        }
    }

    /// Returns the graph path carried by this error, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::HandlerNotFound { path, .. }
            | Self::CyclicReference { path, .. }
            | Self::MissingField { path, .. }
            | Self::TypeMismatch { path, .. }
            | Self::UnknownField { path, .. }
            | Self::Handler { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Nests the reported path under the field `segment`.
    ///
    /// Used when a value converted at the root turns out to belong to a
    /// field of an enclosing object.
    ///
    /// # Examples
    ///
    /// ```
    /// use vl_serial::Error;
    ///
    /// let err = Error::mismatch("$.zip", "string", "number").within("address");
    /// assert_eq!(err.path(), Some("$.address.zip"));
    /// ```
    pub fn within(mut self, segment: &str) -> Self {
        match &mut self {
            Self::HandlerNotFound { path, .. }
            | Self::CyclicReference { path, .. }
            | Self::MissingField { path, .. }
            | Self::TypeMismatch { path, .. }
            | Self::UnknownField { path, .. }
            | Self::Handler { path, .. } => {
                let rest = path.strip_prefix(ROOT_PATH).unwrap_or(path.as_str());
                *path = format!("{ROOT_PATH}.{segment}{rest}");
            }
            _ => {}
        }
        self
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::info::ClassId;

    #[test]
    fn within_prefixes_nested_paths() {
        let err = Error::missing_field("zip").within("address").within("user");
        assert_eq!(err.path(), Some("$.user.address"));
        assert!(matches!(err, Error::MissingField { ref field, .. } if field == "zip"));
    }

    #[test]
    fn within_ignores_pathless_errors() {
        let err = Error::MetadataNotFound(ClassId::from_static("app::User")).within("user");
        assert_eq!(err.path(), None);
        assert_eq!(
            err.to_string(),
            "no metadata driver could describe class `app::User`"
        );
    }
}
