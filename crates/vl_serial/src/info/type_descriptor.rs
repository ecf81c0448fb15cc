use core::fmt;
use core::str::FromStr;
use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::Error;
use crate::info::ClassId;

// -----------------------------------------------------------------------------
// Primitive

/// Scalar types understood by every visitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    String,
}

impl Primitive {
    /// The canonical name, also used as the handler tag.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
            Self::String => "string",
        }
    }

    /// Resolves a (case insensitive) primitive name or one of its aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let primitive = match name.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Self::Bool,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" | "int" | "integer" => Self::I64,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" | "uint" => Self::U64,
            "f32" => Self::F32,
            "f64" | "float" | "double" => Self::F64,
            "char" => Self::Char,
            "string" | "str" => Self::String,
            _ => return None,
        };
        Some(primitive)
    }

    /// Returns `true` for the signed integer types.
    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Returns `true` for the unsigned integer types.
    #[inline]
    pub const fn is_unsigned(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }

    /// Returns `true` for `f32` and `f64`.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Checks that an integer fits the range of this (integer) type.
    pub fn fits(self, value: i128) -> bool {
        let (min, max) = match self {
            Self::I8 => (i8::MIN as i128, i8::MAX as i128),
            Self::I16 => (i16::MIN as i128, i16::MAX as i128),
            Self::I32 => (i32::MIN as i128, i32::MAX as i128),
            Self::I64 => (i64::MIN as i128, i64::MAX as i128),
            Self::U8 => (0, u8::MAX as i128),
            Self::U16 => (0, u16::MAX as i128),
            Self::U32 => (0, u32::MAX as i128),
            Self::U64 => (0, u64::MAX as i128),
            _ => return false,
        };
        (min..=max).contains(&value)
    }
}

// -----------------------------------------------------------------------------
// TypeDescriptor

/// The declared type of a property.
///
/// Descriptors have a textual form, used by mapping files and by
/// `#[serial(type = "...")]`:
///
/// | text                      | descriptor                        |
/// |---------------------------|-----------------------------------|
/// | `string`, `i32`, `bool`   | [`Primitive`]                     |
/// | `array<T>`                | [`TypeDescriptor::Array`]         |
/// | `map<K, V>`               | [`TypeDescriptor::Map`]           |
/// | `option<T>`               | [`TypeDescriptor::Optional`]      |
/// | `app::model::User`        | [`TypeDescriptor::Object`]        |
/// | `DateTime<'%Y-%m-%d'>`    | [`TypeDescriptor::Custom`]        |
///
/// Any name containing `::` is a class, any other unknown name is a custom
/// type that needs a registered handler.
///
/// # Examples
///
/// ```
/// use vl_serial::info::{ClassId, Primitive, TypeDescriptor};
///
/// let ty = TypeDescriptor::parse("map<string, array<app::Tag>>").unwrap();
/// assert_eq!(
///     ty,
///     TypeDescriptor::map(
///         TypeDescriptor::Primitive(Primitive::String),
///         TypeDescriptor::array(TypeDescriptor::Object(ClassId::from_static("app::Tag"))),
///     )
/// );
///
/// let date = TypeDescriptor::parse("DateTime<'%Y-%m-%d'>").unwrap();
/// assert_eq!(date.handler_tag(), "DateTime");
/// assert_eq!(date.params(), ["%Y-%m-%d"]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    Array(Box<TypeDescriptor>),
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    Optional(Box<TypeDescriptor>),
    Object(ClassId),
    Custom { name: String, params: Vec<String> },
}

impl TypeDescriptor {
    /// Creates `array<element>`.
    #[inline]
    pub fn array(element: TypeDescriptor) -> Self {
        Self::Array(Box::new(element))
    }

    /// Creates `map<key, value>`.
    #[inline]
    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// Creates `option<inner>`.
    #[inline]
    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Creates a custom descriptor without parameters.
    #[inline]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Parses the textual form, see the type level documentation.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut parser = Parser { text, pos: 0 };
        let descriptor = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != text.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(descriptor)
    }

    /// Returns `true` for [`TypeDescriptor::Optional`].
    #[inline]
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Strips every [`TypeDescriptor::Optional`] layer.
    pub fn non_optional(&self) -> &TypeDescriptor {
        let mut current = self;
        while let Self::Optional(inner) = current {
            current = inner;
        }
        current
    }

    /// The tag handlers are registered under.
    ///
    /// Primitives use their canonical name, collections use `array` and
    /// `map`, objects use their class id and custom types their name.
    pub fn handler_tag(&self) -> Cow<'_, str> {
        match self {
            Self::Primitive(primitive) => Cow::Borrowed(primitive.name()),
            Self::Array(_) => Cow::Borrowed("array"),
            Self::Map(..) => Cow::Borrowed("map"),
            Self::Optional(inner) => inner.handler_tag(),
            Self::Object(class) => Cow::Borrowed(class.as_str()),
            Self::Custom { name, .. } => Cow::Borrowed(name),
        }
    }

    /// Parameters of a custom descriptor, empty for every other kind.
    pub fn params(&self) -> &[String] {
        match self.non_optional() {
            Self::Custom { params, .. } => params,
            _ => &[],
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(primitive) => f.write_str(primitive.name()),
            Self::Array(element) => write!(f, "array<{element}>"),
            Self::Map(key, value) => write!(f, "map<{key}, {value}>"),
            Self::Optional(inner) => write!(f, "option<{inner}>"),
            Self::Object(class) => f.write_str(class.as_str()),
            Self::Custom { name, params } => {
                f.write_str(name)?;
                if !params.is_empty() {
                    f.write_str("<")?;
                    for (index, param) in params.iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "'{param}'")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for TypeDescriptor {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TypeDescriptor {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TypeDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(de::Error::custom)
    }
}

// -----------------------------------------------------------------------------
// Parser

enum Param {
    Type(TypeDescriptor),
    Literal(String),
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> Error {
        Error::configuration(format!(
            "invalid type `{}` at offset {}: {reason}",
            self.text, self.pos
        ))
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn ident(&mut self) -> &str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b':')
        {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn literal(&mut self, quote: u8) -> Result<String, Error> {
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == quote {
                let literal = self.text[start..self.pos].to_owned();
                self.pos += 1;
                return Ok(literal);
            }
            self.pos += 1;
        }
        Err(self.error("unterminated string parameter"))
    }

    fn parse_type(&mut self) -> Result<TypeDescriptor, Error> {
        self.skip_ws();
        let name = self.ident().to_owned();
        if name.is_empty() {
            return Err(self.error("expected a type name"));
        }

        let mut params = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b'<') {
            self.pos += 1;
            loop {
                self.skip_ws();
                let param = match self.peek() {
                    Some(quote @ (b'\'' | b'"')) => Param::Literal(self.literal(quote)?),
                    _ => Param::Type(self.parse_type()?),
                };
                params.push(param);
                self.skip_ws();
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b'>') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected `,` or `>`")),
                }
            }
        }

        self.build(name, params)
    }

    fn build(&self, name: String, params: Vec<Param>) -> Result<TypeDescriptor, Error> {
        let lower = name.to_ascii_lowercase();
        match (lower.as_str(), params.len()) {
            (_, 0) if !name.contains(ClassId::SEPARATOR) => {
                if let Some(primitive) = Primitive::from_name(&name) {
                    return Ok(TypeDescriptor::Primitive(primitive));
                }
            }
            ("array" | "list" | "vec", 1) => {
                let [element] = self.type_params::<1>(params)?;
                return Ok(TypeDescriptor::array(element));
            }
            ("array" | "list" | "vec" | "map" | "hashmap" | "btreemap", 2) => {
                let [key, value] = self.type_params::<2>(params)?;
                return Ok(TypeDescriptor::map(key, value));
            }
            ("option" | "optional", 1) => {
                let [inner] = self.type_params::<1>(params)?;
                return Ok(TypeDescriptor::optional(inner));
            }
            ("array" | "list" | "vec" | "map" | "hashmap" | "btreemap" | "option" | "optional", _) => {
                return Err(self.error("wrong number of type parameters"));
            }
            _ => {}
        }

        if name.contains(ClassId::SEPARATOR) {
            if !params.is_empty() {
                return Err(self.error("class types take no parameters"));
            }
            return Ok(TypeDescriptor::Object(ClassId::from(name)));
        }

        let params = params
            .into_iter()
            .map(|param| match param {
                Param::Literal(literal) => literal,
                Param::Type(ty) => ty.to_string(),
            })
            .collect();
        Ok(TypeDescriptor::Custom { name, params })
    }

    fn type_params<const N: usize>(&self, params: Vec<Param>) -> Result<[TypeDescriptor; N], Error> {
        let types = params
            .into_iter()
            .map(|param| match param {
                Param::Type(ty) => Ok(ty),
                Param::Literal(_) => Err(self.error("expected a type parameter")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        types
            .try_into()
            .map_err(|_| self.error("wrong number of type parameters"))
    }
}

// -----------------------------------------------------------------------------
// Tests
