//! See [`Mapped`].

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

static SERIAL_ATTRIBUTE_NAME: &str = "serial";

// -----------------------------------------------------------------------------
// Modules

mod derive_data;
mod impls;
mod path;

// -----------------------------------------------------------------------------
// Macros

/// # Mapped Class Derivation
///
/// `#[derive(Mapped)]` implements the following traits:
///
/// - `Data` and `Mapped`: the read view used by serialization.
/// - `Typed`: the type descriptor, `Object(CLASS)`.
/// - `Describe`: the declarative mapping table read by the attribute driver.
/// - `FromValue`: the conversion from a deserialized `Value`.
///
/// Generic types are not supported.
///
/// ## Structs
///
/// Every named field becomes a property, in declaration order. A field type
/// must implement `Data`, `Typed` and `FromValue`.
///
/// ```rust, ignore
/// #[derive(Mapped)]
/// #[serial(class = "app::model::User", xml_root = "user")]
/// struct User {
///     #[serial(xml_attribute)]
///     id: u64,
///     #[serial(rename = "born", type = "DateTime<'%Y-%m-%d'>")]
///     birth_date: DateTime<FixedOffset>,
///     #[serial(groups("details"), since = "1.1")]
///     nickname: Option<String>,
///     #[serial(skip)]
///     session: Session,
/// }
/// ```
///
/// ### Type attributes
///
/// - `class = "..."`: the class id, `module::path::Type` by default.
/// - `xml_root = "..."`: the name of the XML root element.
/// - `xml_namespace(prefix = "...", uri = "...")`: declares a namespace on the
///   class element, `prefix` defaults to the default namespace.
/// - `auto_register`: registers the class when a serializer is built. A
///   no-op without the `auto_register` feature.
///
/// ### Field attributes
///
/// - `rename = "..."`: explicit serialized name, which naming strategies
///   honor.
/// - `type = "..."`: overrides the type descriptor, e.g. to pick a handler.
/// - `groups("a", "b")`, `since = "1.0"`, `until = "2.0"`: exclusion.
/// - `skip`: the field is neither written nor read. It is rebuilt with
///   `Default::default()` and needs no trait implementation.
/// - `read_only`: written but never read.
/// - `inline`: the fields of this object are merged into the parent.
/// - `default` or `default = "path::to::fn"`: the value used when the
///   input omits the property. The property is no longer required.
/// - `xml_attribute`, `xml_value`, `xml_cdata`: XML layout of scalars.
/// - `xml_list(entry = "...", inline)` and `xml_map(entry = "...", key = "...")`:
///   XML layout of collections.
///
/// Fields excluded on deserialization (`read_only`, groups, versions) are
/// rebuilt from their default, so they should be `Option`s or carry
/// `default`.
///
/// ## Enums
///
/// An enum of newtype variants over mapped classes is a polymorphic base.
/// Its instances are written as the class of the variant, with a type field
/// telling them apart.
///
/// ```rust, ignore
/// #[derive(Mapped)]
/// #[serial(discriminator = "kind")]
/// enum Shape {
///     #[serial(tag = "circle")]
///     Circle(Circle),
///     Square(Square),
/// }
/// ```
///
/// - `discriminator = "..."`: the type field, `type` by default.
/// - `tag = "..."` on a variant: its tag, the variant name by default.
#[proc_macro_derive(Mapped, attributes(serial))]
pub fn derive_mapped(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    match derive_data::MappedInput::from_ast(&ast) {
        Ok(input) => impls::impl_mapped(&input).into(),
        Err(err) => err.into_compile_error().into(),
    }
}
