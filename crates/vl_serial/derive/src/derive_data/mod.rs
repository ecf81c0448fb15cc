//! The parsed form of a `#[derive(Mapped)]` input.

use syn::{Data, DeriveInput, Fields, Ident, LitStr, Path, Type};

use crate::SERIAL_ATTRIBUTE_NAME;

// -----------------------------------------------------------------------------
// Modules

mod field_attributes;
mod type_attributes;

// -----------------------------------------------------------------------------
// Internal API

pub(crate) use field_attributes::{FieldAttributes, FieldDefault};
pub(crate) use type_attributes::TypeAttributes;

// -----------------------------------------------------------------------------
// MappedInput

pub(crate) struct MappedField<'a> {
    pub ident: &'a Ident,
    pub ty: &'a Type,
    pub attrs: FieldAttributes,
}

pub(crate) struct MappedVariant<'a> {
    pub ident: &'a Ident,
    pub ty: &'a Type,
    pub tag: String,
}

pub(crate) enum MappedKind<'a> {
    /// A struct with named fields, or a unit struct.
    Struct { fields: Vec<MappedField<'a>>, unit: bool },
    /// An enum of newtype variants.
    Enum { variants: Vec<MappedVariant<'a>> },
}

pub(crate) struct MappedInput<'a> {
    vl_serial_path: Path,
    ident: &'a Ident,
    attrs: TypeAttributes,
    kind: MappedKind<'a>,
}

impl<'a> MappedInput<'a> {
    pub fn from_ast(ast: &'a DeriveInput) -> syn::Result<Self> {
        if !ast.generics.params.is_empty() {
            return Err(syn::Error::new_spanned(
                &ast.generics,
                "`Mapped` cannot be derived for generic types",
            ));
        }

        let attrs = TypeAttributes::parse_attrs(&ast.attrs)?;

        let kind = match &ast.data {
            Data::Struct(data) => {
                if let Some(discriminator) = &attrs.discriminator {
                    return Err(syn::Error::new(
                        discriminator.span(),
                        "`discriminator` only applies to enums",
                    ));
                }
                let unit = matches!(data.fields, Fields::Unit);
                if let Fields::Unnamed(fields) = &data.fields {
                    return Err(syn::Error::new_spanned(
                        fields,
                        "`Mapped` requires named fields",
                    ));
                }
                let fields = data
                    .fields
                    .iter()
                    .filter_map(|field| field.ident.as_ref().map(|ident| (ident, field)))
                    .map(|(ident, field)| {
                        Ok(MappedField {
                            ident,
                            ty: &field.ty,
                            attrs: FieldAttributes::parse_attrs(&field.attrs)?,
                        })
                    })
                    .collect::<syn::Result<Vec<_>>>()?;
                MappedKind::Struct { fields, unit }
            }
            Data::Enum(data) => {
                if data.variants.is_empty() {
                    return Err(syn::Error::new_spanned(
                        &ast.ident,
                        "`Mapped` cannot be derived for empty enums",
                    ));
                }
                let variants = data
                    .variants
                    .iter()
                    .map(|variant| {
                        let ty = match &variant.fields {
                            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => &fields.unnamed[0].ty,
                            _ => {
                                return Err(syn::Error::new_spanned(
                                    variant,
                                    "`Mapped` enum variants must wrap exactly one mapped class",
                                ));
                            }
                        };
                        Ok(MappedVariant {
                            ident: &variant.ident,
                            ty,
                            tag: parse_tag(&variant.attrs)?.unwrap_or_else(|| variant.ident.to_string()),
                        })
                    })
                    .collect::<syn::Result<Vec<_>>>()?;
                MappedKind::Enum { variants }
            }
            Data::Union(_) => {
                return Err(syn::Error::new_spanned(
                    &ast.ident,
                    "`Mapped` cannot be derived for unions",
                ));
            }
        };

        Ok(Self {
            vl_serial_path: crate::path::vl_serial(),
            ident: &ast.ident,
            attrs,
            kind,
        })
    }

    #[inline]
    pub fn vl_serial_path(&self) -> &Path {
        &self.vl_serial_path
    }

    #[inline]
    pub fn ident(&self) -> &Ident {
        self.ident
    }

    #[inline]
    pub fn attrs(&self) -> &TypeAttributes {
        &self.attrs
    }

    #[inline]
    pub fn kind(&self) -> &MappedKind<'a> {
        &self.kind
    }
}

/// Parses `#[serial(tag = "...")]` on an enum variant.
fn parse_tag(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut tag = None;
    for attr in attrs {
        if attr.path().is_ident(SERIAL_ATTRIBUTE_NAME) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("tag") {
                    tag = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `tag`"))
                }
            })?;
        }
    }
    Ok(tag)
}
