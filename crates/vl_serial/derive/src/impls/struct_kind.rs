use proc_macro2::TokenStream;
use quote::quote;

use crate::derive_data::{FieldDefault, MappedField, MappedInput};

pub(crate) fn impl_struct(input: &MappedInput, fields: &[MappedField], unit: bool) -> TokenStream {
    let vl_serial_path = input.vl_serial_path();
    let data_ = crate::path::data_(vl_serial_path);
    let info_ = crate::path::info_(vl_serial_path);
    let catalog_ = crate::path::catalog_(vl_serial_path);
    let error_ = crate::path::error_(vl_serial_path);
    let ident = input.ident();

    let active: Vec<&MappedField> = fields.iter().filter(|field| field.attrs.skip.is_none()).collect();

    let class = super::class_expr(input);
    let class_metadata = super::class_metadata_expr(input);
    let properties = active.iter().map(|field| property_expr(input, field));
    let dependencies = active.iter().map(|field| {
        let ty = field.ty;
        quote! { <#ty as #data_::Typed>::register_classes(catalog); }
    });

    let property_arms = active.iter().map(|field| {
        let field_ident = field.ident;
        let name = field_ident.to_string();
        quote! {
            #name => ::core::option::Option::Some(&self.#field_ident as &dyn #data_::Data),
        }
    });

    let construct = if unit {
        quote! { Self }
    } else {
        let inits = fields.iter().map(|field| {
            let field_ident = field.ident;
            let name = field_ident.to_string();
            let value = if field.attrs.skip.is_some() {
                quote! { ::core::default::Default::default() }
            } else {
                match &field.attrs.default {
                    FieldDefault::None => quote! { object.take_field(#name)? },
                    FieldDefault::Trait => {
                        quote! { object.take_field_or_else(#name, ::core::default::Default::default)? }
                    }
                    FieldDefault::Path(path) => quote! { object.take_field_or_else(#name, #path)? },
                }
            };
            quote! { #field_ident: #value, }
        });
        quote! { Self { #(#inits)* } }
    };

    quote! {
        impl #data_::Mapped for #ident {
            #[inline]
            fn class_id(&self) -> #info_::ClassId {
                <Self as #data_::Describe>::class()
            }

            fn property(&self, name: &str) -> ::core::option::Option<&dyn #data_::Data> {
                match name {
                    #(#property_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl #data_::Describe for #ident {
            const CLASS: &'static str = #class;

            fn describe() -> ::core::result::Result<#info_::ClassMetadata, #error_> {
                ::core::result::Result::Ok(
                    #class_metadata
                        #(.with_property(#properties))*
                )
            }

            fn register_dependencies(catalog: &mut #catalog_) {
                #(#dependencies)*
            }
        }

        impl #data_::FromValue for #ident {
            fn from_value(value: #data_::Value) -> ::core::result::Result<Self, #error_> {
                #[allow(unused_mut, unused_variables)]
                let mut object = #data_::DynamicObject::expect(value, <Self as #data_::Describe>::CLASS)?;
                ::core::result::Result::Ok(#construct)
            }
        }
    }
}

/// The `PropertyMetadata` of a field.
fn property_expr(input: &MappedInput, field: &MappedField) -> TokenStream {
    let vl_serial_path = input.vl_serial_path();
    let data_ = crate::path::data_(vl_serial_path);
    let info_ = crate::path::info_(vl_serial_path);
    let attrs = &field.attrs;
    let name = field.ident.to_string();
    let ty = field.ty;

    let descriptor = match &attrs.descriptor {
        Some(text) => quote! { #info_::TypeDescriptor::parse(#text)? },
        None => quote! { <#ty as #data_::Typed>::type_descriptor() },
    };

    let mut chain = TokenStream::new();
    if let Some(rename) = &attrs.rename {
        chain.extend(quote! { .with_serialized_name(#rename) });
    }

    let flags: Vec<TokenStream> = [
        (attrs.read_only.is_some(), quote! { READ_ONLY }),
        (attrs.inline.is_some(), quote! { INLINE }),
        (attrs.xml_attribute.is_some(), quote! { XML_ATTRIBUTE }),
        (attrs.xml_value.is_some(), quote! { XML_VALUE }),
        (attrs.xml_cdata.is_some(), quote! { XML_CDATA }),
    ]
    .into_iter()
    .filter(|(set, _)| *set)
    .map(|(_, flag)| quote! { #info_::PropertyFlags::#flag })
    .collect();
    if !flags.is_empty() {
        chain.extend(quote! { .with_flags(#(#flags)|*) });
    }

    if !matches!(attrs.default, FieldDefault::None) {
        chain.extend(quote! { .optional() });
    }
    if !attrs.groups.is_empty() {
        let groups = &attrs.groups;
        chain.extend(quote! { .with_groups([#(#groups),*]) });
    }
    if let Some(since) = &attrs.since {
        chain.extend(quote! { .with_since(#since.parse::<#info_::Version>()?) });
    }
    if let Some(until) = &attrs.until {
        chain.extend(quote! { .with_until(#until.parse::<#info_::Version>()?) });
    }
    if let Some(xml) = &attrs.xml_collection {
        let entry = xml.entry.iter().map(|entry| {
            quote! { entry: ::std::borrow::Cow::Borrowed(#entry), }
        });
        let key = xml.key.iter().map(|key| {
            quote! { key_attribute: ::std::borrow::Cow::Borrowed(#key), }
        });
        let inline = xml.inline;
        chain.extend(quote! {
            .with_xml_collection(#info_::XmlCollection {
                #(#entry)*
                #(#key)*
                inline: #inline,
                ..#info_::XmlCollection::DEFAULT
            })
        });
    }

    quote! {
        #info_::PropertyMetadata::new(#name, #descriptor) #chain
    }
}
