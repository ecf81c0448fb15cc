use proc_macro2::TokenStream;
use quote::quote;

use crate::derive_data::{MappedInput, MappedVariant};

const DEFAULT_DISCRIMINATOR: &str = "type";

pub(crate) fn impl_enum(input: &MappedInput, variants: &[MappedVariant]) -> TokenStream {
    let vl_serial_path = input.vl_serial_path();
    let data_ = crate::path::data_(vl_serial_path);
    let info_ = crate::path::info_(vl_serial_path);
    let catalog_ = crate::path::catalog_(vl_serial_path);
    let error_ = crate::path::error_(vl_serial_path);
    let ident = input.ident();

    let class = super::class_expr(input);
    let class_metadata = super::class_metadata_expr(input);
    let field = input
        .attrs()
        .discriminator
        .as_ref()
        .map_or_else(|| DEFAULT_DISCRIMINATOR.to_owned(), syn::LitStr::value);

    let variant_idents: Vec<_> = variants.iter().map(|variant| variant.ident).collect();
    let variant_types: Vec<_> = variants.iter().map(|variant| variant.ty).collect();
    let tags = variants.iter().map(|variant| &variant.tag);

    quote! {
        impl #data_::Mapped for #ident {
            fn class_id(&self) -> #info_::ClassId {
                match self {
                    #(Self::#variant_idents(inner) => #data_::Mapped::class_id(inner),)*
                }
            }

            fn property(&self, name: &str) -> ::core::option::Option<&dyn #data_::Data> {
                match self {
                    #(Self::#variant_idents(inner) => #data_::Mapped::property(inner, name),)*
                }
            }
        }

        impl #data_::Describe for #ident {
            const CLASS: &'static str = #class;

            fn describe() -> ::core::result::Result<#info_::ClassMetadata, #error_> {
                let discriminator = #info_::Discriminator::new(#field)
                    #(.with_class(#tags, <#variant_types as #data_::Describe>::class()))*;
                ::core::result::Result::Ok(#class_metadata.with_discriminator(discriminator))
            }

            fn register_dependencies(catalog: &mut #catalog_) {
                #(<#variant_types as #data_::Typed>::register_classes(catalog);)*
            }
        }

        impl #data_::FromValue for #ident {
            fn from_value(value: #data_::Value) -> ::core::result::Result<Self, #error_> {
                let class = match &value {
                    #data_::Value::Object(object) => object.class().clone(),
                    other => return ::core::result::Result::Err(other.mismatch(<Self as #data_::Describe>::CLASS)),
                };
                #(
                    if class == <#variant_types as #data_::Describe>::CLASS {
                        return <#variant_types as #data_::FromValue>::from_value(value).map(Self::#variant_idents);
                    }
                )*
                ::core::result::Result::Err(#error_::mismatch(
                    "$",
                    ::std::format!("a subclass of `{}`", <Self as #data_::Describe>::CLASS),
                    class.to_string(),
                ))
            }
        }
    }
}
