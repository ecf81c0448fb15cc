//! Code generation for `#[derive(Mapped)]`.

use proc_macro2::TokenStream;
use quote::quote;

use crate::derive_data::{MappedInput, MappedKind};

// -----------------------------------------------------------------------------
// Modules

mod auto_register;
mod enum_kind;
mod struct_kind;

// -----------------------------------------------------------------------------
// Entry

pub(crate) fn impl_mapped(input: &MappedInput) -> TokenStream {
    let body = match input.kind() {
        MappedKind::Struct { fields, unit } => struct_kind::impl_struct(input, fields, *unit),
        MappedKind::Enum { variants } => enum_kind::impl_enum(input, variants),
    };
    let common = impl_common(input);
    let auto_register = auto_register::get_auto_register_impl(input);

    quote! {
        #common
        #body
        #auto_register
    }
}

// -----------------------------------------------------------------------------
// Shared impls

/// `Data` and `Typed`, identical for structs and enums.
fn impl_common(input: &MappedInput) -> TokenStream {
    let vl_serial_path = input.vl_serial_path();
    let data_ = crate::path::data_(vl_serial_path);
    let info_ = crate::path::info_(vl_serial_path);
    let catalog_ = crate::path::catalog_(vl_serial_path);
    let ident = input.ident();

    quote! {
        impl #data_::Data for #ident {
            #[inline]
            fn data_ref(&self) -> #data_::DataRef<'_> {
                #data_::DataRef::Object(self)
            }
        }

        impl #data_::Typed for #ident {
            #[inline]
            fn type_descriptor() -> #info_::TypeDescriptor {
                #info_::TypeDescriptor::Object(<Self as #data_::Describe>::class())
            }

            #[inline]
            fn register_classes(catalog: &mut #catalog_) {
                catalog.register::<Self>();
            }
        }
    }
}

/// The `CLASS` constant: the declared id or `module::path::Type`.
fn class_expr(input: &MappedInput) -> TokenStream {
    match &input.attrs().class {
        Some(class) => quote! { #class },
        None => {
            let name = input.ident().to_string();
            quote! { ::core::concat!(::core::module_path!(), "::", #name) }
        }
    }
}

/// `ClassMetadata::new(..)` with the XML class options.
fn class_metadata_expr(input: &MappedInput) -> TokenStream {
    let info_ = crate::path::info_(input.vl_serial_path());
    let data_ = crate::path::data_(input.vl_serial_path());
    let attrs = input.attrs();

    let xml_root = attrs.xml_root.iter().map(|root| quote! { .with_xml_root(#root) });
    let xml_namespaces = attrs.xml_namespaces.iter().map(|namespace| {
        let prefix = &namespace.prefix;
        let uri = &namespace.uri;
        quote! { .with_xml_namespace(#prefix, #uri) }
    });

    quote! {
        #info_::ClassMetadata::new(<Self as #data_::Describe>::class())
            #(#xml_root)*
            #(#xml_namespaces)*
    }
}
