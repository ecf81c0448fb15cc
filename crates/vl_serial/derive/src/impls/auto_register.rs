use proc_macro2::TokenStream;

use crate::derive_data::MappedInput;

/// Generate `auto_register` implementation
#[cfg(feature = "auto_register")]
pub(crate) fn get_auto_register_impl(input: &MappedInput) -> TokenStream {
    use quote::quote_spanned;

    let Some(span) = input.attrs().auto_register else {
        return TokenStream::new();
    };
    let macro_exports_ = crate::path::macro_exports_(input.vl_serial_path());
    let ident = input.ident();

    quote_spanned! { span =>
        #macro_exports_::inventory::submit! {
            #macro_exports_::AutoRegistration(#macro_exports_::register_class::<#ident>)
        }
    }
}

/// Generate `auto_register` implementation
#[cfg(not(feature = "auto_register"))]
pub(crate) fn get_auto_register_impl(_: &MappedInput) -> TokenStream {
    TokenStream::new()
}
