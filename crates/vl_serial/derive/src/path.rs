//! Paths of the `vl_serial` items generated code refers to.

use proc_macro2::TokenStream;
use quote::quote;

/// Get the correct access path to the `vl_serial` crate.
///
/// 1. For crates that depend on `vl_serial`, `::vl_serial` is returned.
/// 2. For crates that depend on `vellum`, `::vellum::serial` is returned.
/// 3. For other situations, `::vl_serial` is returned, which may be incorrect.
///
/// Reading the manifest is not cheap, so the path is resolved once per
/// derive and passed around.
pub(crate) fn vl_serial() -> syn::Path {
    vl_macro_utils::Manifest::shared(|manifest| manifest.get_crate_path("vl_serial"))
}

#[inline(always)]
pub(crate) fn data_(vl_serial_path: &syn::Path) -> TokenStream {
    quote! {
        #vl_serial_path::data
    }
}

#[inline(always)]
pub(crate) fn info_(vl_serial_path: &syn::Path) -> TokenStream {
    quote! {
        #vl_serial_path::info
    }
}

#[inline(always)]
pub(crate) fn catalog_(vl_serial_path: &syn::Path) -> TokenStream {
    quote! {
        #vl_serial_path::metadata::ClassCatalog
    }
}

#[inline(always)]
pub(crate) fn error_(vl_serial_path: &syn::Path) -> TokenStream {
    quote! {
        #vl_serial_path::Error
    }
}

#[cfg(feature = "auto_register")]
#[inline(always)]
pub(crate) fn macro_exports_(vl_serial_path: &syn::Path) -> TokenStream {
    quote! {
        #vl_serial_path::__macro_exports
    }
}
