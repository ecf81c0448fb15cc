use proc_macro2::Span;
use syn::{Attribute, LitStr, meta::ParseNestedMeta};

use crate::SERIAL_ATTRIBUTE_NAME;

/// An XML namespace declared with `xml_namespace(prefix = "..", uri = "..")`.
#[derive(Debug)]
pub(crate) struct XmlNamespaceAttr {
    pub prefix: String,
    pub uri: LitStr,
}

/// Type level `#[serial(...)]` attributes.
#[derive(Default, Debug)]
pub(crate) struct TypeAttributes {
    pub class: Option<LitStr>,
    pub xml_root: Option<LitStr>,
    pub xml_namespaces: Vec<XmlNamespaceAttr>,
    pub auto_register: Option<Span>,
    pub discriminator: Option<LitStr>,
}

impl TypeAttributes {
    pub fn parse_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        for attr in attrs {
            if attr.path().is_ident(SERIAL_ATTRIBUTE_NAME) {
                attr.parse_nested_meta(|meta| this.parse_meta(meta))?;
            }
        }
        Ok(this)
    }

    fn parse_meta(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("class") {
            let class: LitStr = meta.value()?.parse()?;
            if class.value().trim().is_empty() {
                return Err(syn::Error::new(class.span(), "class id cannot be empty"));
            }
            self.class = Some(class);
            return Ok(());
        }

        if meta.path.is_ident("xml_root") {
            self.xml_root = Some(meta.value()?.parse()?);
            return Ok(());
        }

        if meta.path.is_ident("xml_namespace") {
            let mut prefix = String::new();
            let mut uri = None;
            meta.parse_nested_meta(|inner| {
                if inner.path.is_ident("prefix") {
                    prefix = inner.value()?.parse::<LitStr>()?.value();
                    Ok(())
                } else if inner.path.is_ident("uri") {
                    uri = Some(inner.value()?.parse::<LitStr>()?);
                    Ok(())
                } else {
                    Err(inner.error("expected `prefix` or `uri`"))
                }
            })?;
            let uri = uri.ok_or_else(|| meta.error("`xml_namespace` requires a `uri`"))?;
            self.xml_namespaces.push(XmlNamespaceAttr { prefix, uri });
            return Ok(());
        }

        if meta.path.is_ident("auto_register") {
            self.auto_register = Some(meta.path.require_ident()?.span());
            return Ok(());
        }

        if meta.path.is_ident("discriminator") {
            self.discriminator = Some(meta.value()?.parse()?);
            return Ok(());
        }

        Err(meta.error(
            "unknown type attribute, expected one of `class`, `xml_root`, \
             `xml_namespace`, `auto_register`, `discriminator`",
        ))
    }
}
