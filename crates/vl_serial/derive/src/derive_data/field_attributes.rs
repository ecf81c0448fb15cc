use proc_macro2::Span;
use syn::{Attribute, ExprPath, LitStr, Token, meta::ParseNestedMeta, parenthesized, punctuated::Punctuated};

use crate::SERIAL_ATTRIBUTE_NAME;

/// How a field is rebuilt when the input omits it.
#[derive(Default, Debug)]
pub(crate) enum FieldDefault {
    /// Absent optional fields become `None`, anything else is an error.
    #[default]
    None,
    /// `Default::default()`.
    Trait,
    /// A user function.
    Path(ExprPath),
}

/// `xml_list(..)` or `xml_map(..)`.
#[derive(Default, Debug)]
pub(crate) struct XmlCollectionAttr {
    pub entry: Option<LitStr>,
    pub inline: bool,
    pub key: Option<LitStr>,
}

/// Field level `#[serial(...)]` attributes.
#[derive(Default, Debug)]
pub(crate) struct FieldAttributes {
    pub rename: Option<LitStr>,
    pub descriptor: Option<LitStr>,
    pub groups: Vec<LitStr>,
    pub since: Option<LitStr>,
    pub until: Option<LitStr>,
    pub skip: Option<Span>,
    pub read_only: Option<Span>,
    pub inline: Option<Span>,
    pub default: FieldDefault,
    pub xml_attribute: Option<Span>,
    pub xml_value: Option<Span>,
    pub xml_cdata: Option<Span>,
    pub xml_collection: Option<XmlCollectionAttr>,
}

impl FieldAttributes {
    pub fn parse_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        for attr in attrs {
            if attr.path().is_ident(SERIAL_ATTRIBUTE_NAME) {
                attr.parse_nested_meta(|meta| this.parse_meta(meta))?;
            }
        }
        this.validity()?;
        Ok(this)
    }

    fn parse_meta(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        let span = meta.path.require_ident()?.span();

        if meta.path.is_ident("rename") {
            self.rename = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("type") {
            self.descriptor = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("groups") {
            let content;
            parenthesized!(content in meta.input);
            let groups = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
            self.groups.extend(groups);
        } else if meta.path.is_ident("since") {
            self.since = Some(parse_version(&meta)?);
        } else if meta.path.is_ident("until") {
            self.until = Some(parse_version(&meta)?);
        } else if meta.path.is_ident("skip") {
            self.skip = Some(span);
        } else if meta.path.is_ident("read_only") {
            self.read_only = Some(span);
        } else if meta.path.is_ident("inline") {
            self.inline = Some(span);
        } else if meta.path.is_ident("default") {
            self.default = if meta.input.peek(Token![=]) {
                let path: LitStr = meta.value()?.parse()?;
                FieldDefault::Path(path.parse()?)
            } else {
                FieldDefault::Trait
            };
        } else if meta.path.is_ident("xml_attribute") {
            self.xml_attribute = Some(span);
        } else if meta.path.is_ident("xml_value") {
            self.xml_value = Some(span);
        } else if meta.path.is_ident("xml_cdata") {
            self.xml_cdata = Some(span);
        } else if meta.path.is_ident("xml_list") || meta.path.is_ident("xml_map") {
            let is_map = meta.path.is_ident("xml_map");
            let collection = self.xml_collection.get_or_insert_with(XmlCollectionAttr::default);
            if meta.input.is_empty() || meta.input.peek(Token![,]) {
                return Ok(());
            }
            meta.parse_nested_meta(|inner| {
                if inner.path.is_ident("entry") {
                    collection.entry = Some(inner.value()?.parse()?);
                } else if inner.path.is_ident("inline") {
                    collection.inline = true;
                } else if is_map && inner.path.is_ident("key") {
                    collection.key = Some(inner.value()?.parse()?);
                } else if is_map {
                    return Err(inner.error("expected `entry`, `inline` or `key`"));
                } else {
                    return Err(inner.error("expected `entry` or `inline`"));
                }
                Ok(())
            })?;
        } else {
            return Err(meta.error(
                "unknown field attribute, expected one of `rename`, `type`, `groups`, \
                 `since`, `until`, `skip`, `read_only`, `inline`, `default`, \
                 `xml_attribute`, `xml_value`, `xml_cdata`, `xml_list`, `xml_map`",
            ));
        }
        Ok(())
    }

    fn validity(&self) -> syn::Result<()> {
        if let (Some(_), Some(span)) = (self.skip, self.inline) {
            return Err(syn::Error::new(span, "a skipped field cannot be inline"));
        }
        if let (Some(_), Some(span)) = (self.xml_attribute, self.xml_value) {
            return Err(syn::Error::new(
                span,
                "`xml_attribute` and `xml_value` are mutually exclusive",
            ));
        }
        if let (Some(span), Some(_)) = (self.inline, &self.descriptor) {
            return Err(syn::Error::new(span, "an inline field cannot override its type"));
        }
        Ok(())
    }
}

/// Parses a dotted numeric version such as `"1.2"`.
fn parse_version(meta: &ParseNestedMeta) -> syn::Result<LitStr> {
    let version: LitStr = meta.value()?.parse()?;
    let text = version.value();
    let valid = !text.trim().is_empty()
        && text.trim().split('.').all(|part| part.parse::<u64>().is_ok());
    if !valid {
        return Err(syn::Error::new(version.span(), format!("invalid version `{text}`")));
    }
    Ok(version)
}
