//! Parsing of struct-level and field-level `#[orm(...)]` attributes.

use proc_macro2::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{Attribute, DeriveInput, Expr, ExprLit, Field, Lit, Meta, Result, Token};

/// How a column takes part in one statement kind.
pub(crate) enum OpAttr {
    Include(bool),
    Expr(String),
}

impl OpAttr {
    fn to_tokens(&self) -> TokenStream {
        match self {
            OpAttr::Include(true) => quote!(::relmap::OpExpr::Plain),
            OpAttr::Include(false) => quote!(::relmap::OpExpr::Excluded),
            OpAttr::Expr(sql) => quote!(::relmap::OpExpr::Custom(::std::string::String::from(#sql))),
        }
    }
}

/// Column metadata given on a field or in a struct-level `property(...)`.
#[derive(Default)]
pub(crate) struct ColumnAttrs {
    pub key: bool,
    pub column: Option<String>,
    pub column_type: Option<String>,
    pub select: Option<OpAttr>,
    pub insert: Option<OpAttr>,
    pub update: Option<OpAttr>,
    pub transient: bool,
}

impl ColumnAttrs {
    pub fn is_empty(&self) -> bool {
        !self.key
            && !self.transient
            && self.column.is_none()
            && self.column_type.is_none()
            && self.select.is_none()
            && self.insert.is_none()
            && self.update.is_none()
    }

    /// Apply one meta item; `Ok(false)` if it is not a column attribute.
    fn apply(&mut self, meta: &Meta) -> Result<bool> {
        match meta {
            Meta::Path(path) if path.is_ident("key") => self.key = true,
            Meta::Path(path) if path.is_ident("transient") => self.transient = true,
            Meta::NameValue(nv) if nv.path.is_ident("column") => {
                self.column = Some(lit_str(&nv.value)?);
            }
            Meta::NameValue(nv) if nv.path.is_ident("column_type") => {
                self.column_type = Some(lit_str(&nv.value)?);
            }
            Meta::NameValue(nv) => {
                let Some(ident) = nv.path.get_ident() else {
                    return Ok(false);
                };
                let name = ident.to_string();
                let (slot, value) = match name.as_str() {
                    "select" => (&mut self.select, OpAttr::Include(lit_bool(&nv.value)?)),
                    "insert" => (&mut self.insert, OpAttr::Include(lit_bool(&nv.value)?)),
                    "update" => (&mut self.update, OpAttr::Include(lit_bool(&nv.value)?)),
                    "select_expr" => (&mut self.select, OpAttr::Expr(lit_str(&nv.value)?)),
                    "insert_expr" => (&mut self.insert, OpAttr::Expr(lit_str(&nv.value)?)),
                    "update_expr" => (&mut self.update, OpAttr::Expr(lit_str(&nv.value)?)),
                    _ => return Ok(false),
                };
                if slot.is_some() {
                    return Err(syn::Error::new_spanned(
                        nv,
                        format!("`{name}` conflicts with an earlier attribute for the same statement"),
                    ));
                }
                *slot = Some(value);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// A `::relmap::FieldMeta` builder expression.
    pub fn to_tokens(&self) -> TokenStream {
        let mut calls = Vec::new();
        if let Some(column) = &self.column {
            calls.push(quote!(.column(#column)));
        }
        if let Some(ty) = &self.column_type {
            calls.push(quote!(.column_type(#ty)));
        }
        if self.key {
            calls.push(quote!(.key(true)));
        }
        if let Some(op) = &self.select {
            let op = op.to_tokens();
            calls.push(quote!(.select(#op)));
        }
        if let Some(op) = &self.insert {
            let op = op.to_tokens();
            calls.push(quote!(.insert(#op)));
        }
        if let Some(op) = &self.update {
            let op = op.to_tokens();
            calls.push(quote!(.update(#op)));
        }
        if self.transient {
            calls.push(quote!(.transient(true)));
        }
        quote!(::relmap::FieldMeta::new() #(#calls)*)
    }
}

/// Struct-level attributes of `#[derive(Entity)]`.
#[derive(Default)]
pub(crate) struct EntityAttrs {
    pub table: Option<String>,
    pub table_from: Option<syn::Path>,
    pub properties: Vec<(String, ColumnAttrs)>,
    pub hooks: Vec<syn::Ident>,
}

pub(crate) const HOOKS: &[&str] = &[
    "pre_store",
    "pre_insert",
    "post_insert",
    "post_update",
    "post_delete",
    "post_load",
];

/// Every meta item inside the `#[orm(...)]` attributes of `attrs`.
fn orm_metas(attrs: &[Attribute]) -> Result<Vec<Meta>> {
    let mut metas = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let nested = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
        metas.extend(nested);
    }
    Ok(metas)
}

fn lit_str(value: &Expr) -> Result<String> {
    if let Expr::Lit(ExprLit {
        lit: Lit::Str(s), ..
    }) = value
    {
        return Ok(s.value());
    }
    Err(syn::Error::new_spanned(value, "expected a string literal"))
}

fn lit_bool(value: &Expr) -> Result<bool> {
    if let Expr::Lit(ExprLit {
        lit: Lit::Bool(b), ..
    }) = value
    {
        return Ok(b.value);
    }
    Err(syn::Error::new_spanned(value, "expected `true` or `false`"))
}

pub(crate) fn parse_field(field: &Field) -> Result<ColumnAttrs> {
    let mut attrs = ColumnAttrs::default();
    for meta in orm_metas(&field.attrs)? {
        if !attrs.apply(&meta)? {
            return Err(syn::Error::new_spanned(meta, "unknown field attribute"));
        }
    }
    Ok(attrs)
}

/// Rejects struct-level attributes on types that are not entities.
pub(crate) fn parse_record(input: &DeriveInput) -> Result<()> {
    if let Some(meta) = orm_metas(&input.attrs)?.into_iter().next() {
        return Err(syn::Error::new_spanned(
            meta,
            "struct-level #[orm(...)] attributes require #[derive(Entity)]",
        ));
    }
    Ok(())
}

pub(crate) fn parse_entity(input: &DeriveInput) -> Result<EntityAttrs> {
    let mut attrs = EntityAttrs::default();
    for meta in orm_metas(&input.attrs)? {
        match &meta {
            Meta::NameValue(nv) if nv.path.is_ident("table") => {
                attrs.table = Some(lit_str(&nv.value)?);
            }
            Meta::NameValue(nv) if nv.path.is_ident("table_from") => {
                let Expr::Path(path) = &nv.value else {
                    return Err(syn::Error::new_spanned(&nv.value, "expected an entity type"));
                };
                attrs.table_from = Some(path.path.clone());
            }
            Meta::List(list) if list.path.is_ident("property") => {
                let nested = list.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
                let mut path = None;
                let mut column = ColumnAttrs::default();
                for item in &nested {
                    match item {
                        Meta::NameValue(nv) if nv.path.is_ident("path") => {
                            path = Some(lit_str(&nv.value)?);
                        }
                        _ => {
                            if !column.apply(item)? {
                                return Err(syn::Error::new_spanned(item, "unknown property attribute"));
                            }
                        }
                    }
                }
                let Some(path) = path else {
                    return Err(syn::Error::new_spanned(list, "property(...) requires `path = \"...\"`"));
                };
                attrs.properties.push((path, column));
            }
            Meta::List(list) if list.path.is_ident("hooks") => {
                let nested = list.parse_args_with(Punctuated::<syn::Ident, Token![,]>::parse_terminated)?;
                for hook in nested {
                    if !HOOKS.contains(&hook.to_string().as_str()) {
                        return Err(syn::Error::new_spanned(
                            &hook,
                            format!("unknown hook; expected one of {}", HOOKS.join(", ")),
                        ));
                    }
                    attrs.hooks.push(hook);
                }
            }
            _ => return Err(syn::Error::new_spanned(meta, "unknown entity attribute")),
        }
    }
    if attrs.table.is_some() && attrs.table_from.is_some() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "`table` and `table_from` cannot be combined",
        ));
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn field_attributes() {
        let field: Field = parse_quote! {
            #[orm(key, column = "person_id", update = true, select_expr = "lower({})")]
            id: i64
        };
        let attrs = parse_field(&field).unwrap();
        assert!(attrs.key);
        assert_eq!(attrs.column.as_deref(), Some("person_id"));
        assert!(matches!(attrs.update, Some(OpAttr::Include(true))));
        assert!(matches!(attrs.select, Some(OpAttr::Expr(ref s)) if s == "lower({})"));
        assert!(attrs.insert.is_none());
    }

    #[test]
    fn conflicting_statement_attributes() {
        let field: Field = parse_quote! {
            #[orm(select = false, select_expr = "now()")]
            at: i64
        };
        assert!(parse_field(&field).is_err());
    }

    #[test]
    fn entity_attributes() {
        let input: DeriveInput = parse_quote! {
            #[orm(table = "app.person", hooks(pre_store, post_load))]
            #[orm(property(path = "name.first", column = "firstName"))]
            struct Person {}
        };
        let attrs = parse_entity(&input).unwrap();
        assert_eq!(attrs.table.as_deref(), Some("app.person"));
        assert_eq!(attrs.hooks.len(), 2);
        assert_eq!(attrs.properties.len(), 1);
        assert_eq!(attrs.properties[0].0, "name.first");
        assert_eq!(attrs.properties[0].1.column.as_deref(), Some("firstName"));
    }

    #[test]
    fn unknown_hook_is_rejected() {
        let input: DeriveInput = parse_quote! {
            #[orm(hooks(pre_flight))]
            struct Person {}
        };
        assert!(parse_entity(&input).is_err());
    }

    #[test]
    fn table_and_table_from_conflict() {
        let input: DeriveInput = parse_quote! {
            #[orm(table = "a", table_from = Parent)]
            struct Child {}
        };
        assert!(parse_entity(&input).is_err());
    }
}
