//! `#[derive(ValueEnum)]`: a unit-only enum usable as a scalar property.
//!
//! Values are stored by label. The derive registers `enum <-> String`
//! converters, so enum columns bind as text and read back from text or
//! PostgreSQL ENUM values.

use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Expr, ExprLit, Fields, Lit, Meta, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    let variants = match &input.data {
        Data::Enum(e) => &e.variants,
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "ValueEnum can only be derived for enums",
            ));
        }
    };
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "ValueEnum cannot be derived for generic enums",
        ));
    }

    let mut to_label = Vec::new();
    let mut from_label = Vec::new();
    let mut labels = Vec::new();
    for variant in variants {
        if !matches!(&variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "ValueEnum variants must be unit variants (no fields)",
            ));
        }

        let variant_ident = &variant.ident;
        let label =
            parse_rename(variant)?.unwrap_or_else(|| variant_ident.to_string().to_snake_case());
        if labels.contains(&label) {
            return Err(syn::Error::new_spanned(
                variant,
                format!("duplicate ValueEnum label {label:?}"),
            ));
        }

        to_label.push(quote! {
            #name::#variant_ident => #label,
        });
        from_label.push(quote! {
            #label => ::std::result::Result::Ok(#name::#variant_ident),
        });
        labels.push(label);
    }
    let type_name = name.to_string();

    Ok(quote! {
        impl ::relmap::Property for #name {
            fn collect<__R: 'static>(
                builder: &mut ::relmap::AccessorBuilder<__R>,
                path: &str,
                lens: ::relmap::Lens<__R, Self>,
                depth: usize,
            ) -> ::relmap::OrmResult<()> {
                builder.value(path, lens, depth)
            }

            fn collect_optional<__R: 'static>(
                builder: &mut ::relmap::AccessorBuilder<__R>,
                path: &str,
                lens: ::relmap::Lens<__R, ::std::option::Option<Self>>,
                depth: usize,
            ) -> ::relmap::OrmResult<()> {
                builder.nullable_value(path, lens, depth)
            }
        }

        impl ::relmap::IntoValue for #name {
            fn into_value(self) -> ::std::option::Option<::relmap::Value> {
                ::std::option::Option::Some(::relmap::Value::new(self))
            }
        }

        const _: () = {
            fn __relmap_converters() -> ::std::vec::Vec<::relmap::TypeConverter> {
                ::std::vec![
                    ::relmap::TypeConverter::new(
                        |value: #name| -> ::std::result::Result<::std::string::String, ::std::string::String> {
                            let label: &str = match value {
                                #(#to_label)*
                            };
                            ::std::result::Result::Ok(::std::string::String::from(label))
                        },
                    ),
                    ::relmap::TypeConverter::new(
                        |label: ::std::string::String| -> ::std::result::Result<#name, ::std::string::String> {
                            match label.as_str() {
                                #(#from_label)*
                                other => ::std::result::Result::Err(::std::format!(
                                    "unknown {} label {:?}",
                                    #type_name,
                                    other
                                )),
                            }
                        },
                    ),
                ]
            }

            ::relmap::inventory::submit! {
                ::relmap::ConverterRegistration { converters: __relmap_converters }
            }
        };
    })
}

/// Parse `#[orm(rename = "...")]` from a variant's attributes.
fn parse_rename(variant: &syn::Variant) -> Result<Option<String>> {
    for attr in &variant.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let nested = attr.parse_args_with(
            syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated,
        )?;
        for meta in &nested {
            if let Meta::NameValue(nv) = meta {
                if nv.path.is_ident("rename") {
                    if let Expr::Lit(ExprLit {
                        lit: Lit::Str(s), ..
                    }) = &nv.value
                    {
                        return Ok(Some(s.value()));
                    }
                }
            }
            return Err(syn::Error::new_spanned(meta, "expected `rename = \"...\"`"));
        }
    }
    Ok(None)
}
