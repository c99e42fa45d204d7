//! `#[derive(Record)]` and `#[derive(Entity)]`.

use crate::attrs::{self, EntityAttrs};
use crate::common::syn_types::option_inner;
use heck::{ToSnakeCase, ToUpperCamelCase};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Result};

/// The `Property` impl registering every named field of the struct.
fn property_impl(input: &DeriveInput, derive: &str) -> Result<TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            format!("{derive} cannot be derived for generic types"),
        ));
    }
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    format!("{derive} can only be derived for structs with named fields"),
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs"),
            ));
        }
    };

    let mut collect = Vec::new();
    for field in fields {
        let Some(ident) = &field.ident else {
            continue;
        };
        let ty = &field.ty;
        if option_inner(ty).and_then(option_inner).is_some() {
            return Err(syn::Error::new_spanned(ty, "nested Option properties are not supported"));
        }
        let field_name = ident.to_string();
        let column = attrs::parse_field(field)?;
        let tag = (!column.is_empty()).then(|| {
            let meta = column.to_tokens();
            quote!(builder.tag(&field_path, #meta);)
        });
        collect.push(quote! {
            {
                let field_path = ::relmap::join_path(path, #field_name);
                #tag
                <#ty as ::relmap::Property>::collect(
                    builder,
                    &field_path,
                    lens.field(|s: &Self| &s.#ident, |s: &mut Self| &mut s.#ident),
                    depth + 1,
                )?;
            }
        });
    }

    Ok(quote! {
        impl ::relmap::Property for #name {
            const RECORD: bool = true;

            fn collect<__R: 'static>(
                builder: &mut ::relmap::AccessorBuilder<__R>,
                path: &str,
                lens: ::relmap::Lens<__R, Self>,
                depth: usize,
            ) -> ::relmap::OrmResult<()> {
                builder.record(path, lens.clone(), depth)?;
                #(#collect)*
                ::std::result::Result::Ok(())
            }

            fn collect_optional<__R: 'static>(
                builder: &mut ::relmap::AccessorBuilder<__R>,
                path: &str,
                lens: ::relmap::Lens<__R, ::std::option::Option<Self>>,
                depth: usize,
            ) -> ::relmap::OrmResult<()> {
                builder.optional_record(path, lens.clone(), depth)?;
                <Self as ::relmap::Property>::collect(builder, path, lens.some(), depth)
            }
        }
    })
}

pub fn expand_record(input: DeriveInput) -> Result<TokenStream> {
    attrs::parse_record(&input)?;
    property_impl(&input, "Record")
}

fn hook_method(hook: &syn::Ident) -> TokenStream {
    let method = format_ident!("as_{}", hook);
    let name = hook.to_string();
    if name == "post_delete" {
        return quote! {
            fn as_post_delete(&self) -> ::std::option::Option<&dyn ::relmap::PostDelete> {
                ::std::option::Option::Some(self)
            }
        };
    }
    let trait_name = format_ident!("{}", name.to_upper_camel_case());
    quote! {
        fn #method(&mut self) -> ::std::option::Option<&mut dyn ::relmap::#trait_name> {
            ::std::option::Option::Some(self)
        }
    }
}

pub fn expand_entity(input: DeriveInput) -> Result<TokenStream> {
    let EntityAttrs {
        table,
        table_from,
        properties,
        hooks,
    } = attrs::parse_entity(&input)?;
    let property = property_impl(&input, "Entity")?;
    let name = &input.ident;

    let table_name = match (table, table_from) {
        (Some(table), _) => quote!(::std::string::String::from(#table)),
        (None, Some(parent)) => quote!(<#parent as ::relmap::Entity>::table_name()),
        (None, None) => {
            let table = name.to_string().to_snake_case();
            quote!(::std::string::String::from(#table))
        }
    };

    let overrides = (!properties.is_empty()).then(|| {
        let entries = properties.iter().map(|(path, column)| {
            let meta = column.to_tokens();
            quote!((#path, #meta))
        });
        quote! {
            fn overrides() -> ::std::vec::Vec<(&'static str, ::relmap::FieldMeta)> {
                ::std::vec![#(#entries),*]
            }
        }
    });
    let hooks = hooks.iter().map(hook_method);

    Ok(quote! {
        #property

        impl ::relmap::Entity for #name {
            fn table_name() -> ::std::string::String {
                #table_name
            }

            #overrides

            #(#hooks)*
        }
    })
}
