//! Derive macros for relmap
//!
//! Provides `#[derive(Record)]`, `#[derive(Entity)]` and `#[derive(ValueEnum)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod common;
mod entity;
mod value_enum;

/// Derive `Property` for a struct whose fields become nested property paths.
///
/// # Example
///
/// ```ignore
/// use relmap::Record;
///
/// #[derive(Record, Debug, Default, Clone, PartialEq)]
/// struct Name {
///     #[orm(column = "firstName")]
///     first: String,
///     last: String,
/// }
/// ```
///
/// # Field attributes
///
/// - `#[orm(column = "name")]` - Map the field to a different column name
/// - `#[orm(column_type = "jsonb")]` - Cast bound values to a declared column type
/// - `#[orm(key)]` - Mark the field as part of the identity
/// - `#[orm(select = false)]`, `insert`, `update` - Leave the column out of a statement
/// - `#[orm(select_expr = "lower({})")]`, `insert_expr`, `update_expr` - Custom SQL
/// - `#[orm(transient)]` - Keep the field in the accessor but not in the column list
#[proc_macro_derive(Record, attributes(orm))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand_record(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `Property` and `Entity` for a struct mapped to a table.
///
/// # Example
///
/// ```ignore
/// use relmap::Entity;
///
/// #[derive(Entity, Debug, Default, Clone, PartialEq)]
/// #[orm(table = "person", hooks(pre_store))]
/// #[orm(property(path = "name.first", column = "first_name"))]
/// struct Person {
///     #[orm(key)]
///     id: i64,
///     name: Name,
///     age: Option<i32>,
/// }
/// ```
///
/// # Struct attributes
///
/// - `#[orm(table = "schema.name")]` - Table name (defaults to the snake_case type name)
/// - `#[orm(table_from = Parent)]` - Use the table of another entity
/// - `#[orm(property(path = "a.b", ...))]` - Override metadata of a nested property
/// - `#[orm(hooks(pre_store, pre_insert, post_insert, post_update, post_delete, post_load))]`
///
/// Field attributes are the same as for `Record`.
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand_entity(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive scalar support for a unit-only enum stored by label.
///
/// # Example
///
/// ```ignore
/// use relmap::ValueEnum;
///
/// #[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
/// enum Status {
///     Active,
///     #[orm(rename = "on_hold")]
///     Paused,
/// }
/// ```
///
/// Labels default to the snake_case variant name.
#[proc_macro_derive(ValueEnum, attributes(orm))]
pub fn derive_value_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    value_enum::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
