//! Procedural macros for record field mapping
//!
//! This crate provides the `Record` derive and the `#[model]` attribute.
//! The derive replaces runtime field inspection with a schema table
//! generated at compile time.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

mod generation;
mod parsing;

use generation::generate_record_impl;
use parsing::parse_record;

/// Derive macro for the `Record` and `ModelTarget` traits
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Default, Record)]
/// #[table(name = "users")]
/// pub struct User {
///     #[primary_key]
///     pub id: i64,
///
///     #[tag(json = "name", protobuf = "user_name")]
///     pub name: String,
///
///     pub phone: String,
///
///     #[field(readonly)]
///     pub created_at: Option<String>,
///
///     #[field(skip)]
///     pub scratch: u32,
/// }
/// ```
#[proc_macro_derive(Record, attributes(table, primary_key, field, tag))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let info = match parse_record(&input.attrs, &input.data) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    generate_record_impl(&input, &info).into()
}

/// Convenience attribute macro that adds the derives a record usually needs
///
/// ```rust,ignore
/// #[model]
/// #[table(name = "users")]
/// pub struct User {
///     pub id: i64,
///     pub name: String,
/// }
/// ```
#[proc_macro_attribute]
pub fn model(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let expanded = quote! {
        #[derive(Debug, Clone, Default, ::store_object::Record)]
        #input
    };

    TokenStream::from(expanded)
}
