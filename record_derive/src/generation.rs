//! Code generation for the Record derive
//!
//! Emits the static schema, value extraction, row assignment and the
//! `ModelTarget` impl that lets a record be attached to an operation chain.

use crate::parsing::RecordInfo;
use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

pub fn generate_record_impl(input: &DeriveInput, info: &RecordInfo) -> TokenStream {
    let name = &input.ident;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let table = match &info.table {
        Some(table) => quote! { ::core::option::Option::Some(#table) },
        None => quote! { ::core::option::Option::None },
    };
    let primary_key = match &info.primary_key {
        Some(pk) => quote! { ::core::option::Option::Some(#pk) },
        None => quote! { ::core::option::Option::None },
    };

    let field_schemas = info.fields.iter().map(|f| {
        let field = f.ident.to_string();
        let column = &f.column;
        let readonly = f.readonly;
        let tags = f.tags.iter().map(|(k, v)| quote! { (#k, #v) });
        quote! {
            ::store_object::FieldSchema {
                field: #field,
                column: #column,
                readonly: #readonly,
                tags: &[#(#tags),*],
            }
        }
    });

    let encoders = info.fields.iter().map(|f| {
        let ident = &f.ident;
        let field = ident.to_string();
        quote! { ::store_object::record::encode_field(&self.#ident, #field)? }
    });

    let assigners = info.fields.iter().enumerate().map(|(index, f)| {
        let ident = &f.ident;
        let field = ident.to_string();
        quote! {
            if let ::core::option::Option::Some(value) = columns
                .get(#index)
                .and_then(|column| ::store_object::record::lookup(row, column))
            {
                self.#ident = ::store_object::record::decode_field(value, #field)?;
                assigned += 1;
            }
        }
    });

    let table_const = info.table.as_ref().map(|table| {
        quote! {
            impl #impl_generics #name #ty_generics #where_clause {
                pub const TABLE_NAME: &'static str = #table;
            }
        }
    });

    quote! {
        impl #impl_generics ::store_object::Record for #name #ty_generics #where_clause {
            fn schema() -> &'static ::store_object::RecordSchema {
                static SCHEMA: ::store_object::RecordSchema = ::store_object::RecordSchema {
                    type_name: #type_name,
                    table: #table,
                    primary_key: #primary_key,
                    fields: &[#(#field_schemas),*],
                };
                &SCHEMA
            }

            fn to_values(
                &self,
            ) -> ::core::result::Result<
                ::std::vec::Vec<::store_object::serde_json::Value>,
                ::store_object::RecordError,
            > {
                ::core::result::Result::Ok(::std::vec![#(#encoders),*])
            }

            fn assign(
                &mut self,
                row: &::store_object::Row,
                columns: &[::std::string::String],
            ) -> ::core::result::Result<usize, ::store_object::RecordError> {
                let mut assigned = 0usize;
                #(#assigners)*
                ::core::result::Result::Ok(assigned)
            }
        }

        impl #impl_generics ::store_object::ModelTarget for #name #ty_generics #where_clause {
            fn model_kind(&self) -> ::store_object::ModelKind {
                ::store_object::ModelKind::Single
            }

            fn record_schema(&self) -> ::core::option::Option<&'static ::store_object::RecordSchema> {
                ::core::option::Option::Some(<Self as ::store_object::Record>::schema())
            }

            fn current_values(
                &self,
            ) -> ::core::result::Result<
                ::core::option::Option<::std::vec::Vec<::store_object::serde_json::Value>>,
                ::store_object::RecordError,
            > {
                <Self as ::store_object::Record>::to_values(self).map(::core::option::Option::Some)
            }

            fn load_rows(
                &mut self,
                rows: ::std::vec::Vec<::store_object::Row>,
                columns: &[::std::string::String],
            ) -> ::core::result::Result<u64, ::store_object::RecordError> {
                ::store_object::record::load_single(self, rows, columns)
            }
        }

        #table_const
    }
}
