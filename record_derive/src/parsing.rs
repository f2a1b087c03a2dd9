//! Parsing utilities for record attributes
//!
//! This module handles `#[table]`, `#[primary_key]`, `#[field]` and `#[tag]`
//! and validates the resulting column names.

use syn::{Attribute, Data, Error, Fields, Ident, LitStr, Result};

#[derive(Debug)]
pub struct FieldInfo {
    pub ident: Ident,
    pub column: String,
    pub readonly: bool,
    pub primary_key: bool,
    /// (vocabulary, column) pairs, e.g. ("json", "user_name")
    pub tags: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct RecordInfo {
    pub table: Option<String>,
    pub primary_key: Option<String>,
    pub fields: Vec<FieldInfo>,
}

/// Check if an attribute with the given name exists
pub fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

/// Letters, digits and underscores, not starting with a digit
fn validate_column_name(name: &str) -> std::result::Result<(), String> {
    let first_char = name
        .chars()
        .next()
        .ok_or_else(|| "Name cannot be empty".to_string())?;
    if first_char.is_ascii_digit() {
        return Err(format!("Name '{}' must not start with a digit", name));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!(
            "Name '{}' contains invalid characters: only alphanumeric characters and underscores are allowed",
            name
        ));
    }
    Ok(())
}

fn validated(lit: &LitStr) -> Result<String> {
    let value = lit.value();
    validate_column_name(&value).map_err(|e| Error::new(lit.span(), e))?;
    Ok(value)
}

pub fn parse_table_attribute(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut table = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("table")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().trim().is_empty() {
                    return Err(Error::new(lit.span(), "table name cannot be empty"));
                }
                table = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unsupported table attribute, expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(table)
}

fn parse_field(field: &syn::Field) -> Result<Option<FieldInfo>> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "Field must have a name"))?;
    let field_name = ident.to_string();
    let field_name = field_name.trim_start_matches("r#").to_string();

    let mut column = field_name.clone();
    let mut readonly = false;
    let mut skip = false;
    let mut tags = Vec::new();

    for attr in &field.attrs {
        if attr.path().is_ident("field") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let lit: LitStr = meta.value()?.parse()?;
                    column = validated(&lit)?;
                    Ok(())
                } else if meta.path.is_ident("readonly") {
                    readonly = true;
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported field attribute, expected `name`, `readonly` or `skip`"))
                }
            })?;
        } else if attr.path().is_ident("tag") {
            attr.parse_nested_meta(|meta| {
                let vocabulary = meta
                    .path
                    .get_ident()
                    .ok_or_else(|| meta.error("expected a tag name such as `json`"))?
                    .to_string();
                let lit: LitStr = meta.value()?.parse()?;
                tags.push((vocabulary, validated(&lit)?));
                Ok(())
            })?;
        }
    }

    if skip {
        return Ok(None);
    }

    Ok(Some(FieldInfo {
        ident,
        column,
        readonly,
        primary_key: has_attribute(&field.attrs, "primary_key"),
        tags,
    }))
}

pub fn parse_record(attrs: &[Attribute], data: &Data) -> Result<RecordInfo> {
    let table = parse_table_attribute(attrs)?;

    let named = match data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(named) => named,
            _ => {
                return Err(Error::new(
                    proc_macro2::Span::call_site(),
                    "Record requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                proc_macro2::Span::call_site(),
                "Record can only be derived for structs",
            ))
        }
    };

    let mut fields = Vec::new();
    for field in &named.named {
        if let Some(info) = parse_field(field)? {
            if fields.iter().any(|f: &FieldInfo| f.column == info.column) {
                return Err(Error::new_spanned(
                    field,
                    format!("column '{}' is mapped twice", info.column),
                ));
            }
            fields.push(info);
        }
    }

    let marked: Vec<&FieldInfo> = fields.iter().filter(|f| f.primary_key).collect();
    let primary_key = match marked.as_slice() {
        [] => fields.iter().find(|f| f.column == "id").map(|f| f.column.clone()),
        [single] => Some(single.column.clone()),
        [_, second, ..] => {
            return Err(Error::new(
                second.ident.span(),
                "only one field can be marked #[primary_key]",
            ))
        }
    };

    Ok(RecordInfo {
        table,
        primary_key,
        fields,
    })
}
