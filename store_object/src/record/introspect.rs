//! Model introspection
//!
//! Builds the per-operation field dictionary from a record's static schema.

use super::{FieldDictionary, ModelKind, ModelTarget};
use crate::errors::RecordError;

/// Caller-supplied adjustments to a schema
#[derive(Debug, Clone, Copy, Default)]
pub struct IntrospectOptions<'a> {
    /// Tag vocabularies consulted before the column name, in order
    pub tags: &'a [String],
    /// Columns to leave out of the dictionary
    pub excluded: &'a [String],
    /// Columns to treat as read-only
    pub readonly: &'a [String],
}

#[derive(Debug, Clone, Default)]
pub struct Introspection {
    pub kind: ModelKind,
    pub dictionary: FieldDictionary,
    /// Resolved column name of every schema field, in schema order
    pub columns: Vec<String>,
    pub primary_key: Option<String>,
    pub table: Option<String>,
}

pub fn introspect<M: ModelTarget + ?Sized>(
    model: &M,
    options: IntrospectOptions<'_>,
) -> Result<Introspection, RecordError> {
    let kind = model.model_kind();
    let Some(schema) = model.record_schema() else {
        return Ok(Introspection {
            kind,
            ..Introspection::default()
        });
    };

    let columns: Vec<String> = schema
        .fields
        .iter()
        .map(|f| f.resolve_column(options.tags).to_string())
        .collect();

    let primary_key = schema.primary_key.and_then(|declared| {
        schema
            .fields
            .iter()
            .position(|f| f.column == declared)
            .map(|i| columns[i].clone())
    });

    let values = match kind {
        ModelKind::Single => model.current_values()?,
        _ => None,
    };

    let mut dictionary = FieldDictionary::new();
    for (i, field) in schema.fields.iter().enumerate() {
        let column = &columns[i];
        if options.excluded.iter().any(|c| c == column) {
            continue;
        }
        let value = values
            .as_ref()
            .and_then(|v| v.get(i).cloned())
            .unwrap_or(serde_json::Value::Null);
        let readonly = field.readonly || options.readonly.iter().any(|c| c == column);
        dictionary.insert(column, value, readonly);
    }

    Ok(Introspection {
        kind,
        dictionary,
        columns,
        primary_key,
        table: schema.table.map(str::to_string),
    })
}
