//! Record metadata and field mapping
//!
//! A record's field metadata is a static [`RecordSchema`] generated by
//! `#[derive(Record)]`. Values cross the boundary as `serde_json::Value`,
//! so any field type with serde support can be mapped.

mod dictionary;
mod introspect;
mod target;

pub use dictionary::FieldDictionary;
pub use introspect::{introspect, IntrospectOptions, Introspection};
pub use target::{Detached, ModelKind, ModelTarget};

use crate::errors::RecordError;
use crate::store::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// One mapped field of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub field: &'static str,
    pub column: &'static str,
    pub readonly: bool,
    /// Alternative column names by tag vocabulary, e.g. `("json", "user_name")`
    pub tags: &'static [(&'static str, &'static str)],
}

impl FieldSchema {
    pub fn tag(&self, vocabulary: &str) -> Option<&'static str> {
        self.tags
            .iter()
            .find(|(name, _)| *name == vocabulary)
            .map(|(_, column)| *column)
    }

    /// The first tag present wins, then the declared column name
    pub fn resolve_column(&self, vocabularies: &[String]) -> &'static str {
        vocabularies
            .iter()
            .find_map(|v| self.tag(v))
            .unwrap_or(self.column)
    }
}

/// Compile-time description of a record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    pub type_name: &'static str,
    pub table: Option<&'static str>,
    /// Declared column of the primary-key field
    pub primary_key: Option<&'static str>,
    pub fields: &'static [FieldSchema],
}

impl RecordSchema {
    pub fn field_by_column(&self, column: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.column == column)
    }
}

/// A struct whose fields map onto table columns
pub trait Record: Send + Sync {
    fn schema() -> &'static RecordSchema
    where
        Self: Sized;

    /// Current field values in schema order
    fn to_values(&self) -> Result<Vec<Value>, RecordError>;

    /// Assign the row's columns to fields; `columns` holds the resolved
    /// column name of each schema field. Returns the number of fields set.
    fn assign(&mut self, row: &Row, columns: &[String]) -> Result<usize, RecordError>;
}

pub fn encode_field<T: Serialize>(value: &T, field: &'static str) -> Result<Value, RecordError> {
    serde_json::to_value(value).map_err(|source| RecordError::Encode { field, source })
}

/// Decode a column value, coercing between the shapes drivers hand back
/// (integers for booleans, text for numbers and the reverse).
pub fn decode_field<T: DeserializeOwned>(value: &Value, field: &'static str) -> Result<T, RecordError> {
    let first = match serde_json::from_value(value.clone()) {
        Ok(decoded) => return Ok(decoded),
        Err(err) => err,
    };
    for candidate in coercions(value) {
        if let Ok(decoded) = serde_json::from_value(candidate) {
            return Ok(decoded);
        }
    }
    Err(RecordError::Decode {
        field,
        source: first,
    })
}

fn coercions(value: &Value) -> Vec<Value> {
    match value {
        Value::Number(n) => {
            let mut out = vec![Value::String(n.to_string())];
            if let Some(i) = n.as_i64() {
                out.push(Value::Bool(i != 0));
            }
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    out.push(Value::from(f as i64));
                }
            }
            out
        }
        Value::String(s) => {
            let mut out = Vec::new();
            if let Ok(i) = s.trim().parse::<i64>() {
                out.push(Value::from(i));
            }
            if let Ok(f) = s.trim().parse::<f64>() {
                out.push(Value::from(f));
            }
            match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" => out.push(Value::Bool(true)),
                "false" | "f" => out.push(Value::Bool(false)),
                _ => {}
            }
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                out.push(parsed);
            }
            out
        }
        Value::Bool(b) => vec![Value::from(*b as i64), Value::String(b.to_string())],
        _ => Vec::new(),
    }
}

/// Find a column in a row, falling back to a case-insensitive match
pub fn lookup<'r>(row: &'r Row, column: &str) -> Option<&'r Value> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

/// Load the first row into a single record; an empty result leaves it untouched
pub fn load_single<R: Record>(record: &mut R, rows: Vec<Row>, columns: &[String]) -> Result<u64, RecordError> {
    let count = rows.len() as u64;
    if let Some(row) = rows.first() {
        record.assign(row, columns)?;
    }
    Ok(count)
}
