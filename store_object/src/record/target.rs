//! Values an operation chain can be attached to

use super::{decode_field, Record, RecordSchema};
use crate::errors::RecordError;
use crate::store::Row;
use serde_json::Value;

/// Shape of the attached value, resolved once when it is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    /// One record: supplies column names and values
    Single,
    /// A homogeneous collection: supplies column names only
    Many,
    /// A primitive: no addressable fields
    Scalar,
    /// No value at all (table-only chains)
    #[default]
    Detached,
}

/// Anything a chain can read results into or take values from
pub trait ModelTarget: Send + Sync {
    fn model_kind(&self) -> ModelKind;

    fn record_schema(&self) -> Option<&'static RecordSchema>;

    /// Field values in schema order; only a single record has them
    fn current_values(&self) -> Result<Option<Vec<Value>>, RecordError>;

    /// Fill from result rows, returning the number of rows received
    fn load_rows(&mut self, rows: Vec<Row>, columns: &[String]) -> Result<u64, RecordError>;
}

impl<T: Record + Default> ModelTarget for Vec<T> {
    fn model_kind(&self) -> ModelKind {
        ModelKind::Many
    }

    fn record_schema(&self) -> Option<&'static RecordSchema> {
        Some(T::schema())
    }

    fn current_values(&self) -> Result<Option<Vec<Value>>, RecordError> {
        Ok(None)
    }

    fn load_rows(&mut self, rows: Vec<Row>, columns: &[String]) -> Result<u64, RecordError> {
        self.clear();
        self.reserve(rows.len());
        for row in &rows {
            let mut record = T::default();
            record.assign(row, columns)?;
            self.push(record);
        }
        Ok(rows.len() as u64)
    }
}

macro_rules! scalar_target {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ModelTarget for $ty {
                fn model_kind(&self) -> ModelKind {
                    ModelKind::Scalar
                }

                fn record_schema(&self) -> Option<&'static RecordSchema> {
                    None
                }

                fn current_values(&self) -> Result<Option<Vec<Value>>, RecordError> {
                    Ok(None)
                }

                fn load_rows(&mut self, rows: Vec<Row>, _columns: &[String]) -> Result<u64, RecordError> {
                    if let Some(value) = rows.first().and_then(|row| row.values().next()) {
                        *self = decode_field(value, stringify!($ty))?;
                    }
                    Ok(rows.len() as u64)
                }
            }
        )*
    };
}

scalar_target!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool, String);

/// Placeholder model for chains started from a table name
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl ModelTarget for Detached {
    fn model_kind(&self) -> ModelKind {
        ModelKind::Detached
    }

    fn record_schema(&self) -> Option<&'static RecordSchema> {
        None
    }

    fn current_values(&self) -> Result<Option<Vec<Value>>, RecordError> {
        Ok(None)
    }

    fn load_rows(&mut self, rows: Vec<Row>, _columns: &[String]) -> Result<u64, RecordError> {
        Ok(rows.len() as u64)
    }
}
