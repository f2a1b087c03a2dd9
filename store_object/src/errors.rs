//! Error types for store operations
//!
//! Precondition violations are raised before anything reaches the store.
//! Store errors are carried through unchanged. Cache errors never appear
//! here: the cache coordinator logs and absorbs them.

use crate::engine::OperationKind;
use thiserror::Error;

/// Errors from the relational store capability
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    Driver(String),
}

/// Field encode/decode failures
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("cannot encode field {field}: {source}")]
    Encode {
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("cannot decode column into field {field}: {source}")]
    Decode {
        field: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no model attached: {0} needs a record, collection or scalar")]
    MissingModel(OperationKind),

    #[error("no table name given for {0}")]
    MissingTable(OperationKind),

    #[error("refusing to delete from {table} without a condition")]
    UnconditionedDelete { table: String },

    #[error("upsert on {table} needs conflict columns: call on_conflict() first")]
    MissingConflictColumns { table: String },

    #[error("cache index value for column {column} must be a scalar")]
    NonScalarIndex { column: String },

    #[error("primary key value must be a non-empty string or a non-zero number, got {0}")]
    InvalidPrimaryKey(serde_json::Value),

    #[error("{kind} on {table} has no writable columns")]
    NoWritableColumns { kind: OperationKind, table: String },

    #[error("column {column} is not a field of the attached model")]
    UnknownColumn { column: String },

    #[error("{0}")]
    ArgumentMismatch(String),

    #[error("transaction already finished")]
    TransactionFinished,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl EngineError {
    /// Caller errors detected before any store round-trip
    pub fn is_precondition(&self) -> bool {
        !matches!(self, EngineError::Store(_) | EngineError::Record(_))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Store(StoreError::Sqlx(err))
    }
}
