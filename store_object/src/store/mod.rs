//! The relational store capability
//!
//! The engine only needs "run SQL, return rows", "run SQL, return
//! affected count and last insert id" and a transaction that does the same
//! on one connection. Arguments bind to `?` placeholders.

mod recording;
mod sqlx_store;

pub use recording::RecordingStore;
pub use sqlx_store::SqlxStore;

use crate::errors::StoreError;
use async_trait::async_trait;
use dialect::Dialect;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt::Debug;

/// One result row, columns in select order
pub type Row = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

#[async_trait]
pub trait Store: Send + Sync + Debug {
    /// Fixed when the store is opened
    fn dialect(&self) -> Dialect;

    async fn fetch(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, StoreError>;

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, StoreError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// A transaction holding one store connection until commit or rollback.
///
/// Dropping it without committing rolls back.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn fetch(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, StoreError>;

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecOutcome, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
