//! Cache coordination
//!
//! Records live under `<namespace>:cache:<table>:<pk>:<value>` as the JSON
//! of their row. An index pointer `<namespace>:cache:<table>:<column>:<value>`
//! holds the primary-key value of the row it identifies.
//!
//! Cache failures never fail an operation: reads fall back to the store and
//! write-path failures are logged. Store and cache are not updated
//! atomically; a stale or missing entry heals on the next read miss.

use crate::debug_log;
use crate::engine::{CacheIndex, OperationState};
use crate::query_builder::statement::select_by_primary_key;
use crate::record::lookup;
use crate::store::{Row, Store};
use cache_system::CacheParams;
use dialect::Dialect;
use serde_json::Value;
use tracing::warn;

/// Cache work owed after a successful store write
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEffect {
    /// Re-read the row by primary key and republish it with its index pointers
    Refresh {
        table: String,
        pk_name: String,
        pk_value: Value,
        indexes: Vec<CacheIndex>,
    },
    /// Drop the record and its index pointers
    Invalidate {
        table: String,
        pk_name: String,
        pk_value: Value,
        indexes: Vec<CacheIndex>,
    },
}

/// Text form of a key value as used inside cache keys
pub fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct CacheCoordinator {
    params: CacheParams,
    dialect: Dialect,
}

impl CacheCoordinator {
    pub fn new(params: CacheParams, dialect: Dialect) -> Self {
        Self { params, dialect }
    }

    pub fn params(&self) -> &CacheParams {
        &self.params
    }

    async fn get(&self, key: &str) -> Option<String> {
        match self.params.backend.get(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "cache read failed, falling back to store");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        if let Err(err) = self.params.backend.set(key, value, self.params.ttl).await {
            warn!(key, error = %err, "cache write failed");
        }
    }

    async fn delete(&self, key: &str) {
        if let Err(err) = self.params.backend.delete(key).await {
            warn!(key, error = %err, "cache delete failed");
        }
    }

    /// Primary-key text from the state, directly or through an index pointer
    async fn resolve_primary_key(&self, state: &OperationState, table: &str) -> Option<String> {
        if let Some(pk) = state.primary_key_value() {
            return Some(key_text(pk));
        }
        for index in &state.indexes {
            let key = self
                .params
                .index_key(table, &index.column, &key_text(&index.value));
            if let Some(pk) = self.get(&key).await {
                return Some(pk);
            }
        }
        None
    }

    /// Cached row for a single-record read, if every declared identity matches it
    pub async fn read(&self, state: &OperationState) -> Option<Row> {
        let table = state.table();
        let pk_text = self.resolve_primary_key(state, &table).await?;
        let key = self.params.record_key(&table, &state.pk_name, &pk_text);

        let Some(raw) = self.get(&key).await else {
            debug_log!(key = %key, "cache miss");
            return None;
        };
        let row: Row = match serde_json::from_str(&raw) {
            Ok(row) => row,
            Err(err) => {
                warn!(key = %key, error = %err, "discarding undecodable cache entry");
                self.delete(&key).await;
                return None;
            }
        };

        // a pointer left behind by an older write may name another row
        let consistent = state.indexes.iter().all(|index| {
            lookup(&row, &index.column).map(key_text) == Some(key_text(&index.value))
        });
        if !consistent {
            debug_log!(key = %key, "cached record does not match index values");
            return None;
        }

        debug_log!(key = %key, "cache hit");
        Some(row)
    }

    /// Publish a row and the index pointers declared for it
    pub async fn populate(&self, table: &str, pk_name: &str, indexes: &[CacheIndex], row: &Row) {
        let Some(pk) = lookup(row, pk_name).filter(|v| crate::engine::is_set_key(v)) else {
            debug_log!(table, "row has no primary key, not cached");
            return;
        };
        let pk_text = key_text(pk);

        let encoded = match serde_json::to_string(row) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(table, error = %err, "cannot encode row for cache");
                return;
            }
        };
        self.set(&self.params.record_key(table, pk_name, &pk_text), &encoded)
            .await;

        for index in indexes {
            let key = self
                .params
                .index_key(table, &index.column, &key_text(&index.value));
            self.set(&key, &pk_text).await;
        }
    }

    async fn invalidate(&self, table: &str, pk_name: &str, pk_value: &Value, indexes: &[CacheIndex]) {
        self.delete(&self.params.record_key(table, pk_name, &key_text(pk_value)))
            .await;
        for index in indexes {
            self.delete(
                &self
                    .params
                    .index_key(table, &index.column, &key_text(&index.value)),
            )
            .await;
        }
    }

    /// Carry out a write-path effect; reads the store for refreshes
    pub async fn apply(&self, store: &dyn Store, effect: &CacheEffect) {
        match effect {
            CacheEffect::Refresh {
                table,
                pk_name,
                pk_value,
                indexes,
            } => {
                let sql = select_by_primary_key(self.dialect, table, pk_name, pk_value);
                debug_log!(sql = %sql, "refreshing cached record");
                match store.fetch(&sql, &[]).await {
                    Ok(rows) => match rows.first() {
                        Some(row) => self.populate(table, pk_name, indexes, row).await,
                        None => self.invalidate(table, pk_name, pk_value, indexes).await,
                    },
                    Err(err) => {
                        warn!(table = %table, error = %err, "cannot re-read record, invalidating cache entry");
                        self.invalidate(table, pk_name, pk_value, indexes).await;
                    }
                }
            }
            CacheEffect::Invalidate {
                table,
                pk_name,
                pk_value,
                indexes,
            } => self.invalidate(table, pk_name, pk_value, indexes).await,
        }
    }
}
