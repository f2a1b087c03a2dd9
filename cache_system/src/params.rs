//! Cache parameter configuration
//!
//! This module defines the CacheParams struct: the backend handle, the
//! entry expiry and the key namespace, plus the key layout
//! `<namespace>:cache:<table>:<column>:<value>`.

use crate::backend::CacheBackend;
use config::{DEFAULT_NAMESPACE, DEFAULT_TTL_SECONDS};
use std::sync::Arc;

/// Cache parameters shared by every operation of one engine
#[derive(Debug, Clone)]
pub struct CacheParams {
    /// The cache backend instance
    pub backend: Arc<dyn CacheBackend>,
    /// Entry expiry in seconds
    pub ttl: u64,
    /// Prefix for cache keys
    pub namespace: String,
}

impl CacheParams {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: u64, namespace: &str) -> Self {
        Self {
            ttl,
            namespace: namespace.to_string(),
            backend,
        }
    }

    /// Default namespace and one hour expiry
    pub fn with_defaults(backend: Arc<dyn CacheBackend>) -> Self {
        Self::new(backend, DEFAULT_TTL_SECONDS, DEFAULT_NAMESPACE)
    }

    /// Canonical record key: `<namespace>:cache:<table>:<pk>:<value>`
    pub fn record_key(&self, table: &str, pk_name: &str, pk_value: &str) -> String {
        format!("{}:cache:{}:{}:{}", self.namespace, table, pk_name, pk_value)
    }

    /// Index pointer key: `<namespace>:cache:<table>:<column>:<value>`
    pub fn index_key(&self, table: &str, column: &str, value: &str) -> String {
        format!("{}:cache:{}:{}:{}", self.namespace, table, column, value)
    }
}
