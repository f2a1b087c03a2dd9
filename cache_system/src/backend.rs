//! The cache capability used by the engine

use crate::errors::CacheError;
use async_trait::async_trait;
use std::fmt::Debug;

/// String values stored by key with an expiry
#[async_trait]
pub trait CacheBackend: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;

    /// Returns whether a key was removed
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}
