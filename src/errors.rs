//! Error types for the sqlcache crate
//!
//! This module contains the error returned while setting up a [`SqlCache`](crate::SqlCache).
//! Operation errors come back as [`EngineError`].

use cache_system::CacheError;
use config::ConfigError;
use store_object::{EngineError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlCacheError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
