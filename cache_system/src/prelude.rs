//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types
//! from the cache system for easy importing.

pub use crate::backend::CacheBackend;
pub use crate::errors::CacheError;
pub use crate::manager::CacheManager;
pub use crate::memory::MemoryCache;
pub use crate::params::CacheParams;
pub use config::CacheConfig;
