//! Cache system for key-value caching of store records
//!
//! This crate provides the string get/set/delete capability the engine
//! relies on, a Redis implementation and an in-process one, plus the
//! cache key layout.

pub mod backend;
pub mod errors;
pub mod manager;
pub mod memory;
pub mod params;
pub mod prelude;

// Re-export centralized config
pub use config::CacheConfig;

pub use backend::CacheBackend;
pub use errors::CacheError;
pub use manager::CacheManager;
pub use memory::MemoryCache;
pub use params::CacheParams;
