//! Convenience re-exports for common sqlcache usage
//!
//! This prelude module re-exports the most commonly used items from the sqlcache workspace,
//! making it easier to import everything you need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use sqlcache::prelude::*;
//!
//! // Engine, chains, records, stores and cache types are now in scope
//! ```

// Core sqlcache components
pub use crate::core::SqlCache;
pub use crate::errors::SqlCacheError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, DatabaseConfig, EngineConfig};

// Re-export commonly used store-object types for convenience
pub use store_object::prelude::*;

// Re-export store_object module for macro-generated code
pub use store_object;

// Re-export cache system
pub use cache_system::prelude::*;

// Common external dependencies
pub use anyhow;
pub use sqlx;
pub use tokio;
