//! Convenience re-exports for common store-object usage

// Engine and chains
pub use crate::engine::{Chain, Detached, Engine, OperationKind, Tx};

// Records
pub use crate::record::{ModelKind, ModelTarget};
// the Record trait and its derive share one name
pub use crate::{model, Record};

// Stores
pub use crate::store::{ExecOutcome, RecordingStore, Row, SqlxStore, Store, StoreTransaction};

// Error types
pub use crate::errors::{EngineError, RecordError, StoreError};

// Query building
pub use crate::query_builder::SortOrder;

// Cache params (re-exported from cache_system)
pub use crate::CacheParams;
pub use cache_system::{CacheBackend, MemoryCache};

pub use dialect::Dialect;

// Common external dependencies that are frequently used
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use serde_json::{json, Value};
