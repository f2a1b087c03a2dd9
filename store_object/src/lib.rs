//! Store Object - statement building and cache coordination for sqlcache
//!
//! This crate turns a fluent operation chain (table, columns, conditions,
//! ordering, conflict keys, cache indexes) into dialect-correct SQL, runs it
//! against a [`Store`], and keeps an optional key-value cache coherent with
//! the results.

// Generated code refers to `::store_object`, including inside this crate's tests
extern crate self as store_object;

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod cache_coordinator;
pub mod engine;
pub mod errors;
pub mod prelude;
pub mod query_builder;
pub mod record;
pub mod store;

pub use cache_coordinator::{CacheCoordinator, CacheEffect};
pub use cache_system::CacheParams;
pub use dialect::Dialect;
pub use engine::{Chain, Detached, Engine, OperationKind, OperationState, Tx};
pub use errors::{EngineError, RecordError, StoreError};
pub use record::{
    introspect, FieldDictionary, FieldSchema, Introspection, ModelKind, ModelTarget, Record,
    RecordSchema,
};
pub use record_derive::{model, Record};
pub use store::{ExecOutcome, RecordingStore, Row, SqlxStore, Store, StoreTransaction};

// Used by generated code
pub use serde_json;
