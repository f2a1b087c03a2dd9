//! Execution facade
//!
//! An [`Engine`] holds the long-lived store and cache handles and nothing
//! else. Every [`Engine::model`] or [`Engine::table`] call starts a
//! [`Chain`] with a fresh [`OperationState`], so chains running at the same
//! time never see each other's modifiers.

mod chain;
mod state;
mod transaction;
mod verbs;

pub use crate::record::Detached;
pub use chain::Chain;
pub use state::{is_set_key, CacheIndex, Membership, OperationKind, OperationState};
pub use transaction::Tx;

use crate::cache_coordinator::{CacheCoordinator, CacheEffect};
use crate::debug_log;
use crate::errors::EngineError;
use crate::query_builder::prepare_raw;
use crate::record::ModelTarget;
use crate::store::{ExecOutcome, Row, Store};
use cache_system::CacheParams;
use config::EngineConfig;
use dialect::Dialect;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

#[derive(Debug)]
struct Shared {
    store: Arc<dyn Store>,
    cache: Option<CacheCoordinator>,
    config: EngineConfig,
}

/// Cheap to clone; clones share the same store and cache
#[derive(Debug, Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                cache: None,
                config,
            }),
        }
    }

    /// Attach a cache; records are then kept coherent with the store
    pub fn with_cache(self, params: CacheParams) -> Self {
        let dialect = self.dialect();
        Self {
            shared: Arc::new(Shared {
                store: self.shared.store.clone(),
                cache: Some(CacheCoordinator::new(params, dialect)),
                config: self.shared.config.clone(),
            }),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.shared.store.dialect()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.shared.store
    }

    pub fn cache(&self) -> Option<&CacheCoordinator> {
        self.shared.cache.as_ref()
    }

    /// Start a chain over a record, a collection of records or a scalar
    pub fn model<'m, M: ModelTarget>(&self, model: &'m mut M) -> Chain<'m, M> {
        Chain::attach(self.clone(), model)
    }

    /// Start a chain with no model, for deletes and previews by table name
    pub fn table(&self, name: &str) -> Chain<'static, Detached> {
        Chain::detached(self.clone(), name)
    }

    /// Run caller SQL and return its rows as column maps
    pub async fn query_map(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, EngineError> {
        self.fetch_raw(sql, args)
            .await
            .map_err(|err| self.fail(OperationKind::QueryMap, err))
    }

    async fn fetch_raw(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, EngineError> {
        let stmt = prepare_raw(self.dialect(), sql, args)?;
        debug_log!(sql = %stmt.sql, "map query");
        Ok(self.shared.store.fetch(&stmt.sql, &stmt.args).await?)
    }

    /// Run caller SQL that returns no rows
    pub async fn exec_raw(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, EngineError> {
        self.execute_raw(sql, args)
            .await
            .map_err(|err| self.fail(OperationKind::ExecRaw, err))
    }

    async fn execute_raw(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, EngineError> {
        let stmt = prepare_raw(self.dialect(), sql, args)?;
        debug_log!(sql = %stmt.sql, "raw exec");
        Ok(self.shared.store.execute(&stmt.sql, &stmt.args).await?)
    }

    /// Open a transaction holding one store connection
    pub async fn tx_begin(&self) -> Result<Tx, EngineError> {
        match self.shared.store.begin().await {
            Ok(inner) => {
                debug_log!("transaction started");
                Ok(Tx::new(self.clone(), inner))
            }
            Err(err) => Err(self.fail(OperationKind::Tx, err.into())),
        }
    }

    /// Report a failed operation. In strict mode a caller error panics.
    pub(crate) fn fail(&self, kind: OperationKind, err: EngineError) -> EngineError {
        if self.shared.config.strict && err.is_precondition() {
            panic!("{kind} rejected: {err}");
        }
        error!(operation = %kind, error = %err, "operation failed");
        err
    }

    /// Carry out cache effects in order
    pub(crate) async fn apply_effects(&self, effects: &[CacheEffect]) {
        let Some(cache) = self.cache() else {
            return;
        };
        for effect in effects {
            cache.apply(self.shared.store.as_ref(), effect).await;
        }
    }
}
