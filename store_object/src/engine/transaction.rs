//! Transaction coordination
//!
//! A [`Tx`] owns one store connection from `tx_begin` to commit or rollback.
//! Chains run through it share that connection; their cache effects are
//! queued and applied once, in order, after a successful commit. The first
//! failure rolls the transaction back, drops the queue and closes the handle.

use super::chain::Chain;
use super::state::OperationKind;
use super::verbs::Conn;
use super::Engine;
use crate::cache_coordinator::CacheEffect;
use crate::errors::EngineError;
use crate::query_builder::prepare_raw;
use crate::record::{introspect, IntrospectOptions, ModelTarget};
use crate::store::{ExecOutcome, StoreTransaction};
use crate::debug_log;
use serde_json::Value;
use tracing::warn;

pub struct Tx {
    engine: Engine,
    inner: Option<Box<dyn StoreTransaction>>,
    effects: Vec<CacheEffect>,
}

impl std::fmt::Debug for Tx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx")
            .field("open", &self.inner.is_some())
            .field("queued_effects", &self.effects.len())
            .finish()
    }
}

impl Tx {
    pub(super) fn new(engine: Engine, inner: Box<dyn StoreTransaction>) -> Self {
        Self {
            engine,
            inner: Some(inner),
            effects: Vec::new(),
        }
    }

    /// Whether the transaction was rolled back after a failure
    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }

    /// Cache effects waiting for commit
    pub fn pending_effects(&self) -> &[CacheEffect] {
        &self.effects
    }

    async fn abort(&mut self) {
        self.effects.clear();
        if let Some(inner) = self.inner.take() {
            match inner.rollback().await {
                Ok(()) => {
                    debug_log!("transaction rolled back");
                }
                Err(err) => warn!(error = %err, "transaction rollback failed"),
            }
        }
    }

    /// Roll back on error and report it
    async fn settle<T>(&mut self, kind: OperationKind, result: Result<T, EngineError>) -> Result<T, EngineError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.abort().await;
                Err(self.engine.fail(kind, err))
            }
        }
    }

    fn closed(&self, kind: OperationKind) -> EngineError {
        self.engine.fail(kind, EngineError::TransactionFinished)
    }

    /// Read caller SQL into `dest` on the transaction's connection
    pub async fn get<M: ModelTarget>(&mut self, dest: &mut M, sql: &str, args: &[Value]) -> Result<u64, EngineError> {
        let dialect = self.engine.dialect();
        let tags = &self.engine.config().custom_tags;
        let Some(inner) = self.inner.as_mut() else {
            return Err(self.closed(OperationKind::Tx));
        };
        let result = async {
            let stmt = prepare_raw(dialect, sql, args)?;
            let columns = introspect(
                &*dest,
                IntrospectOptions {
                    tags,
                    ..Default::default()
                },
            )?
            .columns;
            debug_log!(sql = %stmt.sql, "transaction read");
            let rows = inner.fetch(&stmt.sql, &stmt.args).await?;
            Ok::<_, EngineError>(dest.load_rows(rows, &columns)?)
        }
        .await;
        self.settle(OperationKind::Tx, result).await
    }

    /// Run caller SQL on the transaction's connection
    pub async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecOutcome, EngineError> {
        let dialect = self.engine.dialect();
        let Some(inner) = self.inner.as_mut() else {
            return Err(self.closed(OperationKind::Tx));
        };
        let result = async {
            let stmt = prepare_raw(dialect, sql, args)?;
            debug_log!(sql = %stmt.sql, "transaction exec");
            Ok::<_, EngineError>(inner.execute(&stmt.sql, &stmt.args).await?)
        }
        .await;
        self.settle(OperationKind::Tx, result).await
    }

    pub async fn query<M: ModelTarget>(&mut self, mut chain: Chain<'_, M>) -> Result<u64, EngineError> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(self.closed(OperationKind::Query));
        };
        let result = chain.run_query(&mut Conn::Tx(inner)).await;
        self.settle(OperationKind::Query, result).await
    }

    pub async fn insert<M: ModelTarget>(&mut self, mut chain: Chain<'_, M>) -> Result<i64, EngineError> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(self.closed(OperationKind::Insert));
        };
        let result = chain.run_insert(&mut Conn::Tx(inner)).await;
        let (id, effects) = self.settle(OperationKind::Insert, result).await?;
        self.effects.extend(effects);
        Ok(id)
    }

    pub async fn upsert<M: ModelTarget>(&mut self, mut chain: Chain<'_, M>) -> Result<i64, EngineError> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(self.closed(OperationKind::Upsert));
        };
        let result = chain.run_upsert(&mut Conn::Tx(inner)).await;
        let (id, effects) = self.settle(OperationKind::Upsert, result).await?;
        self.effects.extend(effects);
        Ok(id)
    }

    pub async fn update<M: ModelTarget>(&mut self, mut chain: Chain<'_, M>) -> Result<u64, EngineError> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(self.closed(OperationKind::Update));
        };
        let result = chain.run_update(&mut Conn::Tx(inner)).await;
        let (affected, effects) = self.settle(OperationKind::Update, result).await?;
        self.effects.extend(effects);
        Ok(affected)
    }

    pub async fn delete<M: ModelTarget>(&mut self, mut chain: Chain<'_, M>) -> Result<u64, EngineError> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(self.closed(OperationKind::Delete));
        };
        let result = chain.run_delete(&mut Conn::Tx(inner)).await;
        let (affected, effects) = self.settle(OperationKind::Delete, result).await?;
        self.effects.extend(effects);
        Ok(affected)
    }

    /// Commit, then apply the queued cache effects in order
    pub async fn commit(mut self) -> Result<(), EngineError> {
        let Some(inner) = self.inner.take() else {
            return Err(self.closed(OperationKind::Tx));
        };
        if let Err(err) = inner.commit().await {
            self.effects.clear();
            return Err(self.engine.fail(OperationKind::Tx, err.into()));
        }
        debug_log!(effects = self.effects.len(), "transaction committed");
        let effects = std::mem::take(&mut self.effects);
        self.engine.apply_effects(&effects).await;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), EngineError> {
        self.effects.clear();
        let Some(inner) = self.inner.take() else {
            return Err(self.closed(OperationKind::Tx));
        };
        inner
            .rollback()
            .await
            .map_err(|err| self.engine.fail(OperationKind::Tx, err.into()))
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if self.inner.is_some() {
            // the store transaction rolls itself back when dropped
            warn!("transaction dropped without commit, rolling back");
        }
    }
}
