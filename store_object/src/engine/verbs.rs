//! Terminal verb execution
//!
//! Each verb runs over a [`Conn`], either the engine's store or an open
//! transaction, and hands back the cache effects it owes. The caller applies
//! them right away, or after commit when inside a transaction.

use super::chain::Chain;
use super::state::{is_set_key, OperationKind};
use crate::cache_coordinator::CacheEffect;
use crate::errors::{EngineError, StoreError};
use crate::query_builder::statement::SCOPE_IDENTITY_QUERY;
use crate::query_builder::{build_where, prepare_raw, StatementBuilder};
use crate::record::{ModelKind, ModelTarget};
use crate::store::{ExecOutcome, Row, Store, StoreTransaction};
use crate::{debug_log, trace_log};
use dialect::InsertIdStrategy;
use serde_json::Value;
use tracing::warn;

pub(crate) enum Conn<'c> {
    Pool(&'c dyn Store),
    Tx(&'c mut Box<dyn StoreTransaction>),
}

impl<'c> Conn<'c> {
    fn pool(&self) -> Option<&'c dyn Store> {
        match self {
            Conn::Pool(store) => Some(*store),
            Conn::Tx(_) => None,
        }
    }

    async fn fetch(&mut self, sql: &str) -> Result<Vec<Row>, StoreError> {
        self.fetch_with(sql, &[]).await
    }

    async fn fetch_with(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, StoreError> {
        trace_log!(sql, "fetch");
        match self {
            Conn::Pool(store) => store.fetch(sql, args).await,
            Conn::Tx(tx) => tx.fetch(sql, args).await,
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<ExecOutcome, StoreError> {
        trace_log!(sql, "execute");
        match self {
            Conn::Pool(store) => store.execute(sql, &[]).await,
            Conn::Tx(tx) => tx.execute(sql, &[]).await,
        }
    }
}

/// Integer form of a generated key; drivers hand back numbers, decimals or text
fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

fn first_value(rows: &[Row]) -> Option<&Value> {
    rows.first().and_then(|row| row.values().next())
}

impl<M: ModelTarget> Chain<'_, M> {
    /// Settle the operation kind and surface any error held back by a modifier
    pub(super) fn prepare(&mut self, kind: OperationKind) -> Result<(), EngineError> {
        self.state.kind = kind;
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        let custom = self
            .state
            .custom_where
            .as_deref()
            .is_some_and(|w| !w.trim().is_empty());
        if custom
            && self.state.primary_key_value().is_some()
            && matches!(
                kind,
                OperationKind::Query | OperationKind::Update | OperationKind::Delete
            )
        {
            warn!(
                table = %self.state.table(),
                "primary key is set, custom WHERE text is ignored"
            );
        }
        Ok(())
    }

    fn require_model(&self) -> Result<(), EngineError> {
        match (&self.model, self.state.model_kind) {
            (None, _) | (_, ModelKind::Detached) => Err(EngineError::MissingModel(self.state.kind)),
            _ => Ok(()),
        }
    }

    /// Writes take their values from one record
    fn require_record(&self) -> Result<(), EngineError> {
        self.require_model()?;
        if self.state.model_kind != ModelKind::Single {
            return Err(EngineError::MissingModel(self.state.kind));
        }
        Ok(())
    }

    fn builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(&self.state, self.engine.dialect())
    }

    fn load(&mut self, rows: Vec<Row>) -> Result<u64, EngineError> {
        match self.model.as_deref_mut() {
            Some(model) => Ok(model.load_rows(rows, &self.state.columns)?),
            None => Ok(rows.len() as u64),
        }
    }

    /// Cache reads only cover one record addressed by its identity
    fn cache_readable(&self) -> bool {
        self.state.use_cache
            && self.state.model_kind == ModelKind::Single
            && self.state.extra_fragments() == 0
    }

    /// Key the statement addressed, or the key the store generated
    fn affected_key(&self, generated: i64) -> Option<Value> {
        if generated != 0 {
            return Some(Value::from(generated));
        }
        self.state.primary_key_value().cloned()
    }

    fn write_effect(&self, pk: Option<Value>, refresh: bool) -> Vec<CacheEffect> {
        if self.engine.cache().is_none() {
            return Vec::new();
        }
        let Some(pk_value) = pk else {
            debug_log!(table = %self.state.table(), "no primary key known, cache left as is");
            return Vec::new();
        };
        let table = self.state.table();
        let pk_name = self.state.pk_name.clone();
        let indexes = self.state.indexes.clone();
        vec![if refresh {
            CacheEffect::Refresh {
                table,
                pk_name,
                pk_value,
                indexes,
            }
        } else {
            CacheEffect::Invalidate {
                table,
                pk_name,
                pk_value,
                indexes,
            }
        }]
    }

    /// Keys of the rows a WHERE-addressed write is about to touch.
    ///
    /// Read on the write's own connection before it runs; empty when no cache
    /// is attached or the statement is addressed by primary key.
    async fn keys_in_scope(&self, conn: &mut Conn<'_>) -> Result<Vec<Value>, EngineError> {
        if self.engine.cache().is_none() || self.state.primary_key_value().is_some() {
            return Ok(Vec::new());
        }
        let clause = build_where(&self.state, self.engine.dialect());
        let lookup = self.builder().select_primary_key(&clause.text)?;
        debug_log!(sql = %lookup, "keys in scope");
        let rows = conn.fetch(&lookup).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(&self.state.pk_name).or_else(|| row.values().next()))
            .filter(|pk| is_set_key(pk))
            .cloned()
            .collect())
    }

    /// Effects for a write that changed `affected` rows
    fn scoped_effects(&self, affected: u64, scoped: Vec<Value>, refresh: bool) -> Vec<CacheEffect> {
        if affected == 0 {
            return Vec::new();
        }
        match self.state.primary_key_value() {
            Some(pk) => self.write_effect(Some(pk.clone()), refresh),
            None => scoped
                .into_iter()
                .flat_map(|pk| self.write_effect(Some(pk), refresh))
                .collect(),
        }
    }

    /// Put a generated key back into a record that had none
    fn write_back_key(&mut self, id: i64) -> Result<(), EngineError> {
        if id == 0 || self.state.primary_key_value().is_some() {
            return Ok(());
        }
        let mut row = Row::new();
        row.insert(self.state.pk_name.clone(), Value::from(id));
        self.load(vec![row])?;
        Ok(())
    }

    /// Run an INSERT and read back the generated key
    async fn insert_returning_id(&self, conn: &mut Conn<'_>, insert: String) -> Result<i64, EngineError> {
        let dialect = self.engine.dialect();
        let has_key = self.state.dictionary.contains(&self.state.pk_name);
        let id = match dialect.profile().insert_id {
            InsertIdStrategy::Returning if has_key => {
                let sql = insert + &self.builder().returning_primary_key();
                debug_log!(sql = %sql, "insert");
                first_value(&conn.fetch(&sql).await?).and_then(value_as_i64)
            }
            InsertIdStrategy::ScopeIdentity => {
                let sql = format!("{insert}; {SCOPE_IDENTITY_QUERY}");
                debug_log!(sql = %sql, "insert");
                first_value(&conn.fetch(&sql).await?).and_then(value_as_i64)
            }
            _ => {
                debug_log!(sql = %insert, "insert");
                Some(conn.execute(&insert).await?.last_insert_id)
            }
        };
        let id = id.unwrap_or(0);
        if id != 0 {
            return Ok(id);
        }
        Ok(self
            .state
            .primary_key_value()
            .and_then(value_as_i64)
            .unwrap_or(0))
    }

    pub(super) async fn run_query(&mut self, conn: &mut Conn<'_>) -> Result<u64, EngineError> {
        self.prepare(OperationKind::Query)?;
        self.require_model()?;
        let sql = self.builder().select()?;

        let engine = self.engine.clone();
        let cache = match conn {
            Conn::Pool(_) if self.cache_readable() => engine.cache(),
            _ => None,
        };
        if let Some(cache) = cache {
            if let Some(row) = cache.read(&self.state).await {
                return self.load(vec![row]);
            }
        }

        debug_log!(sql = %sql, "query");
        let rows = conn.fetch(&sql).await?;
        if let (Some(cache), [row]) = (cache, rows.as_slice()) {
            if self.state.reads_full_record() {
                cache
                    .populate(&self.state.table(), &self.state.pk_name, &self.state.indexes, row)
                    .await;
            }
        }
        self.load(rows)
    }

    pub(super) async fn run_query_raw(
        &mut self,
        conn: &mut Conn<'_>,
        sql: &str,
        args: &[Value],
    ) -> Result<u64, EngineError> {
        self.prepare(OperationKind::QueryRaw)?;
        self.require_model()?;
        let stmt = prepare_raw(self.engine.dialect(), sql, args)?;
        debug_log!(sql = %stmt.sql, "raw query");
        let rows = conn.fetch_with(&stmt.sql, &stmt.args).await?;
        self.load(rows)
    }

    pub(super) async fn run_insert(&mut self, conn: &mut Conn<'_>) -> Result<(i64, Vec<CacheEffect>), EngineError> {
        self.prepare(OperationKind::Insert)?;
        self.require_record()?;
        let insert = self.builder().insert()?;
        let id = self.insert_returning_id(conn, insert).await?;

        let effects = if self.state.use_cache {
            self.write_effect(self.affected_key(id), true)
        } else {
            Vec::new()
        };
        self.write_back_key(id)?;
        Ok((id, effects))
    }

    pub(super) async fn run_upsert(&mut self, conn: &mut Conn<'_>) -> Result<(i64, Vec<CacheEffect>), EngineError> {
        self.prepare(OperationKind::Upsert)?;
        self.require_record()?;

        let id = if self.engine.dialect().has_native_upsert() {
            self.native_upsert(conn).await?
        } else if let Some(store) = conn.pool() {
            let mut tx = store.begin().await?;
            let result = self.select_then_write(&mut Conn::Tx(&mut tx)).await;
            match result {
                Ok(id) => {
                    tx.commit().await?;
                    id
                }
                Err(err) => {
                    if let Err(rollback) = tx.rollback().await {
                        warn!(error = %rollback, "upsert rollback failed");
                    }
                    return Err(err);
                }
            }
        } else {
            self.select_then_write(conn).await?
        };

        let effects = self.write_effect(self.affected_key(id), self.state.use_cache);
        self.write_back_key(id)?;
        Ok((id, effects))
    }

    async fn native_upsert(&self, conn: &mut Conn<'_>) -> Result<i64, EngineError> {
        let sql = self.builder().upsert()?;
        debug_log!(sql = %sql, "upsert");
        let returning = self.engine.dialect().profile().insert_id == InsertIdStrategy::Returning
            && self.state.dictionary.contains(&self.state.pk_name);
        let id = if returning {
            first_value(&conn.fetch(&sql).await?).and_then(value_as_i64)
        } else {
            Some(conn.execute(&sql).await?.last_insert_id)
        };
        match id {
            Some(id) if id != 0 => Ok(id),
            _ => Ok(self
                .state
                .primary_key_value()
                .and_then(value_as_i64)
                .unwrap_or(0)),
        }
    }

    /// Upsert for dialects without a conflict clause: look the row up by its
    /// uniqueness predicate, then update it or insert a new one
    async fn select_then_write(&self, conn: &mut Conn<'_>) -> Result<i64, EngineError> {
        let builder = self.builder();
        let predicate = builder.uniqueness_predicate()?;
        let lookup = builder.select_primary_key(&predicate)?;
        debug_log!(sql = %lookup, "upsert lookup");
        let existing = first_value(&conn.fetch(&lookup).await?).cloned();

        match existing.filter(is_set_key) {
            Some(pk) => {
                match builder.update_by_primary_key(&pk)? {
                    Some(update) => {
                        debug_log!(sql = %update, "upsert update");
                        conn.execute(&update).await?;
                    }
                    None => {
                        debug_log!("upsert found row, nothing to update");
                    }
                }
                Ok(value_as_i64(&pk).unwrap_or(0))
            }
            None => {
                let insert = builder.insert()?;
                self.insert_returning_id(conn, insert).await
            }
        }
    }

    pub(super) async fn run_update(&mut self, conn: &mut Conn<'_>) -> Result<(u64, Vec<CacheEffect>), EngineError> {
        self.prepare(OperationKind::Update)?;
        self.require_record()?;
        let sql = self.builder().update()?;
        let scoped = self.keys_in_scope(conn).await?;
        debug_log!(sql = %sql, "update");
        let outcome = conn.execute(&sql).await?;

        let effects = self.scoped_effects(outcome.rows_affected, scoped, self.state.use_cache);
        Ok((outcome.rows_affected, effects))
    }

    pub(super) async fn run_delete(&mut self, conn: &mut Conn<'_>) -> Result<(u64, Vec<CacheEffect>), EngineError> {
        self.prepare(OperationKind::Delete)?;
        let sql = self.builder().delete()?;
        let scoped = self.keys_in_scope(conn).await?;
        debug_log!(sql = %sql, "delete");
        let outcome = conn.execute(&sql).await?;

        let effects = self.scoped_effects(outcome.rows_affected, scoped, false);
        Ok((outcome.rows_affected, effects))
    }
}
