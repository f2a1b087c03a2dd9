//! Fluent operation chain
//!
//! Modifiers consume and return the chain. Errors found while modifying
//! (a zero primary key, a composite index value) are held back and reported
//! by the terminal verb, which never reaches the store in that case.

use super::state::{is_set_key, CacheIndex, Membership, OperationKind, OperationState};
use super::verbs::Conn;
use super::Engine;
use crate::errors::EngineError;
use crate::query_builder::{substitute_placeholders, SortOrder, StatementBuilder};
use crate::record::{introspect, Detached, IntrospectOptions, ModelTarget};
use serde_json::Value;

pub struct Chain<'m, M: ModelTarget = Detached> {
    pub(super) engine: Engine,
    pub(super) model: Option<&'m mut M>,
    pub(super) state: OperationState,
    pub(super) deferred: Option<EngineError>,
    /// `pk_name()` was called; introspection must not override it
    pk_explicit: bool,
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl<'m, M: ModelTarget> Chain<'m, M> {
    pub(super) fn attach(engine: Engine, model: &'m mut M) -> Self {
        let state = OperationState::new(&engine.config().primary_key);
        let mut chain = Self {
            engine,
            model: Some(model),
            state,
            deferred: None,
            pk_explicit: false,
        };
        chain.introspect();
        chain
    }

    fn introspect(&mut self) {
        let Some(model) = self.model.as_deref() else {
            return;
        };
        let mut tags = self.state.tags.clone();
        tags.extend(self.engine.config().custom_tags.iter().cloned());
        let options = IntrospectOptions {
            tags: &tags,
            excluded: &self.state.excluded,
            readonly: &self.state.readonly,
        };

        match introspect(model, options) {
            Ok(found) => {
                self.state.model_kind = found.kind;
                self.state.dictionary = found.dictionary;
                self.state.columns = found.columns;
                if let (Some(pk), false) = (found.primary_key, self.pk_explicit) {
                    self.state.pk_name = pk;
                }
                if self.state.tables.is_empty() {
                    self.state.tables.extend(found.table);
                }
            }
            Err(err) => self.defer(err.into()),
        }
    }

    fn defer(&mut self, err: EngineError) {
        // the first problem is the one reported
        if self.deferred.is_none() {
            self.deferred = Some(err);
        }
    }

    pub fn state(&self) -> &OperationState {
        &self.state
    }

    pub fn table(mut self, name: &str) -> Self {
        self.state.tables = vec![name.to_string()];
        self
    }

    /// Several tables, emitted comma-joined
    pub fn tables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.tables = strings(names);
        self
    }

    pub fn pk_name(mut self, name: &str) -> Self {
        self.state.pk_name = name.to_string();
        self.pk_explicit = true;
        self
    }

    /// Address one row by primary key; an empty or zero value is rejected
    pub fn id(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        if is_set_key(&value) {
            self.state.pk_value = Some(value);
        } else {
            self.defer(EngineError::InvalidPrimaryKey(value));
        }
        self
    }

    /// Columns to read, or to write for update and upsert
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.select = strings(columns);
        self
    }

    /// Custom WHERE text, used verbatim when no primary key is set
    pub fn filter(mut self, condition: &str) -> Self {
        self.state.custom_where = Some(condition.to_string());
        self
    }

    pub fn and(mut self, fragment: &str) -> Self {
        self.state.and_fragments.push(fragment.to_string());
        self
    }

    /// AND fragment whose `?` placeholders take quoted literals of `args`
    pub fn and_with(mut self, fragment: &str, args: &[Value]) -> Self {
        match substitute_placeholders(self.engine.dialect(), fragment, args) {
            Ok(text) => self.state.and_fragments.push(text),
            Err(err) => self.defer(err),
        }
        self
    }

    pub fn in_values<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.state.memberships.push(Membership {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        });
        self
    }

    pub fn not_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.state.memberships.push(Membership {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        });
        self
    }

    pub fn order_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.order_by.extend(strings(columns));
        self
    }

    pub fn asc(mut self) -> Self {
        self.state.sort = Some(SortOrder::Asc);
        self
    }

    pub fn desc(mut self) -> Self {
        self.state.sort = Some(SortOrder::Desc);
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.group_by.extend(strings(columns));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.state.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.state.offset = Some(n);
        self
    }

    /// Uniqueness columns that select the update branch of an upsert
    pub fn on_conflict<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.conflicts = strings(columns);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.state.distinct = true;
        self
    }

    /// Declare an alternate identity for cache lookups.
    ///
    /// The value must be a scalar. Naming the primary-key column addresses
    /// the row directly, like `id()`.
    pub fn index(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_array() || value.is_object() {
            self.defer(EngineError::NonScalarIndex {
                column: column.to_string(),
            });
            return self;
        }
        if column == self.state.pk_name {
            return self.id(value);
        }
        self.state.indexes.push(CacheIndex {
            column: column.to_string(),
            value,
        });
        self
    }

    pub fn use_cache(mut self) -> Self {
        self.state.use_cache = true;
        self
    }

    /// Leave columns out of the field dictionary
    pub fn exclude<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.excluded.extend(strings(columns));
        self.introspect();
        self
    }

    /// Never write these columns in SET clauses
    pub fn readonly<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.readonly.extend(strings(columns));
        self.introspect();
        self
    }

    /// Tag vocabularies to resolve column names with, ahead of the engine's
    pub fn tags<I, S>(mut self, vocabularies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.tags = strings(vocabularies);
        self.introspect();
        self
    }

    /// Statement text the chain would run for `kind`, without running it
    pub fn build(mut self, kind: OperationKind) -> Result<String, EngineError> {
        self.prepare(kind)?;
        StatementBuilder::new(&self.state, self.engine.dialect()).build(kind)
    }

    /// Read matching rows into the model; returns the number of rows read
    pub async fn query(mut self) -> Result<u64, EngineError> {
        let engine = self.engine.clone();
        let mut conn = Conn::Pool(engine.store().as_ref());
        self.run_query(&mut conn)
            .await
            .map_err(|err| engine.fail(OperationKind::Query, err))
    }

    /// Insert the record; returns the new primary key
    pub async fn insert(mut self) -> Result<i64, EngineError> {
        let engine = self.engine.clone();
        let mut conn = Conn::Pool(engine.store().as_ref());
        match self.run_insert(&mut conn).await {
            Ok((id, effects)) => {
                engine.apply_effects(&effects).await;
                Ok(id)
            }
            Err(err) => Err(engine.fail(OperationKind::Insert, err)),
        }
    }

    /// Insert, or update the row the conflict columns identify; returns its primary key
    pub async fn upsert(mut self) -> Result<i64, EngineError> {
        let engine = self.engine.clone();
        let mut conn = Conn::Pool(engine.store().as_ref());
        match self.run_upsert(&mut conn).await {
            Ok((id, effects)) => {
                engine.apply_effects(&effects).await;
                Ok(id)
            }
            Err(err) => Err(engine.fail(OperationKind::Upsert, err)),
        }
    }

    /// Returns the number of rows affected
    pub async fn update(mut self) -> Result<u64, EngineError> {
        let engine = self.engine.clone();
        let mut conn = Conn::Pool(engine.store().as_ref());
        match self.run_update(&mut conn).await {
            Ok((affected, effects)) => {
                engine.apply_effects(&effects).await;
                Ok(affected)
            }
            Err(err) => Err(engine.fail(OperationKind::Update, err)),
        }
    }

    /// Returns the number of rows affected; an unconditioned delete is refused
    pub async fn delete(mut self) -> Result<u64, EngineError> {
        let engine = self.engine.clone();
        let mut conn = Conn::Pool(engine.store().as_ref());
        match self.run_delete(&mut conn).await {
            Ok((affected, effects)) => {
                engine.apply_effects(&effects).await;
                Ok(affected)
            }
            Err(err) => Err(engine.fail(OperationKind::Delete, err)),
        }
    }

    /// Run caller SQL and read its rows into the model
    pub async fn query_raw(mut self, sql: &str, args: &[Value]) -> Result<u64, EngineError> {
        let engine = self.engine.clone();
        let mut conn = Conn::Pool(engine.store().as_ref());
        self.run_query_raw(&mut conn, sql, args)
            .await
            .map_err(|err| engine.fail(OperationKind::QueryRaw, err))
    }
}

impl Chain<'static, Detached> {
    pub(super) fn detached(engine: Engine, table: &str) -> Self {
        let mut state = OperationState::new(&engine.config().primary_key);
        state.tables = vec![table.to_string()];
        Self {
            engine,
            model: None,
            state,
            deferred: None,
            pk_explicit: false,
        }
    }
}
