//! sqlx-backed store over the `Any` driver (MySQL, Postgres, SQLite)

use super::{ExecOutcome, Row, Store, StoreTransaction};
use crate::errors::StoreError;
use crate::{debug_log, trace_log};
use async_trait::async_trait;
use config::DatabaseConfig;
use dialect::Dialect;
use serde_json::Value;
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column, Row as _, Transaction};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SqlxStore {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlxStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let descriptor = config
            .descriptor()
            .map_err(|e| StoreError::Driver(e.to_string()))?;
        let dialect =
            Dialect::from_scheme(&descriptor.scheme).map_err(|e| StoreError::Driver(e.to_string()))?;
        if matches!(dialect, Dialect::MsSql | Dialect::Ansi) {
            return Err(StoreError::Driver(format!(
                "no bundled driver for {}; supply a custom Store",
                dialect
            )));
        }

        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_seconds)))
            .max_lifetime(Some(Duration::from_secs(config.max_lifetime_seconds)))
            .connect(&config.url)
            .await?;

        debug_log!("connected {} store", dialect);
        Ok(Self { pool, dialect })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

/// Rewrite `?` placeholders outside string literals into `$n`
fn numbered_placeholders(dialect: Dialect, sql: &str) -> String {
    if dialect != Dialect::Postgres {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + 8);
    let mut in_literal = false;
    let mut index = 0;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                out.push(c);
            }
            '?' if !in_literal => {
                index += 1;
                out.push_str(&dialect.placeholder(index));
            }
            _ => out.push(c),
        }
    }
    out
}

fn bind_args<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    args: &[Value],
) -> Query<'q, Any, AnyArguments<'q>> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s.clone()),
            composite => query.bind(composite.to_string()),
        };
    }
    query
}

fn decode_column(row: &AnyRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v
            .map(|bytes| Value::from(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null);
    }
    Value::Null
}

fn to_row(row: &AnyRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| (column.name().to_string(), decode_column(row, i)))
        .collect()
}

fn to_outcome(result: sqlx::any::AnyQueryResult) -> ExecOutcome {
    ExecOutcome {
        rows_affected: result.rows_affected(),
        last_insert_id: result.last_insert_id().unwrap_or_default(),
    }
}

/// The sqlite any driver never fills `last_insert_id`; it has to be read
/// back on the connection that ran the INSERT
fn needs_rowid(dialect: Dialect, sql: &str, outcome: &ExecOutcome) -> bool {
    let verb = sql.split_whitespace().next().unwrap_or_default();
    dialect == Dialect::Sqlite
        && outcome.last_insert_id == 0
        && outcome.rows_affected > 0
        && (verb.eq_ignore_ascii_case("insert") || verb.eq_ignore_ascii_case("replace"))
}

const LAST_ROWID_QUERY: &str = "SELECT last_insert_rowid()";

fn rowid_of(row: &AnyRow) -> i64 {
    decode_column(row, 0).as_i64().unwrap_or_default()
}

#[async_trait]
impl Store for SqlxStore {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn fetch(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, StoreError> {
        let sql = numbered_placeholders(self.dialect, sql);
        trace_log!(sql = %sql, "fetch");
        let rows = bind_args(sqlx::query(&sql), args)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(to_row).collect())
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, StoreError> {
        let sql = numbered_placeholders(self.dialect, sql);
        trace_log!(sql = %sql, "execute");
        let mut conn = self.pool.acquire().await?;
        let result = bind_args(sqlx::query(&sql), args)
            .execute(&mut *conn)
            .await?;
        let mut outcome = to_outcome(result);
        if needs_rowid(self.dialect, &sql, &outcome) {
            let row = sqlx::query(LAST_ROWID_QUERY).fetch_one(&mut *conn).await?;
            outcome.last_insert_id = rowid_of(&row);
        }
        Ok(outcome)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqlxTransaction {
            tx,
            dialect: self.dialect,
        }))
    }
}

struct SqlxTransaction {
    tx: Transaction<'static, Any>,
    dialect: Dialect,
}

#[async_trait]
impl StoreTransaction for SqlxTransaction {
    async fn fetch(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, StoreError> {
        let sql = numbered_placeholders(self.dialect, sql);
        trace_log!(sql = %sql, "tx fetch");
        let rows = bind_args(sqlx::query(&sql), args)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.iter().map(to_row).collect())
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecOutcome, StoreError> {
        let sql = numbered_placeholders(self.dialect, sql);
        trace_log!(sql = %sql, "tx execute");
        let result = bind_args(sqlx::query(&sql), args)
            .execute(&mut *self.tx)
            .await?;
        let mut outcome = to_outcome(result);
        if needs_rowid(self.dialect, &sql, &outcome) {
            let row = sqlx::query(LAST_ROWID_QUERY).fetch_one(&mut *self.tx).await?;
            outcome.last_insert_id = rowid_of(&row);
        }
        Ok(outcome)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
