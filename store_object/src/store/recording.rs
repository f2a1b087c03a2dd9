//! Dry-run store
//!
//! Records every statement it is handed and answers from scripted results.
//! Useful to preview the SQL an operation chain produces for a dialect with
//! no local server, and as a test double.

use super::{ExecOutcome, Row, Store, StoreTransaction};
use crate::errors::StoreError;
use async_trait::async_trait;
use dialect::Dialect;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Script {
    statements: Vec<String>,
    rows: VecDeque<Result<Vec<Row>, String>>,
    outcomes: VecDeque<Result<ExecOutcome, String>>,
}

#[derive(Debug)]
struct Shared {
    dialect: Dialect,
    script: Mutex<Script>,
    offline: AtomicBool,
}

/// Records statements; `fetch` and `execute` pop scripted results in order.
///
/// An empty row queue answers with no rows, an empty outcome queue with
/// one affected row and no insert id.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    shared: Arc<Shared>,
}

impl RecordingStore {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            shared: Arc::new(Shared {
                dialect,
                script: Mutex::new(Script::default()),
                offline: AtomicBool::new(false),
            }),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        // A poisoned lock only means another test thread panicked mid-record
        self.shared
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.script().rows.push_back(Ok(rows));
    }

    pub fn push_outcome(&self, rows_affected: u64, last_insert_id: i64) {
        self.script().outcomes.push_back(Ok(ExecOutcome {
            rows_affected,
            last_insert_id,
        }));
    }

    /// Make the next `execute` fail with a driver error
    pub fn push_exec_error(&self, message: &str) {
        self.script().outcomes.push_back(Err(message.to_string()));
    }

    /// Make the next `fetch` fail with a driver error
    pub fn push_fetch_error(&self, message: &str) {
        self.script().rows.push_back(Err(message.to_string()));
    }

    /// Refuse every call as if the server were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    /// Everything recorded so far, including BEGIN/COMMIT/ROLLBACK markers
    pub fn statements(&self) -> Vec<String> {
        self.script().statements.clone()
    }

    pub fn last_statement(&self) -> Option<String> {
        self.script().statements.last().cloned()
    }

    pub fn clear(&self) {
        let mut script = self.script();
        script.statements.clear();
        script.rows.clear();
        script.outcomes.clear();
    }

    fn record(&self, sql: &str, args: &[Value]) -> Result<(), StoreError> {
        if self.shared.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Driver("store unreachable".to_string()));
        }
        let entry = if args.is_empty() {
            sql.to_string()
        } else {
            let rendered: Vec<String> = args.iter().map(Value::to_string).collect();
            format!("{} -- [{}]", sql, rendered.join(", "))
        };
        self.script().statements.push(entry);
        Ok(())
    }

    fn next_rows(&self) -> Result<Vec<Row>, StoreError> {
        self.script()
            .rows
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
            .map_err(StoreError::Driver)
    }

    fn next_outcome(&self) -> Result<ExecOutcome, StoreError> {
        self.script()
            .outcomes
            .pop_front()
            .unwrap_or(Ok(ExecOutcome {
                rows_affected: 1,
                last_insert_id: 0,
            }))
            .map_err(StoreError::Driver)
    }
}

#[async_trait]
impl Store for RecordingStore {
    fn dialect(&self) -> Dialect {
        self.shared.dialect
    }

    async fn fetch(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, StoreError> {
        self.record(sql, args)?;
        self.next_rows()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, StoreError> {
        self.record(sql, args)?;
        self.next_outcome()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        self.record("BEGIN", &[])?;
        Ok(Box::new(RecordingTransaction {
            store: self.clone(),
        }))
    }
}

struct RecordingTransaction {
    store: RecordingStore,
}

#[async_trait]
impl StoreTransaction for RecordingTransaction {
    async fn fetch(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, StoreError> {
        self.store.fetch(sql, args).await
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecOutcome, StoreError> {
        self.store.execute(sql, args).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.store.record("COMMIT", &[])
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.store.record("ROLLBACK", &[])
    }
}
