//! Per-chain operation state
//!
//! Every chain owns one of these. It is built when a model or table is
//! attached, changed only by that chain's modifiers and dropped when the
//! terminal verb returns.

use crate::query_builder::SortOrder;
use crate::record::{FieldDictionary, ModelKind};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationKind {
    #[default]
    Query,
    Insert,
    Upsert,
    Update,
    Delete,
    QueryRaw,
    QueryMap,
    ExecRaw,
    Tx,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Query => "query",
            OperationKind::Insert => "insert",
            OperationKind::Upsert => "upsert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::QueryRaw => "raw query",
            OperationKind::QueryMap => "map query",
            OperationKind::ExecRaw => "raw exec",
            OperationKind::Tx => "transaction",
        };
        f.write_str(name)
    }
}

/// Alternate identity used to build an index pointer key
#[derive(Debug, Clone, PartialEq)]
pub struct CacheIndex {
    pub column: String,
    pub value: Value,
}

/// `col IN (...)` or `col NOT IN (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub column: String,
    pub values: Vec<Value>,
    pub negated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OperationState {
    pub kind: OperationKind,
    pub model_kind: ModelKind,
    pub tables: Vec<String>,
    pub pk_name: String,
    /// Set by `id()`; overrides the dictionary's primary-key value
    pub pk_value: Option<Value>,
    pub dictionary: FieldDictionary,
    /// Resolved column of every schema field, for assigning results
    pub columns: Vec<String>,
    pub select: Vec<String>,
    pub custom_where: Option<String>,
    pub and_fragments: Vec<String>,
    pub memberships: Vec<Membership>,
    pub indexes: Vec<CacheIndex>,
    pub order_by: Vec<String>,
    pub sort: Option<SortOrder>,
    pub group_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub conflicts: Vec<String>,
    pub distinct: bool,
    pub use_cache: bool,
    pub tags: Vec<String>,
    pub excluded: Vec<String>,
    pub readonly: Vec<String>,
}

/// A usable key: a non-empty string or a non-zero number
pub fn is_set_key(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

impl OperationState {
    pub fn new(pk_name: &str) -> Self {
        Self {
            pk_name: pk_name.to_string(),
            ..Self::default()
        }
    }

    pub fn table(&self) -> String {
        self.tables.join(",")
    }

    /// The explicit id, else the record's own primary-key value, if usable
    pub fn primary_key_value(&self) -> Option<&Value> {
        self.pk_value
            .as_ref()
            .or_else(|| self.dictionary.get(&self.pk_name))
            .filter(|v| is_set_key(v))
    }

    /// AND, IN and NOT IN fragments beyond the base condition
    pub fn extra_fragments(&self) -> usize {
        self.and_fragments.len() + self.memberships.len()
    }

    /// Whether the select list covers the whole record
    pub fn selects_all(&self) -> bool {
        self.select.is_empty() || self.select.iter().all(|c| c == "*")
    }

    /// Whether a fetched row carries every column, so it may be cached
    pub fn reads_full_record(&self) -> bool {
        self.selects_all() && self.excluded.is_empty()
    }
}
