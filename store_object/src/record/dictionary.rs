use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

/// Column name to current value, in declared field order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDictionary {
    entries: IndexMap<String, Value>,
    readonly: IndexSet<String>,
}

impl FieldDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a column; the first insertion of a name keeps its position
    pub fn insert(&mut self, column: &str, value: Value, readonly: bool) {
        self.entries.insert(column.to_string(), value);
        if readonly {
            self.readonly.insert(column.to_string());
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entries.contains_key(column)
    }

    pub fn is_readonly(&self, column: &str) -> bool {
        self.readonly.contains(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
