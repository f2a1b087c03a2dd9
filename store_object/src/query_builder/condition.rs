//! WHERE clause assembly
//!
//! The base condition is the first available of: primary-key equality,
//! cache-index equality (queries only), the custom WHERE text, `1=1`.
//! AND, IN and NOT IN fragments are then appended.

use crate::engine::{OperationKind, OperationState};
use dialect::Dialect;

/// Which source produced the base condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionSource {
    PrimaryKey,
    Index,
    Custom,
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    /// Condition text without the `WHERE` keyword
    pub text: String,
    pub source: ConditionSource,
    pub extra: usize,
}

impl WhereClause {
    /// Nothing narrows the statement: a bare `1=1`
    pub fn is_unconditioned(&self) -> bool {
        self.source == ConditionSource::Always && self.extra == 0
    }
}

pub fn build_where(state: &OperationState, dialect: Dialect) -> WhereClause {
    let (base, source) = if let Some(pk) = state.primary_key_value() {
        (
            format!(
                "{} = {}",
                dialect.quote_identifier(&state.pk_name),
                dialect.quote_literal(pk)
            ),
            ConditionSource::PrimaryKey,
        )
    } else if !state.indexes.is_empty() && state.kind == OperationKind::Query {
        let parts: Vec<String> = state
            .indexes
            .iter()
            .map(|index| {
                format!(
                    "{} = {}",
                    dialect.quote_identifier(&index.column),
                    dialect.quote_literal(&index.value)
                )
            })
            .collect();
        (parts.join(" AND "), ConditionSource::Index)
    } else if let Some(custom) = state.custom_where.as_deref().filter(|w| !w.trim().is_empty()) {
        (custom.trim().to_string(), ConditionSource::Custom)
    } else {
        ("1=1".to_string(), ConditionSource::Always)
    };

    let mut parts = vec![base];
    parts.extend(state.and_fragments.iter().cloned());
    for membership in &state.memberships {
        let column = dialect.quote_identifier(&membership.column);
        if membership.values.is_empty() {
            // An empty list matches nothing, its negation everything
            parts.push(if membership.negated { "1=1" } else { "1=0" }.to_string());
            continue;
        }
        let values: Vec<String> = membership
            .values
            .iter()
            .map(|v| dialect.quote_literal(v))
            .collect();
        let keyword = if membership.negated { "NOT IN" } else { "IN" };
        parts.push(format!("{} {} ({})", column, keyword, values.join(",")));
    }

    WhereClause {
        text: parts.join(" AND "),
        source,
        extra: state.extra_fragments(),
    }
}
