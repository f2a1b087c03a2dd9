//! Statement construction
//!
//! Turns an [`OperationState`](crate::OperationState) into dialect-correct
//! SQL text. Nothing here touches the store.

pub mod condition;
pub mod ordering;
pub mod raw;
pub mod statement;

#[cfg(test)]
mod tests;

pub use condition::{build_where, ConditionSource, WhereClause};
pub use ordering::SortOrder;
pub use raw::{prepare_raw, substitute_placeholders, RawStatement};
pub use statement::StatementBuilder;
