//! SQL dialect profiles
//!
//! Pure lookup of the syntax fragments that differ between the supported
//! relational stores: identifier quoting, literal quoting, upsert keywords,
//! pagination and the way a generated primary key is read back.

pub mod profile;
pub mod quote;
pub mod types;

pub use profile::{ConflictSyntax, DialectProfile, InsertIdStrategy, LimitPlacement};
pub use quote::is_plain_identifier;
pub use types::{Dialect, DialectError};
