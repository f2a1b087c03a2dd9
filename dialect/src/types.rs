//! Dialect identity
//!
//! A dialect is fixed when a store handle is opened and never changes
//! for the life of that handle.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialectError {
    #[error("unsupported connection scheme: {0}")]
    UnknownScheme(String),
}

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
    MsSql,
    Ansi,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::MySql,
        Dialect::Postgres,
        Dialect::Sqlite,
        Dialect::MsSql,
        Dialect::Ansi,
    ];

    /// Resolve a dialect from a connection descriptor scheme
    pub fn from_scheme(scheme: &str) -> Result<Self, DialectError> {
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mssql" | "sqlserver" => Ok(Dialect::MsSql),
            "ansi" => Ok(Dialect::Ansi),
            other => Err(DialectError::UnknownScheme(other.to_string())),
        }
    }

    /// Canonical scheme name
    pub fn scheme(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::MsSql => "mssql",
            Dialect::Ansi => "ansi",
        }
    }

    /// Whether the store can express insert-or-update in one statement
    pub fn has_native_upsert(&self) -> bool {
        !matches!(self.profile().conflict, crate::ConflictSyntax::None)
    }

    /// Driver-native placeholder for the 1-based argument `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::MsSql => format!("@p{}", index),
            _ => "?".to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}
