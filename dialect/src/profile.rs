//! Per-dialect syntax fragments

use crate::Dialect;

/// Native insert-or-update clause shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSyntax {
    /// `ON DUPLICATE KEY UPDATE col=val,...`
    DuplicateKey,
    /// `ON CONFLICT (cols) DO UPDATE SET col=val,... RETURNING pk`
    OnConflict,
    /// No native clause; upsert runs as select-then-insert-or-update in a transaction
    None,
}

/// Where the row limit goes in a SELECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPlacement {
    /// `... LIMIT n OFFSET m` at the end
    Trailing,
    /// `SELECT TOP n ...`, or `OFFSET m ROWS FETCH NEXT n ROWS ONLY` when paging
    Top,
}

/// How a generated primary key is read back after INSERT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertIdStrategy {
    /// The driver reports the last insert id
    Driver,
    /// `INSERT ... RETURNING pk`
    Returning,
    /// `INSERT ...; SELECT SCOPE_IDENTITY() AS last_insert_id`
    ScopeIdentity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectProfile {
    pub identifier_open: char,
    pub identifier_close: char,
    pub string_quote: char,
    pub conflict: ConflictSyntax,
    pub limit: LimitPlacement,
    pub insert_id: InsertIdStrategy,
    /// Render booleans as TRUE/FALSE instead of 1/0
    pub boolean_keywords: bool,
    /// `ON CONFLICT` must name its target columns
    pub conflict_target_required: bool,
    /// A trailing OFFSET is only accepted together with a LIMIT
    offset_needs_limit: Option<&'static str>,
}

const MYSQL: DialectProfile = DialectProfile {
    identifier_open: '`',
    identifier_close: '`',
    string_quote: '\'',
    conflict: ConflictSyntax::DuplicateKey,
    limit: LimitPlacement::Trailing,
    insert_id: InsertIdStrategy::Driver,
    boolean_keywords: false,
    conflict_target_required: false,
    offset_needs_limit: Some("18446744073709551615"),
};

// RETURNING and target-less ON CONFLICT need SQLite 3.35+
const SQLITE: DialectProfile = DialectProfile {
    conflict: ConflictSyntax::OnConflict,
    insert_id: InsertIdStrategy::Returning,
    offset_needs_limit: Some("-1"),
    ..MYSQL
};

const POSTGRES: DialectProfile = DialectProfile {
    identifier_open: '"',
    identifier_close: '"',
    string_quote: '\'',
    conflict: ConflictSyntax::OnConflict,
    limit: LimitPlacement::Trailing,
    insert_id: InsertIdStrategy::Returning,
    boolean_keywords: true,
    conflict_target_required: true,
    offset_needs_limit: None,
};

const MSSQL: DialectProfile = DialectProfile {
    identifier_open: '[',
    identifier_close: ']',
    string_quote: '\'',
    conflict: ConflictSyntax::None,
    limit: LimitPlacement::Top,
    insert_id: InsertIdStrategy::ScopeIdentity,
    boolean_keywords: false,
    conflict_target_required: false,
    offset_needs_limit: None,
};

const ANSI: DialectProfile = DialectProfile {
    identifier_open: '"',
    identifier_close: '"',
    string_quote: '\'',
    conflict: ConflictSyntax::None,
    limit: LimitPlacement::Trailing,
    insert_id: InsertIdStrategy::Driver,
    boolean_keywords: true,
    conflict_target_required: false,
    offset_needs_limit: None,
};

impl Dialect {
    pub fn profile(&self) -> &'static DialectProfile {
        match self {
            Dialect::MySql => &MYSQL,
            Dialect::Sqlite => &SQLITE,
            Dialect::Postgres => &POSTGRES,
            Dialect::MsSql => &MSSQL,
            Dialect::Ansi => &ANSI,
        }
    }
}

impl DialectProfile {
    /// Keyword that opens the conflict clause
    pub fn conflict_open_keyword(&self) -> Option<&'static str> {
        match self.conflict {
            ConflictSyntax::DuplicateKey => Some("ON DUPLICATE KEY UPDATE"),
            ConflictSyntax::OnConflict => Some("ON CONFLICT"),
            ConflictSyntax::None => None,
        }
    }

    /// Keyword between the conflict target and the assignment list
    pub fn conflict_close_keyword(&self) -> Option<&'static str> {
        match self.conflict {
            ConflictSyntax::OnConflict => Some("DO UPDATE SET"),
            _ => None,
        }
    }

    /// Row limit without an offset
    pub fn limit_syntax(&self, n: u64) -> String {
        match self.limit {
            LimitPlacement::Trailing => format!("LIMIT {}", n),
            LimitPlacement::Top => format!("TOP {}", n),
        }
    }

    /// Row limit combined with an offset
    pub fn limit_offset_syntax(&self, n: u64, m: u64) -> String {
        match self.limit {
            LimitPlacement::Trailing => format!("LIMIT {} OFFSET {}", n, m),
            LimitPlacement::Top => format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", m, n),
        }
    }

    /// Offset without a row limit
    pub fn offset_syntax(&self, m: u64) -> String {
        match (self.limit, self.offset_needs_limit) {
            (LimitPlacement::Top, _) => format!("OFFSET {} ROWS", m),
            (LimitPlacement::Trailing, Some(all)) => format!("LIMIT {} OFFSET {}", all, m),
            (LimitPlacement::Trailing, None) => format!("OFFSET {}", m),
        }
    }
}
