//! SELECT / INSERT / UPSERT / UPDATE / DELETE composition

use super::condition::build_where;
use crate::engine::{OperationKind, OperationState};
use crate::errors::EngineError;
use dialect::{ConflictSyntax, Dialect, LimitPlacement};
use serde_json::Value;

/// Follow-up query that reads the identity generated by the last INSERT
pub const SCOPE_IDENTITY_QUERY: &str = "SELECT SCOPE_IDENTITY() AS last_insert_id";

/// Plain `SELECT * ... WHERE pk = value`, used to re-read a record
pub fn select_by_primary_key(dialect: Dialect, table: &str, pk_name: &str, pk_value: &Value) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = {}",
        table,
        dialect.quote_identifier(pk_name),
        dialect.quote_literal(pk_value)
    )
}

#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    state: &'a OperationState,
    dialect: Dialect,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(state: &'a OperationState, dialect: Dialect) -> Self {
        Self { state, dialect }
    }

    fn table(&self) -> Result<String, EngineError> {
        let table = self.state.table();
        if table.trim().is_empty() {
            return Err(EngineError::MissingTable(self.state.kind));
        }
        Ok(table)
    }

    fn quote_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn select_list(&self) -> String {
        if !self.state.select.is_empty() {
            self.quote_list(&self.state.select)
        } else if !self.state.dictionary.is_empty() {
            let columns: Vec<String> = self.state.dictionary.columns().map(str::to_string).collect();
            self.quote_list(&columns)
        } else {
            "*".to_string()
        }
    }

    /// Statement for `kind`; SELECT also serves raw and map kinds
    pub fn build(&self, kind: OperationKind) -> Result<String, EngineError> {
        match kind {
            OperationKind::Insert => self.insert(),
            OperationKind::Upsert => self.upsert(),
            OperationKind::Update => self.update(),
            OperationKind::Delete => self.delete(),
            _ => self.select(),
        }
    }

    pub fn select(&self) -> Result<String, EngineError> {
        let state = self.state;
        let profile = self.dialect.profile();
        let table = self.table()?;
        let top = profile.limit == LimitPlacement::Top;

        let mut parts = vec!["SELECT".to_string()];
        if state.distinct {
            parts.push("DISTINCT".to_string());
        }
        if let (true, Some(n), None) = (top, state.limit, state.offset) {
            parts.push(profile.limit_syntax(n));
        }
        parts.push(self.select_list());
        parts.push("FROM".to_string());
        parts.push(table);
        parts.push("WHERE".to_string());
        parts.push(build_where(state, self.dialect).text);

        if !state.group_by.is_empty() {
            parts.push(format!("GROUP BY {}", self.quote_list(&state.group_by)));
        }
        if !state.order_by.is_empty() {
            let mut order = format!("ORDER BY {}", self.quote_list(&state.order_by));
            if let Some(sort) = state.sort {
                order.push(' ');
                order.push_str(sort.to_sql());
            }
            parts.push(order);
        } else if top && state.offset.is_some() {
            // OFFSET ... FETCH is only valid after an ORDER BY
            parts.push("ORDER BY (SELECT NULL)".to_string());
        }

        match (state.limit, state.offset) {
            (Some(n), Some(m)) => parts.push(profile.limit_offset_syntax(n, m)),
            (Some(n), None) if !top => parts.push(profile.limit_syntax(n)),
            (None, Some(m)) => parts.push(profile.offset_syntax(m)),
            _ => {}
        }

        Ok(parts.join(" "))
    }

    /// Columns and values written by INSERT
    fn insert_values(&self) -> Vec<(&'a str, Value)> {
        let state = self.state;
        state
            .dictionary
            .iter()
            .filter_map(|(column, value)| {
                if column == state.pk_name {
                    // unset or zero: left to the store's auto increment
                    return state.primary_key_value().map(|pk| (column, pk.clone()));
                }
                if value.is_null() && state.dictionary.is_readonly(column) {
                    return None;
                }
                Some((column, value.clone()))
            })
            .collect()
    }

    fn insert_clause(&self) -> Result<String, EngineError> {
        let table = self.table()?;
        let values = self.insert_values();
        if values.is_empty() {
            return Err(EngineError::NoWritableColumns {
                kind: self.state.kind,
                table,
            });
        }
        let columns: Vec<String> = values
            .iter()
            .map(|(c, _)| self.dialect.quote_identifier(c))
            .collect();
        let literals: Vec<String> = values
            .iter()
            .map(|(_, v)| self.dialect.quote_literal(v))
            .collect();
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(","),
            literals.join(",")
        ))
    }

    pub fn insert(&self) -> Result<String, EngineError> {
        self.insert_clause()
    }

    /// `col=value` pairs for SET: selected columns minus the primary key and read-only columns
    pub fn assignments(&self) -> Result<Vec<String>, EngineError> {
        let state = self.state;
        let candidates: Vec<&str> = if state.selects_all() {
            state.dictionary.columns().collect()
        } else {
            let mut selected = Vec::with_capacity(state.select.len());
            for column in &state.select {
                if !state.dictionary.contains(column) {
                    return Err(EngineError::UnknownColumn {
                        column: column.clone(),
                    });
                }
                selected.push(column.as_str());
            }
            selected
        };

        Ok(candidates
            .into_iter()
            .filter(|c| *c != state.pk_name && !state.dictionary.is_readonly(c))
            .filter_map(|c| {
                state.dictionary.get(c).map(|v| {
                    format!(
                        "{}={}",
                        self.dialect.quote_identifier(c),
                        self.dialect.quote_literal(v)
                    )
                })
            })
            .collect())
    }

    fn no_writable_columns(&self) -> EngineError {
        EngineError::NoWritableColumns {
            kind: self.state.kind,
            table: self.state.table(),
        }
    }

    pub fn update(&self) -> Result<String, EngineError> {
        let table = self.table()?;
        let assignments = self.assignments()?;
        if assignments.is_empty() {
            return Err(self.no_writable_columns());
        }
        Ok(format!(
            "UPDATE {} SET {} WHERE {}",
            table,
            assignments.join(","),
            build_where(self.state, self.dialect).text
        ))
    }

    /// UPDATE of the selected columns addressed by an explicit key
    pub fn update_by_primary_key(&self, pk_value: &Value) -> Result<Option<String>, EngineError> {
        let table = self.table()?;
        let assignments = self.assignments()?;
        if assignments.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "UPDATE {} SET {} WHERE {} = {}",
            table,
            assignments.join(","),
            self.dialect.quote_identifier(&self.state.pk_name),
            self.dialect.quote_literal(pk_value)
        )))
    }

    /// Native single-statement upsert
    pub fn upsert(&self) -> Result<String, EngineError> {
        let state = self.state;
        let profile = self.dialect.profile();
        let insert = self.insert_clause()?;
        let mut assignments = self.assignments()?;

        match profile.conflict {
            ConflictSyntax::DuplicateKey => {
                if self.dialect == Dialect::MySql && state.dictionary.contains(&state.pk_name) {
                    // makes LAST_INSERT_ID() report the existing row on the update branch
                    let pk = self.dialect.quote_identifier(&state.pk_name);
                    assignments.insert(0, format!("{pk}=LAST_INSERT_ID({pk})"));
                }
                if assignments.is_empty() {
                    return Err(self.no_writable_columns());
                }
                Ok(format!(
                    "{} ON DUPLICATE KEY UPDATE {}",
                    insert,
                    assignments.join(",")
                ))
            }
            ConflictSyntax::OnConflict => {
                if state.conflicts.is_empty() && profile.conflict_target_required {
                    return Err(EngineError::MissingConflictColumns {
                        table: state.table(),
                    });
                }
                if assignments.is_empty() {
                    return Err(self.no_writable_columns());
                }
                // SQLite: no target means any uniqueness conflict
                let target = if state.conflicts.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", self.quote_list(&state.conflicts))
                };
                let mut sql = format!(
                    "{} ON CONFLICT{} DO UPDATE SET {}",
                    insert,
                    target,
                    assignments.join(",")
                );
                if state.dictionary.contains(&state.pk_name) {
                    sql.push_str(&self.returning_primary_key());
                }
                Ok(sql)
            }
            ConflictSyntax::None => Err(EngineError::Unsupported(format!(
                "{} has no single-statement upsert",
                self.dialect
            ))),
        }
    }

    pub fn delete(&self) -> Result<String, EngineError> {
        let table = self.table()?;
        let clause = build_where(self.state, self.dialect);
        if clause.is_unconditioned() {
            return Err(EngineError::UnconditionedDelete { table });
        }
        Ok(format!("DELETE FROM {} WHERE {}", table, clause.text))
    }

    /// ` RETURNING <pk>`
    pub fn returning_primary_key(&self) -> String {
        format!(" RETURNING {}", self.dialect.quote_identifier(&self.state.pk_name))
    }

    /// Predicate identifying the existing row for a select-then-write upsert:
    /// the conflict columns when declared, otherwise the primary key
    pub fn uniqueness_predicate(&self) -> Result<String, EngineError> {
        let state = self.state;
        if !state.conflicts.is_empty() {
            let mut parts = Vec::with_capacity(state.conflicts.len());
            for column in &state.conflicts {
                let value = state.dictionary.get(column).ok_or_else(|| EngineError::UnknownColumn {
                    column: column.clone(),
                })?;
                parts.push(format!(
                    "{} = {}",
                    self.dialect.quote_identifier(column),
                    self.dialect.quote_literal(value)
                ));
            }
            return Ok(parts.join(" AND "));
        }
        match state.primary_key_value() {
            Some(pk) => Ok(format!(
                "{} = {}",
                self.dialect.quote_identifier(&state.pk_name),
                self.dialect.quote_literal(pk)
            )),
            None => Err(EngineError::MissingConflictColumns {
                table: state.table(),
            }),
        }
    }

    pub fn select_primary_key(&self, predicate: &str) -> Result<String, EngineError> {
        Ok(format!(
            "SELECT {} FROM {} WHERE {}",
            self.dialect.quote_identifier(&self.state.pk_name),
            self.table()?,
            predicate
        ))
    }
}
