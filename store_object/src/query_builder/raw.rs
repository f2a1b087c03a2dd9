//! Parameter handling for caller-supplied SQL
//!
//! When the number of `?` placeholders equals the number of arguments the
//! arguments are handed to the driver for native binding. Otherwise each
//! `{}` token is replaced by the argument's text. That fallback does no
//! escaping of string arguments: never feed it untrusted input.

use crate::errors::EngineError;
use dialect::Dialect;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    pub sql: String,
    /// Arguments for native binding; empty when substituted into the text
    pub args: Vec<Value>,
}

fn count_question_marks(sql: &str) -> usize {
    sql.matches('?').count()
}

/// Text of an argument for literal substitution
fn raw_text(dialect: Dialect, value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => dialect.quote_literal(other),
    }
}

pub fn prepare_raw(dialect: Dialect, sql: &str, args: &[Value]) -> Result<RawStatement, EngineError> {
    if args.is_empty() || count_question_marks(sql) == args.len() {
        return Ok(RawStatement {
            sql: sql.to_string(),
            args: args.to_vec(),
        });
    }

    let tokens = sql.matches("{}").count();
    if tokens != args.len() {
        return Err(EngineError::ArgumentMismatch(format!(
            "{} arguments for {} `?` placeholders and {} `{{}}` tokens",
            args.len(),
            count_question_marks(sql),
            tokens
        )));
    }

    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    for arg in args {
        if let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            out.push_str(&raw_text(dialect, arg));
            rest = &rest[pos + 2..];
        }
    }
    out.push_str(rest);

    Ok(RawStatement {
        sql: out,
        args: Vec::new(),
    })
}

/// Replace each `?` with the quoted literal of the matching argument
pub fn substitute_placeholders(dialect: Dialect, fragment: &str, args: &[Value]) -> Result<String, EngineError> {
    let count = count_question_marks(fragment);
    if count != args.len() {
        return Err(EngineError::ArgumentMismatch(format!(
            "fragment `{}` has {} placeholders but {} arguments were given",
            fragment,
            count,
            args.len()
        )));
    }
    let mut args = args.iter();
    let mut out = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if c == '?' {
            if let Some(arg) = args.next() {
                out.push_str(&dialect.quote_literal(arg));
                continue;
            }
        }
        out.push(c);
    }
    Ok(out)
}
