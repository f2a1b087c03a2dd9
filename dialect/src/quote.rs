//! Identifier and literal quoting
//!
//! Only values are quoted as literals; no further sanitization happens here.
//! Callers handling untrusted text should prefer native placeholder binding.

use crate::Dialect;
use serde_json::Value;

/// Letters, digits and underscores only
pub fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `name` or `table.name` made of plain identifiers, where the last part may be `*`
fn is_plain_path(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.iter().enumerate().all(|(i, part)| {
        is_plain_identifier(part) || (*part == "*" && i == parts.len() - 1 && i > 0)
    })
}

impl Dialect {
    /// Quote a column reference.
    ///
    /// Plain identifiers and dotted paths are wrapped part by part; `*`,
    /// expressions, aliases and already quoted text pass through untouched.
    pub fn quote_identifier(&self, name: &str) -> String {
        let name = name.trim();
        if !is_plain_path(name) {
            return name.to_string();
        }
        let profile = self.profile();
        name.split('.')
            .map(|part| {
                if part == "*" {
                    part.to_string()
                } else {
                    format!("{}{}{}", profile.identifier_open, part, profile.identifier_close)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Strip this dialect's identifier quotes
    pub fn unquote_identifier(&self, quoted: &str) -> String {
        let profile = self.profile();
        quoted
            .chars()
            .filter(|c| *c != profile.identifier_open && *c != profile.identifier_close)
            .collect()
    }

    /// Quote a text value as a string literal, doubling embedded quotes.
    ///
    /// MySQL reads backslash escapes inside literals, so there backslashes
    /// are doubled and NUL is written as `\0`.
    pub fn quote_string(&self, text: &str) -> String {
        let q = self.profile().string_quote;
        let mut out = String::with_capacity(text.len() + 2);
        out.push(q);
        for c in text.chars() {
            match c {
                '\\' if *self == Dialect::MySql => out.push_str("\\\\"),
                '\0' if *self == Dialect::MySql => out.push_str("\\0"),
                c if c == q => {
                    out.push(q);
                    out.push(q);
                }
                c => out.push(c),
            }
        }
        out.push(q);
        out
    }

    /// Render a value as a SQL literal
    pub fn quote_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match (self.profile().boolean_keywords, b) {
                (true, true) => "TRUE".to_string(),
                (true, false) => "FALSE".to_string(),
                (false, true) => "1".to_string(),
                (false, false) => "0".to_string(),
            },
            Value::Number(n) => n.to_string(),
            Value::String(s) => self.quote_string(s),
            composite => self.quote_string(&composite.to_string()),
        }
    }
}
