//! Declared column type normalization.
//!
//! A field declares its column as a single string such as
//! `"INTEGER NOT NULL"` or `"VARCHAR(40) DEFAULT 'none'"`. This module splits
//! that string into the parts the planner compares against the catalog:
//! the SQLite type affinity, the NOT NULL flag and the default value.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// SQLite type affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeAffinity {
    /// Integer affinity.
    Integer,
    /// Text affinity.
    Text,
    /// Blob affinity.
    Blob,
    /// Real (floating point) affinity.
    Real,
    /// Numeric affinity (the fallback).
    Numeric,
}

impl TypeAffinity {
    /// Computes the affinity of a bare type name.
    ///
    /// The rules are evaluated in SQLite's order, so `"CHARINT"` is
    /// `Integer` and `"FLOATING POINT"` is `Integer` too ("POINT" contains
    /// "INT").
    #[must_use]
    pub fn of(type_name: &str) -> Self {
        let upper = type_name.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.contains("BLOB") {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Numeric
        }
    }

    /// Computes the affinity of a type as reported by the catalog.
    ///
    /// Only the leading type token counts, the same way
    /// [`parse_column_type`] treats declared types.
    #[must_use]
    pub fn of_catalog_type(type_text: &str) -> Self {
        match type_def_regex().captures(type_text) {
            Some(caps) => Self::of(&caps[2]),
            None => Self::of(type_text),
        }
    }
}

impl fmt::Display for TypeAffinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Real => "REAL",
            Self::Numeric => "NUMERIC",
        };
        f.write_str(name)
    }
}

/// The normalized form of a declared column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    /// The type token, including any precision suffix (e.g. `VARCHAR(40)`).
    pub type_name: String,
    /// Type affinity of the bare type name.
    pub affinity: TypeAffinity,
    /// Whether the tail contains `NOT NULL`.
    pub not_null: bool,
    /// The default value in canonical form (see [`canonical_default`]).
    pub default_value: Option<String>,
}

fn type_def_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*((\w+)(\s*\(\s*[+-]?\d+\s*(?:,\s*[+-]?\d+\s*)?\))?)((?s).*)$")
            .expect("type definition pattern is valid")
    })
}

fn not_null_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bNOT\s+NULL\b").expect("NOT NULL pattern is valid"))
}

fn default_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bDEFAULT\s+([+-]?\d+(?:\.\d*)?)")
            .expect("numeric default pattern is valid")
    })
}

fn default_literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bDEFAULT\s+'((?:[^']|'')*)'").expect("literal default pattern is valid")
    })
}

fn default_expr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bDEFAULT\s*\(").expect("expression default pattern is valid")
    })
}

/// Parses a declared column type.
///
/// Default values are extracted by three patterns tried in a fixed order:
/// a signed number, a quoted literal, a parenthesized expression. When more
/// than one pattern matches, the later one wins.
pub fn parse_column_type(declared: &str) -> Result<ColumnType> {
    let caps = type_def_regex()
        .captures(declared)
        .ok_or_else(|| SyncError::Parse {
            input: declared.to_string(),
            message: "expected a type name, optionally followed by (n) or (n,m)".to_string(),
        })?;

    let type_name = caps[1].trim().to_string();
    let affinity = TypeAffinity::of(&caps[2]);
    let tail = caps.get(4).map_or("", |m| m.as_str());

    let not_null = not_null_regex().is_match(tail);

    let mut default_value = None;
    if let Some(m) = default_number_regex().captures(tail) {
        default_value = Some(m[1].to_string());
    }
    if let Some(m) = default_literal_regex().captures(tail) {
        default_value = Some(format!("'{}'", m[1].replace("''", "'")));
    }
    if let Some(expr) = default_expression(tail) {
        default_value = Some(expr.to_string());
    }

    Ok(ColumnType {
        type_name,
        affinity,
        not_null,
        default_value,
    })
}

/// Finds `DEFAULT(<expr>)` and returns the balanced inner expression.
fn default_expression(tail: &str) -> Option<&str> {
    let m = default_expr_regex().find(tail)?;
    let start = m.end();
    let mut depth = 1usize;
    let mut in_literal = false;
    for (offset, ch) in tail[start..].char_indices() {
        match ch {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => {
                depth -= 1;
                if depth == 0 {
                    return Some(tail[start..start + offset].trim());
                }
            }
            _ => {}
        }
    }
    None
}

/// Brings a catalog default value into the form [`parse_column_type`]
/// produces: quoted literals have their doubled quotes collapsed.
#[must_use]
pub fn canonical_default(catalog_default: &str) -> String {
    let text = catalog_default.trim();
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        format!("'{}'", text[1..text.len() - 1].replace("''", "'"))
    } else {
        text.to_string()
    }
}
