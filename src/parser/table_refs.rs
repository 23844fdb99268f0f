//! Table reference extraction from procedure bodies and ad hoc SQL
//!
//! This is a bounded-accuracy lexical pass: comments are removed, then every
//! `FROM`, `JOIN`, `INTO`, `UPDATE` or `DELETE FROM` keyword is followed by a
//! one to three part identifier chain. Derived tables, table variables and
//! functions are not recognised, and words that happen to follow those keywords
//! (e.g. `FROM` inside a string literal) may be captured.

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::comments::strip_comments;

/// Schema assumed for single-part table names.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Keyword followed by an identifier chain of 1-3 parts, each optionally bracketed.
static TABLE_REF: Lazy<Regex> = Lazy::new(|| {
    let part = r"(?:\[[^\]\r\n]+\]|[#A-Za-z_][\w#$]*)";
    let pattern = format!(
        r"(?i)\b(?:DELETE\s+FROM|FROM|JOIN|INTO|UPDATE)\s+({part}(?:\.{part}){{0,2}})"
    );
    Regex::new(&pattern).expect("Invalid table reference regex")
});

/// Splits an identifier chain on dots that are outside brackets.
static CHAIN_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]+\]|[^.\[\]]+").expect("Invalid chain part regex"));

/// A table referenced by SQL text, resolved against a default database
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableReference {
    /// None when no default database was available to resolve a partial name
    pub database: Option<String>,
    pub schema: String,
    pub table: String,
}

impl TableReference {
    pub fn new(database: Option<&str>, schema: &str, table: &str) -> Self {
        Self {
            database: database.map(str::to_string),
            schema: schema.to_string(),
            table: table.to_string(),
        }
    }

    /// `[db].[schema].[table]`, or `[schema].[table]` when unresolved.
    pub fn bracketed(&self) -> String {
        let tail = format!(
            "{}.{}",
            crate::util::quote_ident(&self.schema),
            crate::util::quote_ident(&self.table)
        );
        match &self.database {
            Some(db) => format!("{}.{}", crate::util::quote_ident(db), tail),
            None => tail,
        }
    }

    /// Fill in the database when the reference was extracted without one.
    pub fn with_default_database(mut self, database: &str) -> Self {
        if self.database.is_none() {
            self.database = Some(database.to_string());
        }
        self
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.database {
            Some(db) => write!(f, "{}.{}.{}", db, self.schema, self.table),
            None => write!(f, "{}.{}", self.schema, self.table),
        }
    }
}

/// Extract the set of tables referenced by `sql`.
///
/// Temp tables (`#t`, `##t`) are never returned. One-part names resolve to
/// `default_database.dbo.table`, two-part names to `default_database.schema.table`,
/// three-part names are used as written. Without a default database the
/// database stays unset for partial names.
pub fn extract_tables(sql: &str, default_database: Option<&str>) -> BTreeSet<TableReference> {
    let cleaned = strip_comments(sql);
    let default_database = default_database.map(str::trim).filter(|db| !db.is_empty());

    TABLE_REF
        .captures_iter(&cleaned)
        .filter_map(|caps| caps.get(1))
        .filter_map(|chain| resolve_chain(chain.as_str(), default_database))
        .collect()
}

fn resolve_chain(chain: &str, default_database: Option<&str>) -> Option<TableReference> {
    let parts: Vec<String> = CHAIN_PART
        .find_iter(chain)
        .map(|m| m.as_str().trim_matches(|c| c == '[' || c == ']').trim().to_string())
        .collect();

    let table = parts.last()?;
    if table.is_empty() || table.starts_with('#') {
        return None;
    }

    let reference = match parts.as_slice() {
        [table] => TableReference::new(default_database, DEFAULT_SCHEMA, table),
        [schema, table] => TableReference::new(default_database, schema, table),
        [database, schema, table] => TableReference::new(Some(database), schema, table),
        _ => return None,
    };

    if reference.schema.is_empty() {
        return None;
    }
    Some(reference)
}
