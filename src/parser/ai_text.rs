//! Post-processing of free-form text returned by the text-generation collaborator
//!
//! Nothing here assumes the text is correct SQL. Index suggestions are pulled
//! out by shape only, and rewritten procedures are trimmed down to the
//! `CREATE PROCEDURE` statement.

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AdvisorError;
use crate::util::{find_ci, quote_ident};

/// Marker the optimization prompt asks the model to put before its answer.
pub const SP_OPTIMIZED_MARKER: &str = "=== SP_OPTIMIZED ===";
const SP_OPTIMIZED_END_MARKER: &str = "=== END SP_OPTIMIZED ===";

static CREATE_INDEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)CREATE\s+(?:UNIQUE\s+)?(?:NONCLUSTERED\s+)?INDEX\s+[\[\]A-Za-z0-9_]+.*?ON\s+[\[\]A-Za-z0-9_.]+\s*\([^)]+\)[^;]*;",
    )
    .expect("Invalid CREATE INDEX regex")
});

static SQL_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```sql(.*?)```").expect("Invalid fence regex"));

static CREATE_PROCEDURE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCREATE\s+(?:OR\s+ALTER\s+)?PROC(?:EDURE)?\b").expect("Invalid procedure regex"));

static NUMBERED_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+\.[ \t]*").expect("Invalid numbering regex"));

static PROCEDURE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(CREATE\s+(?:OR\s+ALTER\s+)?PROC(?:EDURE)?\s+)([^\s(]+)").expect("Invalid procedure name regex")
});

/// Pull every `CREATE [UNIQUE] [NONCLUSTERED] INDEX ... ON obj (cols) ...;`
/// statement out of `text`, one per line.
pub fn extract_index_ddl(text: &str) -> String {
    CREATE_INDEX
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduce a model answer to the rewritten procedure text.
///
/// A fenced ```sql block wins when present. Otherwise everything before the
/// first `CREATE PROCEDURE` line is dropped, together with the answer markers,
/// stray backticks and numbered-list prefixes.
pub fn sanitize_procedure(text: &str) -> String {
    if let Some(fenced) = SQL_FENCE.captures(text).and_then(|c| c.get(1)) {
        return strip_markers(fenced.as_str()).trim().to_string();
    }

    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines
        .iter()
        .position(|line| CREATE_PROCEDURE_LINE.is_match(line))
        .unwrap_or(0);
    let body = lines[start..].join("\n").replace('`', "");
    let body = NUMBERED_PREFIX.replace_all(&body, "");
    strip_markers(&body).trim().to_string()
}

fn strip_markers(text: &str) -> String {
    text.replace(SP_OPTIMIZED_END_MARKER, "")
        .replace(SP_OPTIMIZED_MARKER, "")
}

/// Name of the procedure created by `sql` as `(schema, name)`, brackets removed.
pub fn procedure_name(sql: &str) -> Option<(Option<String>, String)> {
    let flattened = sql.replace(['\r', '\n'], " ");
    let caps = PROCEDURE_NAME.captures(&flattened)?;
    let full = caps.get(2)?.as_str();
    let mut parts: Vec<String> = full
        .split('.')
        .map(|p| p.trim_matches(|c| c == '[' || c == ']').to_string())
        .collect();
    let name = parts.pop()?;
    if name.is_empty() {
        return None;
    }
    Some((parts.pop(), name))
}

/// Give a rewritten procedure a fresh name so it lands next to the original.
///
/// The new name is `<original>_Opt_<yyyymmddHHMMSS>` in the `dbo` schema.
/// Returns the updated SQL and the new bare name.
pub fn rename_procedure(sql: &str, now: DateTime<Local>) -> Result<(String, String), AdvisorError> {
    let (_, original) = procedure_name(sql).ok_or_else(|| AdvisorError::ProcedureNameNotFound {
        snippet: sql.chars().take(80).collect(),
    })?;
    let new_name = format!("{}_Opt_{}", original, now.format("%Y%m%d%H%M%S"));
    let replacement = format!("${{1}}dbo.{}", quote_ident(&new_name));
    let updated = PROCEDURE_NAME.replacen(sql, 1, replacement.as_str()).into_owned();
    Ok((updated, new_name))
}

/// Guard statement that drops the procedure `sql` creates, if it exists.
pub fn drop_statement_for(sql: &str) -> Option<String> {
    let (schema, name) = procedure_name(sql)?;
    let schema = schema.unwrap_or_else(|| "dbo".to_string());
    Some(format!(
        "IF OBJECT_ID('{schema}.{name}', 'P') IS NOT NULL DROP PROCEDURE {}.{};",
        quote_ident(&schema),
        quote_ident(&name),
        schema = schema.replace('\'', "''"),
        name = name.replace('\'', "''"),
    ))
}

/// Section of a model answer following `marker`, up to the next `===` heading.
pub fn section_after(text: &str, marker: &str) -> Option<String> {
    let start = find_ci(text, marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find("===").unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}
