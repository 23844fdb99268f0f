//! Lexical analysis of T-SQL text
//!
//! Nothing in here builds a syntax tree. Table and column references are
//! recovered with bounded-accuracy pattern matching over comment-stripped text.

mod ai_text;
mod batch;
mod columns;
mod comments;
mod table_refs;

pub use ai_text::{
    drop_statement_for, extract_index_ddl, procedure_name, rename_procedure, sanitize_procedure,
    section_after, SP_OPTIMIZED_MARKER,
};
pub use batch::split_statements;
pub use columns::{filter_used_columns, render_table_info, ColumnInfo};
pub use comments::strip_comments;
pub use table_refs::{extract_tables, TableReference, DEFAULT_SCHEMA};

use std::path::Path;

use encoding_rs::WINDOWS_1252;

use crate::error::AdvisorError;

/// Read a SQL file as a string, trying UTF-8 first, then Windows-1252 as fallback
pub fn read_sql_file(path: &Path) -> Result<String, AdvisorError> {
    let bytes = std::fs::read(path).map_err(|e| AdvisorError::SqlFileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    // Handles a UTF-8 BOM as well
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.trim_start_matches('\u{feff}').to_string()),
        Err(err) => {
            let bytes = err.into_bytes();
            // Common for scripts saved by SSMS on Windows
            let (decoded, _, had_errors) = WINDOWS_1252.decode(&bytes);
            if had_errors {
                Err(AdvisorError::SqlFileReadError {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "File contains invalid characters",
                    ),
                })
            } else {
                Ok(decoded.into_owned())
            }
        }
    }
}
