//! Prompt context for a stored procedure: referenced tables, used columns, existing indexes

use anyhow::Result;

use super::prompt::{index_prompt, optimization_prompt};
use crate::error::AdvisorError;
use crate::parser::{
    extract_index_ddl, extract_tables, filter_used_columns, render_table_info, sanitize_procedure,
    section_after, TableReference, SP_OPTIMIZED_MARKER,
};
use crate::source::{ExistingIndex, MetadataSource, TextGenerator};

/// Everything the prompts need to know about one procedure
#[derive(Debug, Clone, PartialEq)]
pub struct IndexContext {
    pub database: String,
    pub definition: String,
    pub tables: Vec<TableReference>,
    /// `schema.table (col (type), ...)` per table with known columns
    pub table_info: Vec<String>,
    /// One [`ExistingIndex::describe`] line per index
    pub existing_indexes: Vec<String>,
    /// `table: error` for each metadata lookup that failed
    pub failures: Vec<String>,
}

impl IndexContext {
    /// Table and index lines as one block of prompt text.
    pub fn table_info_text(&self) -> String {
        let mut text = self.table_info.join("\n");
        if !self.existing_indexes.is_empty() {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str("Existing indexes:\n");
            text.push_str(&self.existing_indexes.join("\n"));
        }
        text
    }

    pub fn index_prompt(&self) -> String {
        index_prompt(&self.definition, &self.table_info_text())
    }

    pub fn optimization_prompt(&self) -> String {
        optimization_prompt(&self.definition, &self.table_info_text())
    }
}

/// Build the context for a procedure stored in `database`.
pub fn index_context(
    source: &dyn MetadataSource,
    database: &str,
    schema: &str,
    name: &str,
) -> Result<IndexContext> {
    let definition = source
        .procedure_definition(database, schema, name)?
        .ok_or_else(|| AdvisorError::ProcedureNotFound {
            database: database.to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
        })?;
    context_for_sql(source, database, &definition)
}

/// Build the context for arbitrary SQL text, resolving partial names against `database`.
///
/// Tables in other databases are described from their own catalog. A table
/// the source knows no columns for is listed by name only in `tables`; a
/// lookup that fails is recorded in `failures` and the other tables are
/// still described.
pub fn context_for_sql(source: &dyn MetadataSource, database: &str, sql: &str) -> Result<IndexContext> {
    let tables: Vec<TableReference> = extract_tables(sql, Some(database)).into_iter().collect();
    tracing::debug!(database, tables = tables.len(), "extracted table references");

    let mut table_info = Vec::new();
    let mut existing_indexes = Vec::new();
    let mut failures = Vec::new();
    for table in &tables {
        let db = table.database.as_deref().unwrap_or(database);
        let columns = match source.table_columns(db, &table.schema, &table.table) {
            Ok(columns) => columns,
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "column metadata unavailable");
                failures.push(format!("{}: {}", table, e));
                continue;
            }
        };
        if columns.is_empty() {
            tracing::debug!(table = %table, "no column metadata");
            continue;
        }
        let used = filter_used_columns(&columns, sql, &table.table);
        table_info.push(render_table_info(table, &used));

        match source.existing_indexes(db, &table.schema, &table.table) {
            Ok(indexes) => existing_indexes.extend(indexes.iter().map(ExistingIndex::describe)),
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "index metadata unavailable");
                failures.push(format!("{}: {}", table, e));
            }
        }
    }

    Ok(IndexContext {
        database: database.to_string(),
        definition: sql.to_string(),
        tables,
        table_info,
        existing_indexes,
        failures,
    })
}

/// Ask the generator for index suggestions and keep only the `CREATE INDEX` statements.
pub fn suggest_indexes(generator: &dyn TextGenerator, context: &IndexContext) -> Result<String> {
    let answer = generator.generate(&context.index_prompt())?;
    let ddl = extract_index_ddl(&answer);
    if ddl.is_empty() {
        tracing::warn!("no CREATE INDEX statements found in generated text");
    }
    Ok(ddl)
}

/// Ask the generator for a rewrite of the procedure and clean up the answer.
pub fn suggest_rewrite(generator: &dyn TextGenerator, context: &IndexContext) -> Result<String> {
    let answer = generator.generate(&context.optimization_prompt())?;
    let section = section_after(&answer, SP_OPTIMIZED_MARKER).unwrap_or(answer);
    Ok(sanitize_procedure(&section))
}
