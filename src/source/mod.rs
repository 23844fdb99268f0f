//! Seams to the collaborators around the engine: metadata, execution, text generation, files
//!
//! The classifiers never call these traits themselves; the pipelines in
//! [`crate::advisor`] and [`crate::scan`] fetch rows through them and hand plain
//! values to the pure functions.

mod memory;
mod mssql;
mod sink;

pub use memory::{CannedGenerator, MemorySource, RecordingExecutor};
pub use mssql::SqlServerClient;
pub use sink::{timestamped_name, FileSink};

use std::path::PathBuf;

use crate::analysis::{IndexPhysicalStat, IndexUsageStat, MissingIndexStat};
use crate::error::AdvisorError;
use crate::parser::{ColumnInfo, TableReference};

/// A stored procedure listed by the metadata source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureInfo {
    pub database: String,
    pub schema: String,
    pub name: String,
    pub is_encrypted: bool,
}

impl ProcedureInfo {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// An index that already exists on a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingIndex {
    pub schema: String,
    pub table: String,
    pub name: String,
    /// `CLUSTERED`, `NONCLUSTERED`, ...
    pub type_desc: String,
    pub is_unique: bool,
    pub is_primary_key: bool,
    pub key_columns: Vec<String>,
    pub included_columns: Vec<String>,
}

impl ExistingIndex {
    /// `dbo.Orders: IX_Orders_Date NONCLUSTERED (OrderDate) INCLUDE (Total)`
    pub fn describe(&self) -> String {
        let mut kind = self.type_desc.clone();
        if self.is_primary_key {
            kind.push_str(" PRIMARY KEY");
        } else if self.is_unique {
            kind.push_str(" UNIQUE");
        }
        let mut line = format!(
            "{}.{}: {} {} ({})",
            self.schema,
            self.table,
            self.name,
            kind,
            self.key_columns.join(", ")
        );
        if !self.included_columns.is_empty() {
            line.push_str(&format!(" INCLUDE ({})", self.included_columns.join(", ")));
        }
        line
    }
}

/// Read access to catalog views and DMVs, scoped per database.
///
/// Rows come back in the order the source produced them.
pub trait MetadataSource: Send + Sync {
    /// User databases (system databases excluded).
    fn list_databases(&self) -> Result<Vec<String>, AdvisorError>;

    /// Physical stats for named indexes with more than `min_page_count` pages.
    fn fragmentation_stats(
        &self,
        database: &str,
        min_page_count: i64,
    ) -> Result<Vec<IndexPhysicalStat>, AdvisorError>;

    /// Usage counters for non-primary, non-unique nonclustered indexes.
    fn unused_index_stats(&self, database: &str) -> Result<Vec<IndexUsageStat>, AdvisorError>;

    fn missing_index_stats(&self, database: &str) -> Result<Vec<MissingIndexStat>, AdvisorError>;

    /// Base tables, resolved with `database` set.
    fn list_tables(&self, database: &str) -> Result<Vec<TableReference>, AdvisorError>;

    /// Columns in ordinal order.
    fn table_columns(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, AdvisorError>;

    fn list_procedures(&self, database: &str) -> Result<Vec<ProcedureInfo>, AdvisorError>;

    /// Module text, or None when the procedure does not exist (or is encrypted).
    fn procedure_definition(
        &self,
        database: &str,
        schema: &str,
        name: &str,
    ) -> Result<Option<String>, AdvisorError>;

    fn existing_indexes(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ExistingIndex>, AdvisorError>;
}

/// Runs one SQL statement or batch in a database context.
pub trait StatementExecutor {
    fn execute(&self, database: &str, sql: &str) -> Result<(), AdvisorError>;
}

/// Free-form text generation (the LLM). Output is untrusted text.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, AdvisorError>;
}

/// Optional persistence of generated SQL.
pub trait ArtifactSink {
    fn write(&self, name: &str, content: &str) -> Result<PathBuf, AdvisorError>;
}
