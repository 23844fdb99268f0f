//! In-memory collaborators for tests and dry runs

use std::collections::HashMap;
use std::sync::Mutex;

use super::{ExistingIndex, MetadataSource, ProcedureInfo, StatementExecutor, TextGenerator};
use crate::analysis::{IndexPhysicalStat, IndexUsageStat, MissingIndexStat};
use crate::error::AdvisorError;
use crate::parser::{ColumnInfo, TableReference};

#[derive(Debug, Clone, Default)]
struct DatabaseFixture {
    fragmentation: Vec<IndexPhysicalStat>,
    unused: Vec<IndexUsageStat>,
    missing: Vec<MissingIndexStat>,
    tables: Vec<(TableReference, Vec<ColumnInfo>)>,
    procedures: Vec<(ProcedureInfo, String)>,
    indexes: Vec<ExistingIndex>,
}

/// Metadata held in memory, keyed by database name.
///
/// A database registered with [`MemorySource::with_failing_database`] answers
/// every query with a metadata error.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    databases: Vec<String>,
    fixtures: HashMap<String, DatabaseFixture>,
    failing: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn fixture_mut(&mut self, database: &str) -> &mut DatabaseFixture {
        if !self.databases.iter().any(|d| d == database) {
            self.databases.push(database.to_string());
        }
        self.fixtures.entry(database.to_string()).or_default()
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.fixture_mut(database);
        self
    }

    pub fn with_failing_database(mut self, database: &str, message: &str) -> Self {
        self.fixture_mut(database);
        self.failing.insert(database.to_string(), message.to_string());
        self
    }

    pub fn with_fragmentation(mut self, stat: IndexPhysicalStat) -> Self {
        let db = stat.database.clone();
        self.fixture_mut(&db).fragmentation.push(stat);
        self
    }

    pub fn with_unused(mut self, stat: IndexUsageStat) -> Self {
        let db = stat.database.clone();
        self.fixture_mut(&db).unused.push(stat);
        self
    }

    pub fn with_missing(mut self, stat: MissingIndexStat) -> Self {
        let db = stat.database.clone();
        self.fixture_mut(&db).missing.push(stat);
        self
    }

    pub fn with_table(mut self, database: &str, schema: &str, table: &str, columns: &[(&str, &str)]) -> Self {
        let reference = TableReference::new(Some(database), schema, table);
        let columns = columns
            .iter()
            .map(|(name, data_type)| ColumnInfo::new(name, data_type))
            .collect();
        self.fixture_mut(database).tables.push((reference, columns));
        self
    }

    pub fn with_procedure(mut self, database: &str, schema: &str, name: &str, definition: &str) -> Self {
        let info = ProcedureInfo {
            database: database.to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
            is_encrypted: false,
        };
        self.fixture_mut(database)
            .procedures
            .push((info, definition.to_string()));
        self
    }

    /// Register a procedure whose definition the server will not return.
    pub fn with_encrypted_procedure(mut self, database: &str, schema: &str, name: &str) -> Self {
        let info = ProcedureInfo {
            database: database.to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
            is_encrypted: true,
        };
        self.fixture_mut(database).procedures.push((info, String::new()));
        self
    }

    pub fn with_index(mut self, database: &str, index: ExistingIndex) -> Self {
        self.fixture_mut(database).indexes.push(index);
        self
    }

    fn fixture(&self, database: &str) -> Result<Option<&DatabaseFixture>, AdvisorError> {
        if let Some(message) = self.failing.get(database) {
            return Err(AdvisorError::MetadataQueryError {
                database: database.to_string(),
                message: message.clone(),
            });
        }
        Ok(self.fixtures.get(database))
    }
}

impl MetadataSource for MemorySource {
    fn list_databases(&self) -> Result<Vec<String>, AdvisorError> {
        Ok(self.databases.clone())
    }

    fn fragmentation_stats(
        &self,
        database: &str,
        min_page_count: i64,
    ) -> Result<Vec<IndexPhysicalStat>, AdvisorError> {
        Ok(self
            .fixture(database)?
            .map(|f| {
                f.fragmentation
                    .iter()
                    .filter(|s| s.page_count > min_page_count && s.index.is_some())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn unused_index_stats(&self, database: &str) -> Result<Vec<IndexUsageStat>, AdvisorError> {
        Ok(self.fixture(database)?.map(|f| f.unused.clone()).unwrap_or_default())
    }

    fn missing_index_stats(&self, database: &str) -> Result<Vec<MissingIndexStat>, AdvisorError> {
        Ok(self.fixture(database)?.map(|f| f.missing.clone()).unwrap_or_default())
    }

    fn list_tables(&self, database: &str) -> Result<Vec<TableReference>, AdvisorError> {
        Ok(self
            .fixture(database)?
            .map(|f| f.tables.iter().map(|(t, _)| t.clone()).collect())
            .unwrap_or_default())
    }

    fn table_columns(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, AdvisorError> {
        Ok(self
            .fixture(database)?
            .and_then(|f| {
                f.tables
                    .iter()
                    .find(|(t, _)| {
                        t.schema.eq_ignore_ascii_case(schema) && t.table.eq_ignore_ascii_case(table)
                    })
                    .map(|(_, cols)| cols.clone())
            })
            .unwrap_or_default())
    }

    fn list_procedures(&self, database: &str) -> Result<Vec<ProcedureInfo>, AdvisorError> {
        Ok(self
            .fixture(database)?
            .map(|f| f.procedures.iter().map(|(p, _)| p.clone()).collect())
            .unwrap_or_default())
    }

    fn procedure_definition(
        &self,
        database: &str,
        schema: &str,
        name: &str,
    ) -> Result<Option<String>, AdvisorError> {
        Ok(self.fixture(database)?.and_then(|f| {
            f.procedures
                .iter()
                .find(|(p, _)| p.schema.eq_ignore_ascii_case(schema) && p.name.eq_ignore_ascii_case(name))
                .map(|(_, definition)| definition.clone())
        }))
    }

    fn existing_indexes(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ExistingIndex>, AdvisorError> {
        Ok(self
            .fixture(database)?
            .map(|f| {
                f.indexes
                    .iter()
                    .filter(|i| i.schema.eq_ignore_ascii_case(schema) && i.table.eq_ignore_ascii_case(table))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Records executed statements; statements containing a registered pattern fail.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    executed: Mutex<Vec<(String, String)>>,
    failures: Vec<(String, String)>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement containing `pattern` with `message`.
    pub fn failing_on(mut self, pattern: &str, message: &str) -> Self {
        self.failures.push((pattern.to_string(), message.to_string()));
        self
    }

    /// Successfully executed `(database, sql)` pairs, in order.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.executed
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl StatementExecutor for RecordingExecutor {
    fn execute(&self, database: &str, sql: &str) -> Result<(), AdvisorError> {
        if let Some((_, message)) = self.failures.iter().find(|(pattern, _)| sql.contains(pattern.as_str())) {
            return Err(AdvisorError::StatementError {
                database: database.to_string(),
                statement: sql.to_string(),
                message: message.clone(),
            });
        }
        if let Ok(mut executed) = self.executed.lock() {
            executed.push((database.to_string(), sql.to_string()));
        }
        Ok(())
    }
}

/// Replays a fixed answer, remembering the prompts it was given.
#[derive(Debug, Default)]
pub struct CannedGenerator {
    response: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl CannedGenerator {
    pub fn answering(response: &str) -> Self {
        Self {
            response: Some(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator whose every call fails.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl TextGenerator for CannedGenerator {
    fn generate(&self, prompt: &str) -> Result<String, AdvisorError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.response.clone().ok_or_else(|| AdvisorError::GenerationError {
            message: "no response available".to_string(),
        })
    }
}
