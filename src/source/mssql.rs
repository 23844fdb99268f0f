//! SQL Server collaborator over tiberius
//!
//! Every call opens its own connection with the target database as the
//! initial catalog, so per-database work never shares session state and can
//! run on any worker thread.

use tiberius::{AuthMethod, Client, Config, Row, ToSql};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::{ExistingIndex, MetadataSource, ProcedureInfo, StatementExecutor};
use crate::analysis::{IndexPhysicalStat, IndexUsageStat, MissingIndexStat};
use crate::config::{Authentication, ConnectionSettings};
use crate::error::AdvisorError;
use crate::parser::{ColumnInfo, TableReference};

type SqlClient = Client<Compat<TcpStream>>;

const DATABASES_QUERY: &str = "\
SELECT name
FROM sys.databases
WHERE database_id > 4
  AND state_desc = 'ONLINE'
ORDER BY name;";

const FRAGMENTATION_QUERY: &str = "\
SELECT
    DB_NAME() AS database_name,
    s.name AS schema_name,
    t.name AS table_name,
    i.name AS index_name,
    CAST(ps.avg_fragmentation_in_percent AS FLOAT) AS fragmentation,
    CAST(ps.page_count AS BIGINT) AS page_count
FROM sys.dm_db_index_physical_stats(DB_ID(), NULL, NULL, NULL, 'LIMITED') AS ps
JOIN sys.indexes i ON ps.object_id = i.object_id AND ps.index_id = i.index_id
JOIN sys.tables t ON i.object_id = t.object_id
JOIN sys.schemas s ON t.schema_id = s.schema_id
WHERE ps.database_id = DB_ID()
  AND ps.page_count > @P1
  AND i.name IS NOT NULL
ORDER BY ps.avg_fragmentation_in_percent DESC;";

const UNUSED_QUERY: &str = "\
SELECT
    DB_NAME() AS database_name,
    OBJECT_SCHEMA_NAME(i.object_id) AS schema_name,
    OBJECT_NAME(i.object_id) AS table_name,
    i.name AS index_name,
    CAST(s.user_seeks AS BIGINT) AS user_seeks,
    CAST(s.user_scans AS BIGINT) AS user_scans,
    CAST(s.user_lookups AS BIGINT) AS user_lookups,
    CAST(s.user_updates AS BIGINT) AS user_updates,
    CAST(SUM(ps.used_page_count) * 8 AS BIGINT) AS index_size_kb
FROM sys.indexes AS i
INNER JOIN sys.dm_db_index_usage_stats AS s
    ON i.object_id = s.object_id
    AND i.index_id = s.index_id
    AND s.database_id = DB_ID()
INNER JOIN sys.dm_db_partition_stats AS ps
    ON i.object_id = ps.object_id
    AND i.index_id = ps.index_id
WHERE i.is_primary_key = 0
  AND i.is_unique_constraint = 0
  AND i.name IS NOT NULL
  AND i.type_desc = 'NONCLUSTERED'
GROUP BY i.object_id, i.name, s.user_seeks, s.user_scans, s.user_lookups, s.user_updates
ORDER BY index_size_kb DESC;";

const MISSING_QUERY: &str = "\
SELECT
    DB_NAME(mid.database_id) AS database_name,
    OBJECT_SCHEMA_NAME(mid.object_id, mid.database_id) AS schema_name,
    OBJECT_NAME(mid.object_id, mid.database_id) AS table_name,
    mid.equality_columns,
    mid.inequality_columns,
    mid.included_columns,
    CAST(migs.unique_compiles AS BIGINT) AS unique_compiles,
    CAST(migs.user_seeks AS BIGINT) AS user_seeks,
    CAST(migs.user_scans AS BIGINT) AS user_scans,
    CAST(migs.avg_total_user_cost AS FLOAT) AS avg_total_user_cost,
    CAST(migs.avg_user_impact AS FLOAT) AS avg_user_impact
FROM sys.dm_db_missing_index_group_stats AS migs
INNER JOIN sys.dm_db_missing_index_groups AS mig
    ON migs.group_handle = mig.index_group_handle
INNER JOIN sys.dm_db_missing_index_details AS mid
    ON mig.index_handle = mid.index_handle
WHERE mid.database_id = DB_ID()
  AND OBJECT_SCHEMA_NAME(mid.object_id, mid.database_id) IS NOT NULL
  AND OBJECT_NAME(mid.object_id, mid.database_id) IS NOT NULL
ORDER BY migs.user_seeks DESC, migs.avg_user_impact DESC;";

const TABLES_QUERY: &str = "\
SELECT TABLE_SCHEMA, TABLE_NAME
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_SCHEMA, TABLE_NAME;";

const COLUMNS_QUERY: &str = "\
SELECT COLUMN_NAME, DATA_TYPE
FROM INFORMATION_SCHEMA.COLUMNS
WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
ORDER BY ORDINAL_POSITION;";

const PROCEDURES_QUERY: &str = "\
SELECT
    SCHEMA_NAME(schema_id) AS schema_name,
    name,
    CAST(ISNULL(OBJECTPROPERTY(object_id, 'IsEncrypted'), 0) AS INT) AS is_encrypted
FROM sys.objects
WHERE type = 'P'
ORDER BY schema_name, name;";

const DEFINITION_QUERY: &str = "\
SELECT sm.definition
FROM sys.sql_modules sm
INNER JOIN sys.objects o ON sm.object_id = o.object_id
INNER JOIN sys.schemas s ON o.schema_id = s.schema_id
WHERE s.name = @P1 AND o.name = @P2;";

const INDEXES_QUERY: &str = "\
SELECT
    s.name AS schema_name,
    t.name AS table_name,
    i.name AS index_name,
    i.type_desc,
    CAST(i.is_unique AS INT) AS is_unique,
    CAST(i.is_primary_key AS INT) AS is_primary_key,
    c.name AS column_name,
    CAST(ic.is_included_column AS INT) AS is_included
FROM sys.indexes i
INNER JOIN sys.tables t ON i.object_id = t.object_id
INNER JOIN sys.schemas s ON t.schema_id = s.schema_id
INNER JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
INNER JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
WHERE s.name = @P1 AND t.name = @P2 AND i.name IS NOT NULL
ORDER BY i.index_id, ic.is_included_column, ic.key_ordinal, ic.index_column_id;";

/// Blocking SQL Server client implementing the metadata and execution seams
pub struct SqlServerClient {
    settings: ConnectionSettings,
    runtime: Runtime,
}

impl std::fmt::Debug for SqlServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerClient")
            .field("host", &self.settings.host)
            .field("port", &self.settings.port)
            .field("database", &self.settings.database)
            .finish()
    }
}

impl SqlServerClient {
    pub fn new(settings: ConnectionSettings) -> Result<Self, AdvisorError> {
        if settings.authentication == Authentication::Windows {
            return Err(AdvisorError::ConfigError {
                message: "Windows authentication is not supported; set SQL_USER and SQL_PASSWORD"
                    .to_string(),
            });
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| AdvisorError::ConfigError {
                message: format!("Failed to start async runtime: {}", e),
            })?;
        Ok(Self { settings, runtime })
    }

    fn config(&self, database: &str) -> Config {
        let mut config = Config::new();
        config.host(&self.settings.host);
        config.port(self.settings.port);
        config.database(database);
        if let Authentication::SqlServer { user, password } = &self.settings.authentication {
            config.authentication(AuthMethod::sql_server(user, password));
        }
        if self.settings.trust_cert {
            config.trust_cert();
        }
        config
    }

    async fn connect(&self, database: &str) -> tiberius::Result<SqlClient> {
        let config = self.config(database);
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Client::connect(config, tcp.compat_write()).await
    }

    #[tracing::instrument(skip(self, sql, params))]
    fn query(&self, database: &str, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, AdvisorError> {
        let result = self.runtime.block_on(async {
            let mut client = self.connect(database).await?;
            let stream = client.query(sql, params).await?;
            stream.into_first_result().await
        });
        let rows = result.map_err(|e| AdvisorError::MetadataQueryError {
            database: database.to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(rows = rows.len(), "metadata query completed");
        Ok(rows)
    }

    fn map_rows<T>(
        &self,
        database: &str,
        rows: &[Row],
        f: impl Fn(&Row) -> tiberius::Result<T>,
    ) -> Result<Vec<T>, AdvisorError> {
        rows.iter()
            .map(|row| f(row))
            .collect::<tiberius::Result<Vec<T>>>()
            .map_err(|e| AdvisorError::MetadataQueryError {
                database: database.to_string(),
                message: e.to_string(),
            })
    }
}

fn get_string(row: &Row, col: &str) -> tiberius::Result<String> {
    Ok(get_opt_string(row, col)?.unwrap_or_default())
}

fn get_opt_string(row: &Row, col: &str) -> tiberius::Result<Option<String>> {
    Ok(row.try_get::<&str, _>(col)?.map(str::to_string))
}

fn get_i64(row: &Row, col: &str) -> tiberius::Result<i64> {
    Ok(row.try_get::<i64, _>(col)?.unwrap_or(0))
}

fn get_f64(row: &Row, col: &str) -> tiberius::Result<Option<f64>> {
    row.try_get::<f64, _>(col)
}

fn get_flag(row: &Row, col: &str) -> tiberius::Result<bool> {
    Ok(row.try_get::<i32, _>(col)?.unwrap_or(0) != 0)
}

impl MetadataSource for SqlServerClient {
    fn list_databases(&self) -> Result<Vec<String>, AdvisorError> {
        let master = "master";
        let rows = self.query(master, DATABASES_QUERY, &[])?;
        self.map_rows(master, &rows, |row| get_string(row, "name"))
    }

    fn fragmentation_stats(
        &self,
        database: &str,
        min_page_count: i64,
    ) -> Result<Vec<IndexPhysicalStat>, AdvisorError> {
        let rows = self.query(database, FRAGMENTATION_QUERY, &[&min_page_count])?;
        self.map_rows(database, &rows, |row| {
            Ok(IndexPhysicalStat {
                database: get_string(row, "database_name")?,
                schema: get_string(row, "schema_name")?,
                table: get_string(row, "table_name")?,
                index: get_opt_string(row, "index_name")?,
                fragmentation_percent: get_f64(row, "fragmentation")?,
                page_count: get_i64(row, "page_count")?,
            })
        })
    }

    fn unused_index_stats(&self, database: &str) -> Result<Vec<IndexUsageStat>, AdvisorError> {
        let rows = self.query(database, UNUSED_QUERY, &[])?;
        self.map_rows(database, &rows, |row| {
            Ok(IndexUsageStat {
                database: get_string(row, "database_name")?,
                schema: get_string(row, "schema_name")?,
                table: get_string(row, "table_name")?,
                index: get_opt_string(row, "index_name")?,
                seeks: get_i64(row, "user_seeks")?,
                scans: get_i64(row, "user_scans")?,
                lookups: get_i64(row, "user_lookups")?,
                updates: get_i64(row, "user_updates")?,
                size_kb: get_i64(row, "index_size_kb")?,
            })
        })
    }

    fn missing_index_stats(&self, database: &str) -> Result<Vec<MissingIndexStat>, AdvisorError> {
        let rows = self.query(database, MISSING_QUERY, &[])?;
        self.map_rows(database, &rows, |row| {
            Ok(MissingIndexStat {
                database: get_string(row, "database_name")?,
                schema: get_string(row, "schema_name")?,
                table: get_string(row, "table_name")?,
                equality_columns: get_opt_string(row, "equality_columns")?,
                inequality_columns: get_opt_string(row, "inequality_columns")?,
                included_columns: get_opt_string(row, "included_columns")?,
                unique_compiles: get_i64(row, "unique_compiles")?,
                seeks: get_i64(row, "user_seeks")?,
                scans: get_i64(row, "user_scans")?,
                avg_total_cost: get_f64(row, "avg_total_user_cost")?.unwrap_or(0.0),
                avg_impact: get_f64(row, "avg_user_impact")?.unwrap_or(0.0),
            })
        })
    }

    fn list_tables(&self, database: &str) -> Result<Vec<TableReference>, AdvisorError> {
        let rows = self.query(database, TABLES_QUERY, &[])?;
        self.map_rows(database, &rows, |row| {
            Ok(TableReference::new(
                Some(database),
                &get_string(row, "TABLE_SCHEMA")?,
                &get_string(row, "TABLE_NAME")?,
            ))
        })
    }

    fn table_columns(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, AdvisorError> {
        let rows = self.query(database, COLUMNS_QUERY, &[&schema, &table])?;
        self.map_rows(database, &rows, |row| {
            Ok(ColumnInfo::new(
                &get_string(row, "COLUMN_NAME")?,
                &get_string(row, "DATA_TYPE")?,
            ))
        })
    }

    fn list_procedures(&self, database: &str) -> Result<Vec<ProcedureInfo>, AdvisorError> {
        let rows = self.query(database, PROCEDURES_QUERY, &[])?;
        self.map_rows(database, &rows, |row| {
            Ok(ProcedureInfo {
                database: database.to_string(),
                schema: get_string(row, "schema_name")?,
                name: get_string(row, "name")?,
                is_encrypted: get_flag(row, "is_encrypted")?,
            })
        })
    }

    fn procedure_definition(
        &self,
        database: &str,
        schema: &str,
        name: &str,
    ) -> Result<Option<String>, AdvisorError> {
        let rows = self.query(database, DEFINITION_QUERY, &[&schema, &name])?;
        let definitions = self.map_rows(database, &rows, |row| get_opt_string(row, "definition"))?;
        Ok(definitions.into_iter().flatten().next())
    }

    fn existing_indexes(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ExistingIndex>, AdvisorError> {
        let rows = self.query(database, INDEXES_QUERY, &[&schema, &table])?;
        let columns = self.map_rows(database, &rows, |row| {
            Ok((
                ExistingIndex {
                    schema: get_string(row, "schema_name")?,
                    table: get_string(row, "table_name")?,
                    name: get_string(row, "index_name")?,
                    type_desc: get_string(row, "type_desc")?,
                    is_unique: get_flag(row, "is_unique")?,
                    is_primary_key: get_flag(row, "is_primary_key")?,
                    key_columns: Vec::new(),
                    included_columns: Vec::new(),
                },
                get_string(row, "column_name")?,
                get_flag(row, "is_included")?,
            ))
        })?;

        // One row per index column; fold consecutive rows into their index
        let mut indexes: Vec<ExistingIndex> = Vec::new();
        for (index, column, included) in columns {
            if indexes.last().map(|last| last.name != index.name).unwrap_or(true) {
                indexes.push(index);
            }
            if let Some(last) = indexes.last_mut() {
                if included {
                    last.included_columns.push(column);
                } else {
                    last.key_columns.push(column);
                }
            }
        }
        Ok(indexes)
    }
}

impl StatementExecutor for SqlServerClient {
    #[tracing::instrument(skip(self, sql))]
    fn execute(&self, database: &str, sql: &str) -> Result<(), AdvisorError> {
        let result = self.runtime.block_on(async {
            let mut client = self.connect(database).await?;
            let stream = client.simple_query(sql).await?;
            stream.into_results().await
        });
        match result {
            Ok(_) => {
                tracing::debug!("statement executed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "statement failed");
                Err(AdvisorError::StatementError {
                    database: database.to_string(),
                    statement: sql.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}
