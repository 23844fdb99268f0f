//! sql-index-advisor: index maintenance and advisory engine for SQL Server
//!
//! This library reads index statistics and procedure text through pluggable
//! collaborators, classifies indexes for maintenance, removal or creation,
//! and assembles the results into a single deployable stored procedure.

pub mod advisor;
pub mod analysis;
pub mod assemble;
pub mod config;
pub mod error;
pub mod parser;
pub mod scan;
pub mod source;
pub mod util;
pub mod verify;

use std::path::PathBuf;

use anyhow::Result;

pub use assemble::{AssembleOutcome, RecommendationArtifact};
pub use config::{ConnectionSettings, Thresholds};
pub use error::AdvisorError;
pub use source::{ArtifactSink, MetadataSource, StatementExecutor, TextGenerator};

/// Options for building the recommendation procedure
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Database the scan defaults to (and the procedure is deployed into)
    pub database: String,
    /// Scan every user database instead of just `database`
    pub all_databases: bool,
    /// File holding generated index suggestions
    pub ai_sql: Option<PathBuf>,
    /// Include the suggestions from `ai_sql`; ignored without it
    pub use_ai: bool,
    pub thresholds: Thresholds,
}

/// Scan, classify and assemble the recommendation procedure
pub fn build_recommendation(source: &dyn MetadataSource, options: &BuildOptions) -> Result<AssembleOutcome> {
    let databases = advisor::target_databases(source, &options.database, options.all_databases)?;
    tracing::info!(databases = databases.len(), "scanning databases");

    let mut report = advisor::analyze(source, &databases, &options.thresholds);
    for failure in &report.failures {
        tracing::warn!(database = %failure.database, "skipped: {}", failure.message);
    }
    for rec in report.confine_unused_to(&options.database) {
        tracing::warn!(
            database = %rec.database,
            index = %rec.index,
            "unused index left out: the procedure runs in {}",
            options.database
        );
    }

    let ai_sql = match (&options.ai_sql, options.use_ai) {
        (Some(path), true) => {
            let text = parser::read_sql_file(path)?;
            let ddl = parser::extract_index_ddl(&text);
            tracing::info!(
                statements = ddl.lines().count(),
                path = %path.display(),
                "including generated index suggestions"
            );
            Some(ddl)
        }
        (Some(path), false) => {
            tracing::info!(path = %path.display(), "generated suggestions not included (pass --use-ai)");
            None
        }
        _ => None,
    };

    let outcome = advisor::build_recommendation(&report, ai_sql.as_deref());
    if outcome == AssembleOutcome::NothingToBuild {
        tracing::info!("no recommendations; nothing to build");
    }
    Ok(outcome)
}
