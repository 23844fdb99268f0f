//! End-to-end pipelines over the collaborator traits
//!
//! Metadata comes in through [`MetadataSource`], the pure classifiers and the
//! assembler turn it into SQL, and [`StatementExecutor`] / [`ArtifactSink`]
//! carry the result out. Every step here is sequential apart from the
//! per-database scans.

mod context;
mod prompt;

pub use context::{context_for_sql, index_context, suggest_indexes, suggest_rewrite, IndexContext};
pub use prompt::{index_prompt, optimization_prompt};

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::analysis::{
    analyze_fragmentation, analyze_missing, analyze_unused, generate_maintenance_sql,
    generate_missing_sql, generate_unused_sql, prioritize, IndexActionRecommendation,
    MaintenanceRecommendation, MissingIndexRecommendation, UnusedIndexRecommendation,
};
use crate::assemble::{assemble, AssembleOutcome, RecommendationArtifact, RECOMMENDATION_PROCEDURE};
use crate::config::Thresholds;
use crate::parser::{drop_statement_for, rename_procedure, split_statements};
use crate::scan::{scan_fragmentation, scan_missing, scan_unused, ScanFailure};
use crate::source::{timestamped_name, ArtifactSink, MetadataSource, ProcedureInfo, StatementExecutor};
use crate::verify::{review_rewrite, RewriteReview, SimilarityVerdict};

/// File name of the persisted recommendation procedure.
pub const ARTIFACT_FILE_NAME: &str = "recommendation_index.sql";
/// Prefix of the timestamped maintenance script.
pub const MAINTENANCE_FILE_PREFIX: &str = "index_recommendations";

/// Classified recommendations across every scanned database
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub maintenance: Vec<MaintenanceRecommendation>,
    pub unused: Vec<UnusedIndexRecommendation>,
    pub missing: Vec<MissingIndexRecommendation>,
    pub failures: Vec<ScanFailure>,
}

impl AnalysisReport {
    pub fn maintenance_sql(&self) -> String {
        generate_maintenance_sql(&self.maintenance)
    }

    pub fn unused_sql(&self, include_advisory: bool) -> String {
        generate_unused_sql(&self.unused, include_advisory)
    }

    pub fn missing_sql(&self, include_advisory: bool) -> String {
        generate_missing_sql(&self.missing, include_advisory)
    }

    /// Remove unused-index rows scanned in any database other than `database`.
    ///
    /// Their `DROP INDEX` statements name only schema and table, so they are
    /// only valid in the database the recommendation procedure runs in.
    /// The removed rows are returned.
    pub fn confine_unused_to(&mut self, database: &str) -> Vec<UnusedIndexRecommendation> {
        let (kept, skipped): (Vec<_>, Vec<_>) = std::mem::take(&mut self.unused)
            .into_iter()
            .partition(|rec| rec.database.eq_ignore_ascii_case(database));
        self.unused = kept;
        skipped
    }

    /// Unused and missing recommendations in one priority order.
    pub fn prioritized(&self) -> Vec<IndexActionRecommendation> {
        let mut all: Vec<IndexActionRecommendation> = self
            .unused
            .iter()
            .cloned()
            .map(IndexActionRecommendation::Unused)
            .chain(self.missing.iter().cloned().map(IndexActionRecommendation::Missing))
            .collect();
        prioritize(&mut all);
        all
    }

    pub fn is_empty(&self) -> bool {
        self.maintenance.is_empty() && self.unused.is_empty() && self.missing.is_empty()
    }
}

/// Databases to scan: every user database, or just the configured one.
pub fn target_databases(
    source: &dyn MetadataSource,
    default_database: &str,
    all_databases: bool,
) -> Result<Vec<String>> {
    if all_databases {
        Ok(source.list_databases()?)
    } else {
        Ok(vec![default_database.to_string()])
    }
}

/// Procedures in `database` whose text can be read, in schema then name order.
///
/// Encrypted procedures are left out; their definition is not available.
pub fn readable_procedures(source: &dyn MetadataSource, database: &str) -> Result<Vec<ProcedureInfo>> {
    let mut procedures: Vec<ProcedureInfo> = source
        .list_procedures(database)?
        .into_iter()
        .filter(|p| !p.is_encrypted)
        .collect();
    procedures.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));
    Ok(procedures)
}

/// Scan and classify fragmentation, unused and missing indexes.
#[tracing::instrument(skip(source, thresholds))]
pub fn analyze(source: &dyn MetadataSource, databases: &[String], thresholds: &Thresholds) -> AnalysisReport {
    let fragmentation = scan_fragmentation(source, databases, thresholds);
    let unused = scan_unused(source, databases);
    let missing = scan_missing(source, databases);

    let mut failures = fragmentation.failures;
    failures.extend(unused.failures);
    failures.extend(missing.failures);

    let report = AnalysisReport {
        maintenance: analyze_fragmentation(&fragmentation.rows, thresholds),
        unused: analyze_unused(&unused.rows, thresholds),
        missing: analyze_missing(&missing.rows, thresholds),
        failures,
    };
    tracing::info!(
        maintenance = report.maintenance.len(),
        unused = report.unused.len(),
        missing = report.missing.len(),
        failures = report.failures.len(),
        "analysis complete"
    );
    report
}

/// Assemble the recommendation procedure from a report.
///
/// Only DROP and YES rows contribute statements; `ai_sql` is included when given.
pub fn build_recommendation(report: &AnalysisReport, ai_sql: Option<&str>) -> AssembleOutcome {
    assemble(
        &report.maintenance_sql(),
        &report.unused_sql(false),
        &report.missing_sql(false),
        ai_sql,
    )
}

/// Replace the recommendation procedure in `database`.
///
/// The guard drop runs first; a "does not exist" failure there is ignored.
pub fn deploy_artifact(
    executor: &dyn StatementExecutor,
    database: &str,
    artifact: &RecommendationArtifact,
) -> Result<()> {
    if let Err(e) = executor.execute(database, &artifact.guard_sql) {
        if e.is_missing_object() {
            tracing::debug!(error = %e, "no previous recommendation procedure");
        } else {
            return Err(e.into());
        }
    }
    executor.execute(database, &artifact.create_sql)?;
    tracing::info!(database, procedure = RECOMMENDATION_PROCEDURE, "recommendation procedure deployed");
    Ok(())
}

/// Run the deployed recommendation procedure.
pub fn execute_artifact(executor: &dyn StatementExecutor, database: &str) -> Result<()> {
    executor.execute(database, &RecommendationArtifact::execute_sql())?;
    tracing::info!(database, "recommendation procedure executed");
    Ok(())
}

/// A statement that failed while applying a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFailure {
    pub statement: String,
    pub message: String,
}

/// Outcome of [`apply_statements`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub failures: Vec<StatementFailure>,
}

/// Execute each statement of `sql` on its own, continuing past failures.
pub fn apply_statements(executor: &dyn StatementExecutor, database: &str, sql: &str) -> ApplyReport {
    let mut report = ApplyReport::default();
    for statement in split_statements(sql) {
        match executor.execute(database, &statement) {
            Ok(()) => {
                tracing::info!(statement = %statement, "applied");
                report.applied += 1;
            }
            Err(e) => {
                tracing::error!(statement = %statement, error = %e, "statement failed");
                report.failures.push(StatementFailure {
                    statement,
                    message: e.to_string(),
                });
            }
        }
    }
    report
}

/// Write the deployment script as [`ARTIFACT_FILE_NAME`].
pub fn persist_artifact(
    sink: &dyn ArtifactSink,
    artifact: &RecommendationArtifact,
    database: Option<&str>,
) -> Result<PathBuf> {
    Ok(sink.write(ARTIFACT_FILE_NAME, &artifact.to_script(database))?)
}

/// Write a maintenance script under a timestamped name.
pub fn persist_maintenance(sink: &dyn ArtifactSink, sql: &str, now: DateTime<Local>) -> Result<PathBuf> {
    Ok(sink.write(&timestamped_name(MAINTENANCE_FILE_PREFIX, now), sql)?)
}

/// Result of [`save_rewrite`]
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Created under `name`; `path` is set when a sink was given
    Saved {
        name: String,
        verdict: SimilarityVerdict,
        path: Option<PathBuf>,
    },
    /// Identical to the original; nothing created
    NoOp(SimilarityVerdict),
    /// Below the similarity threshold and not forced
    Rejected(SimilarityVerdict),
}

/// Options for [`save_rewrite`]
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub threshold: f64,
    /// Save even when the rewrite is below the threshold
    pub force: bool,
}

/// Create a verified rewrite next to the original procedure.
///
/// The rewrite is renamed to `<name>_Opt_<timestamp>` in `dbo`, any previous
/// procedure of that name is dropped, and the new one is created in `database`.
pub fn save_rewrite(
    executor: &dyn StatementExecutor,
    sink: Option<&dyn ArtifactSink>,
    database: &str,
    original: &str,
    rewritten: &str,
    options: SaveOptions,
    now: DateTime<Local>,
) -> Result<SaveOutcome> {
    let verdict = match review_rewrite(original, rewritten, options.threshold) {
        RewriteReview::NoOp(verdict) => {
            tracing::info!("rewrite is identical to the original; nothing saved");
            return Ok(SaveOutcome::NoOp(verdict));
        }
        RewriteReview::TooDifferent(verdict) if !options.force => {
            tracing::warn!(ratio = verdict.ratio, threshold = options.threshold, "rewrite rejected");
            return Ok(SaveOutcome::Rejected(verdict));
        }
        review => review.verdict(),
    };

    let (sql, name) = rename_procedure(rewritten, now)?;
    if let Some(drop) = drop_statement_for(&sql) {
        if let Err(e) = executor.execute(database, &drop) {
            if !e.is_missing_object() {
                return Err(e.into());
            }
        }
    }
    executor.execute(database, &sql)?;
    tracing::info!(database, procedure = %name, ratio = verdict.ratio, "rewrite saved");

    let path = match sink {
        Some(sink) => Some(sink.write(&format!("{}.sql", name), &sql)?),
        None => None,
    };
    Ok(SaveOutcome::Saved { name, verdict, path })
}
