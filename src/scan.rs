//! Multi-database scans
//!
//! Each database is an independent unit of work. A failing database is
//! logged and recorded in the report; the remaining databases still complete.

use rayon::prelude::*;

use crate::analysis::{IndexPhysicalStat, IndexUsageStat, MissingIndexStat};
use crate::config::Thresholds;
use crate::error::AdvisorError;
use crate::source::MetadataSource;

/// Below this many databases the scan runs sequentially.
const PARALLEL_THRESHOLD: usize = 4;

/// A database whose scan did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub database: String,
    pub message: String,
}

/// Rows gathered across databases, in database order, plus the failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport<T> {
    pub rows: Vec<T>,
    pub failures: Vec<ScanFailure>,
}

impl<T> Default for ScanReport<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> ScanReport<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn push(&mut self, database: &str, result: Result<Vec<T>, AdvisorError>) {
        match result {
            Ok(rows) => {
                tracing::debug!(database, rows = rows.len(), "database scanned");
                self.rows.extend(rows);
            }
            Err(e) => {
                tracing::warn!(database, error = %e, "database scan failed");
                self.failures.push(ScanFailure {
                    database: database.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Run `scan` once per database, isolating failures.
pub fn scan_databases<T, F>(databases: &[String], scan: F) -> ScanReport<T>
where
    T: Send,
    F: Fn(&str) -> Result<Vec<T>, AdvisorError> + Sync,
{
    let results: Vec<Result<Vec<T>, AdvisorError>> = if databases.len() >= PARALLEL_THRESHOLD {
        databases.par_iter().map(|db| scan(db)).collect()
    } else {
        databases.iter().map(|db| scan(db)).collect()
    };

    let mut report = ScanReport::default();
    for (database, result) in databases.iter().zip(results) {
        report.push(database, result);
    }
    report
}

pub fn scan_fragmentation(
    source: &dyn MetadataSource,
    databases: &[String],
    thresholds: &Thresholds,
) -> ScanReport<IndexPhysicalStat> {
    scan_databases(databases, |db| source.fragmentation_stats(db, thresholds.min_page_count))
}

pub fn scan_unused(source: &dyn MetadataSource, databases: &[String]) -> ScanReport<IndexUsageStat> {
    scan_databases(databases, |db| source.unused_index_stats(db))
}

pub fn scan_missing(source: &dyn MetadataSource, databases: &[String]) -> ScanReport<MissingIndexStat> {
    scan_databases(databases, |db| source.missing_index_stats(db))
}
