//! Physical fragmentation classification (REBUILD / REORGANIZE)

use std::fmt;

use crate::config::Thresholds;
use crate::util::quote_ident;

/// One row of `sys.dm_db_index_physical_stats` joined to its index and table.
///
/// Nullable columns stay optional so malformed rows can be filtered instead of rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPhysicalStat {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub index: Option<String>,
    pub fragmentation_percent: Option<f64>,
    pub page_count: i64,
}

/// Maintenance operation for a fragmented index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaintenanceAction {
    Rebuild,
    Reorganize,
}

impl MaintenanceAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            MaintenanceAction::Rebuild => "REBUILD",
            MaintenanceAction::Reorganize => "REORGANIZE",
        }
    }
}

impl fmt::Display for MaintenanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceRecommendation {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub index: String,
    pub fragmentation_percent: f64,
    pub page_count: i64,
    pub action: MaintenanceAction,
}

impl MaintenanceRecommendation {
    /// `ALTER INDEX [index] ON [database].[schema].[table] ACTION;`
    pub fn statement(&self) -> String {
        format!(
            "ALTER INDEX {} ON {}.{}.{} {};",
            quote_ident(&self.index),
            quote_ident(&self.database),
            quote_ident(&self.schema),
            quote_ident(&self.table),
            self.action
        )
    }
}

/// Map one stat row to a maintenance action.
///
/// Returns None below the reorganize threshold, and for rows without an
/// index name or a usable fragmentation value.
pub fn classify(stat: &IndexPhysicalStat, thresholds: &Thresholds) -> Option<MaintenanceRecommendation> {
    let index = stat.index.as_deref().filter(|name| !name.trim().is_empty())?;
    let fragmentation = stat.fragmentation_percent.filter(|f| f.is_finite())?;

    let action = if fragmentation >= thresholds.rebuild_percent {
        MaintenanceAction::Rebuild
    } else if fragmentation >= thresholds.reorganize_percent {
        MaintenanceAction::Reorganize
    } else {
        return None;
    };

    Some(MaintenanceRecommendation {
        database: stat.database.clone(),
        schema: stat.schema.clone(),
        table: stat.table.clone(),
        index: index.to_string(),
        fragmentation_percent: fragmentation,
        page_count: stat.page_count,
        action,
    })
}

/// Classify a batch of rows, skipping tiny indexes.
///
/// Only rows with more than `min_page_count` pages are considered. Output is
/// ordered by fragmentation, highest first; ties keep input order.
pub fn analyze_fragmentation(
    stats: &[IndexPhysicalStat],
    thresholds: &Thresholds,
) -> Vec<MaintenanceRecommendation> {
    let mut recommendations: Vec<MaintenanceRecommendation> = stats
        .iter()
        .filter(|stat| stat.page_count > thresholds.min_page_count)
        .filter_map(|stat| classify(stat, thresholds))
        .collect();

    // sort_by is stable
    recommendations.sort_by(|a, b| b.fragmentation_percent.total_cmp(&a.fragmentation_percent));
    recommendations
}

/// One `ALTER INDEX` statement per recommendation, newline-joined, in order.
pub fn generate_maintenance_sql(recommendations: &[MaintenanceRecommendation]) -> String {
    recommendations
        .iter()
        .map(MaintenanceRecommendation::statement)
        .collect::<Vec<_>>()
        .join("\n")
}
