//! Index usage classification: unused indexes to drop, missing indexes to create
//!
//! Both inputs come from cumulative DMV counters that reset on server restart,
//! so every threshold here is a heuristic rather than an exact signal.

use std::fmt;

use crate::config::Thresholds;
use crate::util::{fit_identifier, quote_ident, split_column_group};

/// Usage counters for one non-primary, non-unique, nonclustered index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexUsageStat {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub index: Option<String>,
    pub seeks: i64,
    pub scans: i64,
    pub lookups: i64,
    pub updates: i64,
    pub size_kb: i64,
}

impl IndexUsageStat {
    pub fn reads(&self) -> i64 {
        self.seeks + self.scans + self.lookups
    }
}

/// One missing-index suggestion from `sys.dm_db_missing_index_*`.
///
/// Column groups are the raw DMV strings, e.g. `[CustomerId], [OrderDate]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingIndexStat {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub equality_columns: Option<String>,
    pub inequality_columns: Option<String>,
    pub included_columns: Option<String>,
    pub unique_compiles: i64,
    pub seeks: i64,
    pub scans: i64,
    pub avg_total_cost: f64,
    pub avg_impact: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnusedIndexAction {
    Drop,
    LowRead,
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingIndexAction {
    /// Recommended to create
    Yes,
    Optional,
}

impl fmt::Display for UnusedIndexAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnusedIndexAction::Drop => "DROP",
            UnusedIndexAction::LowRead => "LOW_READ",
            UnusedIndexAction::Keep => "KEEP",
        })
    }
}

impl fmt::Display for MissingIndexAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingIndexAction::Yes => "YES",
            MissingIndexAction::Optional => "OPTIONAL",
        })
    }
}

impl UnusedIndexAction {
    pub fn severity(&self) -> u8 {
        match self {
            UnusedIndexAction::Drop => 0,
            UnusedIndexAction::LowRead => 1,
            UnusedIndexAction::Keep => 2,
        }
    }
}

impl MissingIndexAction {
    pub fn severity(&self) -> u8 {
        match self {
            MissingIndexAction::Yes => 0,
            MissingIndexAction::Optional => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnusedIndexRecommendation {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub index: String,
    pub reads: i64,
    pub updates: i64,
    pub size_kb: i64,
    pub action: UnusedIndexAction,
    /// `DROP INDEX ...;` for DROP and LOW_READ, None for KEEP
    pub suggested_sql: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissingIndexRecommendation {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub index_name: String,
    pub seeks: i64,
    pub avg_total_cost: f64,
    pub avg_impact: f64,
    /// Rough size estimate: seeks x average cost x 8
    pub estimated_size_kb: i64,
    pub action: MissingIndexAction,
    pub suggested_sql: String,
}

/// Classify an unused-index candidate.
///
/// Rows without an index name are dropped.
pub fn classify_unused(stat: &IndexUsageStat, thresholds: &Thresholds) -> Option<UnusedIndexRecommendation> {
    let index = stat.index.as_deref().filter(|name| !name.trim().is_empty())?;
    let reads = stat.reads();

    let action = if reads == 0 && stat.updates > 0 {
        UnusedIndexAction::Drop
    } else if reads < thresholds.low_read && stat.updates > 0 {
        UnusedIndexAction::LowRead
    } else {
        UnusedIndexAction::Keep
    };

    let suggested_sql = match action {
        UnusedIndexAction::Keep => None,
        _ => Some(format!(
            "DROP INDEX {} ON {}.{};",
            quote_ident(index),
            quote_ident(&stat.schema),
            quote_ident(&stat.table)
        )),
    };

    Some(UnusedIndexRecommendation {
        database: stat.database.clone(),
        schema: stat.schema.clone(),
        table: stat.table.clone(),
        index: index.to_string(),
        reads,
        updates: stat.updates,
        size_kb: stat.size_kb,
        action,
        suggested_sql,
    })
}

/// Classify a missing-index suggestion and synthesize its `CREATE INDEX`.
///
/// Rows with neither equality nor inequality columns have no key and are dropped.
pub fn classify_missing(stat: &MissingIndexStat, thresholds: &Thresholds) -> Option<MissingIndexRecommendation> {
    let equality = split_column_group(stat.equality_columns.as_deref().unwrap_or(""));
    let inequality = split_column_group(stat.inequality_columns.as_deref().unwrap_or(""));
    let included = split_column_group(stat.included_columns.as_deref().unwrap_or(""));

    if equality.is_empty() && inequality.is_empty() {
        return None;
    }

    let action = if stat.seeks > thresholds.missing_min_seeks && stat.avg_impact > thresholds.missing_min_impact {
        MissingIndexAction::Yes
    } else {
        MissingIndexAction::Optional
    };

    let mut index_name = format!("IX_{}", stat.table);
    if !equality.is_empty() {
        index_name.push('_');
        index_name.push_str(&equality.join("_"));
    }
    if !inequality.is_empty() {
        index_name.push('_');
        index_name.push_str(&inequality.join("_"));
    }
    let index_name = fit_identifier(&index_name);

    let key_columns: Vec<String> = equality
        .iter()
        .chain(inequality.iter())
        .map(|c| quote_ident(c))
        .collect();

    let mut suggested_sql = format!(
        "CREATE NONCLUSTERED INDEX {} ON {}.{}.{} ({})",
        quote_ident(&index_name),
        quote_ident(&stat.database),
        quote_ident(&stat.schema),
        quote_ident(&stat.table),
        key_columns.join(", ")
    );
    if !included.is_empty() {
        let include: Vec<String> = included.iter().map(|c| quote_ident(c)).collect();
        suggested_sql.push_str(&format!(" INCLUDE ({})", include.join(", ")));
    }
    suggested_sql.push(';');

    Some(MissingIndexRecommendation {
        database: stat.database.clone(),
        schema: stat.schema.clone(),
        table: stat.table.clone(),
        index_name,
        seeks: stat.seeks,
        avg_total_cost: stat.avg_total_cost,
        avg_impact: stat.avg_impact,
        estimated_size_kb: (stat.seeks as f64 * stat.avg_total_cost * 8.0) as i64,
        action,
        suggested_sql,
    })
}

/// Either branch of the usage classifier, for combined prioritization
#[derive(Debug, Clone, PartialEq)]
pub enum IndexActionRecommendation {
    Unused(UnusedIndexRecommendation),
    Missing(MissingIndexRecommendation),
}

impl IndexActionRecommendation {
    /// 0 for DROP / YES, 1 for LOW_READ / OPTIONAL, 2 for KEEP.
    pub fn severity(&self) -> u8 {
        match self {
            IndexActionRecommendation::Unused(r) => r.action.severity(),
            IndexActionRecommendation::Missing(r) => r.action.severity(),
        }
    }

    /// Size in KB for unused indexes, average impact for missing ones.
    pub fn weight(&self) -> f64 {
        match self {
            IndexActionRecommendation::Unused(r) => r.size_kb as f64,
            IndexActionRecommendation::Missing(r) => r.avg_impact,
        }
    }

    pub fn suggested_sql(&self) -> Option<&str> {
        match self {
            IndexActionRecommendation::Unused(r) => r.suggested_sql.as_deref(),
            IndexActionRecommendation::Missing(r) => Some(r.suggested_sql.as_str()),
        }
    }

    pub fn action_label(&self) -> String {
        match self {
            IndexActionRecommendation::Unused(r) => r.action.to_string(),
            IndexActionRecommendation::Missing(r) => r.action.to_string(),
        }
    }
}

/// Sort by severity (DROP / YES first), then weight descending. Stable.
pub fn prioritize(recommendations: &mut [IndexActionRecommendation]) {
    recommendations.sort_by(|a, b| {
        a.severity()
            .cmp(&b.severity())
            .then_with(|| b.weight().total_cmp(&a.weight()))
    });
}

/// Classify unused-index rows, most severe and largest first.
pub fn analyze_unused(stats: &[IndexUsageStat], thresholds: &Thresholds) -> Vec<UnusedIndexRecommendation> {
    let mut recs: Vec<UnusedIndexRecommendation> =
        stats.iter().filter_map(|s| classify_unused(s, thresholds)).collect();
    recs.sort_by(|a, b| {
        a.action
            .severity()
            .cmp(&b.action.severity())
            .then_with(|| b.size_kb.cmp(&a.size_kb))
    });
    recs
}

/// Classify missing-index rows, recommended first, then by impact and seeks.
pub fn analyze_missing(stats: &[MissingIndexStat], thresholds: &Thresholds) -> Vec<MissingIndexRecommendation> {
    let mut recs: Vec<MissingIndexRecommendation> =
        stats.iter().filter_map(|s| classify_missing(s, thresholds)).collect();
    recs.sort_by(|a, b| {
        a.action
            .severity()
            .cmp(&b.action.severity())
            .then_with(|| b.avg_impact.total_cmp(&a.avg_impact))
            .then_with(|| b.seeks.cmp(&a.seeks))
    });
    recs
}

/// `DROP INDEX` statements for DROP rows; LOW_READ rows too when `include_advisory`.
pub fn generate_unused_sql(recs: &[UnusedIndexRecommendation], include_advisory: bool) -> String {
    recs.iter()
        .filter(|r| match r.action {
            UnusedIndexAction::Drop => true,
            UnusedIndexAction::LowRead => include_advisory,
            UnusedIndexAction::Keep => false,
        })
        .filter_map(|r| r.suggested_sql.clone())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `CREATE INDEX` statements for YES rows; OPTIONAL rows too when `include_advisory`.
pub fn generate_missing_sql(recs: &[MissingIndexRecommendation], include_advisory: bool) -> String {
    recs.iter()
        .filter(|r| r.action == MissingIndexAction::Yes || include_advisory)
        .map(|r| r.suggested_sql.clone())
        .collect::<Vec<_>>()
        .join("\n")
}
