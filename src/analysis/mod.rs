//! Rule-based classifiers over physical and usage index statistics

mod fragmentation;
mod usage;

pub use fragmentation::{
    analyze_fragmentation, classify, generate_maintenance_sql, IndexPhysicalStat,
    MaintenanceAction, MaintenanceRecommendation,
};
pub use usage::{
    analyze_missing, analyze_unused, classify_missing, classify_unused, generate_missing_sql,
    generate_unused_sql, prioritize, IndexActionRecommendation, IndexUsageStat,
    MissingIndexAction, MissingIndexRecommendation, MissingIndexStat, UnusedIndexAction,
    UnusedIndexRecommendation,
};
