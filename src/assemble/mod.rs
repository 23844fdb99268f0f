//! Recommendation artifact assembly
//!
//! Merges the deterministic maintenance, drop and create sections (plus an
//! opted-in AI section) into the body of one well-known stored procedure.

mod escape;

pub use escape::{escape_dynamic_sql, exec_literal, unescape_dynamic_sql};

use crate::util::quote_ident;

/// Schema of the recommendation procedure.
pub const RECOMMENDATION_SCHEMA: &str = "dbo";
/// Fixed name of the recommendation procedure; a new build replaces the old one.
pub const RECOMMENDATION_PROCEDURE: &str = "recommendation_index";
/// Comment line placed before AI-supplied DDL.
pub const AI_SECTION_MARKER: &str = "-- AI Suggested Indexes --";

/// Deployable recommendation procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationArtifact {
    /// Merged SQL, unescaped, as it will run inside the procedure
    pub combined_sql: String,
    /// `IF OBJECT_ID(...) IS NOT NULL DROP PROCEDURE ...;`
    pub guard_sql: String,
    /// `EXEC('CREATE PROCEDURE ...');`
    pub create_sql: String,
}

impl RecommendationArtifact {
    /// Qualified procedure name, e.g. `dbo.recommendation_index`.
    pub fn procedure_name() -> String {
        format!("{}.{}", RECOMMENDATION_SCHEMA, RECOMMENDATION_PROCEDURE)
    }

    /// Statement that runs the deployed procedure.
    pub fn execute_sql() -> String {
        format!("EXEC {};", Self::procedure_name())
    }

    /// Full deployment script, optionally switching database first.
    pub fn to_script(&self, database: Option<&str>) -> String {
        let mut script = String::new();
        if let Some(db) = database {
            script.push_str(&format!("USE {};\n\n", quote_ident(db)));
        }
        script.push_str(&self.guard_sql);
        script.push_str("\n\n");
        script.push_str(&self.create_sql);
        script.push('\n');
        script
    }
}

/// Result of an assemble call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleOutcome {
    Built(RecommendationArtifact),
    /// Every section was empty
    NothingToBuild,
}

impl AssembleOutcome {
    pub fn artifact(&self) -> Option<&RecommendationArtifact> {
        match self {
            AssembleOutcome::Built(artifact) => Some(artifact),
            AssembleOutcome::NothingToBuild => None,
        }
    }
}

/// Merge the recommendation sections into one artifact.
///
/// Sections appear in a fixed order: maintenance, unused-index drops,
/// missing-index creates. `ai_sql` is appended last under
/// [`AI_SECTION_MARKER`]; callers pass `None` unless the user opted in.
pub fn assemble(
    maintenance_sql: &str,
    unused_sql: &str,
    missing_sql: &str,
    ai_sql: Option<&str>,
) -> AssembleOutcome {
    let mut sections: Vec<String> = [maintenance_sql, unused_sql, missing_sql]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(ai) = ai_sql.map(str::trim).filter(|s| !s.is_empty()) {
        sections.push(format!("{}\n{}", AI_SECTION_MARKER, ai));
    }

    if sections.is_empty() {
        return AssembleOutcome::NothingToBuild;
    }

    let combined_sql = sections.join("\n\n");
    AssembleOutcome::Built(RecommendationArtifact {
        guard_sql: guard_statement(),
        create_sql: create_statement(&combined_sql),
        combined_sql,
    })
}

fn guard_statement() -> String {
    let name = RecommendationArtifact::procedure_name();
    format!(
        "IF OBJECT_ID('{}', 'P') IS NOT NULL DROP PROCEDURE {};",
        name, name
    )
}

fn create_statement(combined_sql: &str) -> String {
    let body = format!(
        "CREATE PROCEDURE {}\nAS\nBEGIN\n    SET NOCOUNT ON;\n\n{}\nEND",
        RecommendationArtifact::procedure_name(),
        indent_sql_block(combined_sql)
    );
    exec_literal(&format!("\n{}\n", body))
}

fn indent_sql_block(sql: &str) -> String {
    sql.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("    {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
