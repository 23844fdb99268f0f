//! Unit tests for the recommendation assembler

use pretty_assertions::assert_eq;

use sql_index_advisor::assemble::{assemble, unescape_dynamic_sql, AI_SECTION_MARKER};
use sql_index_advisor::parser::extract_index_ddl;
use sql_index_advisor::AssembleOutcome;

const AI_ANSWER: &str = "Based on the procedures, I recommend:

1. CREATE INDEX IX_Orders_CustomerId ON [Sales].[dbo].[Orders] (CustomerId);
2. CREATE NONCLUSTERED INDEX IX_Orders_Status ON [Sales].[dbo].[Orders] (Status) WHERE Status <> 'Closed';

These should help the WHERE clause.";

fn literal_body(create_sql: &str) -> &str {
    create_sql
        .strip_prefix("EXEC('")
        .and_then(|s| s.strip_suffix("');"))
        .expect("EXEC wrapper")
}

#[test]
fn test_ai_answer_becomes_final_section() {
    let ai_sql = extract_index_ddl(AI_ANSWER);
    let outcome = assemble("ALTER INDEX [IX_1] ON [Sales].[dbo].[Orders] REBUILD;", "", "", Some(&ai_sql));
    let artifact = outcome.artifact().expect("artifact");

    let sections: Vec<&str> = artifact.combined_sql.split("\n\n").collect();
    assert_eq!(sections.len(), 2);
    assert_eq!(
        sections[1],
        format!(
            "{}\nCREATE INDEX IX_Orders_CustomerId ON [Sales].[dbo].[Orders] (CustomerId);\n\
             CREATE NONCLUSTERED INDEX IX_Orders_Status ON [Sales].[dbo].[Orders] (Status) WHERE Status <> 'Closed';",
            AI_SECTION_MARKER
        )
    );
}

#[test]
fn test_literal_unescapes_to_procedure_body() {
    let ai_sql = extract_index_ddl(AI_ANSWER);
    let outcome = assemble("", "DROP INDEX [IX_O'Brien] ON [dbo].[People];", "", Some(&ai_sql));
    let artifact = outcome.artifact().expect("artifact");

    let body = unescape_dynamic_sql(literal_body(&artifact.create_sql));
    assert!(body.starts_with("\nCREATE PROCEDURE dbo.recommendation_index\nAS\nBEGIN\n"));
    assert!(body.ends_with("\nEND\n"));
    for line in artifact.combined_sql.lines().filter(|l| !l.trim().is_empty()) {
        assert!(body.contains(&format!("    {}", line)), "missing line: {}", line);
    }
}

#[test]
fn test_nothing_to_build_is_a_value() {
    assert_eq!(assemble("", "", "", None), AssembleOutcome::NothingToBuild);
    assert!(assemble("", "", "", None).artifact().is_none());
}
