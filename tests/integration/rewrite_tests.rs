//! Procedure context, generated rewrites and their verified persistence

use chrono::{Local, TimeZone};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use sql_index_advisor::advisor::{
    context_for_sql, index_context, save_rewrite, suggest_indexes, suggest_rewrite, SaveOptions,
    SaveOutcome,
};
use sql_index_advisor::source::{CannedGenerator, FileSink, RecordingExecutor};
use sql_index_advisor::ArtifactSink;

use crate::common::{sales_source, GET_ORDERS};

#[test]
fn test_context_for_stored_procedure() {
    let context = index_context(&sales_source(), "Sales", "dbo", "GetOrders").unwrap();

    let tables: Vec<String> = context.tables.iter().map(|t| t.to_string()).collect();
    assert_eq!(tables, vec!["Sales.dbo.Customers", "Sales.dbo.Orders"]);
    assert_eq!(
        context.table_info,
        vec![
            "dbo.Customers (Id (int), Name (nvarchar))".to_string(),
            "dbo.Orders (Id (int), CustomerId (int), OrderDate (datetime))".to_string(),
        ]
    );

    let prompt = context.index_prompt();
    assert!(prompt.contains(GET_ORDERS));
    assert!(prompt.contains("dbo.Orders (Id (int), CustomerId (int), OrderDate (datetime))"));
}

#[test]
fn test_unknown_tables_are_listed_without_info() {
    let context = context_for_sql(&sales_source(), "Sales", "SELECT * FROM dbo.Unknown u JOIN dbo.Orders o ON o.Id = u.Id").unwrap();
    assert_eq!(context.tables.len(), 2);
    assert_eq!(context.table_info, vec!["dbo.Orders (Id (int))".to_string()]);
}

#[test]
fn test_index_suggestions_from_generated_text() {
    let context = index_context(&sales_source(), "Sales", "dbo", "GetOrders").unwrap();
    let generator = CannedGenerator::answering(
        "```sql\nCREATE INDEX IX_Orders_CustomerId_OrderDate ON [Sales].[dbo].[Orders] (CustomerId, OrderDate DESC);\n```",
    );
    let ddl = suggest_indexes(&generator, &context).unwrap();
    assert_eq!(
        ddl,
        "CREATE INDEX IX_Orders_CustomerId_OrderDate ON [Sales].[dbo].[Orders] (CustomerId, OrderDate DESC);"
    );
}

#[test]
fn test_generated_rewrite_saved_next_to_original() {
    let source = sales_source();
    let context = index_context(&source, "Sales", "dbo", "GetOrders").unwrap();
    let answer = format!(
        "Sure, here is the optimized version.\n=== SP_OPTIMIZED ===\n{}\n=== END SP_OPTIMIZED ===",
        GET_ORDERS.replace("SET NOCOUNT ON;", "SET NOCOUNT ON;\n    SET XACT_ABORT ON;")
    );
    let rewritten = suggest_rewrite(&CannedGenerator::answering(&answer), &context).unwrap();
    assert!(rewritten.starts_with("CREATE PROCEDURE dbo.GetOrders"));
    assert!(rewritten.ends_with("END"));

    let temp = TempDir::new().unwrap();
    let sink = FileSink::new(temp.path());
    let executor = RecordingExecutor::new();
    let now = Local.with_ymd_and_hms(2025, 1, 31, 23, 59, 58).unwrap();
    let outcome = save_rewrite(
        &executor,
        Some(&sink as &dyn ArtifactSink),
        "Sales",
        &context.definition,
        &rewritten,
        SaveOptions {
            threshold: 0.9,
            force: false,
        },
        now,
    )
    .unwrap();

    let SaveOutcome::Saved { name, verdict, path } = outcome else {
        panic!("expected the rewrite to be saved");
    };
    assert_eq!(name, "GetOrders_Opt_20250131235958");
    assert!(verdict.is_similar);

    let path = path.expect("sink path");
    assert_eq!(path, temp.path().join("GetOrders_Opt_20250131235958.sql"));
    let saved = std::fs::read_to_string(path).unwrap();
    assert!(saved.starts_with("CREATE PROCEDURE dbo.[GetOrders_Opt_20250131235958]"));

    let executed = executor.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed[0].1.starts_with("IF OBJECT_ID('dbo.GetOrders_Opt_20250131235958', 'P')"));
    assert_eq!(executed[1].1, saved);
}

#[test]
fn test_unrelated_rewrite_rejected() {
    let executor = RecordingExecutor::new();
    let outcome = save_rewrite(
        &executor,
        None,
        "Sales",
        GET_ORDERS,
        "CREATE PROCEDURE dbo.GetOrders AS RETURN 0",
        SaveOptions {
            threshold: 0.95,
            force: false,
        },
        Local::now(),
    )
    .unwrap();
    assert!(matches!(outcome, SaveOutcome::Rejected(v) if !v.is_similar));
    assert!(executor.executed().is_empty());
}
