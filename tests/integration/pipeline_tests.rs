//! Scan, classify, assemble and deploy against in-memory collaborators

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use sql_index_advisor::advisor::{
    analyze, apply_statements, build_recommendation as assemble_report, context_for_sql,
    deploy_artifact, execute_artifact, persist_artifact, persist_maintenance, target_databases,
    ARTIFACT_FILE_NAME,
};
use sql_index_advisor::assemble::AI_SECTION_MARKER;
use sql_index_advisor::source::{FileSink, MemorySource, RecordingExecutor};
use sql_index_advisor::{build_recommendation, AssembleOutcome, BuildOptions, Thresholds};

use crate::common::{create_sql_file, physical, sales_source, usage};

fn all_databases(source: &MemorySource) -> Vec<String> {
    target_databases(source, "Sales", true).unwrap()
}

#[test]
fn test_analyze_across_databases() {
    let source = sales_source();
    let report = analyze(&source, &all_databases(&source), &Thresholds::default());

    assert!(report.failures.is_empty());
    assert_eq!(
        report.maintenance_sql(),
        "ALTER INDEX [IX_Orders_Date] ON [Sales].[dbo].[Orders] REBUILD;\n\
         ALTER INDEX [IX_OldOrders_Id] ON [Archive].[dbo].[OldOrders] REBUILD;\n\
         ALTER INDEX [IX_Orders_Status] ON [Sales].[dbo].[Orders] REORGANIZE;"
    );
    assert_eq!(report.unused_sql(false), "DROP INDEX [IX_Orders_Legacy] ON [dbo].[Orders];");
    assert_eq!(
        report.missing_sql(false),
        "CREATE NONCLUSTERED INDEX [IX_Orders_CustomerId_OrderDate] ON [Sales].[dbo].[Orders] ([CustomerId], [OrderDate]) INCLUDE ([Total]);"
    );

    let labels: Vec<String> = report.prioritized().iter().map(|r| r.action_label()).collect();
    assert_eq!(labels, vec!["DROP", "YES", "LOW_READ", "OPTIONAL", "KEEP"]);
}

#[test]
fn test_single_database_scope() {
    let source = sales_source();
    let databases = target_databases(&source, "Archive", false).unwrap();
    assert_eq!(databases, vec!["Archive".to_string()]);

    let report = analyze(&source, &databases, &Thresholds::default());
    assert_eq!(report.maintenance.len(), 1);
    assert!(report.unused.is_empty());
    assert!(report.missing.is_empty());
}

#[test]
fn test_failing_database_does_not_stop_scan() {
    let source = sales_source().with_failing_database("Locked", "The server principal is not able to access the database");
    let report = analyze(&source, &all_databases(&source), &Thresholds::default());

    assert_eq!(report.maintenance.len(), 3);
    // one failure per scan kind
    assert_eq!(report.failures.len(), 3);
    assert!(report.failures.iter().all(|f| f.database == "Locked"));
}

#[test]
fn test_scenario_single_fragmented_index() {
    let source = MemorySource::new()
        .with_fragmentation(physical("Sales", "Orders", "IX_Orders_Date", 45.2, 5000))
        .with_fragmentation(physical("Sales", "Orders", "IX_Tiny", 99.0, 50));
    let report = analyze(&source, &["Sales".to_string()], &Thresholds::default());

    assert_eq!(
        report.maintenance_sql(),
        "ALTER INDEX [IX_Orders_Date] ON [Sales].[dbo].[Orders] REBUILD;"
    );
    let outcome = assemble_report(&report, None);
    let artifact = outcome.artifact().expect("artifact");
    assert_eq!(artifact.combined_sql, report.maintenance_sql());
}

#[test]
fn test_empty_scan_builds_nothing() {
    let source = MemorySource::new().with_database("Empty");
    let report = analyze(&source, &all_databases(&source), &Thresholds::default());
    assert!(report.is_empty());
    assert_eq!(assemble_report(&report, None), AssembleOutcome::NothingToBuild);
}

#[test]
fn test_build_deploy_and_execute() {
    let source = sales_source();
    let options = BuildOptions {
        database: "Sales".to_string(),
        all_databases: false,
        ai_sql: None,
        use_ai: false,
        thresholds: Thresholds::default(),
    };
    let outcome = build_recommendation(&source, &options).unwrap();
    let artifact = outcome.artifact().expect("artifact");

    let executor = RecordingExecutor::new();
    deploy_artifact(&executor, "Sales", artifact).unwrap();
    execute_artifact(&executor, "Sales").unwrap();

    let executed: Vec<String> = executor.executed().into_iter().map(|(_, sql)| sql).collect();
    assert_eq!(executed.len(), 3);
    assert_eq!(executed[0], artifact.guard_sql);
    assert_eq!(executed[1], artifact.create_sql);
    assert_eq!(executed[2], "EXEC dbo.recommendation_index;");
}

#[test]
fn test_ai_suggestions_need_opt_in() {
    let source = sales_source();
    let ai_file = create_sql_file(
        "Here are my suggestions:\nCREATE INDEX IX_Customers_Email ON [Sales].[dbo].[Customers] (Email);\nThanks!",
    );
    let mut options = BuildOptions {
        database: "Sales".to_string(),
        all_databases: false,
        ai_sql: Some(ai_file.path().to_path_buf()),
        use_ai: false,
        thresholds: Thresholds::default(),
    };

    let without = build_recommendation(&source, &options).unwrap();
    assert!(!without.artifact().unwrap().combined_sql.contains(AI_SECTION_MARKER));

    options.use_ai = true;
    let with = build_recommendation(&source, &options).unwrap();
    let combined = &with.artifact().unwrap().combined_sql;
    assert!(combined.ends_with(&format!(
        "{}\nCREATE INDEX IX_Customers_Email ON [Sales].[dbo].[Customers] (Email);",
        AI_SECTION_MARKER
    )));
    assert!(!combined.contains("Thanks!"));
}

#[test]
fn test_rebuilds_are_byte_identical() {
    let source = sales_source();
    let databases = all_databases(&source);
    let first = assemble_report(&analyze(&source, &databases, &Thresholds::default()), None);
    let second = assemble_report(&analyze(&source, &databases, &Thresholds::default()), None);
    assert_eq!(
        first.artifact().unwrap().to_script(Some("Sales")),
        second.artifact().unwrap().to_script(Some("Sales"))
    );
}

#[test]
fn test_persist_and_apply_maintenance() {
    let temp = TempDir::new().unwrap();
    let sink = FileSink::new(temp.path().join("outputs"));
    let source = sales_source();
    let report = analyze(&source, &all_databases(&source), &Thresholds::default());

    let artifact = assemble_report(&report, None);
    let path = persist_artifact(&sink, artifact.artifact().unwrap(), Some("Sales")).unwrap();
    assert!(path.ends_with(ARTIFACT_FILE_NAME));
    let script = std::fs::read_to_string(&path).unwrap();
    assert!(script.starts_with("USE [Sales];"));

    let now = chrono::Local::now();
    let maintenance = persist_maintenance(&sink, &report.maintenance_sql(), now).unwrap();
    let file_name = maintenance.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("index_recommendations_"));
    assert!(file_name.ends_with(".sql"));

    let executor = RecordingExecutor::new().failing_on("[IX_OldOrders_Id]", "Cannot find index");
    let applied = apply_statements(&executor, "Sales", &report.maintenance_sql());
    assert_eq!(applied.applied, 2);
    assert_eq!(applied.failures.len(), 1);
}

#[test]
fn test_build_across_databases_keeps_drops_in_deploy_database() {
    let source = sales_source().with_unused(usage("Archive", "Orders", "IX_Orders_Archived", 0, 900, 2048));
    let build = |database: &str| {
        let options = BuildOptions {
            database: database.to_string(),
            all_databases: true,
            ai_sql: None,
            use_ai: false,
            thresholds: Thresholds::default(),
        };
        build_recommendation(&source, &options).unwrap()
    };

    let sales = build("Sales");
    let combined = &sales.artifact().unwrap().combined_sql;
    assert!(combined.contains("DROP INDEX [IX_Orders_Legacy] ON [dbo].[Orders];"));
    assert!(!combined.contains("IX_Orders_Archived"));
    // three-part maintenance statements still cover every database
    assert!(combined.contains("ALTER INDEX [IX_OldOrders_Id] ON [Archive].[dbo].[OldOrders] REBUILD;"));

    let archive = build("Archive");
    let combined = &archive.artifact().unwrap().combined_sql;
    assert!(combined.contains("DROP INDEX [IX_Orders_Archived] ON [dbo].[Orders];"));
    assert!(!combined.contains("IX_Orders_Legacy"));

    let executor = RecordingExecutor::new();
    deploy_artifact(&executor, "Archive", archive.artifact().unwrap()).unwrap();
    assert!(executor.executed().iter().all(|(database, _)| database == "Archive"));
}

#[test]
fn test_context_survives_unreachable_database() {
    let source = sales_source().with_failing_database("Locked", "login failed");
    let context = context_for_sql(
        &source,
        "Sales",
        "SELECT o.Id, a.Note FROM dbo.Orders o JOIN Locked.dbo.Audit a ON a.OrderId = o.Id",
    )
    .unwrap();

    assert_eq!(context.tables.len(), 2);
    assert_eq!(context.table_info, vec!["dbo.Orders (Id (int))".to_string()]);
    assert_eq!(context.failures.len(), 1);
    assert!(context.failures[0].starts_with("Locked.dbo.Audit: "));
    assert!(context.failures[0].contains("login failed"));
    assert!(context.index_prompt().contains("dbo.Orders (Id (int))"));
}
