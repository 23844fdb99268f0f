//! Unit tests for table reference extraction and column filtering

use pretty_assertions::assert_eq;

use sql_index_advisor::parser::{
    extract_tables, filter_used_columns, read_sql_file, render_table_info, split_statements,
    ColumnInfo, TableReference,
};

use crate::common::{create_sql_file, create_sql_file_bytes, GET_ORDERS};

fn names(sql: &str, database: Option<&str>) -> Vec<String> {
    extract_tables(sql, database).iter().map(|t| t.to_string()).collect()
}

// ============================================================================
// Reference Extraction
// ============================================================================

#[test]
fn test_procedure_tables_resolved_against_default_database() {
    assert_eq!(
        names(GET_ORDERS, Some("Sales")),
        vec!["Sales.dbo.Customers".to_string(), "Sales.dbo.Orders".to_string()]
    );
}

#[test]
fn test_commented_reference_is_ignored() {
    let tables = names(GET_ORDERS, Some("Sales"));
    assert!(!tables.iter().any(|t| t.contains("OrdersOld")));
}

#[test]
fn test_all_dml_keywords() {
    let sql = "
        INSERT INTO dbo.AuditLog (Msg) VALUES ('x');
        UPDATE Inventory SET Qty = 0;
        DELETE FROM [ops].[Queue] WHERE Id = 1;
        SELECT 1 FROM Reporting.dbo.Daily d LEFT JOIN dbo.Calendar c ON c.D = d.D;";
    assert_eq!(
        names(sql, Some("Sales")),
        vec![
            "Reporting.dbo.Daily".to_string(),
            "Sales.dbo.AuditLog".to_string(),
            "Sales.dbo.Calendar".to_string(),
            "Sales.dbo.Inventory".to_string(),
            "Sales.ops.Queue".to_string(),
        ]
    );
}

#[test]
fn test_temp_tables_excluded() {
    let sql = "SELECT * INTO #work FROM dbo.Orders; SELECT * FROM ##global g JOIN #work w ON 1 = 1;";
    assert_eq!(names(sql, Some("Sales")), vec!["Sales.dbo.Orders".to_string()]);
}

#[test]
fn test_without_default_database() {
    let tables = extract_tables("SELECT * FROM Orders", None);
    assert_eq!(
        tables.into_iter().collect::<Vec<_>>(),
        vec![TableReference::new(None, "dbo", "Orders")]
    );
}

#[test]
fn test_duplicates_collapse() {
    let sql = "SELECT * FROM dbo.Orders; SELECT * FROM [dbo].[Orders]; SELECT * FROM Orders;";
    assert_eq!(names(sql, Some("Sales")), vec!["Sales.dbo.Orders".to_string()]);
}

#[test]
fn test_read_sql_file_utf8_with_bom() {
    let file = create_sql_file("\u{feff}SELECT * FROM dbo.Orders");
    let sql = read_sql_file(file.path()).unwrap();
    assert_eq!(sql, "SELECT * FROM dbo.Orders");
}

#[test]
fn test_read_sql_file_windows_1252_fallback() {
    // 0xE9 is 'é' in Windows-1252 and invalid as a lone UTF-8 byte
    let file = create_sql_file_bytes(b"SELECT * FROM dbo.Caf\xe9");
    let sql = read_sql_file(file.path()).unwrap();
    assert_eq!(sql, "SELECT * FROM dbo.Caf\u{e9}");
}

#[test]
fn test_read_missing_file_is_error() {
    let err = read_sql_file(std::path::Path::new("/definitely/not/here.sql")).unwrap_err();
    assert!(err.to_string().contains("Failed to read SQL file"));
}

// ============================================================================
// Column Usage Filter
// ============================================================================

#[test]
fn test_filter_keeps_ordinal_order() {
    let columns = vec![
        ColumnInfo::new("Id", "int"),
        ColumnInfo::new("CustomerId", "int"),
        ColumnInfo::new("OrderDate", "datetime"),
        ColumnInfo::new("Notes", "nvarchar"),
    ];
    assert_eq!(
        filter_used_columns(&columns, GET_ORDERS, "Orders"),
        vec![
            "Id (int)".to_string(),
            "CustomerId (int)".to_string(),
            "OrderDate (datetime)".to_string(),
        ]
    );
}

#[test]
fn test_filter_falls_back_to_all_columns() {
    let columns = vec![ColumnInfo::new("Payload", "xml"), ColumnInfo::new("Hash", "binary")];
    assert_eq!(
        filter_used_columns(&columns, "EXEC sp_executesql @sql", "Blobs"),
        vec!["Payload (xml)".to_string(), "Hash (binary)".to_string()]
    );
}

#[test]
fn test_render_table_info_line() {
    let table = TableReference::new(Some("Sales"), "dbo", "Orders");
    assert_eq!(
        render_table_info(&table, &["Id (int)".to_string(), "Total (decimal)".to_string()]),
        "dbo.Orders (Id (int), Total (decimal))"
    );
}

// ============================================================================
// Statement Splitting
// ============================================================================

#[test]
fn test_split_maintenance_script() {
    let sql = "ALTER INDEX [A] ON [S].[dbo].[T] REBUILD;\nALTER INDEX [B] ON [S].[dbo].[T] REORGANIZE;\nGO\nSELECT 'a;b';";
    assert_eq!(
        split_statements(sql),
        vec![
            "ALTER INDEX [A] ON [S].[dbo].[T] REBUILD;".to_string(),
            "ALTER INDEX [B] ON [S].[dbo].[T] REORGANIZE;".to_string(),
            "SELECT 'a;b';".to_string(),
        ]
    );
}
