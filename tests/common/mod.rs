//! Common test utilities for sql-index-advisor tests

#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

use sql_index_advisor::analysis::{IndexPhysicalStat, IndexUsageStat, MissingIndexStat};
use sql_index_advisor::source::MemorySource;

/// Helper to create a temp SQL file with content
pub fn create_sql_file(content: &str) -> NamedTempFile {
    create_sql_file_bytes(content.as_bytes())
}

pub fn create_sql_file_bytes(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".sql").unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

pub fn physical(database: &str, table: &str, index: &str, fragmentation: f64, pages: i64) -> IndexPhysicalStat {
    IndexPhysicalStat {
        database: database.to_string(),
        schema: "dbo".to_string(),
        table: table.to_string(),
        index: Some(index.to_string()),
        fragmentation_percent: Some(fragmentation),
        page_count: pages,
    }
}

pub fn usage(database: &str, table: &str, index: &str, reads: i64, updates: i64, size_kb: i64) -> IndexUsageStat {
    IndexUsageStat {
        database: database.to_string(),
        schema: "dbo".to_string(),
        table: table.to_string(),
        index: Some(index.to_string()),
        seeks: reads,
        scans: 0,
        lookups: 0,
        updates,
        size_kb,
    }
}

pub fn missing(
    database: &str,
    table: &str,
    equality: Option<&str>,
    inequality: Option<&str>,
    included: Option<&str>,
    seeks: i64,
    impact: f64,
) -> MissingIndexStat {
    MissingIndexStat {
        database: database.to_string(),
        schema: "dbo".to_string(),
        table: table.to_string(),
        equality_columns: equality.map(str::to_string),
        inequality_columns: inequality.map(str::to_string),
        included_columns: included.map(str::to_string),
        unique_compiles: 1,
        seeks,
        scans: 0,
        avg_total_cost: 2.5,
        avg_impact: impact,
    }
}

pub const GET_ORDERS: &str = "CREATE PROCEDURE dbo.GetOrders @CustomerId INT
AS
BEGIN
    SET NOCOUNT ON;
    -- legacy: SELECT * FROM dbo.OrdersOld
    SELECT o.Id, o.OrderDate, c.Name
    FROM dbo.Orders o
    INNER JOIN [dbo].[Customers] c ON c.Id = o.CustomerId
    WHERE o.CustomerId = @CustomerId
    ORDER BY o.OrderDate DESC;
END";

/// Two databases with a little of everything: fragmented indexes, an unused
/// index, a missing-index suggestion, tables and one procedure.
pub fn sales_source() -> MemorySource {
    MemorySource::new()
        .with_fragmentation(physical("Sales", "Orders", "IX_Orders_Date", 45.2, 5000))
        .with_fragmentation(physical("Sales", "Orders", "IX_Orders_Status", 12.0, 800))
        .with_fragmentation(physical("Sales", "Customers", "IX_Customers_Name", 80.0, 50))
        .with_fragmentation(physical("Sales", "Customers", "IX_Customers_Email", 2.0, 900))
        .with_unused(usage("Sales", "Orders", "IX_Orders_Legacy", 0, 1200, 4096))
        .with_unused(usage("Sales", "Orders", "IX_Orders_Region", 20, 300, 1024))
        .with_unused(usage("Sales", "Customers", "IX_Customers_Phone", 5000, 10, 512))
        .with_missing(missing(
            "Sales",
            "Orders",
            Some("[CustomerId]"),
            Some("[OrderDate]"),
            Some("[Total]"),
            120,
            85.0,
        ))
        .with_missing(missing("Sales", "Orders", Some("[Status]"), None, None, 10, 40.0))
        .with_table(
            "Sales",
            "dbo",
            "Orders",
            &[
                ("Id", "int"),
                ("CustomerId", "int"),
                ("OrderDate", "datetime"),
                ("Total", "decimal"),
                ("Notes", "nvarchar"),
            ],
        )
        .with_table("Sales", "dbo", "Customers", &[("Id", "int"), ("Name", "nvarchar"), ("Email", "nvarchar")])
        .with_procedure("Sales", "dbo", "GetOrders", GET_ORDERS)
        .with_fragmentation(physical("Archive", "OldOrders", "IX_OldOrders_Id", 31.0, 2500))
}
