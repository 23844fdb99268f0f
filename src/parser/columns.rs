//! Column usage filtering for prompt context

use regex::Regex;

use super::table_refs::TableReference;

/// A column as reported by the metadata source, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
        }
    }

    /// `name (type)`
    pub fn describe(&self) -> String {
        format!("{} ({})", self.name, self.data_type)
    }
}

/// Narrow `all_columns` to the ones `sql` appears to use.
///
/// A column counts as used when `table.column` or the bare word `column`
/// occurs in the text (word boundaries, case-insensitive). When nothing
/// matches, every column is returned: dynamic SQL and extraction misses
/// should not leave the table description empty.
pub fn filter_used_columns(all_columns: &[ColumnInfo], sql: &str, table_name: &str) -> Vec<String> {
    let used: Vec<String> = all_columns
        .iter()
        .filter(|col| column_is_referenced(sql, table_name, &col.name))
        .map(ColumnInfo::describe)
        .collect();

    if used.is_empty() {
        all_columns.iter().map(ColumnInfo::describe).collect()
    } else {
        used
    }
}

fn column_is_referenced(sql: &str, table_name: &str, column: &str) -> bool {
    if column.is_empty() {
        return false;
    }
    let col = regex::escape(column);
    let qualified = format!(r"(?i)\b{}\.{}\b", regex::escape(table_name), col);
    let bare = format!(r"(?i)\b{}\b", col);

    [qualified, bare].iter().any(|pattern| {
        Regex::new(pattern)
            .map(|re| re.is_match(sql))
            .unwrap_or(false)
    })
}

/// One table-info line: `schema.table (col (type), ...)`.
pub fn render_table_info(table: &TableReference, columns: &[String]) -> String {
    format!("{}.{} ({})", table.schema, table.table, columns.join(", "))
}
