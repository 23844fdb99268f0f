//! Quoting for SQL embedded in a dynamic `EXEC('...')` string

/// Double every single quote so `sql` can sit inside a `'...'` literal.
pub fn escape_dynamic_sql(sql: &str) -> String {
    sql.replace('\'', "''")
}

/// What the server does to a literal body before executing it: `''` becomes `'`.
pub fn unescape_dynamic_sql(literal_body: &str) -> String {
    literal_body.replace("''", "'")
}

/// Wrap `sql` in `EXEC('...')`.
pub fn exec_literal(sql: &str) -> String {
    format!("EXEC('{}');", escape_dynamic_sql(sql))
}
