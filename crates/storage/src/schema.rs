use rusqlite::Connection;

use bulkedit_core::ModelSchema;

use crate::error::StorageError;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    Ok(())
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

/// `CREATE TABLE` for a model: an integer primary key plus one column per
/// persisted field. Virtual fields get no column.
pub fn create_table_sql(schema: &ModelSchema) -> String {
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY", quote_ident("id"))];
    for field in schema.persisted_fields() {
        let mut column = format!("{} {}", quote_ident(&field.name), field.field_type.sql_type());
        if field.required {
            column.push_str(" NOT NULL");
        }
        columns.push(column);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(schema.table()),
        columns.join(",\n    ")
    )
}
