use mt_core::{Column, ScalarType};
use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // In-memory databases have no WAL to checkpoint; failure is fine.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::info!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS datasets (
            name       TEXT PRIMARY KEY,
            columns    TEXT NOT NULL,
            shape      TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS runs (
            id         TEXT PRIMARY KEY,
            dataset    TEXT NOT NULL REFERENCES datasets(name),
            first_event INTEGER NOT NULL,
            events     INTEGER NOT NULL DEFAULT 0,
            rows       INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL DEFAULT (datetime('now')),
            closed_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_runs_dataset ON runs(dataset);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}

/// Double-quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn sql_type(ty: ScalarType) -> &'static str {
    match ty {
        ScalarType::I32 | ScalarType::I64 => "INTEGER",
        ScalarType::F32 | ScalarType::F64 => "REAL",
    }
}

/// Name of the coordinate column for slot dimension `dim`.
pub fn slot_column(dim: usize) -> String {
    format!("slot{dim}")
}

/// Create the row table for a dataset: bookkeeping columns, one slot
/// coordinate per shape dimension, then the data columns in order.
/// Float columns are nullable; SQLite stores NaN as NULL.
pub fn create_dataset_table(
    conn: &Connection,
    dataset: &str,
    columns: &[Column],
    rank: usize,
) -> Result<()> {
    let mut defs = vec![
        "row_id INTEGER PRIMARY KEY".to_string(),
        "run_id TEXT NOT NULL REFERENCES runs(id)".to_string(),
        "event INTEGER NOT NULL".to_string(),
    ];
    defs.extend((0..rank).map(|d| format!("{} INTEGER NOT NULL", slot_column(d))));
    defs.extend(
        columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), sql_type(c.ty))),
    );

    let table = quote_ident(dataset);
    let index = quote_ident(&format!("idx_{dataset}_event"));
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} ({});
         CREATE INDEX IF NOT EXISTS {index} ON {table}(event);",
        defs.join(", ")
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for table in &["metadata", "datasets", "runs"] {
            let count: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert!(count >= 0, "table {table} should exist");
        }
    }

    #[test]
    fn test_schema_version_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_idempotent_initialize() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
    }

    #[test]
    fn test_busy_timeout_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("pT"), "\"pT\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_create_dataset_table_columns() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let columns = vec![
            Column::new("pdgID", ScalarType::I32),
            Column::new("pT", ScalarType::F32),
        ];
        create_dataset_table(&conn, "muons", &columns, 1).unwrap();

        let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info('muons')").unwrap();
        let info: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(
            info,
            vec![
                ("row_id".to_string(), "INTEGER".to_string()),
                ("run_id".to_string(), "TEXT".to_string()),
                ("event".to_string(), "INTEGER".to_string()),
                ("slot0".to_string(), "INTEGER".to_string()),
                ("pdgID".to_string(), "INTEGER".to_string()),
                ("pT".to_string(), "REAL".to_string()),
            ]
        );
    }
}
