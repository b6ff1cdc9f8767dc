//! SQLite schema for the backing store
//!
//! Three record tables mirror the object model. Ownership of photographs is
//! expressed by a unique `photograph_id` column on the owning row.

use rusqlite::{Connection, OptionalExtension, Result};

pub const SCHEMA_VERSION: i32 = 1;

/// Create every table and index, then record [`SCHEMA_VERSION`]
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Photographs table (opaque image blobs)
        CREATE TABLE IF NOT EXISTS photographs (
            id TEXT PRIMARY KEY,
            image_data BLOB NOT NULL
        );

        -- Notebooks table
        CREATE TABLE IF NOT EXISTS notebooks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            photograph_id TEXT UNIQUE,
            FOREIGN KEY (photograph_id) REFERENCES photographs(id)
        );

        -- Notes table (many-to-one with notebooks)
        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            notebook_id TEXT NOT NULL,
            title TEXT NOT NULL,
            contents TEXT,
            created_at INTEGER NOT NULL,
            photograph_id TEXT UNIQUE,
            FOREIGN KEY (notebook_id) REFERENCES notebooks(id) ON DELETE CASCADE,
            FOREIGN KEY (photograph_id) REFERENCES photographs(id)
        );

        -- Indexes for the list queries
        CREATE INDEX IF NOT EXISTS idx_notebooks_title ON notebooks(title);
        CREATE INDEX IF NOT EXISTS idx_notes_notebook_created_at ON notes(notebook_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_notes_title ON notes(title);
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Version recorded in `schema_info`, if any
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let has_info: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_info')",
        [],
        |row| row.get(0),
    )?;
    if !has_info {
        return Ok(None);
    }

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.and_then(|v| v.parse().ok()))
}

/// Whether the tables are missing or older than [`SCHEMA_VERSION`]
pub fn needs_init(conn: &Connection) -> bool {
    !matches!(get_schema_version(conn), Ok(Some(v)) if v >= SCHEMA_VERSION)
}
