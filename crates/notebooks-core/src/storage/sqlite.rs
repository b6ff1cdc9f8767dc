//! SQLite backing store
//!
//! Holds the committed records of the main context. The whole object graph
//! is loaded when the store opens; afterwards only change sets are written,
//! one transaction per save.
//!
//! ## Tables
//!
//! - `photographs` - Image blobs
//! - `notebooks` - Notebook records
//! - `notes` - Note records (children of notebooks)
//!
//! Timestamps are stored as nanoseconds since the Unix epoch.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::graph::{ChangeSet, ObjectGraph, Pending};
use crate::models::{Note, NoteId, Notebook, NotebookId, Photograph, PhotographId};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::schema::{init_schema, needs_init};

/// Files SQLite may keep next to the database
const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// SQLite-backed persistence for committed records
pub struct SqliteStore {
    /// Database file, `None` for in-memory stores
    path: Option<PathBuf>,
    /// Open connection, `None` once destroyed
    conn: Option<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        prepare(&conn).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;

        info!("Opened store at {}", path.display());
        Ok(Self {
            path: Some(path),
            conn: Some(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        prepare(&conn)?;
        Ok(Self {
            path: None,
            conn: Some(conn),
        })
    }

    /// Location of the database file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether [`destroy`](Self::destroy) has been called
    pub fn is_destroyed(&self) -> bool {
        self.conn.is_none()
    }

    fn conn(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Destroyed)
    }

    /// Read every committed record
    ///
    /// A destroyed store reads as empty.
    pub fn load(&self) -> StoreResult<ObjectGraph> {
        let Some(conn) = self.conn.as_ref() else {
            return Ok(ObjectGraph::new());
        };

        let mut graph = ObjectGraph::new();

        let mut stmt = conn.prepare("SELECT id, image_data FROM photographs")?;
        let rows = stmt.query_map([], |row| {
            Ok(PhotographRow {
                id: row.get(0)?,
                image_data: row.get(1)?,
            })
        })?;
        for row in rows {
            let photograph = row?.into_photograph()?;
            graph.photographs.insert(photograph.id, photograph);
        }

        let mut stmt =
            conn.prepare("SELECT id, title, created_at, photograph_id FROM notebooks")?;
        let rows = stmt.query_map([], |row| {
            Ok(NotebookRow {
                id: row.get(0)?,
                title: row.get(1)?,
                created_at: row.get(2)?,
                photograph_id: row.get(3)?,
            })
        })?;
        for row in rows {
            let notebook = row?.into_notebook()?;
            graph.notebooks.insert(notebook.id, notebook);
        }

        let mut stmt = conn.prepare(
            "SELECT id, notebook_id, title, contents, created_at, photograph_id FROM notes",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(NoteRow {
                id: row.get(0)?,
                notebook_id: row.get(1)?,
                title: row.get(2)?,
                contents: row.get(3)?,
                created_at: row.get(4)?,
                photograph_id: row.get(5)?,
            })
        })?;
        for row in rows {
            let note = row?.into_note()?;
            graph.notes.insert(note.id, note);
        }

        debug!(
            "Loaded object graph, notebooks={}, notes={}, photographs={}",
            graph.notebook_count(),
            graph.note_count(),
            graph.photograph_count()
        );
        Ok(graph)
    }

    /// Persist a change set in a single transaction
    pub fn write(&mut self, changes: &ChangeSet) -> StoreResult<()> {
        let conn = self.conn.as_mut().ok_or(StoreError::Destroyed)?;
        let tx = conn.transaction()?;

        // Rows are upserted parents first and deleted children first so
        // that foreign keys hold after every statement.
        for photograph in changes.photographs.values().filter_map(Pending::value) {
            upsert_photograph(&tx, photograph)?;
        }
        for notebook in changes.notebooks.values().filter_map(Pending::value) {
            upsert_notebook(&tx, notebook)?;
        }
        for note in changes.notes.values().filter_map(Pending::value) {
            upsert_note(&tx, note)?;
        }

        for (id, change) in &changes.notes {
            if change.value().is_none() {
                tx.execute("DELETE FROM notes WHERE id = ?", params![id.to_string()])?;
            }
        }
        for (id, change) in &changes.notebooks {
            if change.value().is_none() {
                tx.execute("DELETE FROM notebooks WHERE id = ?", params![id.to_string()])?;
            }
        }
        for (id, change) in &changes.photographs {
            if change.value().is_none() {
                tx.execute(
                    "DELETE FROM photographs WHERE id = ?",
                    params![id.to_string()],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Close the database and delete its files
    ///
    /// Later writes fail with [`StoreError::Destroyed`]; loads return an
    /// empty graph. Destroying an in-memory store just drops it.
    pub fn destroy(&mut self) -> StoreResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| StoreError::Database(e))?;
        }

        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        remove_if_exists(path)?;
        for suffix in SIDECAR_SUFFIXES {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(suffix);
            remove_if_exists(Path::new(&sidecar))?;
        }

        info!("Destroyed store at {}", path.display());
        Ok(())
    }

    /// Get notebook count
    pub fn notebook_count(&self) -> StoreResult<i64> {
        count(self.conn()?, "SELECT COUNT(*) FROM notebooks")
    }

    /// Get note count
    pub fn note_count(&self) -> StoreResult<i64> {
        count(self.conn()?, "SELECT COUNT(*) FROM notes")
    }

    /// Get photograph count
    pub fn photograph_count(&self) -> StoreResult<i64> {
        count(self.conn()?, "SELECT COUNT(*) FROM photographs")
    }
}

fn prepare(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    if needs_init(conn) {
        init_schema(conn)?;
    }
    Ok(())
}

fn count(conn: &Connection, sql: &str) -> StoreResult<i64> {
    conn.query_row(sql, [], |row| row.get(0))
        .map_err(Into::into)
}

fn remove_if_exists(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::Destroy {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ==================== Row conversion ====================

struct PhotographRow {
    id: String,
    image_data: Vec<u8>,
}

struct NotebookRow {
    id: String,
    title: String,
    created_at: i64,
    photograph_id: Option<String>,
}

struct NoteRow {
    id: String,
    notebook_id: String,
    title: String,
    contents: Option<String>,
    created_at: i64,
    photograph_id: Option<String>,
}

impl PhotographRow {
    fn into_photograph(self) -> StoreResult<Photograph> {
        Ok(Photograph {
            id: PhotographId::from_uuid(parse_uuid("photographs", &self.id)?),
            image_data: self.image_data.into(),
        })
    }
}

impl NotebookRow {
    fn into_notebook(self) -> StoreResult<Notebook> {
        Ok(Notebook {
            id: NotebookId::from_uuid(parse_uuid("notebooks", &self.id)?),
            created_at: from_nanos(self.created_at),
            title: self.title,
            photograph: parse_photograph("notebooks", self.photograph_id)?,
        })
    }
}

impl NoteRow {
    fn into_note(self) -> StoreResult<Note> {
        Ok(Note {
            id: NoteId::from_uuid(parse_uuid("notes", &self.id)?),
            notebook: NotebookId::from_uuid(parse_uuid("notes", &self.notebook_id)?),
            created_at: from_nanos(self.created_at),
            title: self.title,
            contents: self.contents,
            photograph: parse_photograph("notes", self.photograph_id)?,
        })
    }
}

fn parse_uuid(table: &'static str, value: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| StoreError::InvalidRecord {
        table,
        details: format!("invalid UUID '{}': {}", value, e),
    })
}

fn parse_photograph(
    table: &'static str,
    value: Option<String>,
) -> StoreResult<Option<PhotographId>> {
    value
        .map(|v| parse_uuid(table, &v).map(PhotographId::from_uuid))
        .transpose()
}

fn from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

fn to_nanos(table: &'static str, at: &DateTime<Utc>) -> StoreResult<i64> {
    at.timestamp_nanos_opt()
        .ok_or_else(|| StoreError::InvalidRecord {
            table,
            details: format!("timestamp {} is out of range", at),
        })
}

// ==================== Transaction helpers ====================

fn upsert_photograph(tx: &Transaction, photograph: &Photograph) -> StoreResult<()> {
    tx.execute(
        r#"
        INSERT INTO photographs (id, image_data) VALUES (?1, ?2)
        ON CONFLICT(id) DO UPDATE SET image_data = excluded.image_data
        "#,
        params![photograph.id.to_string(), &*photograph.image_data],
    )?;
    Ok(())
}

fn upsert_notebook(tx: &Transaction, notebook: &Notebook) -> StoreResult<()> {
    tx.execute(
        r#"
        INSERT INTO notebooks (id, title, created_at, photograph_id) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            created_at = excluded.created_at,
            photograph_id = excluded.photograph_id
        "#,
        params![
            notebook.id.to_string(),
            notebook.title,
            to_nanos("notebooks", &notebook.created_at)?,
            notebook.photograph.map(|p| p.to_string()),
        ],
    )?;
    Ok(())
}

fn upsert_note(tx: &Transaction, note: &Note) -> StoreResult<()> {
    tx.execute(
        r#"
        INSERT INTO notes (id, notebook_id, title, contents, created_at, photograph_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            contents = excluded.contents,
            created_at = excluded.created_at,
            photograph_id = excluded.photograph_id
        "#,
        params![
            note.id.to_string(),
            note.notebook.to_string(),
            note.title,
            note.contents,
            to_nanos("notes", &note.created_at)?,
            note.photograph.map(|p| p.to_string()),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn notebook(title: &str) -> Notebook {
        Notebook {
            id: NotebookId::new(),
            created_at: Utc::now(),
            title: title.to_string(),
            photograph: None,
        }
    }

    fn note(notebook: &Notebook, title: &str) -> Note {
        Note {
            id: NoteId::new(),
            notebook: notebook.id,
            created_at: Utc::now(),
            title: title.to_string(),
            contents: None,
            photograph: None,
        }
    }

    #[test]
    fn test_write_and_load() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let photo = Photograph {
            id: PhotographId::new(),
            image_data: vec![1, 2, 3].into(),
        };
        let mut nb = notebook("Travel");
        nb.photograph = Some(photo.id);
        let mut n = note(&nb, "Lisbon");
        n.contents = Some("Tram 28".to_string());

        let mut changes = ChangeSet::default();
        changes.record_photograph(photo.id, Pending::Inserted(photo.clone()));
        changes.record_notebook(nb.id, Pending::Inserted(nb.clone()));
        changes.record_note(n.id, Pending::Inserted(n.clone()));
        store.write(&changes).unwrap();

        let graph = store.load().unwrap();
        assert_eq!(graph.notebook(nb.id), Some(&nb));
        assert_eq!(graph.note(n.id), Some(&n));
        assert_eq!(graph.photograph(photo.id), Some(&photo));
    }

    #[test]
    fn test_timestamps_keep_nanoseconds() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut nb = notebook("Precise");
        nb.created_at = Utc.timestamp_nanos(1_700_000_000_123_456_789);

        let mut changes = ChangeSet::default();
        changes.record_notebook(nb.id, Pending::Inserted(nb.clone()));
        store.write(&changes).unwrap();

        assert_eq!(store.load().unwrap().notebook(nb.id).unwrap().created_at, nb.created_at);
    }

    #[test]
    fn test_update_and_delete() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut nb = notebook("Draft");
        let n = note(&nb, "Gone soon");

        let mut changes = ChangeSet::default();
        changes.record_notebook(nb.id, Pending::Inserted(nb.clone()));
        changes.record_note(n.id, Pending::Inserted(n.clone()));
        store.write(&changes).unwrap();

        nb.title = "Final".to_string();
        let mut changes = ChangeSet::default();
        changes.record_notebook(nb.id, Pending::Updated(nb.clone()));
        changes.record_note(n.id, Pending::Deleted);
        store.write(&changes).unwrap();

        let graph = store.load().unwrap();
        assert_eq!(graph.notebook(nb.id).unwrap().title, "Final");
        assert_eq!(graph.note_count(), 0);
        assert_eq!(store.note_count().unwrap(), 0);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let nb = notebook("Valid");
        let orphan = note(&notebook("Missing"), "Orphan");

        let mut changes = ChangeSet::default();
        changes.record_notebook(nb.id, Pending::Inserted(nb));
        changes.record_note(orphan.id, Pending::Inserted(orphan));

        assert!(store.write(&changes).is_err());
        assert_eq!(store.notebook_count().unwrap(), 0);
    }

    #[test]
    fn test_reopen_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("Notebooks.sqlite");
        let nb = notebook("Durable");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            let mut changes = ChangeSet::default();
            changes.record_notebook(nb.id, Pending::Inserted(nb.clone()));
            store.write(&changes).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap().notebook(nb.id), Some(&nb));
    }

    #[test]
    fn test_destroy_removes_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Notebooks.sqlite");
        let mut store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());

        store.destroy().unwrap();

        assert!(!path.exists());
        assert!(store.is_destroyed());
        assert!(store.load().unwrap().is_empty());

        let mut changes = ChangeSet::default();
        let nb = notebook("Too late");
        changes.record_notebook(nb.id, Pending::Inserted(nb));
        assert!(matches!(store.write(&changes), Err(StoreError::Destroyed)));
    }

    #[test]
    fn test_destroy_twice_is_harmless() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = SqliteStore::open(temp_dir.path().join("Notebooks.sqlite")).unwrap();
        store.destroy().unwrap();
        store.destroy().unwrap();
    }

    #[test]
    fn test_invalid_uuid_is_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO notebooks (id, title, created_at) VALUES ('bogus', 'x', 0)",
                [],
            )
            .unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { table: "notebooks", .. }));
    }
}
