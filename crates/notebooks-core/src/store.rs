//! Store lifecycle and context hierarchy
//!
//! The `Store` owns the SQLite backing store through its main context and
//! hands out background contexts for work off the UI lane.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open(config).await?;
//!
//! // Write in the background
//! let handle = store.with_background_context(|ctx| {
//!     Notebook::create(ctx, Utc::now(), "Groceries")?;
//!     ctx.save()
//! });
//! handle.await??;
//!
//! // Fold the child save in and persist it
//! store.main_context_mut().process_pending_changes();
//! store.save()?;
//! ```

use std::path::Path;

use tokio::task::{self, JoinHandle};
use tracing::info;

use crate::config::Config;
use crate::context::{BackgroundContext, MainContext};
use crate::storage::{SqliteStore, StoreResult};

/// The persistence core: backing store plus its main context
pub struct Store {
    config: Config,
    main: MainContext,
}

impl Store {
    /// Open the store described by `config`, creating it if needed
    ///
    /// The database is opened and loaded on the blocking pool; the returned
    /// future resolves on the caller's task.
    pub async fn open(config: Config) -> StoreResult<Self> {
        task::spawn_blocking(move || Self::open_blocking(config)).await?
    }

    /// Synchronous variant of [`open`](Self::open)
    pub fn open_blocking(config: Config) -> StoreResult<Self> {
        let backing = SqliteStore::open(config.store_path())?;
        let main = MainContext::new(backing)?;
        info!("Store ready, name={}", config.store_name);
        Ok(Self { config, main })
    }

    /// A store backed by an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let main = MainContext::new(SqliteStore::open_in_memory()?)?;
        Ok(Self {
            config: Config::default(),
            main,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Location of the database file
    pub fn path(&self) -> Option<&Path> {
        self.main.backing().path()
    }

    pub fn main_context(&self) -> &MainContext {
        &self.main
    }

    pub fn main_context_mut(&mut self) -> &mut MainContext {
        &mut self.main
    }

    /// Run `work` in a fresh child context on the blocking pool
    ///
    /// The child sees the main context's current state, committed and
    /// pending. It is dropped when `work` returns; anything not saved by
    /// then is discarded. The handle may be awaited or dropped.
    pub fn with_background_context<F, T, E>(&self, work: F) -> JoinHandle<Result<T, E>>
    where
        F: FnOnce(&mut BackgroundContext) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let mut ctx = self.main.child();
        task::spawn_blocking(move || work(&mut ctx))
    }

    /// Save the main context to the backing store
    pub fn save(&mut self) -> StoreResult<()> {
        self.main.save()
    }

    /// Discard unsaved changes of the main context
    pub fn reset(&mut self) -> StoreResult<()> {
        self.main.reset()
    }

    /// Delete the backing store
    ///
    /// The main context keeps its in-memory state until it is reset; saving
    /// it fails from now on. Opening the same configuration again yields an
    /// empty store.
    pub fn destroy(&mut self) -> StoreResult<()> {
        self.main.backing_mut().destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ObjectContext;
    use crate::models::{Note, Notebook};
    use crate::storage::StoreError;
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config::with_data_dir(temp_dir.path())
    }

    #[tokio::test]
    async fn test_open_creates_store_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).await.unwrap();

        assert!(temp_dir.path().join("Notebooks.sqlite").exists());
        assert!(store.main_context().notebooks().is_empty());
    }

    #[tokio::test]
    async fn test_open_invalid_location_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = Store::open(Config::with_data_dir(blocker.join("data"))).await;
        let err = result.err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_save_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let nb_id = {
            let mut store = Store::open_blocking(test_config(&temp_dir)).unwrap();
            let nb = Notebook::create(store.main_context_mut(), Utc::now(), "Persisted").unwrap();
            store.save().unwrap();
            nb.id
        };

        let store = Store::open_blocking(test_config(&temp_dir)).unwrap();
        assert_eq!(store.main_context().notebook(nb_id).unwrap().title, "Persisted");
    }

    #[tokio::test]
    async fn test_background_save_reaches_main() {
        let mut store = Store::open_in_memory().unwrap();
        let nb = Notebook::create(store.main_context_mut(), Utc::now(), "Inbox").unwrap();
        let nb_id = nb.id;

        let note_id = store
            .with_background_context(move |ctx| {
                let notebook = ctx.notebook(nb_id)?;
                let note = Note::create(ctx, &notebook, "From the background", Utc::now())?;
                ctx.save()?;
                Ok::<_, StoreError>(note.id)
            })
            .await
            .unwrap()
            .unwrap();

        let main = store.main_context_mut();
        assert!(main.note(note_id).is_err());
        assert_eq!(main.process_pending_changes(), 1);
        assert_eq!(main.note(note_id).unwrap().notebook, nb_id);

        store.save().unwrap();
        assert!(!store.main_context().has_changes());
    }

    #[tokio::test]
    async fn test_background_save_racing_reset_is_dropped() {
        let mut store = Store::open_in_memory().unwrap();
        let nb = Notebook::create(store.main_context_mut(), Utc::now(), "Pending").unwrap();
        let nb_id = nb.id;

        let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();
        let handle = store.with_background_context(move |ctx| {
            go_rx.recv().ok();
            let notebook = ctx.notebook(nb_id)?;
            Note::create(ctx, &notebook, "Late", Utc::now())?;
            ctx.save()
        });

        store.reset().unwrap();
        go_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        let main = store.main_context_mut();
        assert_eq!(main.process_pending_changes(), 0);
        assert!(main.notes().is_empty());

        // Later saves are unaffected
        Notebook::create(main, Utc::now(), "Next").unwrap();
        store.save().unwrap();
        assert!(!store.main_context().has_changes());
    }

    #[tokio::test]
    async fn test_unsaved_background_work_is_discarded() {
        let mut store = Store::open_in_memory().unwrap();

        store
            .with_background_context(|ctx| {
                Notebook::create(ctx, Utc::now(), "Never saved").map(|_| ())
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.main_context_mut().process_pending_changes(), 0);
        assert!(store.main_context().notebooks().is_empty());
    }

    #[test]
    fn test_destroy_then_reopen_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = Store::open_blocking(test_config(&temp_dir)).unwrap();
        Notebook::create(store.main_context_mut(), Utc::now(), "Doomed").unwrap();
        store.save().unwrap();

        store.destroy().unwrap();
        assert!(!temp_dir.path().join("Notebooks.sqlite").exists());

        Notebook::create(store.main_context_mut(), Utc::now(), "After").unwrap();
        assert!(matches!(store.save(), Err(StoreError::Destroyed)));

        store.reset().unwrap();
        assert!(store.main_context().notebooks().is_empty());

        let reopened = Store::open_blocking(test_config(&temp_dir)).unwrap();
        assert!(reopened.main_context().notebooks().is_empty());
    }

    #[test]
    fn test_reset_discards_unsaved() {
        let mut store = Store::open_in_memory().unwrap();
        Notebook::create(store.main_context_mut(), Utc::now(), "Unsaved").unwrap();
        assert!(store.main_context().has_changes());

        store.reset().unwrap();
        assert!(!store.main_context().has_changes());
        assert!(store.main_context().notebooks().is_empty());
    }
}
