//! Application facade
//!
//! Ties the store to the use cases a front end needs: one-time sample
//! seeding, adding a note from an image, editing a note and tearing the
//! store down. Writes run in background contexts; the front end pumps
//! [`App::merge_pending_changes`] on its own lane to make them visible.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::ObjectContext;
use crate::models::{Note, NoteId, NotebookId, Photograph};
use crate::query::{self, NoteQuery, NotebookQuery, ResultSet};
use crate::preferences::Preferences;
use crate::samples;
use crate::storage::StoreError;
use crate::store::Store;
use crate::thumbnail::{self, ThumbnailError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Image(#[from] ThumbnailError),

    #[error("preferences: {0:#}")]
    Preferences(anyhow::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    /// Whether the application cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        match self {
            AppError::Store(e) => e.is_fatal(),
            AppError::Image(_) => false,
            AppError::Preferences(_) => false,
            AppError::Task(_) => true,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// The application's data controller
pub struct App {
    store: Store,
    preferences: Preferences,
    config: Config,
}

impl App {
    /// Wrap an open store with the given initialization state
    pub fn new(store: Store, preferences: Preferences) -> Self {
        let config = store.config().clone();
        Self {
            store,
            preferences,
            config,
        }
    }

    /// Open the store and preferences described by `config`
    ///
    /// Seeds the sample notebook when `preload_sample_data` is set.
    pub async fn open(config: Config) -> AppResult<Self> {
        let preferences =
            Preferences::load(config.preferences_path()).map_err(AppError::Preferences)?;
        let store = Store::open(config).await?;

        let mut app = Self::new(store, preferences);
        if app.config.preload_sample_data {
            app.preload_sample_data()?;
        }
        Ok(app)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Observe all notebooks, optionally filtered by title
    pub fn query_notebooks(&self, filter: Option<&str>) -> AppResult<ResultSet<NotebookQuery>> {
        Ok(query::query_notebooks(self.store.main_context(), filter)?)
    }

    /// Observe the notes of `notebook`, optionally filtered by title
    pub fn query_notes(
        &self,
        notebook: NotebookId,
        filter: Option<&str>,
    ) -> AppResult<ResultSet<NoteQuery>> {
        Ok(query::query_notes(self.store.main_context(), notebook, filter)?)
    }

    /// Seed the sample notebook once per installation
    ///
    /// Returns whether anything was inserted. The flag is persisted even if
    /// saving the store fails; that failure is only logged.
    pub fn preload_sample_data(&mut self) -> AppResult<bool> {
        if self.preferences.has_preload_data() {
            return Ok(false);
        }

        let image = thumbnail::placeholder(samples::PLACEHOLDER_IMAGE_SIZE)?;
        let main = self.store.main_context_mut();
        samples::insert_sample_notebook(main, Some(image))?;
        main.process_pending_changes();
        self.save();

        self.preferences.set_has_preload_data(true);
        self.preferences.save().map_err(AppError::Preferences)?;
        info!("Sample data preloaded");
        Ok(true)
    }

    /// Insert the three empty sample notebooks into the main context
    pub fn load_sample_notebooks(&mut self) -> AppResult<Vec<NotebookId>> {
        let main = self.store.main_context_mut();
        let notebooks = samples::insert_sample_notebooks(main)?;
        main.process_pending_changes();
        Ok(notebooks.into_iter().map(|nb| nb.id).collect())
    }

    /// Create the sample notebook in a background context
    pub fn load_notes_in_background(&self) -> JoinHandle<AppResult<NotebookId>> {
        self.store.with_background_context(|ctx| -> AppResult<NotebookId> {
            let image = thumbnail::placeholder(samples::PLACEHOLDER_IMAGE_SIZE)?;
            let notebook = samples::insert_sample_notebook(ctx, Some(image))?;
            ctx.save()?;
            Ok(notebook.id)
        })
    }

    /// Create a note in `notebook` with a thumbnail of the image at
    /// `image_path`
    ///
    /// Nothing is created if the image cannot be read or decoded.
    pub fn add_note(
        &self,
        image_path: impl Into<PathBuf>,
        notebook: NotebookId,
    ) -> JoinHandle<AppResult<NoteId>> {
        let image_path = image_path.into();
        let max_dimension = self.config.thumbnail_max_dimension;

        self.store.with_background_context(move |ctx| -> AppResult<NoteId> {
            let thumbnail = thumbnail::downsample(&image_path, max_dimension)?;

            let notebook = ctx.notebook(notebook)?;
            let photograph = Photograph::create(ctx, thumbnail)?;
            let note = Note::create(ctx, &notebook, samples::PLACEHOLDER_NOTE_TITLE, Utc::now())?;
            ctx.set_note_photograph(note.id, photograph.id)?;

            ctx.save()?;
            Ok(note.id)
        })
    }

    /// Overwrite the title and contents of a note in the background
    pub fn edit_note(
        &self,
        note: NoteId,
        title: impl Into<String>,
        contents: impl Into<String>,
    ) -> JoinHandle<AppResult<()>> {
        let title = title.into();
        let contents = contents.into();

        self.store.with_background_context(move |ctx| -> AppResult<()> {
            ctx.update_note(note, title, Some(contents))?;
            ctx.save()?;
            Ok(())
        })
    }

    /// Fold finished background saves into the main context
    ///
    /// Call on the lane that owns the app. Returns how many saves were merged.
    pub fn merge_pending_changes(&mut self) -> usize {
        self.store.main_context_mut().process_pending_changes()
    }

    /// Save the main context, logging instead of failing
    pub fn save(&mut self) -> bool {
        match self.store.save() {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save main context: {}", e);
                false
            }
        }
    }

    /// Save what is pending, then delete the store and empty the main context
    ///
    /// The preload flag is kept, so samples are not seeded again.
    pub fn teardown(&mut self) -> AppResult<()> {
        self.save();
        self.store.destroy()?;
        self.store.reset()?;
        info!("Store torn down");
        Ok(())
    }
}

/// Short date used in list rows, e.g. `03/14/24`
pub fn format_short_date(at: &DateTime<Utc>) -> String {
    at.format("%m/%d/%y").to_string()
}
