//! Notebooks Core Library
//!
//! This crate provides the persistence and query core for Notebooks, a
//! note-taking application where notebooks hold notes and either may carry
//! a photograph.
//!
//! # Architecture
//!
//! - **SQLite**: durable backing store of committed records
//! - **Contexts**: a main context for the UI lane and short-lived background
//!   contexts for writes; changes stay pending until a context is saved
//! - **Result sets**: live queries that turn context changes into row-level
//!   update events
//!
//! # Quick Start
//!
//! ```text
//! let mut app = App::open(Config::load()?).await?;
//!
//! // Observe notebooks
//! let mut notebooks = app.query_notebooks(None)?;
//! let mut events = notebooks.subscribe();
//!
//! // Add a note in the background, then fold it into the main context
//! app.add_note("photo.jpg", notebooks.items()[0].id).await??;
//! app.merge_pending_changes();
//! notebooks.process_changes(app.store().main_context())?;
//! ```
//!
//! # Modules
//!
//! - `app`: Use-case facade (main entry point)
//! - `store`: Store lifecycle and background contexts
//! - `context`: Main and background contexts
//! - `models`: Notebook, note and photograph records
//! - `query`: Observable result sets
//! - `storage`: SQLite backing store
//! - `config`: Application configuration

pub mod app;
pub mod config;
pub mod context;
pub mod graph;
pub mod models;
pub mod preferences;
pub mod query;
pub mod samples;
pub mod storage;
pub mod store;
pub mod thumbnail;

pub use app::{format_short_date, App, AppError, AppResult};
pub use config::Config;
pub use context::{BackgroundContext, ContextNotification, MainContext, ObjectContext};
pub use models::{Note, NoteId, Notebook, NotebookId, ObjectId, Photograph, PhotographId};
pub use preferences::Preferences;
pub use query::{
    FetchRequest, IndexPath, NoteQuery, NotebookQuery, ResultSet, ResultSetEvent,
};
pub use storage::{SqliteStore, StoreError, StoreResult};
pub use store::Store;
pub use thumbnail::ThumbnailError;
