//! Storage layer
//!
//! The backing store of the main context: a single SQLite database holding
//! every committed notebook, note and photograph.

pub mod error;
pub mod schema;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::SqliteStore;
