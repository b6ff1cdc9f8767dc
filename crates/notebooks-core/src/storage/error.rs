//! Storage error handling
//!
//! Provides typed errors for store and context operations, with a
//! classification into unrecoverable failures and caller mistakes.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{ObjectId, PhotographId};

/// Errors that can occur during store and context operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing store could not be opened or initialized
    #[error("Failed to open store at '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to delete a store file
    #[error("Failed to delete store file '{path}': {source}")]
    Destroy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing store was destroyed; reopen it to continue
    #[error("Store has been destroyed")]
    Destroyed,

    /// No record with this identity is visible from the context
    #[error("{0} not found")]
    ObjectNotFound(ObjectId),

    /// A photograph can only belong to a single notebook or note
    #[error("Photograph {photograph} is already owned by {owner}")]
    PhotographAlreadyOwned {
        photograph: PhotographId,
        owner: ObjectId,
    },

    /// The parent context was dropped before a child could save into it
    #[error("Parent context is no longer available")]
    ContextClosed,

    /// A stored row could not be turned back into a record
    #[error("Invalid record in '{table}': {details}")]
    InvalidRecord { table: &'static str, details: String },

    /// A background lane panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Check if this error leaves the store in a state the caller cannot fix
    ///
    /// Missing objects and ownership conflicts are mistakes of the calling
    /// code; everything else means the store itself is unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            StoreError::ObjectNotFound(_) | StoreError::PhotographAlreadyOwned { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StoreError::Open { .. } => {
                Some("The store file may be corrupted or locked by another process. Run `notebooks reset` to start fresh.")
            }
            StoreError::Destroyed => Some("Reopen the store before saving again."),
            StoreError::ObjectNotFound(_) => {
                Some("The record may have been removed; refresh your query and try again.")
            }
            _ => None,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteId;

    #[test]
    fn test_not_found_is_not_fatal() {
        let err = StoreError::ObjectNotFound(NoteId::new().into());
        assert!(!err.is_fatal());
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_destroyed_is_fatal() {
        let err = StoreError::Destroyed;
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "Store has been destroyed");
    }

    #[test]
    fn test_open_error_display() {
        let err = StoreError::Open {
            path: PathBuf::from("/data/Notebooks.sqlite"),
            source: rusqlite::Error::InvalidQuery,
        };

        let msg = err.to_string();
        assert!(msg.contains("Failed to open store"));
        assert!(msg.contains("/data/Notebooks.sqlite"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_ownership_error_display() {
        let photograph = PhotographId::new();
        let owner: ObjectId = NoteId::new().into();
        let err = StoreError::PhotographAlreadyOwned { photograph, owner };

        let msg = err.to_string();
        assert!(msg.contains(&photograph.to_string()));
        assert!(msg.contains("note"));
    }
}
