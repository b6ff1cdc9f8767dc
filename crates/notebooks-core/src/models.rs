//! Data models for Notebooks
//!
//! Defines the three record kinds (Notebook, Note and Photograph) and the
//! identity tokens used to re-locate a record from any context.
//!
//! Records are plain values. A record fetched from one context must never be
//! handed to another; pass its id instead and resolve it again on the other
//! side.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ObjectContext;
use crate::storage::StoreResult;

macro_rules! identity_token {
    ($(#[$meta:meta])* $name:ident, $variant:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID (for loading from storage)
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<$name> for ObjectId {
            fn from(id: $name) -> Self {
                ObjectId::$variant(id)
            }
        }
    };
}

identity_token!(
    /// Stable identity of a [`Notebook`]
    NotebookId,
    Notebook
);
identity_token!(
    /// Stable identity of a [`Note`]
    NoteId,
    Note
);
identity_token!(
    /// Stable identity of a [`Photograph`]
    PhotographId,
    Photograph
);

/// Identity of any record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ObjectId {
    Notebook(NotebookId),
    Note(NoteId),
    Photograph(PhotographId),
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Notebook(id) => write!(f, "notebook {}", id),
            ObjectId::Note(id) => write!(f, "note {}", id),
            ObjectId::Photograph(id) => write!(f, "photograph {}", id),
        }
    }
}

/// A notebook: a titled collection of notes
///
/// The notes themselves are not stored on the notebook; they point back at
/// it and are looked up through [`ObjectContext::notes_in`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notebook {
    /// Unique identifier
    pub id: NotebookId,
    /// When this notebook was created
    pub created_at: DateTime<Utc>,
    /// Display title
    pub title: String,
    /// Cover photograph owned by this notebook
    pub photograph: Option<PhotographId>,
}

impl Notebook {
    /// Insert a new notebook into `ctx`
    ///
    /// The notebook has no notes and no photograph until they are added.
    /// It becomes durable only once the context is saved.
    pub fn create<C>(ctx: &mut C, created_at: DateTime<Utc>, title: impl Into<String>) -> StoreResult<Self>
    where
        C: ObjectContext + ?Sized,
    {
        let notebook = Self {
            id: NotebookId::new(),
            created_at,
            title: title.into(),
            photograph: None,
        };
        ctx.insert_notebook(notebook.clone())?;
        Ok(notebook)
    }
}

/// A note inside a notebook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    /// Unique identifier
    pub id: NoteId,
    /// Owning notebook, fixed at creation
    pub notebook: NotebookId,
    /// When this note was created
    pub created_at: DateTime<Utc>,
    /// Note title
    pub title: String,
    /// Note body
    pub contents: Option<String>,
    /// Photograph owned by this note
    pub photograph: Option<PhotographId>,
}

impl Note {
    /// Insert a new note bound to `notebook` into `ctx`
    ///
    /// Fails if `notebook` is not known to the context.
    pub fn create<C>(
        ctx: &mut C,
        notebook: &Notebook,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Self>
    where
        C: ObjectContext + ?Sized,
    {
        let note = Self {
            id: NoteId::new(),
            notebook: notebook.id,
            created_at,
            title: title.into(),
            contents: None,
            photograph: None,
        };
        ctx.insert_note(note.clone())?;
        Ok(note)
    }
}

/// An image attached to a notebook or a note
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Photograph {
    /// Unique identifier
    pub id: PhotographId,
    /// Encoded image bytes (PNG for everything this crate produces)
    ///
    /// Shared between contexts; cloning a photograph never copies the image.
    pub image_data: Arc<[u8]>,
}

impl Photograph {
    /// Insert a new photograph into `ctx`
    ///
    /// The photograph is unowned until attached with
    /// [`ObjectContext::set_notebook_photograph`] or
    /// [`ObjectContext::set_note_photograph`].
    pub fn create<C>(ctx: &mut C, image_data: Vec<u8>) -> StoreResult<Self>
    where
        C: ObjectContext + ?Sized,
    {
        let photograph = Self {
            id: PhotographId::new(),
            image_data: image_data.into(),
        };
        ctx.insert_photograph(photograph.clone())?;
        Ok(photograph)
    }

    /// Size of the encoded image in bytes
    pub fn len(&self) -> usize {
        self.image_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_data.is_empty()
    }
}

impl fmt::Debug for Photograph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Photograph")
            .field("id", &self.id)
            .field("image_data", &format_args!("<{} bytes>", self.image_data.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = NotebookId::new();
        let b = NotebookId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_parse_round_trip() {
        let id = NoteId::new();
        let parsed: NoteId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<NoteId>().is_err());
    }

    #[test]
    fn test_object_id_display() {
        let id = NotebookId::new();
        let object: ObjectId = id.into();
        assert_eq!(object.to_string(), format!("notebook {}", id));
    }

    #[test]
    fn test_id_serializes_as_plain_uuid() {
        let id = PhotographId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn test_note_serialization() {
        let note = Note {
            id: NoteId::new(),
            notebook: NotebookId::new(),
            created_at: Utc::now(),
            title: "Groceries".to_string(),
            contents: Some("eggs, milk".to_string()),
            photograph: None,
        };
        let json = serde_json::to_string(&note).unwrap();
        let deserialized: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(note, deserialized);
    }

    #[test]
    fn test_photograph_debug_hides_bytes() {
        let photograph = Photograph {
            id: PhotographId::new(),
            image_data: vec![0u8; 2048].into(),
        };
        let debug = format!("{:?}", photograph);
        assert!(debug.contains("<2048 bytes>"));
        assert_eq!(photograph.len(), 2048);
    }
}
