//! Sample data seeded on first launch and by the "load" commands

use chrono::{Duration, Utc};

use crate::context::ObjectContext;
use crate::models::{Note, Notebook, Photograph};
use crate::storage::StoreResult;

/// Title of the seeded notebook
pub const SAMPLE_NOTEBOOK_TITLE: &str = "Notebook with notes";

/// Titles of the notes inside the seeded notebook, oldest first
pub const SAMPLE_NOTE_TITLES: [&str; 3] = ["Note 1", "Note 2", "Note 3"];

/// Titles of the empty notebooks inserted by `load_sample_notebooks`
pub const SAMPLE_NOTEBOOK_TITLES: [&str; 3] = ["notebook1", "notebook2", "notebook3"];

/// Title given to notes created from an image
pub const PLACEHOLDER_NOTE_TITLE: &str = "Note title";

/// Side of the generated sample photograph, in pixels
pub const PLACEHOLDER_IMAGE_SIZE: u32 = 64;

/// Insert the sample notebook with its notes and, if given, a cover photograph
///
/// Nothing is saved; the caller decides which context saves and how
/// failures are treated.
pub fn insert_sample_notebook<C>(ctx: &mut C, image_data: Option<Vec<u8>>) -> StoreResult<Notebook>
where
    C: ObjectContext + ?Sized,
{
    let now = Utc::now();
    let notebook = Notebook::create(ctx, now, SAMPLE_NOTEBOOK_TITLE)?;

    // Spaced out so creation order survives the sort
    for (i, title) in SAMPLE_NOTE_TITLES.iter().enumerate() {
        Note::create(ctx, &notebook, *title, now + Duration::milliseconds(i as i64))?;
    }

    if let Some(image_data) = image_data {
        let photograph = Photograph::create(ctx, image_data)?;
        ctx.set_notebook_photograph(notebook.id, photograph.id)?;
    }

    ctx.notebook(notebook.id)
}

/// Insert the three empty sample notebooks
pub fn insert_sample_notebooks<C>(ctx: &mut C) -> StoreResult<Vec<Notebook>>
where
    C: ObjectContext + ?Sized,
{
    let now = Utc::now();
    SAMPLE_NOTEBOOK_TITLES
        .iter()
        .map(|title| Notebook::create(ctx, now, *title))
        .collect()
}
