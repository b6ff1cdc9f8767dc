//! Note command handlers
//!
//! Notes live inside notebooks; every write runs in a background context
//! and is merged into the main context before saving.

use std::path::PathBuf;

use anyhow::{Context, Result};

use notebooks_core::{App, ObjectContext, ResultSetEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::commands::{resolve_note, resolve_notebook};
use crate::editor::edit_contents;
use crate::output::Output;

/// List the notes of a notebook
pub fn list(app: &App, notebook: String, search: Option<String>, output: &Output) -> Result<()> {
    let notebook_id = resolve_notebook(app, &notebook)?;
    let notebook = app.store().main_context().notebook(notebook_id)?;
    let notes = app.query_notes(notebook_id, search.as_deref())?;

    output.print_notes(&notebook, notes.items());
    Ok(())
}

/// Show a single note
pub fn show(app: &App, id: String, output: &Output) -> Result<()> {
    let note_id = resolve_note(app, &id)?;
    let note = app.store().main_context().note(note_id)?;

    output.print_note(&note);
    Ok(())
}

/// Add a note with a thumbnail of an image file
pub async fn add(app: &mut App, notebook: String, image: PathBuf, output: &Output) -> Result<()> {
    let notebook_id = resolve_notebook(app, &notebook)?;

    let mut notes = app.query_notes(notebook_id, None)?;
    let mut events = notes.subscribe();

    let note_id = app
        .add_note(&image, notebook_id)
        .await
        .context("Background task failed")?
        .with_context(|| format!("Failed to add note from {:?}", image))?;

    app.merge_pending_changes();
    notes.process_changes(app.store().main_context())?;
    if !app.save() {
        output.warn("The note could not be saved and will be lost on exit");
    }

    let batch = drain(&mut events);
    debug!("Notes result set updated, events={}", batch.len());

    output.success(&format!("Added note: {}", note_id));
    output.print_events(&batch);
    output.print_note(&app.store().main_context().note(note_id)?);
    Ok(())
}

/// Edit the title and contents of a note
///
/// Values not given on the command line keep their current content; the
/// contents open in $EDITOR when `--contents` is missing.
pub async fn edit(
    app: &mut App,
    id: String,
    title: Option<String>,
    contents: Option<String>,
    output: &Output,
) -> Result<()> {
    let note_id = resolve_note(app, &id)?;
    let current = app.store().main_context().note(note_id)?;

    let title = title.unwrap_or_else(|| current.title.clone());
    let contents = match contents {
        Some(contents) => contents,
        None => edit_contents(
            &format!("Editing: {}\nSave and quit when done.", current.title),
            current.contents.as_deref().unwrap_or(""),
        )?,
    };

    app.edit_note(note_id, title, contents)
        .await
        .context("Background task failed")?
        .context("Failed to edit note")?;

    app.merge_pending_changes();
    if !app.save() {
        output.warn("The edit could not be saved and will be lost on exit");
    }

    output.success(&format!("Updated note: {}", note_id));
    output.print_note(&app.store().main_context().note(note_id)?);
    Ok(())
}

fn drain(events: &mut UnboundedReceiver<ResultSetEvent>) -> Vec<ResultSetEvent> {
    let mut batch = Vec::new();
    while let Ok(event) = events.try_recv() {
        batch.push(event);
    }
    batch
}
