//! Command handlers

pub mod config;
pub mod note;
pub mod notebook;
pub mod status;

use anyhow::{bail, Result};

use notebooks_core::{App, NoteId, NotebookId, ObjectContext};

/// Resolve a notebook from a full UUID or a unique id prefix
pub fn resolve_notebook(app: &App, id: &str) -> Result<NotebookId> {
    if let Ok(id) = id.parse::<NotebookId>() {
        return Ok(id);
    }

    let notebooks = app.store().main_context().notebooks();
    let matches: Vec<_> = notebooks
        .iter()
        .filter(|nb| nb.id.to_string().starts_with(id))
        .collect();

    match matches.len() {
        0 => bail!("No notebook found matching: {}", id),
        1 => Ok(matches[0].id),
        _ => {
            eprintln!("Multiple notebooks match '{}':", id);
            for nb in &matches {
                eprintln!("  {} - {}", nb.id, nb.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Resolve a note from a full UUID or a unique id prefix
pub fn resolve_note(app: &App, id: &str) -> Result<NoteId> {
    if let Ok(id) = id.parse::<NoteId>() {
        return Ok(id);
    }

    let notes = app.store().main_context().notes();
    let matches: Vec<_> = notes
        .iter()
        .filter(|note| note.id.to_string().starts_with(id))
        .collect();

    match matches.len() {
        0 => bail!("No note found matching: {}", id),
        1 => Ok(matches[0].id),
        _ => {
            eprintln!("Multiple notes match '{}':", id);
            for note in &matches {
                eprintln!("  {} - {}", note.id, note.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}
