//! Notebook command handlers

use anyhow::{Context, Result};

use notebooks_core::{App, ObjectContext};

use crate::output::{NotebookRow, Output};

/// List notebooks, optionally filtered by title
pub fn list(app: &App, search: Option<String>, output: &Output) -> Result<()> {
    let notebooks = app.query_notebooks(search.as_deref())?;
    let main = app.store().main_context();

    let rows: Vec<NotebookRow<'_>> = notebooks
        .items()
        .iter()
        .map(|notebook| NotebookRow {
            notebook,
            note_count: main.notes_in(notebook.id).len(),
        })
        .collect();

    output.print_notebooks(&rows);
    Ok(())
}

/// Insert the three empty sample notebooks
pub fn samples(app: &mut App, output: &Output) -> Result<()> {
    let ids = app.load_sample_notebooks()?;
    if !app.save() {
        output.warn("Sample notebooks could not be saved");
    }

    output.success(&format!("Added {} sample notebook(s)", ids.len()));
    Ok(())
}

/// Create the sample notebook with notes in the background
pub async fn load(app: &mut App, output: &Output) -> Result<()> {
    let notebook = app
        .load_notes_in_background()
        .await
        .context("Background task failed")?
        .context("Failed to load sample notes")?;

    app.merge_pending_changes();
    if !app.save() {
        output.warn("Sample notes could not be saved");
    }

    output.success(&format!("Loaded sample notebook: {}", notebook));
    Ok(())
}

/// Seed sample data unless it was seeded before
pub fn preload(app: &mut App, output: &Output) -> Result<()> {
    if app.preload_sample_data()? {
        output.success("Sample data preloaded");
    } else {
        output.message("Sample data was already preloaded.");
    }
    Ok(())
}
