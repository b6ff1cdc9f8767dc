//! Status command handler

use anyhow::Result;

use notebooks_core::{App, ObjectContext};

use crate::output::{Output, OutputFormat};

/// Show store location and record counts
pub fn show(app: &App, output: &Output) -> Result<()> {
    let main = app.store().main_context();
    let notebooks = main.notebooks();
    let notes = main.notes();
    let photographs = notebooks
        .iter()
        .filter(|nb| nb.photograph.is_some())
        .count()
        + notes.iter().filter(|n| n.photograph.is_some()).count();
    let path = app
        .store()
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(in memory)".to_string());

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "store": path,
                    "preloaded": app.preferences().has_preload_data(),
                    "unsaved_changes": main.has_changes(),
                    "counts": {
                        "notebooks": notebooks.len(),
                        "notes": notes.len(),
                        "photographs": photographs
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", path);
        }
        OutputFormat::Human => {
            println!("Notebooks Status");
            println!("================");
            println!();
            println!("Store:     {}", path);
            println!(
                "Preloaded: {}",
                if app.preferences().has_preload_data() {
                    "yes"
                } else {
                    "no"
                }
            );
            println!();
            println!("Counts:");
            println!("  Notebooks:   {}", notebooks.len());
            println!("  Notes:       {}", notes.len());
            println!("  Photographs: {}", photographs);
        }
    }

    Ok(())
}
