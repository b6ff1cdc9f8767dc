//! Rendering of notebooks, notes and result-set events
//!
//! Every command prints through [`Output`] so that `--json` and `--quiet`
//! behave the same everywhere.

use notebooks_core::{format_short_date, Note, Notebook, ResultSetEvent};
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// A notebook row with the number of notes it holds
#[derive(Debug, Serialize)]
pub struct NotebookRow<'a> {
    #[serde(flatten)]
    pub notebook: &'a Notebook,
    pub note_count: usize,
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a list of notebooks
    pub fn print_notebooks(&self, rows: &[NotebookRow<'_>]) {
        match self.format {
            OutputFormat::Human => {
                if rows.is_empty() {
                    println!("No notebooks found.");
                    return;
                }
                for row in rows {
                    let photo = if row.notebook.photograph.is_some() {
                        " [photo]"
                    } else {
                        ""
                    };
                    println!(
                        "{} | {} | {}{} | {} note(s)",
                        short_id(&row.notebook.id.to_string()),
                        format_short_date(&row.notebook.created_at),
                        truncate(&row.notebook.title, 40),
                        photo,
                        row.note_count
                    );
                }
                println!("\n{} notebook(s)", rows.len());
            }
            OutputFormat::Json => print_json(&rows),
            OutputFormat::Quiet => {
                for row in rows {
                    println!("{}", row.notebook.id);
                }
            }
        }
    }

    /// Print the notes of a notebook
    pub fn print_notes(&self, notebook: &Notebook, notes: &[Note]) {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "Notes in: {} - {}",
                    short_id(&notebook.id.to_string()),
                    notebook.title
                );
                println!();

                if notes.is_empty() {
                    println!("No notes in this notebook.");
                    return;
                }

                for note in notes {
                    let preview = note
                        .contents
                        .as_deref()
                        .map(|c| format!(" - {}", truncate_line(c, 40)))
                        .unwrap_or_default();
                    let photo = if note.photograph.is_some() { " [photo]" } else { "" };
                    println!(
                        "{} | {} | {}{}{}",
                        short_id(&note.id.to_string()),
                        format_short_date(&note.created_at),
                        truncate(&note.title, 35),
                        photo,
                        preview
                    );
                }
                println!("\n{} note(s)", notes.len());
            }
            OutputFormat::Json => print_json(&notes),
            OutputFormat::Quiet => {
                for note in notes {
                    println!("{}", note.id);
                }
            }
        }
    }

    /// Print a single note
    pub fn print_note(&self, note: &Note) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", note.id);
                println!("Notebook: {}", note.notebook);
                println!("Title:    {}", note.title);
                println!("Created:  {}", note.created_at.format("%Y-%m-%d %H:%M"));
                if let Some(photograph) = note.photograph {
                    println!("Photo:    {}", photograph);
                }
                if let Some(ref contents) = note.contents {
                    println!();
                    println!("{}", contents);
                }
            }
            OutputFormat::Json => print_json(note),
            OutputFormat::Quiet => {
                println!("{}", note.id);
            }
        }
    }

    /// Print result set events (human mode only)
    pub fn print_events(&self, events: &[ResultSetEvent]) {
        if self.format != OutputFormat::Human || events.is_empty() {
            return;
        }
        for event in events {
            println!("  {}", describe_event(event));
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (suppressed in quiet mode)
    pub fn warn(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn describe_event(event: &ResultSetEvent) -> String {
    match event {
        ResultSetEvent::BeginUpdate => "begin update".to_string(),
        ResultSetEvent::SectionInserted { section } => format!("section {} inserted", section),
        ResultSetEvent::SectionDeleted { section } => format!("section {} deleted", section),
        ResultSetEvent::RowInserted { at } => format!("row {} inserted", at.row),
        ResultSetEvent::RowDeleted { at } => format!("row {} deleted", at.row),
        ResultSetEvent::RowUpdated { at } => format!("row {} updated", at.row),
        ResultSetEvent::RowMoved { from, to } => format!("row {} moved to {}", from.row, to.row),
        ResultSetEvent::EndUpdate => "end update".to_string(),
    }
}

/// First eight characters of an id
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
