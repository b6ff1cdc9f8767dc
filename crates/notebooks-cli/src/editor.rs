//! Interactive editing support
//!
//! Opens $EDITOR for note contents and asks for confirmations.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::process::Command;

/// Lines starting with this marker are dropped from edited text
const COMMENT_PREFIX: &str = "#:";

/// Edit `current` in the user's editor
///
/// `header` is shown as comment lines above the text and removed again
/// afterwards.
pub fn edit_contents(header: &str, current: &str) -> Result<String> {
    let editor = find_editor()?;

    let mut initial = String::new();
    for line in header.lines() {
        initial.push_str(COMMENT_PREFIX);
        initial.push(' ');
        initial.push_str(line);
        initial.push('\n');
    }
    initial.push_str(current);

    let temp_path = env::temp_dir().join(format!("notebooks_note_{}.txt", std::process::id()));
    fs::write(&temp_path, initial)
        .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;

    let status = Command::new(&editor)
        .arg(&temp_path)
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor));

    let edited = match status {
        Ok(status) if status.success() => fs::read_to_string(&temp_path)
            .with_context(|| format!("Failed to read edited file: {:?}", temp_path)),
        Ok(_) => Err(anyhow::anyhow!(
            "Editor '{}' exited with non-zero status. Check that your editor is configured correctly.",
            editor
        )),
        Err(e) => Err(e),
    };
    let _ = fs::remove_file(&temp_path);

    Ok(strip_comments(&edited?))
}

fn strip_comments(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| !line.starts_with(COMMENT_PREFIX))
        .collect();
    kept.join("\n").trim_end().to_string()
}

/// Find the user's preferred editor
fn find_editor() -> Result<String> {
    for var in ["EDITOR", "VISUAL"] {
        if let Ok(editor) = env::var(var) {
            if !editor.is_empty() {
                return Ok(editor);
            }
        }
    }

    for editor in ["nano", "vim", "vi"] {
        if command_exists(editor) {
            return Ok(editor.to_string());
        }
    }

    bail!(
        "No editor found. Set $EDITOR or pass --contents.\n\
         Example: export EDITOR=nano"
    )
}

/// Check if a command exists in PATH
fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
