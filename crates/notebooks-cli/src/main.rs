//! Notebooks CLI
//!
//! Command-line interface for Notebooks - notebooks, notes and photographs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use notebooks_core::{App, AppError, Config};

mod commands;
mod editor;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "notebooks")]
#[command(about = "Notebooks - notes with photographs, kept in local notebooks")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage notebooks
    Notebook {
        #[command(subcommand)]
        command: NotebookCommands,
    },
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Seed the sample notebook (once per installation)
    Preload,
    /// Delete the store and start over
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show store location and counts
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum NotebookCommands {
    /// List notebooks
    #[command(alias = "ls")]
    List {
        /// Only notebooks whose title contains this text, ignoring case and accents
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Add the empty sample notebooks
    Samples,
    /// Create the sample notebook with notes in the background
    Load,
}

#[derive(Subcommand)]
enum NoteCommands {
    /// List notes in a notebook
    #[command(alias = "ls")]
    List {
        /// Notebook ID (full UUID or prefix)
        notebook: String,
        /// Only notes whose title contains this text (case-sensitive)
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show a note
    Show {
        /// Note ID (full UUID or prefix)
        id: String,
    },
    /// Add a note with a thumbnail of an image
    #[command(alias = "create")]
    Add {
        /// Notebook ID (full UUID or prefix)
        notebook: String,
        /// Image file for the note's photograph
        image: PathBuf,
    },
    /// Edit a note's title and contents
    Edit {
        /// Note ID (full UUID or prefix)
        id: String,
        /// New title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// New contents (opens editor if not provided)
        #[arg(short, long)]
        contents: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, store_name, thumbnail_max_dimension, preload_sample_data)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_deref();

    // Commands that don't need the store
    if let Commands::Config { command } = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key.clone(), value.clone(), config_path, &output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let mut app = match App::open(config).await {
        Ok(app) => app,
        Err(e) => {
            if let AppError::Store(store_error) = &e {
                if let Some(hint) = store_error.recovery_suggestion() {
                    output.warn(hint);
                }
            }
            return Err(e).context("Failed to open store");
        }
    };

    match cli.command {
        Commands::Notebook { command } => handle_notebook_command(command, &mut app, &output).await,
        Commands::Note { command } => handle_note_command(command, &mut app, &output).await,
        Commands::Preload => commands::notebook::preload(&mut app, &output),
        Commands::Reset { yes } => reset(&mut app, yes, &output),
        Commands::Status => commands::status::show(&app, &output),
        Commands::Config { .. } => Ok(()), // Handled above
    }
}

async fn handle_notebook_command(
    command: NotebookCommands,
    app: &mut App,
    output: &Output,
) -> Result<()> {
    match command {
        NotebookCommands::List { search } => commands::notebook::list(app, search, output),
        NotebookCommands::Samples => commands::notebook::samples(app, output),
        NotebookCommands::Load => commands::notebook::load(app, output).await,
    }
}

async fn handle_note_command(command: NoteCommands, app: &mut App, output: &Output) -> Result<()> {
    match command {
        NoteCommands::List { notebook, search } => {
            commands::note::list(app, notebook, search, output)
        }
        NoteCommands::Show { id } => commands::note::show(app, id, output),
        NoteCommands::Add { notebook, image } => {
            commands::note::add(app, notebook, image, output).await
        }
        NoteCommands::Edit {
            id,
            title,
            contents,
        } => commands::note::edit(app, id, title, contents, output).await,
    }
}

fn reset(app: &mut App, yes: bool, output: &Output) -> Result<()> {
    if !yes {
        if !output.should_prompt() {
            anyhow::bail!("Refusing to reset without --yes in non-interactive output mode.");
        }
        if !editor::confirm("Delete every notebook, note and photograph?")? {
            output.message("Cancelled.");
            return Ok(());
        }
    }

    app.teardown().context("Failed to reset store")?;
    output.success("Store deleted");
    Ok(())
}

/// Log to stderr; RUST_LOG wins over --verbose
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "notebooks_core={},notebooks_cli={}",
            level, level
        ))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
