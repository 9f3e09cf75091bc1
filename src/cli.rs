//! Command-line interface for par-note.
//!
//! Every invocation restores the saved workspace, applies one command, prints
//! the resulting layout and shuts down, which persists the topology and
//! flushes any unsaved note.

use crate::app::App;
use crate::config::LogLevel;
use crate::document::{DocumentId, normalize_path};
use crate::save::CheckpointRecord;
use crate::session::WorkspaceState;
use crate::tab::TabState;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// par-note - A tabbed note workspace with crash-safe autosave
#[derive(Debug, Parser)]
#[command(name = "par-note")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Use this config file instead of ~/.config/par-note/config.yaml
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL", global = true, value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Restore the saved workspace and print its layout (default)
    Status,
    /// Open notes in the active pane
    Open {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Close a note's tab, saving it first
    Close { path: PathBuf },
    /// Add a second pane
    Split,
    /// Merge the active pane into its neighbour
    Merge,
    /// Append a line of text to a note and save it
    Append { path: PathBuf, text: String },
    /// List unsaved content left behind by a previous run
    Recover {
        /// Write the recovered content to the notes
        #[arg(long)]
        apply: bool,
    },
}

fn parse_log_level(name: &str) -> Result<LogLevel, String> {
    LogLevel::from_name(name).ok_or_else(|| format!("unknown log level '{name}'"))
}

/// Parse process arguments
pub fn parse() -> Cli {
    Cli::parse()
}

/// Run one command against a started app
pub async fn execute(app: &App, command: &Commands) -> Result<()> {
    // Checkpoints are listed before restore reopens (and adopts) them
    let pending = match command {
        Commands::Recover { apply } => {
            let records = list_checkpoints(app).await;
            if records.is_empty() {
                return Ok(());
            }
            if !apply {
                println!("Run `par-note recover --apply` to write these notes");
                return Ok(());
            }
            records
        }
        _ => Vec::new(),
    };

    if let Some(report) = app.restore().await? {
        for path in &report.skipped {
            eprintln!("par-note: skipped missing note {}", path.display());
        }
    }

    let workspace = app.workspace();
    match command {
        Commands::Status => {}
        Commands::Recover { .. } => apply_checkpoints(app, pending).await?,
        Commands::Open { paths } => {
            for path in paths {
                workspace
                    .open(path.clone(), None)
                    .await
                    .with_context(|| format!("Failed to open {}", path.display()))?;
            }
        }
        Commands::Close { path } => {
            let tab = DocumentId::from_path(&normalize_path(path));
            let report = workspace
                .close_tab(tab)
                .await
                .with_context(|| format!("{} is not open", path.display()))?;
            if let Some(e) = report.save_error {
                eprintln!("par-note: closed with unsaved changes: {e}");
            }
        }
        Commands::Split => {
            if workspace.split().await?.is_none() {
                println!("Pane limit reached");
            }
        }
        Commands::Merge => {
            if !workspace.close_pane(None).await? {
                println!("Only one pane is open");
            }
        }
        Commands::Append { path, text } => {
            let tab = workspace.open(path.clone(), None).await?;
            let mut content = app.coordinator().get_content(tab).unwrap_or_default();
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(text);
            content.push('\n');
            workspace.apply_edit(tab, content).await?;
            workspace.save_now(tab).await?;
        }
    }

    let state = workspace.snapshot().await?;
    print_layout(app, &state);
    Ok(())
}

async fn list_checkpoints(app: &App) -> Vec<CheckpointRecord> {
    let records = app.coordinator().pending_checkpoints().await;
    if records.is_empty() {
        println!("Nothing to recover");
        return records;
    }
    for record in &records {
        println!(
            "{}  ({} bytes, checkpointed {})",
            record.path.display(),
            record.content.len(),
            record.saved_at
        );
    }
    records
}

/// Write each checkpoint's content to its note
async fn apply_checkpoints(app: &App, records: Vec<CheckpointRecord>) -> Result<()> {
    let workspace = app.workspace();
    let mut failed = 0usize;
    for record in records {
        let result = async {
            let tab = workspace.open(record.path.clone(), None).await?;
            workspace.apply_edit(tab, record.content).await?;
            workspace.save_now(tab).await
        }
        .await;
        match result {
            Ok(_) => println!("Recovered {}", record.path.display()),
            Err(e) => {
                failed += 1;
                eprintln!("par-note: failed to recover {}: {e}", record.path.display());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} note(s) could not be recovered");
    }
    Ok(())
}

fn print_layout(app: &App, state: &WorkspaceState) {
    for (index, pane) in state.panes.iter().enumerate() {
        let marker = if index == state.active_pane_index {
            " (active)"
        } else {
            ""
        };
        println!("Pane {}{}", index + 1, marker);
        if pane.tabs.is_empty() {
            println!("  (empty)");
        }
        for tab in &pane.tabs {
            let selected = if tab.tab_id.is_some() && tab.tab_id == pane.active_tab_id {
                '*'
            } else {
                ' '
            };
            let state = tab
                .tab_id
                .and_then(|id| app.coordinator().state(id))
                .unwrap_or(TabState::Clean);
            let indicator = match state {
                TabState::Clean => "",
                TabState::Dirty => " [unsaved]",
                TabState::Saving => " [saving]",
            };
            println!(
                "  {} {}  {}{}",
                selected,
                tab.title,
                tab.path.display(),
                indicator
            );
        }
    }
}
