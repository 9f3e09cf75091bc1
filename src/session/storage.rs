//! File I/O for workspace persistence
//!
//! The state file defaults to `~/.config/par-note/workspace.yaml`
//! (see `Config::state_file_path`).

use super::{StateFile, WorkspaceState};
use crate::storage::Storage;
use anyhow::{Context, Result};
use std::path::Path;

/// Save workspace state to a specific file
pub fn save_state_to(storage: &dyn Storage, state: &WorkspaceState, path: &Path) -> Result<()> {
    let contents =
        serde_yaml_ng::to_string(state).context("Failed to serialize workspace state")?;

    storage
        .write(path, contents.as_bytes())
        .with_context(|| format!("Failed to write workspace state to {:?}", path))?;

    log::info!(
        "Saved workspace state ({} panes, {} tabs) to {:?}",
        state.panes.len(),
        state.tab_count(),
        path
    );
    Ok(())
}

/// Load workspace state from a specific file
///
/// Returns `None` if the file doesn't exist or is empty.
/// Returns an error if the file exists but is corrupt.
pub fn load_state_from(storage: &dyn Storage, path: &Path) -> Result<Option<WorkspaceState>> {
    let Some(bytes) = storage
        .read(path)
        .with_context(|| format!("Failed to read workspace state from {:?}", path))?
    else {
        return Ok(None);
    };

    let contents = String::from_utf8(bytes)
        .with_context(|| format!("Workspace state {:?} is not UTF-8", path))?;
    if contents.trim().is_empty() {
        return Ok(None);
    }

    let file: StateFile = serde_yaml_ng::from_str(&contents)
        .with_context(|| format!("Failed to parse workspace state from {:?}", path))?;
    let state = file.migrate();

    log::info!(
        "Loaded workspace state ({} panes, {} tabs) from {:?}",
        state.panes.len(),
        state.tab_count(),
        path
    );
    Ok(Some(state))
}

/// Remove the state file (a fresh start on next launch)
pub fn clear_state(storage: &dyn Storage, path: &Path) -> Result<()> {
    storage
        .remove(path)
        .with_context(|| format!("Failed to remove workspace state file {:?}", path))
}
