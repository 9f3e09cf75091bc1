//! Workspace state types for save/restore across restarts
//!
//! The workspace topology (panes, their tabs, selections) is written to
//! `~/.config/par-note/workspace.yaml` whenever it changes and restored on the
//! next launch. Note content is never part of this file.

pub mod capture;
pub mod persister;
pub mod restore;
pub mod storage;

use crate::document::DocumentId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Schema version written by this build
pub const CURRENT_VERSION: u32 = 2;

/// Persisted workspace topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    /// Schema version; files from other versions are migrated on load
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub pane_count: usize,
    #[serde(default)]
    pub active_pane_index: usize,
    #[serde(default)]
    pub panes: Vec<PaneEntry>,
    /// When the state was written (RFC 3339)
    #[serde(default)]
    pub last_saved: String,
}

/// One pane in the saved workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaneEntry {
    #[serde(default)]
    pub tabs: Vec<TabEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_tab_id: Option<DocumentId>,
}

/// One tab in the saved workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<DocumentId>,
    pub path: PathBuf,
    #[serde(default)]
    pub title: String,
}

fn default_version() -> u32 {
    1
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            pane_count: 1,
            active_pane_index: 0,
            panes: vec![PaneEntry::default()],
            last_saved: String::new(),
        }
    }
}

impl WorkspaceState {
    pub fn tab_count(&self) -> usize {
        self.panes.iter().map(|p| p.tabs.len()).sum()
    }
}

/// On-disk layout accepted by the loader: the current fields plus the
/// version 1 single-pane fields
#[derive(Debug, Deserialize)]
pub(crate) struct StateFile {
    #[serde(flatten)]
    state: WorkspaceState,
    /// Version 1: the tabs of the only pane
    #[serde(default)]
    tabs: Vec<TabEntry>,
    /// Version 1: position of the selected tab
    #[serde(default)]
    active_tab_index: Option<usize>,
}

impl StateFile {
    /// Bring the file up to [`CURRENT_VERSION`]
    pub(crate) fn migrate(self) -> WorkspaceState {
        let StateFile {
            mut state,
            tabs,
            active_tab_index,
        } = self;

        if state.version < 2 && state.panes.is_empty() {
            log::info!("Migrating workspace state from version {}", state.version);
            let active_tab_id = active_tab_index
                .and_then(|i| tabs.get(i))
                .or_else(|| tabs.first())
                .map(|t| t.tab_id.unwrap_or_else(|| DocumentId::from_path(&t.path)));
            state.panes = vec![PaneEntry {
                tabs,
                active_tab_id,
            }];
            state.active_pane_index = 0;
        } else if state.version > CURRENT_VERSION {
            log::warn!(
                "Workspace state version {} is newer than {}; reading known fields only",
                state.version,
                CURRENT_VERSION
            );
        }

        if state.panes.is_empty() {
            state.panes.push(PaneEntry::default());
        }
        state.pane_count = state.panes.len();
        if state.active_pane_index >= state.panes.len() {
            state.active_pane_index = 0;
        }
        state.version = CURRENT_VERSION;
        state
    }
}
