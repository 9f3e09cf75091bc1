//! Snapshot the live workspace into a [`WorkspaceState`]

use super::{CURRENT_VERSION, PaneEntry, TabEntry, WorkspaceState};
use crate::workspace::Workspace;

/// Copy the current topology. The result holds no references into the
/// workspace, so it can be written while the workspace keeps changing.
pub fn capture_workspace(workspace: &Workspace) -> WorkspaceState {
    let panes: Vec<PaneEntry> = workspace
        .panes()
        .iter()
        .map(|pane| PaneEntry {
            tabs: pane
                .tabs()
                .iter()
                .map(|tab| TabEntry {
                    tab_id: Some(tab.id),
                    path: tab.path().to_path_buf(),
                    title: tab.title.clone(),
                })
                .collect(),
            active_tab_id: pane.active_tab_id(),
        })
        .collect();

    WorkspaceState {
        version: CURRENT_VERSION,
        pane_count: panes.len(),
        active_pane_index: workspace.active_pane_index(),
        panes,
        last_saved: chrono::Utc::now().to_rfc3339(),
    }
}
