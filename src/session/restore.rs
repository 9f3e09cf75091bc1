//! Rebuild a workspace from a saved [`WorkspaceState`]
//!
//! Tabs are reopened through the normal open path, so recovery of unsaved
//! checkpoints happens exactly as for a note opened by hand. Tabs whose note
//! no longer exists are skipped; the rest of the restore goes on.

use super::WorkspaceState;
use crate::document::DocumentId;
use crate::pane::PaneId;
use crate::workspace::Workspace;
use std::path::PathBuf;

/// Outcome of a restore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Notes reopened, in restore order
    pub restored: Vec<PathBuf>,
    /// Notes that were missing or failed to open
    pub skipped: Vec<PathBuf>,
}

/// Restore `state` into `workspace`, which should be freshly created.
pub async fn restore_workspace(workspace: &mut Workspace, state: &WorkspaceState) -> RestoreReport {
    let mut report = RestoreReport::default();

    let wanted = state.panes.len().max(1);
    while workspace.pane_count() < wanted {
        if workspace.split().is_none() {
            log::warn!(
                "Saved workspace has {} panes; restoring into {}",
                wanted,
                workspace.pane_count()
            );
            break;
        }
    }
    let pane_ids = workspace.pane_ids();

    // Saved pane index -> live pane, for the active-pane lookup below
    let mut restored_panes: Vec<PaneId> = Vec::with_capacity(state.panes.len());

    // Panes that had saved tabs but lost all of them to missing notes
    let mut emptied: Vec<PaneId> = Vec::new();

    for (index, entry) in state.panes.iter().enumerate() {
        let pane = pane_ids[index.min(pane_ids.len() - 1)];
        restored_panes.push(pane);

        let mut opened = 0usize;
        for tab in &entry.tabs {
            if !workspace.coordinator().note_exists(&tab.path).await {
                log::warn!("Skipping missing note {:?} during restore", tab.path);
                report.skipped.push(tab.path.clone());
                continue;
            }
            match workspace.open_document(&tab.path, Some(pane)).await {
                Ok(id) => {
                    if !tab.title.is_empty() {
                        let _ = workspace.rename_tab(id, tab.title.clone());
                    }
                    opened += 1;
                    report.restored.push(tab.path.clone());
                }
                Err(e) => {
                    log::warn!("Skipping note {:?} during restore: {}", tab.path, e);
                    report.skipped.push(tab.path.clone());
                }
            }
        }
        if opened == 0 && !entry.tabs.is_empty() {
            emptied.push(pane);
        }

        restore_selection(workspace, pane, entry.active_tab_id);
    }

    // Panes saved empty stay; only panes emptied by skipping are merged away
    for pane in emptied.iter().rev() {
        if workspace.pane_count() > 1 && workspace.pane(*pane).is_some_and(|p| p.is_empty()) {
            let _ = workspace.close_pane(*pane);
        }
    }

    let active = restored_panes
        .get(state.active_pane_index)
        .and_then(|id| workspace.panes().iter().position(|p| p.id == *id))
        .unwrap_or(0);
    workspace.switch_to_pane(active);

    crate::debug_info!(
        "SESSION",
        "Restored {} tabs into {} panes ({} skipped)",
        report.restored.len(),
        workspace.pane_count(),
        report.skipped.len()
    );
    report
}

/// Select the saved active tab, or the first tab when that id is stale
fn restore_selection(workspace: &mut Workspace, pane: PaneId, saved: Option<DocumentId>) {
    let Some(live) = workspace.pane(pane) else {
        return;
    };
    let target = saved
        .filter(|id| live.contains(*id))
        .or_else(|| live.tabs().first().map(|t| t.id));
    if let Some(tab) = target {
        let _ = workspace.select_tab(tab);
    }
}
