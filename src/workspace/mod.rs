//! Workspace topology: one or more panes, each holding an ordered set of tabs.
//!
//! The workspace never owns note content. Opening, editing and closing go
//! through the [`SaveCoordinator`]; tabs only hold editor surfaces.
//!
//! All mutation takes `&mut self`, so one mutation runs at a time. Async
//! callers share a workspace through the single-writer [`actor`], which
//! applies [`WorkspaceCommand`]s strictly in order.
//!
//! There is always at least one pane.

pub mod actor;
pub mod events;

pub use actor::{WorkspaceCommand, WorkspaceHandle};
pub use events::WorkspaceEvent;

use crate::document::DocumentId;
use crate::editor::SurfaceFactory;
use crate::error::{SaveError, WorkspaceError};
use crate::pane::{Pane, PaneId};
use crate::save::{SaveCoordinator, SaveOutcome};
use crate::tab::{Tab, TabId, TabState};
use std::path::Path;
use tokio::sync::broadcast;

/// What happened when a tab was closed
#[derive(Debug, Clone)]
pub struct CloseReport {
    pub tab: TabId,
    /// The pane emptied by the close was merged away
    pub pane_removed: bool,
    /// The final save failed. The tab was closed anyway; its unsaved content
    /// stays in the checkpoint.
    pub save_error: Option<SaveError>,
}

pub struct Workspace {
    panes: Vec<Pane>,
    /// Index into `panes`
    active_pane: usize,
    next_pane_id: u64,
    max_panes: usize,
    coordinator: SaveCoordinator,
    surfaces: SurfaceFactory,
    events: broadcast::Sender<WorkspaceEvent>,
    /// Set by every mutation that changes what gets persisted
    topology_changed: bool,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("panes", &self.panes)
            .field("active_pane", &self.active_pane)
            .field("max_panes", &self.max_panes)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Create a workspace with one empty pane
    pub fn new(coordinator: SaveCoordinator, surfaces: SurfaceFactory, max_panes: usize) -> Self {
        let (events, _) = broadcast::channel(events::EVENT_CAPACITY);
        let mut workspace = Self {
            panes: Vec::new(),
            active_pane: 0,
            next_pane_id: 1,
            max_panes: max_panes.max(1),
            coordinator,
            surfaces,
            events,
            topology_changed: false,
        };
        let id = workspace.allocate_pane_id();
        workspace.panes.push(Pane::new(id));
        workspace
    }

    fn allocate_pane_id(&mut self) -> PaneId {
        let id = PaneId(self.next_pane_id);
        self.next_pane_id += 1;
        id
    }

    pub fn coordinator(&self) -> &SaveCoordinator {
        &self.coordinator
    }

    /// Subscribe to topology events. Closed when the workspace is dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: WorkspaceEvent) {
        let _ = self.events.send(event);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    pub fn pane(&self, id: PaneId) -> Option<&Pane> {
        self.panes.iter().find(|p| p.id == id)
    }

    pub fn pane_ids(&self) -> Vec<PaneId> {
        self.panes.iter().map(|p| p.id).collect()
    }

    pub fn active_pane(&self) -> &Pane {
        &self.panes[self.active_pane]
    }

    pub fn active_pane_id(&self) -> PaneId {
        self.panes[self.active_pane].id
    }

    pub fn active_pane_index(&self) -> usize {
        self.active_pane
    }

    /// Selected tab of the active pane
    pub fn active_tab_id(&self) -> Option<TabId> {
        self.active_pane().active_tab_id()
    }

    /// Pane currently holding `tab`
    pub fn find_tab(&self, tab: TabId) -> Option<PaneId> {
        self.panes.iter().find(|p| p.contains(tab)).map(|p| p.id)
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.panes.iter().find_map(|p| p.get_tab(id))
    }

    /// Derived save state of an open tab
    pub fn tab_state(&self, id: TabId) -> Option<TabState> {
        self.tab(id).map(|tab| tab.state(&self.coordinator))
    }

    /// Whether anything persisted changed since the last call
    pub fn take_topology_changed(&mut self) -> bool {
        std::mem::take(&mut self.topology_changed)
    }

    fn pane_index(&self, id: PaneId) -> Result<usize, WorkspaceError> {
        self.panes
            .iter()
            .position(|p| p.id == id)
            .ok_or(WorkspaceError::PaneNotFound(id))
    }

    fn locate(&self, tab: TabId) -> Result<usize, WorkspaceError> {
        self.panes
            .iter()
            .position(|p| p.contains(tab))
            .ok_or(WorkspaceError::TabNotFound(tab))
    }

    // ========================================================================
    // Selection
    // ========================================================================

    fn set_active_pane(&mut self, index: usize) {
        if index != self.active_pane {
            self.active_pane = index;
            self.topology_changed = true;
            self.emit(WorkspaceEvent::ActivePaneChanged(self.panes[index].id));
        }
    }

    fn selection_changed(&mut self, index: usize) {
        let pane = &self.panes[index];
        self.topology_changed = true;
        self.emit(WorkspaceEvent::TabSelectionChanged {
            pane: pane.id,
            tab: pane.active_tab_id(),
        });
    }

    /// Select a tab and make its pane active
    pub fn select_tab(&mut self, tab: TabId) -> Result<(), WorkspaceError> {
        let index = self.locate(tab)?;
        self.panes[index].select_tab(tab);
        self.selection_changed(index);
        self.set_active_pane(index);
        Ok(())
    }

    /// Select the next tab of the active pane (wraps; no-op when empty)
    pub fn next_tab(&mut self) {
        let index = self.active_pane;
        if !self.panes[index].is_empty() {
            self.panes[index].next_tab();
            self.selection_changed(index);
        }
    }

    /// Select the previous tab of the active pane (wraps; no-op when empty)
    pub fn prev_tab(&mut self) {
        let index = self.active_pane;
        if !self.panes[index].is_empty() {
            self.panes[index].prev_tab();
            self.selection_changed(index);
        }
    }

    /// Activate a pane by position (0-based)
    pub fn switch_to_pane(&mut self, index: usize) -> bool {
        if index < self.panes.len() {
            self.set_active_pane(index);
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Topology
    // ========================================================================

    /// Open a note in `pane` (default: the active pane) and select it.
    ///
    /// A note that is already open in any pane is selected there instead of
    /// being opened twice.
    pub async fn open_document(
        &mut self,
        path: &Path,
        pane: Option<PaneId>,
    ) -> Result<TabId, WorkspaceError> {
        self.check_pane(pane)?;
        let id = self.coordinator.open(path).await?;
        self.attach_document(id, pane)
    }

    /// Fail early when an open targets a pane that does not exist
    pub(crate) fn check_pane(&self, pane: Option<PaneId>) -> Result<(), WorkspaceError> {
        match pane {
            Some(id) => self.pane_index(id).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Give a document the coordinator already opened a tab, or select its
    /// existing one. A target pane that was closed in the meantime falls
    /// back to the active pane.
    pub(crate) fn attach_document(
        &mut self,
        id: TabId,
        pane: Option<PaneId>,
    ) -> Result<TabId, WorkspaceError> {
        if let Some(index) = self.panes.iter().position(|p| p.contains(id)) {
            crate::debug_log!("WORKSPACE", "{} already open; selecting it", id);
            self.panes[index].select_tab(id);
            self.selection_changed(index);
            self.set_active_pane(index);
            return Ok(id);
        }

        let target = pane
            .and_then(|p| self.pane_index(p).ok())
            .unwrap_or(self.active_pane);
        let path = self
            .coordinator
            .path_of(id)
            .ok_or(WorkspaceError::TabNotFound(id))?;
        let pane_id = self.panes[target].id;
        let mut tab = Tab::new(id, path, pane_id, (self.surfaces)(id));
        if let Err(e) = tab.populate(&self.coordinator) {
            tab.dispose();
            return Err(e.into());
        }

        crate::debug_info!("WORKSPACE", "Opened tab '{}' in pane {}", tab.title, pane_id);
        self.panes[target].add_tab(tab, true);
        self.emit(WorkspaceEvent::TabOpened { tab: id, pane: pane_id });
        self.selection_changed(target);
        self.set_active_pane(target);
        Ok(id)
    }

    /// Add a pane and make it active. `None` when the pane limit is reached.
    pub fn split(&mut self) -> Option<PaneId> {
        if self.panes.len() >= self.max_panes {
            crate::debug_log!("WORKSPACE", "Split ignored: {} panes open", self.panes.len());
            return None;
        }
        let id = self.allocate_pane_id();
        self.panes.push(Pane::new(id));
        self.topology_changed = true;
        self.emit(WorkspaceEvent::PaneAdded(id));
        self.set_active_pane(self.panes.len() - 1);
        crate::debug_info!("WORKSPACE", "Split: added pane {}", id);
        Some(id)
    }

    /// Close a pane, moving its tabs to the neighbouring pane.
    ///
    /// Returns `Ok(false)` when it is the only pane. The tabs keep their
    /// editor surfaces.
    pub fn close_pane(&mut self, pane: PaneId) -> Result<bool, WorkspaceError> {
        let index = self.pane_index(pane)?;
        if self.panes.len() <= 1 {
            return Ok(false);
        }
        self.merge_pane_away(index);
        Ok(true)
    }

    /// Remove the pane at `index`, appending its tabs to the previous pane
    /// (or the next one when it is the first). Requires two or more panes.
    pub(crate) fn merge_pane_away(&mut self, index: usize) {
        let previous_active = self.active_pane_id();
        let mut closing = self.panes.remove(index);
        let dest = index.saturating_sub(1);
        let dest_id = self.panes[dest].id;

        let moved = closing.drain_tabs();
        let had_tabs = !moved.is_empty();
        for tab in moved {
            let tab_id = tab.id;
            self.panes[dest].add_tab(tab, false);
            self.emit(WorkspaceEvent::TabMoved {
                tab: tab_id,
                from: closing.id,
                to: dest_id,
            });
        }
        self.topology_changed = true;
        self.emit(WorkspaceEvent::PaneRemoved(closing.id));
        if had_tabs {
            self.selection_changed(dest);
        }

        self.active_pane = if previous_active == closing.id {
            dest
        } else {
            self.panes
                .iter()
                .position(|p| p.id == previous_active)
                .unwrap_or(dest)
        };
        if self.active_pane_id() != previous_active {
            self.emit(WorkspaceEvent::ActivePaneChanged(self.active_pane_id()));
        }
        crate::debug_info!(
            "WORKSPACE",
            "Merged pane {} into pane {}",
            closing.id,
            dest_id
        );
    }

    /// Move a live tab to `index` in another pane, select it there and make
    /// that pane active.
    ///
    /// Returns `Ok(false)` when `source == dest`. The tab is never disposed:
    /// the same object, with its unsaved editor state, lands in `dest`.
    pub fn move_tab_between_panes(
        &mut self,
        tab: TabId,
        source: PaneId,
        dest: PaneId,
        index: usize,
    ) -> Result<bool, WorkspaceError> {
        if source == dest {
            return Ok(false);
        }
        let src = self.pane_index(source)?;
        let dst = self.pane_index(dest)?;
        let moving = self.panes[src]
            .remove_tab_without_dispose(tab)
            .ok_or(WorkspaceError::TabNotInPane { tab, pane: source })?;

        self.panes[dst].insert_tab(index, moving, true);
        self.emit(WorkspaceEvent::TabMoved {
            tab,
            from: source,
            to: dest,
        });
        self.selection_changed(src);
        self.selection_changed(dst);
        self.set_active_pane(dst);
        crate::debug_info!("WORKSPACE", "Moved {} from pane {} to pane {}", tab, source, dest);
        Ok(true)
    }

    /// Close a tab. The coordinator's final save writes any unsaved edits;
    /// when that fails the tab closes anyway and the failure is reported. A
    /// non-last pane emptied by the close is merged away.
    pub async fn close_tab(&mut self, tab: TabId) -> Result<CloseReport, WorkspaceError> {
        let pane_removed = self.detach_tab(tab)?;
        let save_error = self.coordinator.close(tab).await.err();
        Ok(CloseReport {
            tab,
            pane_removed,
            save_error,
        })
    }

    /// Topology half of a close: remove and dispose the tab, then merge
    /// away an emptied non-last pane. Returns whether a pane was removed.
    /// The document stays open in the coordinator until it is closed there.
    pub(crate) fn detach_tab(&mut self, tab: TabId) -> Result<bool, WorkspaceError> {
        let index = self.locate(tab)?;
        let pane_id = self.panes[index].id;

        self.panes[index].remove_tab(tab);
        self.topology_changed = true;
        self.emit(WorkspaceEvent::TabClosed { tab, pane: pane_id });

        let pane_removed = self.panes[index].is_empty() && self.panes.len() > 1;
        if pane_removed {
            self.merge_pane_away(index);
        } else {
            self.selection_changed(index);
        }
        Ok(pane_removed)
    }

    /// Replace a tab's display title
    pub fn rename_tab(
        &mut self,
        tab: TabId,
        title: impl Into<String>,
    ) -> Result<(), WorkspaceError> {
        let index = self.locate(tab)?;
        let entry = self.panes[index]
            .get_tab_mut(tab)
            .ok_or(WorkspaceError::TabNotFound(tab))?;
        entry.title = title.into();
        self.topology_changed = true;
        Ok(())
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Load `content` into the tab's editor surface and forward the change
    pub fn apply_edit(&mut self, tab: TabId, content: &str) -> Result<(), WorkspaceError> {
        let index = self.locate(tab)?;
        let entry = self.panes[index]
            .get_tab_mut(tab)
            .ok_or(WorkspaceError::TabNotFound(tab))?;
        entry.surface_mut().load_serialized_content(content);
        entry.content_changed(&self.coordinator)?;
        Ok(())
    }

    /// The tab's editor surface reported a change
    pub fn content_changed(&self, tab: TabId) -> Result<(), WorkspaceError> {
        let entry = self.tab(tab).ok_or(WorkspaceError::TabNotFound(tab))?;
        entry.content_changed(&self.coordinator)?;
        Ok(())
    }

    pub async fn save_now(&self, tab: TabId) -> Result<SaveOutcome, WorkspaceError> {
        self.locate(tab)?;
        Ok(self.coordinator.save_now(tab).await?)
    }

    pub async fn save_all(&self) -> Vec<(DocumentId, SaveError)> {
        self.coordinator.save_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::PlainTextSurface;
    use crate::storage::FsStorage;
    use par_note_config::SaveConfig;
    use std::sync::Arc;

    fn workspace(max_panes: usize) -> Workspace {
        let coordinator = SaveCoordinator::new(
            Arc::new(FsStorage::new()),
            SaveConfig::default(),
            std::env::temp_dir().join("par-note-unused-checkpoints"),
        );
        Workspace::new(coordinator, PlainTextSurface::factory(), max_panes)
    }

    #[test]
    fn starts_with_one_empty_pane() {
        let ws = workspace(2);
        assert_eq!(ws.pane_count(), 1);
        assert!(ws.active_pane().is_empty());
        assert_eq!(ws.active_tab_id(), None);
    }

    #[test]
    fn split_respects_pane_limit() {
        let mut ws = workspace(2);
        let second = ws.split().unwrap();
        assert_eq!(ws.active_pane_id(), second);
        assert_eq!(ws.split(), None);
        assert_eq!(ws.pane_count(), 2);
        assert!(ws.take_topology_changed());
        assert!(!ws.take_topology_changed());
    }

    #[test]
    fn close_only_pane_is_noop() {
        let mut ws = workspace(2);
        let only = ws.active_pane_id();
        assert!(!ws.close_pane(only).unwrap());
        assert_eq!(ws.pane_count(), 1);
    }

    #[test]
    fn close_unknown_pane_fails() {
        let mut ws = workspace(2);
        assert!(matches!(
            ws.close_pane(PaneId(99)),
            Err(WorkspaceError::PaneNotFound(PaneId(99)))
        ));
    }

    #[test]
    fn closing_first_pane_activates_remaining() {
        let mut ws = workspace(2);
        let first = ws.active_pane_id();
        let second = ws.split().unwrap();
        ws.switch_to_pane(0);
        assert!(ws.close_pane(first).unwrap());
        assert_eq!(ws.pane_ids(), vec![second]);
        assert_eq!(ws.active_pane_id(), second);
    }

    #[test]
    fn move_within_same_pane_is_noop() {
        let mut ws = workspace(2);
        let pane = ws.active_pane_id();
        let tab = DocumentId::from_path(Path::new("/notes/a.md"));
        assert!(!ws.move_tab_between_panes(tab, pane, pane, 0).unwrap());
    }

    #[test]
    fn cycling_empty_pane_emits_nothing() {
        let mut ws = workspace(2);
        let mut events = ws.subscribe();
        ws.next_tab();
        ws.prev_tab();
        assert!(events.try_recv().is_err());
    }
}
