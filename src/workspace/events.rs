//! Topology notifications for the shell UI

use crate::pane::PaneId;
use crate::tab::TabId;

pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    TabOpened { tab: TabId, pane: PaneId },
    TabClosed { tab: TabId, pane: PaneId },
    /// A tab changed panes; it was not closed and reopened
    TabMoved { tab: TabId, from: PaneId, to: PaneId },
    TabSelectionChanged { pane: PaneId, tab: Option<TabId> },
    ActivePaneChanged(PaneId),
    PaneAdded(PaneId),
    PaneRemoved(PaneId),
}
