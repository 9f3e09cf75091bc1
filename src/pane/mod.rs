//! Panes: ordered tab bars with one selected tab
//!
//! Tab order is the tab bar order. Removing a tab comes in two flavours:
//! [`Pane::remove_tab`] destroys the tab (its editor surface is disposed),
//! [`Pane::remove_tab_without_dispose`] hands the live tab back to the caller
//! so it can be inserted into another pane unchanged.

use crate::tab::{Tab, TabId};
use std::cmp::Ordering;
use std::fmt;

/// Unique identifier for a pane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneId(pub u64);

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One tab bar
#[derive(Debug)]
pub struct Pane {
    pub id: PaneId,
    /// All tabs in this pane, in order
    tabs: Vec<Tab>,
    /// Currently selected tab ID
    active_tab_id: Option<TabId>,
}

impl Pane {
    /// Create a new empty pane
    pub fn new(id: PaneId) -> Self {
        Self {
            id,
            tabs: Vec::new(),
            active_tab_id: None,
        }
    }

    /// Append a tab
    pub fn add_tab(&mut self, tab: Tab, select: bool) {
        let end = self.tabs.len();
        self.insert_tab(end, tab, select);
    }

    /// Insert a tab at `index` (clamped to `0..=len`).
    ///
    /// The first tab of a pane with no selection is selected even when
    /// `select` is false.
    pub fn insert_tab(&mut self, index: usize, mut tab: Tab, select: bool) {
        let clamped = index.min(self.tabs.len());
        let id = tab.id;
        tab.set_pane(self.id);
        self.tabs.insert(clamped, tab);
        if select || self.active_tab_id.is_none() {
            self.active_tab_id = Some(id);
        }
        log::debug!(
            "Inserted tab {} at index {} of pane {} (total: {})",
            id,
            clamped,
            self.id,
            self.tabs.len()
        );
    }

    /// Remove and destroy a tab. Returns false if the tab is not here.
    pub fn remove_tab(&mut self, id: TabId) -> bool {
        match self.remove_tab_without_dispose(id) {
            Some(mut tab) => {
                tab.dispose();
                true
            }
            None => false,
        }
    }

    /// Remove a tab and hand it back alive, for moving it to another pane.
    ///
    /// Selection moves exactly as in [`remove_tab`](Self::remove_tab).
    pub fn remove_tab_without_dispose(&mut self, id: TabId) -> Option<Tab> {
        let idx = self.tabs.iter().position(|t| t.id == id)?;
        let tab = self.tabs.remove(idx);

        // If we removed the active tab, select a neighbour (previous first)
        if self.active_tab_id == Some(id) {
            self.active_tab_id = if self.tabs.is_empty() {
                None
            } else {
                Some(self.tabs[idx.saturating_sub(1)].id)
            };
        }

        log::debug!(
            "Removed tab {} (index {}) from pane {}",
            id,
            idx,
            self.id
        );
        Some(tab)
    }

    /// Take every tab out, in order. The pane is left empty.
    pub(crate) fn drain_tabs(&mut self) -> Vec<Tab> {
        self.active_tab_id = None;
        std::mem::take(&mut self.tabs)
    }

    /// Select a tab by ID
    pub fn select_tab(&mut self, id: TabId) -> bool {
        if self.contains(id) {
            self.active_tab_id = Some(id);
            true
        } else {
            false
        }
    }

    /// Select the next tab (wraps around)
    pub fn next_tab(&mut self) {
        if self.tabs.is_empty() {
            return;
        }
        let current = self.active_tab_index().unwrap_or(0);
        let next = (current + 1) % self.tabs.len();
        self.active_tab_id = Some(self.tabs[next].id);
    }

    /// Select the previous tab (wraps around)
    pub fn prev_tab(&mut self) {
        if self.tabs.is_empty() {
            return;
        }
        let current = self.active_tab_index().unwrap_or(0);
        let prev = if current == 0 {
            self.tabs.len() - 1
        } else {
            current - 1
        };
        self.active_tab_id = Some(self.tabs[prev].id);
    }

    /// Select tab by index (1-based, for Cmd+1-9)
    pub fn switch_to_index(&mut self, index: usize) -> bool {
        if index > 0 && index <= self.tabs.len() {
            self.active_tab_id = Some(self.tabs[index - 1].id);
            true
        } else {
            false
        }
    }

    /// Reorder a tab within the tab bar; the tabs in between shift by one.
    /// `index` past the end means the last slot. False when the tab is not
    /// here or already sits at `index`.
    pub fn move_tab_to_index(&mut self, id: TabId, index: usize) -> bool {
        let Some(from) = self.tabs.iter().position(|t| t.id == id) else {
            return false;
        };
        let to = index.min(self.tabs.len() - 1);
        match from.cmp(&to) {
            Ordering::Less => self.tabs[from..=to].rotate_left(1),
            Ordering::Greater => self.tabs[to..=from].rotate_right(1),
            Ordering::Equal => return false,
        }
        true
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.tabs.iter().any(|t| t.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Get the number of tabs
    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    /// Get all tabs as a slice
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    /// Get a tab by ID
    pub fn get_tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to a tab by ID
    pub fn get_tab_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    /// Get the active tab ID
    pub fn active_tab_id(&self) -> Option<TabId> {
        self.active_tab_id
    }

    /// Get a reference to the active tab
    pub fn active_tab(&self) -> Option<&Tab> {
        self.active_tab_id.and_then(|id| self.get_tab(id))
    }

    /// Get index of active tab (0-based)
    pub fn active_tab_index(&self) -> Option<usize> {
        self.active_tab_id
            .and_then(|id| self.tabs.iter().position(|t| t.id == id))
    }
}
