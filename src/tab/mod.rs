//! Tabs: the UI-facing handle of one open note inside one pane
//!
//! A `Tab` owns its editor surface but never the note's content; content
//! lives in the save coordinator and is pushed to / pulled from the surface.
//! Dirty and saving state is derived from the coordinator on demand:
//!
//! ```text
//! Clean --edit--> Dirty --save starts--> Saving --ok--> Clean
//!                   ^                       |
//!                   +-------- failed -------+
//! ```

use crate::document::{DocumentId, title_for_path};
use crate::editor::EditorSurface;
use crate::error::SaveError;
use crate::pane::PaneId;
use crate::save::{DocumentState, SaveCoordinator};
use std::path::{Path, PathBuf};

/// A tab is identified by the document it shows
pub type TabId = DocumentId;

/// Derived save state of a tab
pub type TabState = DocumentState;

/// One open note in one pane
pub struct Tab {
    /// Unique identifier (the note's document id)
    pub id: TabId,
    /// Tab title
    pub title: String,
    path: PathBuf,
    /// Pane currently holding this tab; lookup only
    pane: PaneId,
    surface: Box<dyn EditorSurface>,
    /// Content is still being pulled into the surface
    pub loading: bool,
    disposed: bool,
}

impl std::fmt::Debug for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tab")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("path", &self.path)
            .field("pane", &self.pane)
            .field("loading", &self.loading)
            .finish_non_exhaustive()
    }
}

impl Tab {
    /// Create a tab for an opened document. The surface starts empty and
    /// `loading` until [`populate`](Self::populate) runs.
    pub fn new(id: TabId, path: PathBuf, pane: PaneId, surface: Box<dyn EditorSurface>) -> Self {
        Self {
            id,
            title: title_for_path(&path),
            path,
            pane,
            surface,
            loading: true,
            disposed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pane_id(&self) -> PaneId {
        self.pane
    }

    pub(crate) fn set_pane(&mut self, pane: PaneId) {
        self.pane = pane;
    }

    pub fn surface(&self) -> &dyn EditorSurface {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> &mut dyn EditorSurface {
        self.surface.as_mut()
    }

    /// Fill the surface from the coordinator's buffer (no storage access)
    pub fn populate(&mut self, coordinator: &SaveCoordinator) -> Result<(), SaveError> {
        let content = coordinator
            .get_content(self.id)
            .ok_or(SaveError::UnknownDocument(self.id))?;
        self.surface.load_serialized_content(&content);
        self.loading = false;
        Ok(())
    }

    /// Forward the surface's content after a change notification
    pub fn content_changed(&self, coordinator: &SaveCoordinator) -> Result<(), SaveError> {
        coordinator.update_content(self.id, self.surface.serialized_content())
    }

    /// Current save state, or `Clean` once the document is no longer open
    pub fn state(&self, coordinator: &SaveCoordinator) -> TabState {
        coordinator.state(self.id).unwrap_or(TabState::Clean)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Tear down the editor surface. Only for tabs that are being destroyed;
    /// a tab moving between panes keeps its surface.
    pub(crate) fn dispose(&mut self) {
        if !self.disposed {
            self.surface.dispose();
            self.disposed = true;
        }
    }
}

#[cfg(test)]
impl Tab {
    /// Create a tab without a coordinator, for topology tests
    pub(crate) fn new_stub(name: &str, pane: PaneId) -> Self {
        let path = PathBuf::from(format!("/notes/{name}.md"));
        let mut tab = Tab::new(
            DocumentId::from_path(&path),
            path,
            pane,
            Box::new(crate::editor::PlainTextSurface::new()),
        );
        tab.loading = false;
        tab
    }
}
