//! Editor-surface seam.
//!
//! The rich-text editing widget is an external collaborator. A tab talks to
//! it only through [`EditorSurface`]: pull the serialized content after a
//! change, push content in when the tab is (re)populated, and tear it down
//! when the tab is destroyed.

use crate::document::DocumentId;
use std::sync::Arc;

/// The editing widget bound to one tab
pub trait EditorSurface: Send + Sync {
    /// Current content in its serialized (on-disk) form
    fn serialized_content(&self) -> String;

    /// Replace the surface's content
    fn load_serialized_content(&mut self, content: &str);

    /// Release UI resources. Called once, when the owning tab is closed.
    fn dispose(&mut self) {}
}

/// Creates a surface for a newly opened tab
pub type SurfaceFactory = Arc<dyn Fn(DocumentId) -> Box<dyn EditorSurface> + Send + Sync>;

/// String-backed surface for headless use (CLI, tests)
#[derive(Debug, Default, Clone)]
pub struct PlainTextSurface {
    text: String,
}

impl PlainTextSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory producing empty plain-text surfaces
    pub fn factory() -> SurfaceFactory {
        Arc::new(|_id| Box::new(PlainTextSurface::new()))
    }
}

impl EditorSurface for PlainTextSurface {
    fn serialized_content(&self) -> String {
        self.text.clone()
    }

    fn load_serialized_content(&mut self, content: &str) {
        self.text.clear();
        self.text.push_str(content);
    }
}
