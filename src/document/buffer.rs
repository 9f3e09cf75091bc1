//! Authoritative in-memory content of one open document.

use super::DocumentId;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Content and save bookkeeping for one document.
///
/// Owned by the save coordinator; every other component reads it through the
/// coordinator. `dirty` is set on every update and only cleared once a
/// canonical write (or an unchanged-content check) proves the persisted copy
/// matches.
#[derive(Debug)]
pub struct DocumentBuffer {
    id: DocumentId,
    path: PathBuf,
    content: String,
    /// Content of the most recent checkpoint, if one is on disk
    checkpointed: Option<String>,
    /// Content of the most recent successful canonical write (or the initial read)
    persisted: String,
    dirty: bool,
    saving: bool,
    last_edit: Option<Instant>,
}

impl DocumentBuffer {
    pub fn new(id: DocumentId, path: PathBuf, persisted: String) -> Self {
        Self {
            id,
            path,
            content: persisted.clone(),
            checkpointed: None,
            persisted,
            dirty: false,
            saving: false,
            last_edit: None,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn last_edit(&self) -> Option<Instant> {
        self.last_edit
    }

    /// Replace the current content. O(1) apart from the move of `content`.
    pub fn update(&mut self, content: String) {
        self.content = content;
        self.dirty = true;
        self.last_edit = Some(Instant::now());
    }

    /// Adopt checkpoint content found at open time. The canonical copy is
    /// left as read from disk, so the buffer starts dirty.
    pub fn recover(&mut self, content: String) {
        self.checkpointed = Some(content.clone());
        self.dirty = content != self.persisted;
        self.content = content;
    }

    /// Whether the current content differs from the persisted copy.
    pub fn differs_from_persisted(&self) -> bool {
        self.content != self.persisted
    }

    /// Whether the current content is already covered by a checkpoint.
    pub fn matches_checkpoint(&self) -> bool {
        self.checkpointed.as_deref() == Some(self.content.as_str())
    }

    /// Clear the dirty flag when content matches the persisted copy.
    pub fn settle(&mut self) {
        if !self.differs_from_persisted() {
            self.dirty = false;
        }
    }

    pub(crate) fn begin_save(&mut self) -> String {
        self.saving = true;
        self.content.clone()
    }

    /// Record the end of a canonical write of `written`.
    ///
    /// On success the persisted copy advances; the buffer stays dirty if the
    /// content moved on while the write was running. On failure nothing but
    /// the saving flag changes.
    pub(crate) fn finish_save(&mut self, written: Option<String>) {
        self.saving = false;
        if let Some(written) = written {
            self.persisted = written;
            self.dirty = self.differs_from_persisted();
        }
    }

    pub(crate) fn mark_checkpointed(&mut self, content: String) {
        self.checkpointed = Some(content);
    }

    pub(crate) fn clear_checkpoint(&mut self) {
        self.checkpointed = None;
    }
}
