//! Typed error types for the save coordinator and the workspace.
//!
//! These are the errors callers at the crate boundary can match on. Glue code
//! (CLI, `App`, session file helpers) keeps using `anyhow` with context.

use crate::document::DocumentId;
use crate::pane::PaneId;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Failures of the save coordinator.
///
/// `Clone` so that one canonical write can report the same outcome to every
/// request coalesced into it; I/O sources are shared through `Arc`.
#[derive(Debug, Clone, Error)]
pub enum SaveError {
    /// The id does not belong to an open document.
    #[error("document {0} is not open")]
    UnknownDocument(DocumentId),

    /// Reading or writing the canonical file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Canonical path of the document.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The stored bytes are not valid UTF-8 text.
    #[error("'{path}' does not contain UTF-8 text")]
    Decode {
        /// Canonical path of the document.
        path: PathBuf,
    },

    /// Reading or writing the crash-recovery checkpoint failed.
    #[error("checkpoint error for '{path}': {message}")]
    Checkpoint {
        /// Canonical path of the document the checkpoint belongs to.
        path: PathBuf,
        /// Human-readable cause.
        message: String,
    },

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),

    /// The bounded exit flush ran out of time.
    #[error("save-all did not finish within {0:?}")]
    Shutdown(std::time::Duration),
}

impl SaveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SaveError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

impl From<tokio::task::JoinError> for SaveError {
    fn from(e: tokio::task::JoinError) -> Self {
        SaveError::Task(e.to_string())
    }
}

/// Failures of workspace topology operations.
#[derive(Debug, Clone, Error)]
pub enum WorkspaceError {
    #[error("pane {0} does not exist")]
    PaneNotFound(PaneId),

    #[error("tab {0} is not open")]
    TabNotFound(DocumentId),

    #[error("tab {tab} is not in pane {pane}")]
    TabNotInPane { tab: DocumentId, pane: PaneId },

    /// Opening or saving the underlying document failed.
    #[error(transparent)]
    Save(#[from] SaveError),

    /// The workspace actor has stopped; no further mutations are accepted.
    #[error("workspace is shut down")]
    ActorClosed,
}
