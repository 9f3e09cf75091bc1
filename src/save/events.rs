//! Save lifecycle notifications.

use crate::document::DocumentId;
use std::path::PathBuf;

/// Buffered events per subscriber before the slowest one starts lagging
pub const EVENT_CAPACITY: usize = 256;

/// Events published by the save coordinator.
///
/// Delivered on a `tokio::sync::broadcast` channel owned by the coordinator:
/// once the coordinator is dropped every receiver sees `Closed`, so
/// subscribers never need to unregister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEvent {
    /// A canonical write for the document began.
    SaveStarted(DocumentId),
    /// A canonical write finished.
    SaveCompleted { id: DocumentId, success: bool },
    /// The note's canonical file now holds the saved content.
    NoteSaved { id: DocumentId, path: PathBuf },
    /// A crash-recovery checkpoint was written.
    ContentCheckpointed(DocumentId),
    /// The document was opened with content recovered from a checkpoint.
    Recovered(DocumentId),
}

impl SaveEvent {
    pub fn document(&self) -> DocumentId {
        match self {
            SaveEvent::SaveStarted(id)
            | SaveEvent::ContentCheckpointed(id)
            | SaveEvent::Recovered(id) => *id,
            SaveEvent::SaveCompleted { id, .. } | SaveEvent::NoteSaved { id, .. } => *id,
        }
    }
}
