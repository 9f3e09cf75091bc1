//! Document identity and in-memory buffers.
//!
//! A [`DocumentId`] is derived from the note's absolute path (UUID v5), so the
//! same path always maps to the same id: within one process, and across
//! restarts, which lets a checkpoint written before a crash be matched to the
//! document when it is reopened.

mod buffer;

pub use buffer::DocumentBuffer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Namespace for path-derived document ids
const DOCUMENT_NAMESPACE: Uuid = Uuid::from_u128(0x6f4e_2a1c_9b3d_4e57_8a60_d1c2_b3a4_f5e6);

/// Stable key for one open document's save state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Derive the id for a path. The path is made absolute first so that
    /// `notes/a.md` and `/home/u/notes/a.md` resolve to the same document.
    pub fn from_path(path: &Path) -> Self {
        let path = normalize_path(path);
        DocumentId(Uuid::new_v5(
            &DOCUMENT_NAMESPACE,
            path.to_string_lossy().as_bytes(),
        ))
    }

    /// Parse the string form written to workspace state files
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(DocumentId)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Absolute form of a note path, used as the canonical storage location
pub fn normalize_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Display title for a note: its file stem, or the full name when it has none
pub fn title_for_path(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_same_id() {
        let a = DocumentId::from_path(Path::new("/notes/today.md"));
        let b = DocumentId::from_path(Path::new("/notes/today.md"));
        let c = DocumentId::from_path(Path::new("/notes/tomorrow.md"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_relative_and_absolute_agree() {
        let cwd = std::env::current_dir().unwrap();
        let rel = DocumentId::from_path(Path::new("inbox.md"));
        let abs = DocumentId::from_path(&cwd.join("inbox.md"));
        assert_eq!(rel, abs);
    }

    #[test]
    fn test_display_parse_roundtrip() {
        let id = DocumentId::from_path(Path::new("/notes/x.md"));
        assert_eq!(DocumentId::parse(&id.to_string()), Some(id));
        assert_eq!(DocumentId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_title_for_path() {
        assert_eq!(title_for_path(Path::new("/n/Groceries.md")), "Groceries");
        assert_eq!(title_for_path(Path::new("/n/.hidden")), ".hidden");
        assert_eq!(title_for_path(Path::new("/")), "Untitled");
    }
}
