//! Crash-recovery checkpoints.
//!
//! One JSON file per document in the checkpoint directory, named after the
//! document id. The record carries the note's path so that checkpoints left by
//! a crashed process can be listed and matched back to their notes.

use crate::document::DocumentId;
use crate::error::SaveError;
use crate::storage::{self, Storage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Contents of one checkpoint file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Canonical path of the note
    pub path: PathBuf,
    /// When the checkpoint was taken (RFC 3339)
    pub saved_at: String,
    /// Serialized editor content at that time
    pub content: String,
}

/// Reads and writes checkpoint records through the storage primitive
#[derive(Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    storage: Arc<dyn Storage>,
}

impl CheckpointStore {
    pub fn new(dir: PathBuf, storage: Arc<dyn Storage>) -> Self {
        Self { dir, storage }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Checkpoint location for a document; never the canonical path
    pub fn path_for(&self, id: DocumentId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn error(note: &Path, message: impl Into<String>) -> SaveError {
        SaveError::Checkpoint {
            path: note.to_path_buf(),
            message: message.into(),
        }
    }

    pub async fn write(&self, id: DocumentId, note: &Path, content: &str) -> Result<(), SaveError> {
        let record = CheckpointRecord {
            path: note.to_path_buf(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            content: content.to_string(),
        };
        let bytes =
            serde_json::to_vec(&record).map_err(|e| Self::error(note, e.to_string()))?;
        storage::write_blocking(&self.storage, &self.path_for(id), bytes)
            .await?
            .map_err(|e| Self::error(note, e.to_string()))
    }

    pub async fn load(
        &self,
        id: DocumentId,
        note: &Path,
    ) -> Result<Option<CheckpointRecord>, SaveError> {
        let Some(bytes) = storage::read_blocking(&self.storage, &self.path_for(id))
            .await?
            .map_err(|e| Self::error(note, e.to_string()))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Self::error(note, format!("corrupt checkpoint: {e}")))
    }

    pub async fn remove(&self, id: DocumentId, note: &Path) -> Result<(), SaveError> {
        storage::remove_blocking(&self.storage, &self.path_for(id))
            .await?
            .map_err(|e| Self::error(note, e.to_string()))
    }

    /// Every readable checkpoint in the directory.
    ///
    /// Unparseable files are skipped with a warning. Blocking; run it on the
    /// blocking pool from async code.
    pub fn list(&self) -> Vec<CheckpointRecord> {
        let files = match self.storage.list(&self.dir) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Failed to list checkpoints in {:?}: {}", self.dir, e);
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for file in files {
            if file.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let parsed = self
                .storage
                .read(&file)
                .ok()
                .flatten()
                .and_then(|bytes| serde_json::from_slice::<CheckpointRecord>(&bytes).ok());
            match parsed {
                Some(record) => records.push(record),
                None => log::warn!("Skipping unreadable checkpoint {:?}", file),
            }
        }
        records
    }
}
