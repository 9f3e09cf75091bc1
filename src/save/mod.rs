//! Save coordinator: owns every open document's buffer and decides when it
//! is checkpointed and when it is written to its canonical file.
//!
//! # Guarantees
//!
//! - `update_content` never performs I/O: it swaps the buffer content, sets
//!   the dirty flag and signals the document's timer task.
//! - At most one canonical write per document is in flight. Requests that
//!   arrive meanwhile are coalesced into one follow-up write that uses the
//!   buffer content current at that point (see [`gate`]).
//! - Writes for different documents run in parallel.
//! - A failed canonical write leaves the buffer dirty and keeps the
//!   checkpoint; a successful one removes it.
//!
//! # Sub-modules
//!
//! - [`checkpoint`] - checkpoint records and their store
//! - [`events`] - lifecycle notifications
//! - `gate` - per-document write serialization
//! - `timers` - checkpoint / autosave debounce task

pub mod checkpoint;
pub mod events;
mod gate;
mod timers;

pub use checkpoint::{CheckpointRecord, CheckpointStore};
pub use events::SaveEvent;

use crate::config::SaveConfig;
use crate::document::{DocumentBuffer, DocumentId, normalize_path};
use crate::error::SaveError;
use crate::storage::{self, Storage};
use gate::SaveGate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use timers::TimerSignal;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;

/// Result of a canonical save request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The content was written to the canonical file.
    Written,
    /// Nothing to write: the canonical file already holds the content.
    Unchanged,
    /// Served by a write that was started or completed for another request.
    Coalesced,
}

/// Save state of a document as shown by dirty indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Clean,
    Dirty,
    Saving,
}

/// One open document as seen by the coordinator and its timer task
pub(crate) struct OpenDocument {
    pub(crate) id: DocumentId,
    pub(crate) path: PathBuf,
    pub(crate) buffer: Mutex<DocumentBuffer>,
    gate: SaveGate,
}

impl OpenDocument {
    fn new(buffer: DocumentBuffer) -> Self {
        Self {
            id: buffer.id(),
            path: buffer.path().to_path_buf(),
            buffer: Mutex::new(buffer),
            gate: SaveGate::new(),
        }
    }
}

struct DocumentSlot {
    doc: Arc<OpenDocument>,
    signal: watch::Sender<TimerSignal>,
}

pub(crate) struct Inner {
    storage: Arc<dyn Storage>,
    checkpoints: CheckpointStore,
    pub(crate) config: SaveConfig,
    documents: Mutex<HashMap<DocumentId, DocumentSlot>>,
    /// Documents whose final save is still running. The receiver resolves
    /// once the close finishes.
    closing: Mutex<HashMap<DocumentId, watch::Receiver<()>>>,
    events: broadcast::Sender<SaveEvent>,
}

/// Marks a document as closing until dropped
struct ClosingGuard<'a> {
    inner: &'a Inner,
    id: DocumentId,
    _done: watch::Sender<()>,
}

impl Drop for ClosingGuard<'_> {
    fn drop(&mut self) {
        self.inner.closing.lock().remove(&self.id);
    }
}

/// Owns all document buffers and schedules their checkpoints and saves.
///
/// Cheap to clone; clones share the same documents.
#[derive(Clone)]
pub struct SaveCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SaveCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveCoordinator")
            .field("open_documents", &self.inner.documents.lock().len())
            .field("checkpoint_dir", &self.inner.checkpoints.dir())
            .finish_non_exhaustive()
    }
}

impl SaveCoordinator {
    /// Create a coordinator writing notes through `storage` and checkpoints
    /// into `checkpoint_dir`.
    pub fn new(storage: Arc<dyn Storage>, config: SaveConfig, checkpoint_dir: PathBuf) -> Self {
        let (events, _) = broadcast::channel(events::EVENT_CAPACITY);
        let checkpoints = CheckpointStore::new(checkpoint_dir, Arc::clone(&storage));
        Self {
            inner: Arc::new(Inner {
                storage,
                checkpoints,
                config,
                documents: Mutex::new(HashMap::new()),
                closing: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Subscribe to save lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> &SaveConfig {
        &self.inner.config
    }

    /// Open a document, loading it from storage.
    ///
    /// Reopening a path that is already open returns the existing id without
    /// touching storage. Reopening a path whose close is still saving waits
    /// for that save first. A missing file opens as an empty document. When a
    /// checkpoint with different content exists (a previous process died
    /// before its canonical save), the buffer opens with the checkpoint
    /// content and starts dirty.
    pub async fn open(&self, path: &Path) -> Result<DocumentId, SaveError> {
        let path = normalize_path(path);
        let id = DocumentId::from_path(&path);
        let closing = {
            let documents = self.inner.documents.lock();
            if documents.contains_key(&id) {
                crate::debug_log!("SAVE", "Document {} already open for {:?}", id, path);
                return Ok(id);
            }
            self.inner.closing.lock().get(&id).cloned()
        };
        if let Some(mut done) = closing {
            crate::debug_log!("SAVE", "Waiting for close of {} before reopening", id);
            // Nothing is ever sent: this resolves when the close drops its sender
            let _ = done.changed().await;
        }

        let bytes = storage::read_blocking(&self.inner.storage, &path)
            .await?
            .map_err(|e| SaveError::io(&path, e))?;
        let persisted = match bytes {
            Some(bytes) => {
                String::from_utf8(bytes).map_err(|_| SaveError::Decode { path: path.clone() })?
            }
            None => String::new(),
        };

        let mut buffer = DocumentBuffer::new(id, path.clone(), persisted);
        let mut recovered = false;
        if self.inner.config.recover_checkpoints_on_open {
            match self.inner.checkpoints.load(id, &path).await {
                Ok(Some(record)) if record.content != buffer.content() => {
                    log::warn!(
                        "Recovering unsaved content for {:?} from checkpoint taken {}",
                        path,
                        record.saved_at
                    );
                    buffer.recover(record.content);
                    recovered = true;
                }
                Ok(_) => {}
                Err(e) => log::warn!("Ignoring checkpoint for {:?}: {}", path, e),
            }
        }

        let doc = Arc::new(OpenDocument::new(buffer));
        {
            let mut documents = self.inner.documents.lock();
            // A concurrent open of the same path won the race
            if documents.contains_key(&id) {
                return Ok(id);
            }
            let (signal, receiver) = watch::channel(TimerSignal::Idle);
            tokio::spawn(timers::run_document_timers(
                Arc::downgrade(&self.inner),
                Arc::clone(&doc),
                receiver,
            ));
            documents.insert(id, DocumentSlot { doc, signal });
        }

        crate::debug_info!("SAVE", "Opened {} ({:?})", id, path);
        if recovered {
            self.inner.emit(SaveEvent::Recovered(id));
        }
        Ok(id)
    }

    /// Replace a document's content after an edit.
    ///
    /// Never blocks on I/O; safe to call on every keystroke. Restarts both the
    /// checkpoint and the autosave debounce.
    pub fn update_content(&self, id: DocumentId, content: String) -> Result<(), SaveError> {
        let documents = self.inner.documents.lock();
        let slot = documents.get(&id).ok_or(SaveError::UnknownDocument(id))?;
        slot.doc.buffer.lock().update(content);
        slot.signal.send_replace(TimerSignal::Edited);
        Ok(())
    }

    /// Write the document to its canonical file now.
    ///
    /// Cancels the pending autosave. If a write for this document is already
    /// running, this request waits for it and is either covered by it or
    /// served by a single follow-up write with the latest content.
    pub async fn save_now(&self, id: DocumentId) -> Result<SaveOutcome, SaveError> {
        let doc = {
            let documents = self.inner.documents.lock();
            let slot = documents.get(&id).ok_or(SaveError::UnknownDocument(id))?;
            slot.signal.send_replace(TimerSignal::SaveCancelled);
            Arc::clone(&slot.doc)
        };

        let result = self.inner.full_save(&doc).await;
        if result.is_err() {
            // Put the document back on the debounce cycle so the checkpoint
            // is taken and the save retried
            if let Some(slot) = self.inner.documents.lock().get(&id) {
                slot.signal.send_replace(TimerSignal::Edited);
            }
        }
        result
    }

    /// Current buffer content, without touching storage
    pub fn get_content(&self, id: DocumentId) -> Option<String> {
        let documents = self.inner.documents.lock();
        documents
            .get(&id)
            .map(|slot| slot.doc.buffer.lock().content().to_string())
    }

    /// Close a document: best-effort final save, then discard the buffer.
    ///
    /// A failed final save is logged and returned; the document is closed
    /// either way. Its unsaved content stays in the checkpoint and is
    /// recovered the next time the note is opened. Closing an id that is not
    /// open is a no-op.
    pub async fn close(&self, id: DocumentId) -> Result<(), SaveError> {
        let (slot, _closing) = {
            let mut documents = self.inner.documents.lock();
            let Some(slot) = documents.remove(&id) else {
                return Ok(());
            };
            let (done, waiters) = watch::channel(());
            self.inner.closing.lock().insert(id, waiters);
            let guard = ClosingGuard {
                inner: &self.inner,
                id,
                _done: done,
            };
            (slot, guard)
        };
        // Dropping the sender ends the timer task after its current step
        let DocumentSlot { doc, signal } = slot;
        drop(signal);

        match self.inner.full_save(&doc).await {
            Ok(outcome) => {
                crate::debug_info!("SAVE", "Closed {} ({:?})", id, outcome);
                Ok(())
            }
            Err(e) => {
                // The debounced checkpoint may not have fired yet
                self.inner.checkpoint(&doc).await;
                log::error!(
                    "Final save of {:?} failed, unsaved content kept in checkpoint: {}",
                    doc.path,
                    e
                );
                Err(e)
            }
        }
    }

    /// Derived save state for dirty/saving indicators
    pub fn state(&self, id: DocumentId) -> Option<DocumentState> {
        let documents = self.inner.documents.lock();
        let slot = documents.get(&id)?;
        let buffer = slot.doc.buffer.lock();
        Some(if buffer.is_saving() {
            DocumentState::Saving
        } else if buffer.is_dirty() {
            DocumentState::Dirty
        } else {
            DocumentState::Clean
        })
    }

    pub fn is_open(&self, id: DocumentId) -> bool {
        self.inner.documents.lock().contains_key(&id)
    }

    pub fn open_documents(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.inner.documents.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn path_of(&self, id: DocumentId) -> Option<PathBuf> {
        self.inner
            .documents
            .lock()
            .get(&id)
            .map(|slot| slot.doc.path.clone())
    }

    /// Whether a note exists in storage. Read failures count as missing.
    pub async fn note_exists(&self, path: &Path) -> bool {
        let storage = Arc::clone(&self.inner.storage);
        let path = normalize_path(path);
        tokio::task::spawn_blocking(move || storage.exists(&path))
            .await
            .unwrap_or(false)
    }

    /// Save every dirty document, in parallel. Returns the failures.
    pub async fn save_all(&self) -> Vec<(DocumentId, SaveError)> {
        let docs: Vec<Arc<OpenDocument>> = self
            .inner
            .documents
            .lock()
            .values()
            .filter(|slot| slot.doc.buffer.lock().is_dirty())
            .map(|slot| Arc::clone(&slot.doc))
            .collect();

        let mut tasks = JoinSet::new();
        for doc in docs {
            let inner = Arc::clone(&self.inner);
            tasks.spawn(async move {
                let result = inner.full_save(&doc).await;
                (doc.id, result)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Err(e))) => failures.push((id, e)),
                Ok(_) => {}
                Err(e) => log::error!("Save task failed: {}", e),
            }
        }
        failures
    }

    /// Exit flush: [`save_all`](Self::save_all) bounded by `timeout`.
    ///
    /// When time runs out the remaining saves are abandoned; anything they
    /// would have written is still covered by its checkpoint.
    pub async fn shutdown(
        &self,
        timeout: Duration,
    ) -> Result<Vec<(DocumentId, SaveError)>, SaveError> {
        match tokio::time::timeout(timeout, self.save_all()).await {
            Ok(failures) => {
                for (id, e) in &failures {
                    log::error!("Exit save of {} failed: {}", id, e);
                }
                Ok(failures)
            }
            Err(_) => {
                log::warn!("Exit save did not finish within {:?}; exiting anyway", timeout);
                Err(SaveError::Shutdown(timeout))
            }
        }
    }

    /// Checkpoints left behind by a previous process
    pub async fn pending_checkpoints(&self) -> Vec<CheckpointRecord> {
        let store = self.inner.checkpoints.clone();
        match tokio::task::spawn_blocking(move || store.list()).await {
            Ok(records) => records,
            Err(e) => {
                log::error!("Checkpoint listing task failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Delete the checkpoint of a note without applying it
    pub async fn discard_checkpoint(&self, path: &Path) -> Result<(), SaveError> {
        let path = normalize_path(path);
        self.inner
            .checkpoints
            .remove(DocumentId::from_path(&path), &path)
            .await
    }
}

impl Inner {
    fn emit(&self, event: SaveEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Serialized, coalescing canonical write of one document
    pub(crate) async fn full_save(&self, doc: &OpenDocument) -> Result<SaveOutcome, SaveError> {
        let ticket = doc.gate.ticket();
        let _turn = doc.gate.turn().await;
        if let Some(outcome) = doc.gate.covered(ticket) {
            crate::debug_trace!("SAVE", "Save request {} for {} coalesced", ticket, doc.id);
            return outcome;
        }

        let through = doc.gate.issued();
        let snapshot = {
            let mut buffer = doc.buffer.lock();
            if buffer.differs_from_persisted() {
                Some(buffer.begin_save())
            } else {
                buffer.settle();
                None
            }
        };
        let Some(snapshot) = snapshot else {
            doc.gate.record(through, Ok(SaveOutcome::Unchanged));
            return Ok(SaveOutcome::Unchanged);
        };

        self.emit(SaveEvent::SaveStarted(doc.id));
        crate::debug_log!(
            "SAVE",
            "Writing {} bytes to {:?}",
            snapshot.len(),
            doc.path
        );

        let result = match storage::write_blocking(
            &self.storage,
            &doc.path,
            snapshot.as_bytes().to_vec(),
        )
        .await
        {
            Ok(Ok(())) => Ok(SaveOutcome::Written),
            Ok(Err(e)) => Err(SaveError::io(&doc.path, e)),
            Err(e) => Err(SaveError::from(e)),
        };

        let success = result.is_ok();
        let still_dirty = {
            let mut buffer = doc.buffer.lock();
            buffer.finish_save(success.then_some(snapshot));
            buffer.is_dirty()
        };

        match &result {
            Ok(_) => {
                if !still_dirty {
                    self.drop_checkpoint(doc).await;
                }
                self.emit(SaveEvent::NoteSaved {
                    id: doc.id,
                    path: doc.path.clone(),
                });
            }
            Err(e) => log::error!("Save of {:?} failed: {}", doc.path, e),
        }
        self.emit(SaveEvent::SaveCompleted {
            id: doc.id,
            success,
        });

        doc.gate.record(through, result.clone());
        result
    }

    /// Write the crash-recovery copy if the content moved past both the
    /// persisted copy and the last checkpoint
    pub(crate) async fn checkpoint(&self, doc: &OpenDocument) {
        let _turn = doc.gate.checkpoint_turn().await;
        let content = {
            let buffer = doc.buffer.lock();
            if !buffer.differs_from_persisted() || buffer.matches_checkpoint() {
                return;
            }
            buffer.content().to_string()
        };

        match self.checkpoints.write(doc.id, &doc.path, &content).await {
            Ok(()) => {
                doc.buffer.lock().mark_checkpointed(content);
                crate::debug_trace!("SAVE", "Checkpointed {}", doc.id);
                self.emit(SaveEvent::ContentCheckpointed(doc.id));
            }
            Err(e) => log::warn!("Checkpoint of {:?} failed: {}", doc.path, e),
        }
    }

    async fn drop_checkpoint(&self, doc: &OpenDocument) {
        let _turn = doc.gate.checkpoint_turn().await;
        if doc.buffer.lock().is_dirty() {
            return;
        }
        match self.checkpoints.remove(doc.id, &doc.path).await {
            Ok(()) => doc.buffer.lock().clear_checkpoint(),
            Err(e) => log::warn!("Failed to remove checkpoint for {:?}: {}", doc.path, e),
        }
    }

    /// Autosave deadline reached. Returns the next deadline, if any.
    pub(crate) async fn autosave_due(
        &self,
        doc: &OpenDocument,
        failures: &mut u32,
    ) -> Option<tokio::time::Instant> {
        let (differs, idle) = {
            let buffer = doc.buffer.lock();
            (
                buffer.differs_from_persisted(),
                buffer.last_edit().map(|at| at.elapsed()),
            )
        };
        if !differs {
            doc.buffer.lock().settle();
            return None;
        }

        let holdoff = self.config.typing_holdoff();
        if let Some(idle) = idle
            && idle < holdoff
        {
            crate::debug_trace!("SAVE", "Deferring autosave of {}: still typing", doc.id);
            return Some(tokio::time::Instant::now() + self.config.autosave_delay());
        }

        match self.full_save(doc).await {
            Ok(_) => None,
            Err(e) => {
                *failures += 1;
                if *failures <= self.config.autosave_retry_limit {
                    log::warn!(
                        "Autosave of {:?} failed (attempt {}), retrying: {}",
                        doc.path,
                        failures,
                        e
                    );
                    Some(tokio::time::Instant::now() + self.config.autosave_delay())
                } else {
                    log::error!(
                        "Autosave of {:?} failed {} times; waiting for the next edit",
                        doc.path,
                        failures
                    );
                    None
                }
            }
        }
    }
}
