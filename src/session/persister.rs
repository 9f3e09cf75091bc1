//! Debounced writer for the workspace state file.
//!
//! At most one write is in flight. A save requested while one is running
//! replaces the pending snapshot; the running loop writes it once the current
//! write finishes. Bursts of topology changes therefore cost at most two
//! writes, and the last snapshot always lands.

use super::WorkspaceState;
use super::storage::save_state_to;
use crate::storage::Storage;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Default)]
struct Slot {
    running: bool,
    pending: Option<WorkspaceState>,
}

struct Inner {
    storage: Arc<dyn Storage>,
    path: PathBuf,
    slot: Mutex<Slot>,
    /// `true` while the write loop runs
    busy: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct WorkspacePersister {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for WorkspacePersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspacePersister")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

impl WorkspacePersister {
    pub fn new(storage: Arc<dyn Storage>, path: PathBuf) -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                storage,
                path,
                slot: Mutex::new(Slot::default()),
                busy,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Request a write of `state`. Never waits for I/O.
    ///
    /// Must be called from within a tokio runtime.
    pub fn save(&self, state: WorkspaceState) {
        {
            let mut slot = self.inner.slot.lock();
            slot.pending = Some(state);
            if slot.running {
                crate::debug_trace!("SESSION", "Workspace save in flight; snapshot queued");
                return;
            }
            slot.running = true;
            self.inner.busy.send_replace(true);
        }
        tokio::spawn(write_loop(Arc::clone(&self.inner)));
    }

    /// Wait until every requested snapshot has been written
    pub async fn flush(&self) {
        let mut busy = self.inner.busy.subscribe();
        // The sender lives in `inner`, which we hold, so this cannot fail
        let _ = busy.wait_for(|running| !running).await;
    }
}

async fn write_loop(inner: Arc<Inner>) {
    loop {
        let state = {
            let mut slot = inner.slot.lock();
            match slot.pending.take() {
                Some(state) => state,
                None => {
                    slot.running = false;
                    inner.busy.send_replace(false);
                    return;
                }
            }
        };

        let task_inner = Arc::clone(&inner);
        let result = tokio::task::spawn_blocking(move || {
            save_state_to(task_inner.storage.as_ref(), &state, &task_inner.path)
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Failed to save workspace state: {:#}", e),
            Err(e) => log::error!("Workspace save task failed: {}", e),
        }
    }
}
