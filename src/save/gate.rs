//! Per-document save serialization and coalescing.
//!
//! Every canonical save request takes a ticket, then waits for the document's
//! save turn. The holder of the turn reads the buffer *after* acquiring it and
//! records the highest ticket issued at that moment: every request numbered at
//! or below that mark was made before the content was read, so its content is
//! part of the write. When such a request later gets its turn it returns the
//! recorded outcome instead of writing again.

use super::SaveOutcome;
use crate::error::SaveError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

pub(crate) struct SaveGate {
    /// Held for the whole duration of a canonical write
    turn: AsyncMutex<()>,
    /// Serializes checkpoint writes and removals
    checkpoint: AsyncMutex<()>,
    issued: AtomicU64,
    served: Mutex<Served>,
}

struct Served {
    through: u64,
    outcome: Result<SaveOutcome, SaveError>,
}

impl SaveGate {
    pub(crate) fn new() -> Self {
        Self {
            turn: AsyncMutex::new(()),
            checkpoint: AsyncMutex::new(()),
            issued: AtomicU64::new(0),
            served: Mutex::new(Served {
                through: 0,
                outcome: Ok(SaveOutcome::Unchanged),
            }),
        }
    }

    pub(crate) fn ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) async fn turn(&self) -> MutexGuard<'_, ()> {
        self.turn.lock().await
    }

    pub(crate) async fn checkpoint_turn(&self) -> MutexGuard<'_, ()> {
        self.checkpoint.lock().await
    }

    /// Highest ticket issued so far. Read while holding the turn, right
    /// before snapshotting the buffer.
    pub(crate) fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// The outcome of an earlier write that already covered `ticket`
    pub(crate) fn covered(&self, ticket: u64) -> Option<Result<SaveOutcome, SaveError>> {
        let served = self.served.lock();
        (served.through >= ticket).then(|| {
            served
                .outcome
                .clone()
                .map(|_| SaveOutcome::Coalesced)
        })
    }

    pub(crate) fn record(&self, through: u64, outcome: Result<SaveOutcome, SaveError>) {
        let mut served = self.served.lock();
        served.through = served.through.max(through);
        served.outcome = outcome;
    }
}
