//! Dual-timer debounce, one task per open document.
//!
//! Every edit restarts two deadlines: a short one for the crash-recovery
//! checkpoint and a longer one for the canonical save. Edits reach the task
//! through a `watch` channel, so a burst of keystrokes costs one flag update
//! each and the task only ever sees the latest signal.
//!
//! The task holds the coordinator weakly. It ends when the document's signal
//! sender is dropped (document closed) or the coordinator is gone.

use super::{Inner, OpenDocument};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerSignal {
    Idle,
    /// Content changed: restart both deadlines.
    Edited,
    /// An immediate save superseded the pending one.
    SaveCancelled,
}

pub(crate) async fn run_document_timers(
    inner: Weak<Inner>,
    doc: Arc<OpenDocument>,
    mut signal: watch::Receiver<TimerSignal>,
) {
    loop {
        if signal.changed().await.is_err() {
            break;
        }
        if *signal.borrow_and_update() != TimerSignal::Edited {
            continue;
        }
        let Some(config) = inner.upgrade().map(|inner| inner.config.clone()) else {
            break;
        };

        let now = Instant::now();
        let mut checkpoint_at = Some(now + config.checkpoint_delay());
        let mut save_at = Some(now + config.autosave_delay());
        let mut failures = 0u32;

        while checkpoint_at.is_some() || save_at.is_some() {
            tokio::select! {
                changed = signal.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    match *signal.borrow_and_update() {
                        TimerSignal::Edited => {
                            let now = Instant::now();
                            checkpoint_at = Some(now + config.checkpoint_delay());
                            save_at = Some(now + config.autosave_delay());
                            failures = 0;
                        }
                        TimerSignal::SaveCancelled => save_at = None,
                        TimerSignal::Idle => {}
                    }
                }
                _ = sleep_until(checkpoint_at.unwrap_or_else(Instant::now)), if checkpoint_at.is_some() => {
                    checkpoint_at = None;
                    let Some(inner) = inner.upgrade() else {
                        return;
                    };
                    inner.checkpoint(&doc).await;
                }
                _ = sleep_until(save_at.unwrap_or_else(Instant::now)), if save_at.is_some() => {
                    let Some(inner) = inner.upgrade() else {
                        return;
                    };
                    save_at = inner.autosave_due(&doc, &mut failures).await;
                }
            }
        }
    }
    crate::debug_trace!("SAVE", "Timer task for {} finished", doc.id);
}
