// Library exports for testing and potential library use
//
// # Mutex Usage Policy
//
// par-note uses two mutex types for different concurrency scenarios.
// New code should follow these rules:
//
//   - `parking_lot::Mutex`    - use for sync-only state touched from both the
//                               interaction path and background tasks (document
//                               buffers, the open-document map, the persister
//                               slot). Never hold one across an `.await`.
//
//   - `tokio::sync::Mutex`    - use only where a lock must be held across an
//                               `.await`: the per-document save turn, which
//                               stays locked for the whole canonical write.
//
// Lock order: the open-document map before a document buffer. The save turn
// is taken without holding either.

/// Application version (root crate version, for use by sub-crates).
/// Sub-crates should receive this via parameter rather than using
/// `env!("CARGO_PKG_VERSION")` which resolves to the sub-crate's version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod app;
pub mod cli;
pub mod config {
    //! Configuration re-exports from the par-note-config crate.
    pub use par_note_config::*;
}
pub mod document;
pub mod editor;
pub mod error;
pub mod pane;
pub mod save;
pub mod session;
pub mod storage;
pub mod tab;
pub mod workspace;
