//! Shared integration test helpers for par-note.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::{CountingStorage, fast_save_config, TestContext};
//! ```
//!
//! Note: Rust integration tests use `mod common;` (not `use`) to bring in
//! helpers from `tests/common/mod.rs`. The `#[allow(dead_code)]` attributes
//! suppress warnings when only a subset of helpers are used per file.

#![allow(dead_code)]

use par_note::config::{Config, SaveConfig};
use par_note::document::DocumentId;
use par_note::editor::{EditorSurface, SurfaceFactory};
use par_note::save::{SaveCoordinator, SaveEvent};
use par_note::storage::{FsStorage, Storage};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Checkpoint debounce used by the integration tests
pub const CHECKPOINT_MS: u64 = 40;
/// Autosave debounce used by the integration tests
pub const AUTOSAVE_MS: u64 = 400;

/// Save timings short enough for tests while keeping the checkpoint well
/// ahead of the canonical save.
pub fn fast_save_config() -> SaveConfig {
    SaveConfig {
        checkpoint_delay_ms: CHECKPOINT_MS,
        autosave_delay_ms: AUTOSAVE_MS,
        typing_holdoff_ms: 0,
        autosave_retry_limit: 2,
        exit_save_timeout_ms: 2000,
        recover_checkpoints_on_open: true,
        checkpoint_dir: None,
    }
}

/// A `Config` whose state file and checkpoint directory live in `dir`
pub fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.save = fast_save_config();
    config.save.checkpoint_dir = Some(dir.join("checkpoints"));
    config.workspace.state_file = Some(dir.join("workspace.yaml"));
    config
}

#[derive(Default)]
struct Counters {
    /// Successful writes per path, with the bytes written
    writes: HashMap<PathBuf, Vec<Vec<u8>>>,
    in_flight: HashMap<PathBuf, usize>,
    max_in_flight: HashMap<PathBuf, usize>,
}

/// File system storage that records every write and can be told to fail or
/// slow down writes to selected paths.
#[derive(Default)]
pub struct CountingStorage {
    inner: FsStorage,
    counters: Mutex<Counters>,
    failing: Mutex<HashSet<PathBuf>>,
    write_delay: Mutex<Duration>,
}

impl CountingStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Successful writes to `path`
    pub fn writes_to(&self, path: &Path) -> usize {
        self.counters
            .lock()
            .writes
            .get(path)
            .map_or(0, |w| w.len())
    }

    /// Content of the most recent successful write to `path`
    pub fn last_write(&self, path: &Path) -> Option<String> {
        self.counters
            .lock()
            .writes
            .get(path)
            .and_then(|w| w.last())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Highest number of overlapping writes to `path` ever observed
    pub fn max_concurrent_writes(&self, path: &Path) -> usize {
        self.counters
            .lock()
            .max_in_flight
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_writes_to(&self, path: &Path, fail: bool) {
        let mut failing = self.failing.lock();
        if fail {
            failing.insert(path.to_path_buf());
        } else {
            failing.remove(path);
        }
    }

    /// Make every write take at least `delay`
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }
}

impl Storage for CountingStorage {
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        {
            let mut counters = self.counters.lock();
            let in_flight = counters.in_flight.entry(path.to_path_buf()).or_default();
            *in_flight += 1;
            let now = *in_flight;
            let max = counters.max_in_flight.entry(path.to_path_buf()).or_default();
            *max = (*max).max(now);
        }

        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let result = if self.failing.lock().contains(path) {
            Err(io::Error::other("injected write failure"))
        } else {
            self.inner.write(path, bytes)
        };

        let mut counters = self.counters.lock();
        if let Some(in_flight) = counters.in_flight.get_mut(path) {
            *in_flight -= 1;
        }
        if result.is_ok() {
            counters
                .writes
                .entry(path.to_path_buf())
                .or_default()
                .push(bytes.to_vec());
        }
        result
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.inner.remove(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        self.inner.list(dir)
    }
}

/// Editor surface that counts how often it was disposed
#[derive(Default)]
pub struct TestSurface {
    text: String,
    disposed: Arc<AtomicUsize>,
}

impl EditorSurface for TestSurface {
    fn serialized_content(&self) -> String {
        self.text.clone()
    }

    fn load_serialized_content(&mut self, content: &str) {
        self.text = content.to_string();
    }

    fn dispose(&mut self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Surface factory plus the shared dispose counter of every surface it made
pub fn counting_surfaces() -> (SurfaceFactory, Arc<AtomicUsize>) {
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disposed);
    let factory: SurfaceFactory = Arc::new(move |_id: DocumentId| {
        Box::new(TestSurface {
            text: String::new(),
            disposed: Arc::clone(&counter),
        }) as Box<dyn EditorSurface>
    });
    (factory, disposed)
}

/// Temp directory, instrumented storage and a coordinator wired to both.
///
/// The `TempDir` must be kept alive for the duration of the test.
pub struct TestContext {
    pub dir: TempDir,
    pub storage: Arc<CountingStorage>,
    pub coordinator: SaveCoordinator,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(fast_save_config())
    }

    pub fn with_config(config: SaveConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let storage = CountingStorage::new();
        let coordinator = SaveCoordinator::new(
            storage.clone(),
            config,
            dir.path().join("checkpoints"),
        );
        Self {
            dir,
            storage,
            coordinator,
        }
    }

    /// Path of a note inside the temp dir
    pub fn note(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create a note on disk with the given content
    pub fn write_note(&self, name: &str, content: &str) -> PathBuf {
        let path = self.note(name);
        std::fs::write(&path, content).expect("Failed to write note");
        path
    }

    pub fn checkpoint_path(&self, id: DocumentId) -> PathBuf {
        self.dir
            .path()
            .join("checkpoints")
            .join(format!("{id}.json"))
    }
}

pub fn read_note(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

/// Wait for the first event matching `pred`, failing after `timeout`
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<SaveEvent>,
    timeout: Duration,
    pred: impl Fn(&SaveEvent) -> bool,
) -> SaveEvent {
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for save event")
}
