//! Path-addressed byte storage.
//!
//! The save coordinator and the workspace persister never touch `std::fs`
//! directly; they go through a [`Storage`] handed to them at construction.
//! [`FsStorage`] is the local file system implementation. Writes are
//! crash-atomic: bytes go to a sibling temp file which is then renamed over
//! the target.
//!
//! The trait is synchronous. Async callers run it on
//! `tokio::task::spawn_blocking` (see [`read_blocking`] / [`write_blocking`]).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Byte-level read/write primitive
pub trait Storage: Send + Sync + 'static {
    /// Read the whole file. `Ok(None)` when it does not exist.
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    /// Replace the file's contents atomically, creating parent directories.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Remove the file. Removing a missing file is not an error.
    fn remove(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Files directly inside `dir`. A missing directory lists as empty.
    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Local file system storage
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

impl Storage for FsStorage {
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = Self::temp_path(path);
        fs::write(&temp_path, bytes)?;
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Run [`Storage::read`] on the blocking pool
pub async fn read_blocking(
    storage: &Arc<dyn Storage>,
    path: &Path,
) -> Result<io::Result<Option<Vec<u8>>>, tokio::task::JoinError> {
    let storage = Arc::clone(storage);
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || storage.read(&path)).await
}

/// Run [`Storage::write`] on the blocking pool
pub async fn write_blocking(
    storage: &Arc<dyn Storage>,
    path: &Path,
    bytes: Vec<u8>,
) -> Result<io::Result<()>, tokio::task::JoinError> {
    let storage = Arc::clone(storage);
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || storage.write(&path, &bytes)).await
}

/// Run [`Storage::remove`] on the blocking pool
pub async fn remove_blocking(
    storage: &Arc<dyn Storage>,
    path: &Path,
) -> Result<io::Result<()>, tokio::task::JoinError> {
    let storage = Arc::clone(storage);
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || storage.remove(&path)).await
}
