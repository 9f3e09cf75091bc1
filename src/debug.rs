//! Unified logging for par-note
//!
//! Installs a `log::Log` implementation so that every `log::info!()` etc. in
//! the workspace ends up in one place:
//!
//! - /tmp/par_note_debug.log on Unix/macOS
//! - %TEMP%\par_note_debug.log on Windows
//!
//! When `RUST_LOG` is set the same lines are mirrored to stderr.
//!
//! Level precedence: CLI `--log-level`, then `RUST_LOG`, then the config file
//! (applied later through [`set_level`] once the config has been loaded).
use crate::config::LogLevel;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

struct LogBridge {
    file: Mutex<Option<File>>,
    mirror_stderr: bool,
}

static BRIDGE: OnceLock<LogBridge> = OnceLock::new();

/// Whether the level was pinned by the CLI or `RUST_LOG` and must not be
/// replaced by the config value.
static LEVEL_PINNED: AtomicBool = AtomicBool::new(false);

/// Get the path of the debug log file
pub fn log_path() -> PathBuf {
    #[cfg(unix)]
    {
        PathBuf::from("/tmp/par_note_debug.log")
    }
    #[cfg(not(unix))]
    {
        std::env::temp_dir().join("par_note_debug.log")
    }
}

fn get_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{:<5}] [{}] {}\n",
            get_timestamp(),
            record.level(),
            record.target(),
            record.args()
        );
        if let Some(file) = self.file.lock().as_mut() {
            // A failing log write must never take the application down
            let _ = file.write_all(line.as_bytes());
        }
        if self.mirror_stderr {
            eprint!("{line}");
        }
    }

    fn flush(&self) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

fn level_from_env() -> Option<LogLevel> {
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| LogLevel::from_name(&value))
}

/// Install the log bridge.
///
/// `cli_level` wins over `RUST_LOG`; when neither is given the level stays at
/// `Info` until [`set_level`] applies the config value. Calling this more than
/// once is harmless.
pub fn init_log_bridge(cli_level: Option<LogLevel>) {
    let env_level = level_from_env();
    let pinned = cli_level.or(env_level);
    let level = pinned.unwrap_or(LogLevel::Info);
    LEVEL_PINNED.store(pinned.is_some(), Ordering::Relaxed);

    let bridge = BRIDGE.get_or_init(|| {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(log_path())
            .ok();
        LogBridge {
            file: Mutex::new(file),
            mirror_stderr: std::env::var_os("RUST_LOG").is_some(),
        }
    });

    // Already installed by an earlier call (tests, embedding applications)
    if log::set_logger(bridge).is_ok() {
        log::info!(
            "par-note {} debug session started (level={:?})",
            crate::VERSION,
            level
        );
    }
    log::set_max_level(level.to_level_filter());
}

/// Apply the level from the config file unless the CLI or `RUST_LOG` pinned one
pub fn set_level(level: LogLevel) {
    if LEVEL_PINNED.load(Ordering::Relaxed) {
        return;
    }
    log::set_max_level(level.to_level_filter());
}

// Convenience macros for category-tagged logging. The category becomes the
// log target, so `[SAVE]` / `[WORKSPACE]` / `[SESSION]` show up in the file.
#[macro_export]
macro_rules! debug_error {
    ($category:expr, $($arg:tt)*) => {
        ::log::error!(target: $category, $($arg)*)
    };
}

#[macro_export]
macro_rules! debug_info {
    ($category:expr, $($arg:tt)*) => {
        ::log::info!(target: $category, $($arg)*)
    };
}

#[macro_export]
macro_rules! debug_log {
    ($category:expr, $($arg:tt)*) => {
        ::log::debug!(target: $category, $($arg)*)
    };
}

#[macro_export]
macro_rules! debug_trace {
    ($category:expr, $($arg:tt)*) => {
        ::log::trace!(target: $category, $($arg)*)
    };
}
