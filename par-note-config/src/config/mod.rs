//! Workspace engine configuration.
//!
//! # Sub-modules
//!
//! - [`persistence`] - `impl Config` methods for load/save and path resolution
//!
//! Every field carries a serde default so that older or hand-trimmed YAML
//! files keep loading; unknown keys are ignored.

pub mod persistence;

use crate::error::ConfigError;
use crate::types::LogLevel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Save scheduling (checkpoints, autosave, exit flush)
    #[serde(default)]
    pub save: SaveConfig,

    /// Workspace layout and state file settings
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Log level for the debug log file (overridden by `--log-level` / `RUST_LOG`)
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Timing and recovery settings for the save coordinator
///
/// The durations are tunables rather than contracts; the only relationship
/// the coordinator relies on is that checkpoints are taken more often than
/// canonical saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveConfig {
    /// Quiet period after the last edit before a crash-recovery checkpoint is written
    #[serde(default = "crate::defaults::checkpoint_delay_ms")]
    pub checkpoint_delay_ms: u64,

    /// Quiet period after the last edit before the canonical file is rewritten
    #[serde(default = "crate::defaults::autosave_delay_ms")]
    pub autosave_delay_ms: u64,

    /// A timer-driven canonical write is deferred while the last edit is younger than this
    #[serde(default = "crate::defaults::typing_holdoff_ms")]
    pub typing_holdoff_ms: u64,

    /// Retries for a failed timer-driven save before waiting for the next edit
    #[serde(default = "crate::defaults::autosave_retry_limit")]
    pub autosave_retry_limit: u32,

    /// Upper bound on the save-all pass run at exit
    #[serde(default = "crate::defaults::exit_save_timeout_ms")]
    pub exit_save_timeout_ms: u64,

    /// Reopen documents with their checkpoint content when it differs from the canonical file
    #[serde(default = "crate::defaults::bool_true")]
    pub recover_checkpoints_on_open: bool,

    /// Directory for checkpoint files (default: `<config dir>/checkpoints`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            checkpoint_delay_ms: crate::defaults::checkpoint_delay_ms(),
            autosave_delay_ms: crate::defaults::autosave_delay_ms(),
            typing_holdoff_ms: crate::defaults::typing_holdoff_ms(),
            autosave_retry_limit: crate::defaults::autosave_retry_limit(),
            exit_save_timeout_ms: crate::defaults::exit_save_timeout_ms(),
            recover_checkpoints_on_open: true,
            checkpoint_dir: None,
        }
    }
}

impl SaveConfig {
    pub fn checkpoint_delay(&self) -> Duration {
        Duration::from_millis(self.checkpoint_delay_ms)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn typing_holdoff(&self) -> Duration {
        Duration::from_millis(self.typing_holdoff_ms)
    }

    pub fn exit_save_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_save_timeout_ms)
    }
}

/// Pane/tab layout settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Reopen the previous session's panes and tabs on startup
    #[serde(default = "crate::defaults::bool_true")]
    pub restore_on_startup: bool,

    /// Maximum number of side-by-side panes
    #[serde(default = "crate::defaults::max_panes")]
    pub max_panes: usize,

    /// Workspace state file (default: `<config dir>/workspace.yaml`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            restore_on_startup: true,
            max_panes: crate::defaults::max_panes(),
            state_file: None,
        }
    }
}

impl Config {
    /// Check field values that serde cannot reject on its own.
    ///
    /// Zero delays are rejected because they would turn every keystroke into
    /// a disk write. A checkpoint delay that is not shorter than the autosave
    /// delay is allowed but logged, since checkpoints then never precede the
    /// canonical save.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.save.checkpoint_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "save.checkpoint_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.save.autosave_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "save.autosave_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.workspace.max_panes == 0 {
            return Err(ConfigError::Validation(
                "workspace.max_panes must be at least 1".to_string(),
            ));
        }
        if self.save.checkpoint_delay_ms >= self.save.autosave_delay_ms {
            log::warn!(
                "save.checkpoint_delay_ms ({}) is not shorter than save.autosave_delay_ms ({}); \
                 checkpoints will rarely be taken",
                self.save.checkpoint_delay_ms,
                self.save.autosave_delay_ms
            );
        }
        Ok(())
    }
}
