//! Configuration system for the par-note workspace engine.
//!
//! This crate provides configuration loading, saving, and default values
//! for the note workspace. It includes:
//!
//! - Save scheduling settings (checkpoint / autosave debounce, typing holdoff)
//! - Workspace layout settings (pane limit, state file location)
//! - Log level selection
//! - Typed errors for config I/O and validation

pub mod config;
pub mod defaults;
pub mod error;
mod types;

// Re-export main types for convenience
pub use config::{Config, SaveConfig, WorkspaceConfig};
pub use error::ConfigError;
pub use types::LogLevel;
