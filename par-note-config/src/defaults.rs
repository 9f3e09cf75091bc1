//! Default value functions for configuration.
//!
//! Each function is used as a `#[serde(default = "crate::defaults::...")]`
//! attribute on a config field, and by the matching `Default` impl.

// ── Primitive helpers ──────────────────────────────────────────────────────

pub fn bool_true() -> bool {
    true
}

// ── Save scheduling ────────────────────────────────────────────────────────

pub fn checkpoint_delay_ms() -> u64 {
    300
}

pub fn autosave_delay_ms() -> u64 {
    3000
}

pub fn typing_holdoff_ms() -> u64 {
    1000
}

pub fn autosave_retry_limit() -> u32 {
    3
}

pub fn exit_save_timeout_ms() -> u64 {
    2000
}

// ── Workspace ──────────────────────────────────────────────────────────────

pub fn max_panes() -> usize {
    2
}
