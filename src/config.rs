//! Run configuration for the memory/context-pack engine.
//!
//! There is no on-disk config file: every knob here is either a CLI flag
//! default or a fixed convention of the `.ai/` layout (mirrored from the
//! original tool's hardcoded constants). `MemoryConfig` exists as a single
//! place to carry those defaults through the library API, the way the
//! teacher carries pack-decode tuning through `PackConfig`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Repository-relative root directories and default git ref for a run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MemoryConfig {
    /// Root directory holding memory item subdirectories (`task/`, `adr/`, ...).
    pub memory_root: PathBuf,
    /// Root directory holding evidence artifacts referenced by `evidence[].ref`.
    pub evidence_root: PathBuf,
    /// Commit-ish used when the CLI's `--commit` flag is omitted.
    pub default_commit: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            memory_root: PathBuf::from(".ai/memory"),
            evidence_root: PathBuf::from(".ai/evidence"),
            default_commit: "HEAD".to_string(),
        }
    }
}
