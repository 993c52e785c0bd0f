//! Capture engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Root of the tracked workspace
    pub workspace_root: PathBuf,

    /// Where chunks and snapshots are written; defaults to the platform data dir
    #[serde(default)]
    pub export_dir: Option<PathBuf>,

    /// Control endpoint issuing short-lived upload URLs; unset disables upload
    #[serde(default)]
    pub upload_endpoint: Option<String>,

    /// Whether the user consented to uploading captured sessions
    #[serde(default)]
    pub upload_consent: bool,

    /// Extra gitignore-style exclusion patterns
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Files larger than this are never tracked
    #[serde(default = "default_max_tracked_file_bytes")]
    pub max_tracked_file_bytes: u64,

    #[serde(default = "default_content_cache_entries")]
    pub content_cache_entries: usize,

    /// Buffered user edits per file before the buffer degrades to full-diff
    #[serde(default = "default_pending_edit_cap")]
    pub pending_edit_cap: usize,

    /// Trailing lines kept per terminal
    #[serde(default = "default_terminal_viewport_lines")]
    pub terminal_viewport_lines: usize,

    /// How long after a version-control signal a change burst is classified as VCS
    #[serde(default = "default_vcs_window_ms")]
    pub vcs_window_ms: u64,

    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_terminal_poll_interval_ms")]
    pub terminal_poll_interval_ms: u64,

    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,

    /// Base panic-redaction window; grows by this much per chained press
    #[serde(default = "default_redaction_window_secs")]
    pub redaction_window_secs: u64,

    /// Presses within this many seconds of the previous one chain the window
    #[serde(default = "default_redaction_chain_gap_secs")]
    pub redaction_chain_gap_secs: u64,

    /// Snapshot artifacts above this size split into fixed-size parts
    #[serde(default = "default_snapshot_part_bytes")]
    pub snapshot_part_bytes: usize,
}

fn default_max_tracked_file_bytes() -> u64 {
    100 * 1024
}

fn default_content_cache_entries() -> usize {
    5000
}

fn default_pending_edit_cap() -> usize {
    1000
}

fn default_terminal_viewport_lines() -> usize {
    20
}

fn default_vcs_window_ms() -> u64 {
    500
}

fn default_sample_interval_ms() -> u64 {
    100
}

fn default_terminal_poll_interval_ms() -> u64 {
    1000
}

fn default_save_interval_secs() -> u64 {
    5 * 60
}

fn default_redaction_window_secs() -> u64 {
    10
}

fn default_redaction_chain_gap_secs() -> u64 {
    3
}

fn default_snapshot_part_bytes() -> usize {
    5 * 1024 * 1024
}

impl CaptureConfig {
    /// Configuration for a workspace with every tunable at its default.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            export_dir: None,
            upload_endpoint: None,
            upload_consent: false,
            ignore_patterns: Vec::new(),
            max_tracked_file_bytes: default_max_tracked_file_bytes(),
            content_cache_entries: default_content_cache_entries(),
            pending_edit_cap: default_pending_edit_cap(),
            terminal_viewport_lines: default_terminal_viewport_lines(),
            vcs_window_ms: default_vcs_window_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            terminal_poll_interval_ms: default_terminal_poll_interval_ms(),
            save_interval_secs: default_save_interval_secs(),
            redaction_window_secs: default_redaction_window_secs(),
            redaction_chain_gap_secs: default_redaction_chain_gap_secs(),
            snapshot_part_bytes: default_snapshot_part_bytes(),
        }
    }

    /// The effective export directory: explicit config, or the platform data
    /// dir, or a dot-directory fallback when neither resolves.
    pub fn effective_export_dir(&self) -> PathBuf {
        if let Some(dir) = &self.export_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("scribe"))
            .unwrap_or_else(|| self.workspace_root.join(".scribe"))
    }
}
