//! The event log's closed tagged union.
//!
//! Every entry in a session is an `EventRecord`: a unique, strictly
//! increasing `sequence`, a wall-clock `timestamp` in milliseconds, and one
//! `EventPayload` variant. Extending the log means adding a variant here and
//! handling it in the exhaustive matches that serialize and classify; there
//! are no ad hoc string tags.

use serde::{Deserialize, Serialize};

use super::text_diff::ContentDelta;
use super::viewport::{TerminalViewport, ViewportState};

/// The actor a recorded action is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    /// The human operator at the keyboard
    User,
    /// An autonomous coding agent editing the workspace
    Agent,
    /// External tooling (shell output, processes outside the editor)
    External,
    /// No baseline exists to attribute against (creations, deletions)
    Unknown,
    /// An ordinary version-control operation
    Vcs,
    /// A version-control operation that moved the HEAD reference
    VcsCheckout,
}

/// What happened to a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One event in the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// The kinds of events a session records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// A snapshot of visible editor/terminal state
    Observation {
        viewport: Option<ViewportState>,
        terminal: Option<TerminalViewport>,
    },
    /// A document edit committed in the editor
    Edit {
        source: ActionSource,
        file: String,
        range_offset: usize,
        range_length: usize,
        text: String,
        undo_redo: bool,
    },
    /// The cursor/selection settled somewhere new
    Selection {
        source: ActionSource,
        file: String,
        line: u32,
        column: u32,
    },
    /// The active document changed
    TabSwitch {
        source: ActionSource,
        file: Option<String>,
    },
    /// A terminal gained focus
    TerminalFocus {
        source: ActionSource,
        terminal_id: String,
        name: String,
    },
    /// A command was started in a terminal
    TerminalCommand {
        source: ActionSource,
        terminal_id: String,
        command: String,
    },
    /// A chunk of terminal output arrived
    TerminalOutput {
        source: ActionSource,
        terminal_id: String,
        output: String,
    },
    /// A file changed on disk, with the attributed diff
    FileChange {
        source: ActionSource,
        file: String,
        change: FileChangeKind,
        delta: ContentDelta,
    },
    /// Reference to an out-of-band compressed capture of the workspace
    WorkspaceSnapshot { artifact: String },
}

impl EventPayload {
    /// The attributed source, for action variants.
    pub fn source(&self) -> Option<ActionSource> {
        match self {
            Self::Observation { .. } | Self::WorkspaceSnapshot { .. } => None,
            Self::Edit { source, .. }
            | Self::Selection { source, .. }
            | Self::TabSwitch { source, .. }
            | Self::TerminalFocus { source, .. }
            | Self::TerminalCommand { source, .. }
            | Self::TerminalOutput { source, .. }
            | Self::FileChange { source, .. } => Some(*source),
        }
    }

    /// True for actions performed by the human operator.
    pub fn is_user_action(&self) -> bool {
        self.source() == Some(ActionSource::User)
    }
}
