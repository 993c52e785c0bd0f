//! The boundary with the host editing application.
//!
//! The host supplies primitive signals — document changes, selection moves,
//! terminal lifecycle with an output stream, raw filesystem notifications —
//! and answers queries about currently visible state. Everything here is a
//! plain data type or a narrow trait so the engine can be driven by a real
//! editor or by a test harness interchangeably.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::model::viewport::Position;

/// A document change committed in the editor: the byte range
/// `[range_offset, range_offset + range_length)` was replaced by `text`.
#[derive(Debug, Clone)]
pub struct DocumentEdit {
    pub file: PathBuf,
    pub range_offset: usize,
    pub range_length: usize,
    pub text: String,
    /// Set when the change came from undo/redo rather than fresh input
    pub undo_redo: bool,
}

/// What caused a selection change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrigin {
    /// The cursor settled after typing; pairs with the preceding edit
    Typing,
    /// An editor command moved the selection
    Command,
    /// The pointer moved the selection
    Mouse,
}

/// The cursor/selection settled at a new position.
#[derive(Debug, Clone)]
pub struct SelectionChange {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub origin: SelectionOrigin,
}

/// A raw filesystem notification scoped to the workspace.
#[derive(Debug, Clone)]
pub enum FsNotification {
    Created(PathBuf),
    Changed(PathBuf),
    Deleted(PathBuf),
}

impl FsNotification {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Created(p) | Self::Changed(p) | Self::Deleted(p) => p,
        }
    }
}

/// Everything the engine needs to know about a host terminal, delivered once
/// when the terminal process starts. The host keys later notifications by its
/// own `key`; the tracker assigns the stable capture-side id.
#[derive(Debug)]
pub struct TerminalOpened {
    pub key: u64,
    pub name: String,
    /// The terminal's output stream; drained by a background task
    pub output: mpsc::Receiver<String>,
}

/// Notifications the host pushes into the capture runtime.
#[derive(Debug)]
pub enum HostNotification {
    Edit(DocumentEdit),
    Selection(SelectionChange),
    /// The active document changed
    TabSwitch { file: Option<PathBuf> },
    /// Visible ranges or scroll position changed
    ViewportChanged,
    TerminalOpened(TerminalOpened),
    TerminalFocused { key: u64 },
    TerminalCommand { key: u64, command: String },
    TerminalClosed { key: u64 },
    Fs(FsNotification),
}

/// A snapshot of the active document as the host currently displays it.
#[derive(Debug, Clone)]
pub struct DocumentView {
    pub file: PathBuf,
    /// Full document text
    pub content: String,
    /// Visible line ranges, 1-indexed inclusive; possibly several when the
    /// document is split across panes
    pub visible_ranges: Vec<(u32, u32)>,
    pub cursor: Option<Position>,
}

/// Query surface the viewport sampler polls for visible editor state.
pub trait EditorView: Send + Sync {
    /// The active document, or `None` when no editor has focus.
    fn active_document(&self) -> Option<DocumentView>;
}
