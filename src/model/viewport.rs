//! Visible editor and terminal state captured by observations.

use serde::{Deserialize, Serialize};

/// A cursor position, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// The contiguous visible slice of the active document.
///
/// `start_line` and `end_line` are 1-indexed and inclusive; `content` is the
/// full text of exactly those lines. When a cursor is present it always lies
/// within the bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportState {
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Position>,
}

/// The trailing lines of a terminal's simulated screen.
///
/// `id` is the tracker-assigned stable identity; `name` is the display name,
/// which may collide or be reused across terminals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalViewport {
    pub id: String,
    pub name: String,
    pub lines: Vec<String>,
}
