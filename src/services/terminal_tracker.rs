//! Per-terminal rolling buffers and stable identities.
//!
//! Each terminal process gets an opaque `term-N` id on first sight,
//! independent of its display name (names collide and get reused; ids never
//! do within a process). The tracker keeps a bounded trailing-line buffer per
//! terminal — no escape-sequence emulation, just line-split text with
//! front-truncation — and remembers which terminal holds focus. Output
//! chunks are appended by the engine's serialized path; the async draining
//! of host output streams lives in the runtime, not here.

use std::collections::{HashMap, VecDeque};

use crate::model::viewport::TerminalViewport;

#[derive(Debug)]
struct TerminalBuffer {
    name: String,
    lines: VecDeque<String>,
    /// The last line is still receiving text (previous chunk had no trailing newline)
    line_open: bool,
    /// Output arrived since the last viewport poll
    new_output: bool,
}

/// Tracks terminal identities, focus and rolling buffers.
///
/// Identities persist warm across recording sessions within the process;
/// only closing a terminal discards them.
#[derive(Debug)]
pub struct TerminalTracker {
    terminals: HashMap<String, TerminalBuffer>,
    focused: Option<String>,
    next_id: u64,
    max_lines: usize,
}

impl TerminalTracker {
    pub fn new(max_lines: usize) -> Self {
        Self {
            terminals: HashMap::new(),
            focused: None,
            next_id: 0,
            max_lines: max_lines.max(1),
        }
    }

    /// Assign a stable id to a newly seen terminal.
    pub fn register(&mut self, name: &str) -> String {
        let id = format!("term-{}", self.next_id);
        self.next_id += 1;
        self.terminals.insert(
            id.clone(),
            TerminalBuffer {
                name: name.to_string(),
                lines: VecDeque::new(),
                line_open: false,
                new_output: false,
            },
        );
        id
    }

    /// Discard a closed terminal's buffer and identity.
    pub fn close(&mut self, id: &str) {
        self.terminals.remove(id);
        if self.focused.as_deref() == Some(id) {
            self.focused = None;
        }
    }

    /// Record a focus change; returns `(id, name)` for the notification.
    pub fn focus(&mut self, id: &str) -> Option<(String, String)> {
        let buffer = self.terminals.get(id)?;
        self.focused = Some(id.to_string());
        Some((id.to_string(), buffer.name.clone()))
    }

    pub fn focused_id(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Append the `"$ <command>"` marker line for a command start.
    pub fn command_started(&mut self, id: &str, command: &str) {
        if let Some(buffer) = self.terminals.get_mut(id) {
            push_line(buffer, format!("$ {command}"), self.max_lines);
            buffer.line_open = false;
        }
    }

    /// Append an output chunk, splitting on newlines and continuing any
    /// still-open last line. The buffer front-truncates past the line limit.
    pub fn append_output(&mut self, id: &str, chunk: &str) {
        let Some(buffer) = self.terminals.get_mut(id) else {
            return;
        };

        let ends_with_newline = chunk.ends_with('\n');
        let mut pieces: Vec<&str> = chunk.split('\n').collect();
        if ends_with_newline {
            // The final empty piece is the artifact of the trailing newline,
            // not a new line of content.
            pieces.pop();
        }

        for (i, piece) in pieces.iter().enumerate() {
            if i == 0 && buffer.line_open {
                if let Some(last) = buffer.lines.back_mut() {
                    last.push_str(piece);
                    continue;
                }
            }
            push_line(buffer, (*piece).to_string(), self.max_lines);
        }

        buffer.line_open = !ends_with_newline && !pieces.is_empty();
        buffer.new_output = true;
    }

    /// Whether output landed on `id` since the last call; clears the flag.
    pub fn take_new_output(&mut self, id: &str) -> bool {
        self.terminals
            .get_mut(id)
            .map(|b| std::mem::take(&mut b.new_output))
            .unwrap_or(false)
    }

    /// The trailing-line viewport for `id`, at most `limit` lines.
    pub fn viewport(&self, id: &str, limit: usize) -> Option<TerminalViewport> {
        let buffer = self.terminals.get(id)?;
        let skip = buffer.lines.len().saturating_sub(limit);
        Some(TerminalViewport {
            id: id.to_string(),
            name: buffer.name.clone(),
            lines: buffer.lines.iter().skip(skip).cloned().collect(),
        })
    }
}

fn push_line(buffer: &mut TerminalBuffer, line: String, max_lines: usize) {
    buffer.lines.push_back(line);
    while buffer.lines.len() > max_lines {
        buffer.lines.pop_front();
    }
}
