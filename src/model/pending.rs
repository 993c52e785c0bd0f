//! Per-file buffers of user edits awaiting correlation with an on-disk change.
//!
//! Every document-change notification lands here until the matching save is
//! observed on disk. Replaying a file's buffer over its cached old content
//! reconstructs the user-only baseline used by three-way attribution.
//! Buffers are hard-capped; once a buffer overflows its replay would be
//! incomplete, so the whole buffer is treated as absent and classification
//! falls back to a full diff.

use std::collections::HashMap;

/// A single buffered document edit, in host notification order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    /// Byte offset of the replaced range in the document at the time of the edit
    pub range_offset: usize,
    /// Byte length of the replaced range
    pub range_length: usize,
    /// Replacement text
    pub text: String,
}

#[derive(Debug, Default)]
struct FileBuffer {
    edits: Vec<PendingEdit>,
    overflowed: bool,
}

/// Ordered pending-edit buffers keyed by file, capped per file.
#[derive(Debug)]
pub struct PendingEdits {
    buffers: HashMap<String, FileBuffer>,
    per_file_cap: usize,
}

impl PendingEdits {
    pub fn new(per_file_cap: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            per_file_cap,
        }
    }

    /// Buffer an edit for `file`. On overflow the oldest edit is evicted and
    /// the buffer is marked incomplete.
    pub fn push(&mut self, file: &str, edit: PendingEdit) {
        let buffer = self.buffers.entry(file.to_string()).or_default();
        buffer.edits.push(edit);
        if buffer.edits.len() > self.per_file_cap {
            buffer.edits.remove(0);
            buffer.overflowed = true;
        }
    }

    /// Whether any edits are buffered for `file` (including overflowed buffers).
    pub fn has_edits(&self, file: &str) -> bool {
        self.buffers.get(file).is_some_and(|b| !b.edits.is_empty())
    }

    /// Remove and return the buffer for `file`, if it is complete.
    ///
    /// An overflowed buffer is removed but reported as `None`: its replay
    /// would silently misattribute, so the caller degrades to a full diff.
    pub fn take(&mut self, file: &str) -> Option<Vec<PendingEdit>> {
        let buffer = self.buffers.remove(file)?;
        if buffer.overflowed || buffer.edits.is_empty() {
            return None;
        }
        Some(buffer.edits)
    }

    /// Drop the buffer for one file.
    pub fn clear_file(&mut self, file: &str) {
        self.buffers.remove(file);
    }

    /// Drop every buffer (version-control operation or session reset).
    pub fn clear_all(&mut self) {
        self.buffers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Replay `edits` in order over `base`, producing the user-only baseline.
///
/// Each edit replaces the byte range `[range_offset, range_offset + range_length)`
/// with its text. Returns `None` when an edit does not fit the evolving
/// content (stale offsets, non-boundary slice); callers fall back to a full
/// diff rather than guessing.
pub fn replay(base: &str, edits: &[PendingEdit]) -> Option<String> {
    let mut text = base.to_string();
    for edit in edits {
        let end = edit.range_offset.checked_add(edit.range_length)?;
        if end > text.len()
            || !text.is_char_boundary(edit.range_offset)
            || !text.is_char_boundary(end)
        {
            return None;
        }
        text.replace_range(edit.range_offset..end, &edit.text);
    }
    Some(text)
}
