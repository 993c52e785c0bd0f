//! Minimal single-span diff between two text contents.
//!
//! A `ContentDelta` is the logged shape of every file change: the longest
//! common prefix and suffix are trimmed away and whatever remains is a single
//! replace of `removed` by `inserted` at `offset`. Applying the delta to the
//! before-content reproduces the after-content exactly, which is what makes
//! the event log replayable.

use serde::{Deserialize, Serialize};

/// A single contiguous text replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDelta {
    /// Byte offset into the before-content where the replacement starts
    pub offset: usize,
    /// Text removed from the before-content
    pub removed: String,
    /// Text inserted in its place
    pub inserted: String,
}

impl ContentDelta {
    /// Compute the minimal single-span delta transforming `old` into `new`.
    ///
    /// Prefix and suffix trimming is done on char boundaries so the resulting
    /// offsets always slice valid UTF-8.
    pub fn compute(old: &str, new: &str) -> Self {
        let prefix = common_prefix(old, new);
        let suffix = common_suffix(&old[prefix..], &new[prefix..]);

        Self {
            offset: prefix,
            removed: old[prefix..old.len() - suffix].to_string(),
            inserted: new[prefix..new.len() - suffix].to_string(),
        }
    }

    /// Apply this delta to `before`, returning the after-content.
    ///
    /// Returns `None` if the delta does not fit `before` (wrong offset or the
    /// removed span does not match), so callers can fall back instead of
    /// producing corrupt content.
    pub fn apply(&self, before: &str) -> Option<String> {
        let end = self.offset.checked_add(self.removed.len())?;
        if end > before.len()
            || !before.is_char_boundary(self.offset)
            || !before.is_char_boundary(end)
        {
            return None;
        }
        if &before[self.offset..end] != self.removed.as_str() {
            return None;
        }

        let mut after = String::with_capacity(before.len() - self.removed.len() + self.inserted.len());
        after.push_str(&before[..self.offset]);
        after.push_str(&self.inserted);
        after.push_str(&before[end..]);
        Some(after)
    }

    /// True when the delta changes nothing.
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_empty()
    }
}

/// Length in bytes of the longest common prefix of `a` and `b`,
/// aligned to a char boundary in both.
fn common_prefix(a: &str, b: &str) -> usize {
    let mut prefix = 0;
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca != cb {
            break;
        }
        prefix += ca.len_utf8();
    }
    prefix
}

/// Length in bytes of the longest common suffix of `a` and `b`,
/// aligned to a char boundary in both.
fn common_suffix(a: &str, b: &str) -> usize {
    let mut suffix = 0;
    for (ca, cb) in a.chars().rev().zip(b.chars().rev()) {
        if ca != cb {
            break;
        }
        suffix += ca.len_utf8();
    }
    suffix
}
