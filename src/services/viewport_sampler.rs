//! Fixed-frequency sampling of visible editor and terminal state.
//!
//! A dirty flag set by host visibility notifications gates each tick, and a
//! content hash of the previous capture suppresses exact duplicates, so an
//! idle editor contributes nothing to the log. Observations taken right
//! after a user action bypass the duplicate check (the action makes the
//! moment meaningful even if the pixels did not move) but still refresh the
//! hash.

use sha2::{Digest, Sha256};

use crate::host::{DocumentView, EditorView};
use crate::model::viewport::{TerminalViewport, ViewportState};

/// The visible state captured by one sample.
pub type Capture = (Option<ViewportState>, Option<TerminalViewport>);

/// Deduplicating sampler of viewport state.
#[derive(Debug, Default)]
pub struct ViewportSampler {
    dirty: bool,
    last_hash: Option<[u8; 32]>,
}

impl ViewportSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a host visibility change; the next tick will capture.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Reset dedup state at session start.
    pub fn reset(&mut self) {
        self.dirty = false;
        self.last_hash = None;
    }

    /// Scroll-triggered capture: only when dirty, and suppressed when
    /// identical to the immediately preceding capture.
    pub fn sample(
        &mut self,
        view: &dyn EditorView,
        terminal: Option<TerminalViewport>,
    ) -> Option<Capture> {
        if !self.dirty {
            return None;
        }

        let viewport = view.active_document().and_then(build_viewport);
        self.dirty = false;
        if viewport.is_none() && terminal.is_none() {
            return None;
        }

        let hash = capture_hash(&viewport, &terminal);
        if self.last_hash == Some(hash) {
            return None;
        }
        self.last_hash = Some(hash);
        Some((viewport, terminal))
    }

    /// Post-action capture: exempt from duplicate suppression.
    pub fn capture_now(
        &mut self,
        view: &dyn EditorView,
        terminal: Option<TerminalViewport>,
    ) -> Capture {
        let viewport = view.active_document().and_then(build_viewport);
        self.last_hash = Some(capture_hash(&viewport, &terminal));
        self.dirty = false;
        (viewport, terminal)
    }
}

/// Compute the bounding union of the visible ranges and slice out the full
/// content of those lines.
fn build_viewport(doc: DocumentView) -> Option<ViewportState> {
    let line_count = doc.content.lines().count().max(1) as u32;

    let mut start_line = u32::MAX;
    let mut end_line = 0;
    for &(start, end) in &doc.visible_ranges {
        start_line = start_line.min(start.max(1));
        end_line = end_line.max(end);
    }
    if start_line == u32::MAX {
        return None;
    }
    let end_line = end_line.min(line_count);
    if start_line > end_line {
        return None;
    }

    let content = doc
        .content
        .lines()
        .skip(start_line as usize - 1)
        .take((end_line - start_line + 1) as usize)
        .collect::<Vec<_>>()
        .join("\n");

    Some(ViewportState {
        file: doc.file.to_string_lossy().into_owned(),
        start_line,
        end_line,
        content,
        cursor: doc.cursor,
    })
}

fn capture_hash(viewport: &Option<ViewportState>, terminal: &Option<TerminalViewport>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    if let Some(v) = viewport {
        hasher.update(v.file.as_bytes());
        hasher.update(v.start_line.to_le_bytes());
        hasher.update(v.end_line.to_le_bytes());
        hasher.update(v.content.as_bytes());
        if let Some(c) = v.cursor {
            hasher.update(c.line.to_le_bytes());
            hasher.update(c.column.to_le_bytes());
        }
    }
    if let Some(t) = terminal {
        hasher.update(t.id.as_bytes());
        for line in &t.lines {
            hasher.update(line.as_bytes());
            hasher.update([b'\n']);
        }
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::viewport::Position;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FixedView {
        doc: Mutex<Option<DocumentView>>,
    }

    impl FixedView {
        fn showing(content: &str, ranges: Vec<(u32, u32)>, cursor: Option<Position>) -> Self {
            Self {
                doc: Mutex::new(Some(DocumentView {
                    file: PathBuf::from("a.txt"),
                    content: content.to_string(),
                    visible_ranges: ranges,
                    cursor,
                })),
            }
        }
    }

    impl EditorView for FixedView {
        fn active_document(&self) -> Option<DocumentView> {
            self.doc.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_not_dirty_means_no_capture() {
        let view = FixedView::showing("hi", vec![(1, 1)], None);
        let mut sampler = ViewportSampler::new();
        assert!(sampler.sample(&view, None).is_none());
    }

    #[test]
    fn test_dirty_capture_then_duplicate_suppressed() {
        let view = FixedView::showing("a\nb\nc", vec![(1, 2)], None);
        let mut sampler = ViewportSampler::new();

        sampler.mark_dirty();
        let (viewport, _) = sampler.sample(&view, None).unwrap();
        let viewport = viewport.unwrap();
        assert_eq!(viewport.start_line, 1);
        assert_eq!(viewport.end_line, 2);
        assert_eq!(viewport.content, "a\nb");

        // Same state again: dirty but identical, so suppressed.
        sampler.mark_dirty();
        assert!(sampler.sample(&view, None).is_none());
    }

    #[test]
    fn test_bounding_union_of_split_ranges() {
        let view = FixedView::showing("1\n2\n3\n4\n5", vec![(4, 5), (1, 2)], None);
        let mut sampler = ViewportSampler::new();

        sampler.mark_dirty();
        let (viewport, _) = sampler.sample(&view, None).unwrap();
        let viewport = viewport.unwrap();
        assert_eq!((viewport.start_line, viewport.end_line), (1, 5));
        assert_eq!(viewport.content, "1\n2\n3\n4\n5");
    }

    #[test]
    fn test_end_line_clamped_to_document() {
        let view = FixedView::showing("only", vec![(1, 99)], None);
        let mut sampler = ViewportSampler::new();

        sampler.mark_dirty();
        let (viewport, _) = sampler.sample(&view, None).unwrap();
        let viewport = viewport.unwrap();
        assert_eq!((viewport.start_line, viewport.end_line), (1, 1));
    }

    #[test]
    fn test_capture_now_bypasses_suppression() {
        let view = FixedView::showing("hi", vec![(1, 1)], Some(Position { line: 1, column: 3 }));
        let mut sampler = ViewportSampler::new();

        let (first, _) = sampler.capture_now(&view, None);
        let (second, _) = sampler.capture_now(&view, None);
        assert_eq!(first, second);
        assert!(first.is_some());

        // But the refreshed hash still suppresses the next scroll sample.
        sampler.mark_dirty();
        assert!(sampler.sample(&view, None).is_none());
    }

    #[test]
    fn test_cursor_within_bounds() {
        let view = FixedView::showing("a\nb\nc", vec![(1, 3)], Some(Position { line: 2, column: 1 }));
        let mut sampler = ViewportSampler::new();

        let (viewport, _) = sampler.capture_now(&view, None);
        let viewport = viewport.unwrap();
        let cursor = viewport.cursor.unwrap();
        assert!(viewport.start_line <= cursor.line && cursor.line <= viewport.end_line);
    }
}
