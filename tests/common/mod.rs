//! Shared test harness: a scriptable editor view and engine construction
//! against temp directories and a logical clock.

pub mod tracing;

use std::path::Path;
use std::sync::{Arc, Mutex};

use scribe::config::CaptureConfig;
use scribe::engine::CaptureEngine;
use scribe::host::{DocumentView, EditorView};
use scribe::model::event::{EventPayload, EventRecord};
use scribe::model::viewport::Position;
use scribe::services::time_source::TestTimeSource;

/// An `EditorView` whose visible state tests set directly.
#[derive(Default)]
pub struct ScriptedView {
    doc: Mutex<Option<DocumentView>>,
}

impl ScriptedView {
    pub fn show(
        &self,
        file: &Path,
        content: &str,
        visible_ranges: Vec<(u32, u32)>,
        cursor: Option<Position>,
    ) {
        *self.doc.lock().unwrap() = Some(DocumentView {
            file: file.to_path_buf(),
            content: content.to_string(),
            visible_ranges,
            cursor,
        });
    }

    pub fn clear(&self) {
        *self.doc.lock().unwrap() = None;
    }
}

impl EditorView for ScriptedView {
    fn active_document(&self) -> Option<DocumentView> {
        self.doc.lock().unwrap().clone()
    }
}

/// Build an engine over `workspace` exporting into `export`, on a logical clock.
pub fn engine_with(
    workspace: &Path,
    export: &Path,
) -> (CaptureEngine, Arc<TestTimeSource>, Arc<ScriptedView>) {
    let mut config = CaptureConfig::new(workspace);
    config.export_dir = Some(export.to_path_buf());
    let time = TestTimeSource::shared();
    let view = Arc::new(ScriptedView::default());
    let engine = CaptureEngine::new(config, view.clone(), time.clone());
    (engine, time, view)
}

/// The `kind` tag of each event, in log order, for shape assertions.
pub fn event_kinds(events: &[EventRecord]) -> Vec<&'static str> {
    events
        .iter()
        .map(|e| match &e.payload {
            EventPayload::Observation { .. } => "observation",
            EventPayload::Edit { .. } => "edit",
            EventPayload::Selection { .. } => "selection",
            EventPayload::TabSwitch { .. } => "tab_switch",
            EventPayload::TerminalFocus { .. } => "terminal_focus",
            EventPayload::TerminalCommand { .. } => "terminal_command",
            EventPayload::TerminalOutput { .. } => "terminal_output",
            EventPayload::FileChange { .. } => "file_change",
            EventPayload::WorkspaceSnapshot { .. } => "workspace_snapshot",
        })
        .collect()
}

/// Assert sequences are strictly increasing and contiguous.
pub fn assert_contiguous(events: &[EventRecord]) {
    for pair in events.windows(2) {
        assert_eq!(
            pair[1].sequence,
            pair[0].sequence + 1,
            "sequence gap between {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}
