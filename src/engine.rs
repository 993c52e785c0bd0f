//! The attribution engine.
//!
//! Owns the one live `RecordingSession` and every tracker feeding it,
//! constructed by dependency injection so independent engines can coexist
//! under test. All entry points are liveness-guarded `&mut self` methods:
//! the runtime invokes them one at a time, which is what makes a single
//! counter sufficient for sequence assignment. Long-running work (snapshot
//! capture, uploads) is spawned off this path and marshals nothing back into
//! shared state.
//!
//! Attribution itself is the three-way diff: buffered user edits replayed
//! over the cached old content give the user-only baseline, and whatever
//! separates that baseline from the actual new content belongs to the agent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::config::CaptureConfig;
use crate::host::{DocumentEdit, EditorView, FsNotification, SelectionChange, SelectionOrigin};
use crate::model::event::{ActionSource, EventPayload, EventRecord, FileChangeKind};
use crate::model::pending::{replay, PendingEdit, PendingEdits};
use crate::model::session::{generate_session_id, RecordingSession};
use crate::model::text_diff::ContentDelta;
use crate::model::viewport::TerminalViewport;
use crate::services::content_cache::ContentCache;
use crate::services::fs_detector::{FileDelta, FsChangeDetector};
use crate::services::git_detector::{GitOperationDetector, VcsOperation};
use crate::services::ignore_filter::IgnoreFilter;
use crate::services::persistence::ChunkStore;
use crate::services::snapshot::SnapshotWriter;
use crate::services::terminal_tracker::TerminalTracker;
use crate::services::time_source::SharedTimeSource;
use crate::services::upload::{load_or_create_user_id, Uploader};
use crate::services::viewport_sampler::ViewportSampler;

/// Growing panic-redaction window: consecutive presses within the chain gap
/// widen the window by one base step; a pause resets it.
#[derive(Debug)]
struct RedactionLadder {
    base: Duration,
    chain_gap: Duration,
    window: Duration,
    last_press: Option<Instant>,
}

impl RedactionLadder {
    fn new(base: Duration, chain_gap: Duration) -> Self {
        Self {
            base,
            chain_gap,
            window: base,
            last_press: None,
        }
    }

    fn press(&mut self, now: Instant) -> Duration {
        match self.last_press {
            Some(prev) if now.saturating_duration_since(prev) <= self.chain_gap => {
                self.window += self.base;
            }
            _ => self.window = self.base,
        }
        self.last_press = Some(now);
        self.window
    }
}

/// The capture engine: classification, the event log, and tracker lifecycle.
pub struct CaptureEngine {
    config: CaptureConfig,
    time: SharedTimeSource,
    view: Arc<dyn EditorView>,

    session: Option<RecordingSession>,
    pending: PendingEdits,
    cache: ContentCache,
    ignore: IgnoreFilter,
    detector: FsChangeDetector,
    git: GitOperationDetector,
    terminals: TerminalTracker,
    sampler: ViewportSampler,

    store: Option<ChunkStore>,
    uploader: Option<Uploader>,
    snapshot_index: u32,

    /// An uninterrupted run of agent changes shares one workspace snapshot
    batch_active: bool,
    /// File whose committed edit still awaits its settle-selection observation
    awaiting_observation: Option<String>,
    redaction: RedactionLadder,
    save_in_flight: bool,
    save_failures: u32,
}

impl CaptureEngine {
    pub fn new(
        config: CaptureConfig,
        view: Arc<dyn EditorView>,
        time: SharedTimeSource,
    ) -> Self {
        let ignore = IgnoreFilter::new(&config.workspace_root, &config.ignore_patterns);
        let detector = FsChangeDetector::new(&config.workspace_root, config.max_tracked_file_bytes);
        let git = GitOperationDetector::new(
            time.clone(),
            Duration::from_millis(config.vcs_window_ms),
        );
        let terminals = TerminalTracker::new(config.terminal_viewport_lines);
        let pending = PendingEdits::new(config.pending_edit_cap);
        let cache = ContentCache::new(config.content_cache_entries);
        let redaction = RedactionLadder::new(
            Duration::from_secs(config.redaction_window_secs),
            Duration::from_secs(config.redaction_chain_gap_secs),
        );

        Self {
            config,
            time,
            view,
            session: None,
            pending,
            cache,
            ignore,
            detector,
            git,
            terminals,
            sampler: ViewportSampler::new(),
            store: None,
            uploader: None,
            snapshot_index: 0,
            batch_active: false,
            awaiting_observation: None,
            redaction,
            save_in_flight: false,
            save_failures: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// The unflushed event log, for inspection and tests.
    pub fn events(&self) -> &[EventRecord] {
        self.session.as_ref().map(|s| s.events.as_slice()).unwrap_or(&[])
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    // ========================================================================
    // Control surface
    // ========================================================================

    /// Start a recording session. Returns `Ok(false)` when one is already
    /// live (user-visible notice, not an error). Configuration problems — a
    /// missing workspace root, an unwritable export location — fail here
    /// once and are not retried.
    pub fn start_recording(&mut self) -> anyhow::Result<bool> {
        if self.session.is_some() {
            return Ok(false);
        }

        if !self.config.workspace_root.is_dir() {
            anyhow::bail!(
                "workspace root {:?} does not exist",
                self.config.workspace_root
            );
        }

        let export_dir = self.config.effective_export_dir();
        let session_id = generate_session_id();
        let start_time = self.time.epoch_millis();
        let store = ChunkStore::new(&export_dir, &session_id, start_time);
        store
            .ensure_dir()
            .with_context(|| format!("creating export directory {export_dir:?}"))?;

        self.uploader = match (&self.config.upload_endpoint, self.config.upload_consent) {
            (Some(endpoint), true) => {
                let user_id = load_or_create_user_id(&export_dir);
                Some(Uploader::new(endpoint, &user_id))
            }
            _ => None,
        };

        // Fresh per-session state; terminal identities and ignore rules stay warm.
        self.pending.clear_all();
        self.cache.clear();
        self.sampler.reset();
        self.batch_active = false;
        self.awaiting_observation = None;
        self.snapshot_index = 0;
        self.save_in_flight = false;
        self.save_failures = 0;

        tracing::info!("Recording started: session {}", session_id);
        self.session = Some(RecordingSession::new(session_id, start_time));
        self.store = Some(store);
        Ok(true)
    }

    /// Stop the live session, flushing a final chunk. Returns false when no
    /// session is live; nothing is mutated in that case.
    pub async fn stop_recording(&mut self) -> bool {
        if self.session.is_none() {
            return false;
        }

        let _ = self.save_chunk().await;
        if let Some(mut session) = self.session.take() {
            session.end_time = Some(self.time.epoch_millis());
            tracing::info!("Recording stopped: session {}", session.session_id);
        }
        self.store = None;
        self.uploader = None;
        self.awaiting_observation = None;
        self.batch_active = false;
        true
    }

    /// Remove recent events from the unflushed log. The window starts at the
    /// configured base and widens on rapid consecutive presses. Returns the
    /// number of events removed.
    pub fn redact_recent(&mut self) -> usize {
        let now = self.time.now();
        let now_millis = self.time.epoch_millis();
        let Some(session) = self.session.as_mut() else {
            return 0;
        };
        let window = self.redaction.press(now);
        let cutoff = now_millis.saturating_sub(window.as_millis() as u64);
        let removed = session.redact_since(cutoff);
        tracing::info!(
            "Panic redaction removed {} events ({}s window)",
            removed,
            window.as_secs()
        );
        removed
    }

    // ========================================================================
    // User-input signals
    // ========================================================================

    /// A document edit was committed in the editor.
    ///
    /// The Edit action is logged immediately; its Observation waits for the
    /// paired selection signal, because the cursor has not settled yet.
    pub fn record_edit(&mut self, edit: &DocumentEdit) {
        if self.session.is_none() {
            return;
        }
        let file = self.relative(&edit.file);
        self.note_user_action();
        self.pending.push(
            &file,
            PendingEdit {
                range_offset: edit.range_offset,
                range_length: edit.range_length,
                text: edit.text.clone(),
            },
        );
        self.log_event(EventPayload::Edit {
            source: ActionSource::User,
            file: file.clone(),
            range_offset: edit.range_offset,
            range_length: edit.range_length,
            text: edit.text.clone(),
            undo_redo: edit.undo_redo,
        });
        self.awaiting_observation = Some(file);
    }

    /// The selection settled. A typing-caused selection on the file with a
    /// deferred observation is the second half of its edit: it captures the
    /// observation without logging a Selection action of its own.
    pub fn record_selection(&mut self, selection: &SelectionChange) {
        if self.session.is_none() {
            return;
        }
        let file = self.relative(&selection.file);
        self.note_user_action();

        let pairs_edit = self.awaiting_observation.as_deref() == Some(file.as_str());
        if pairs_edit {
            self.awaiting_observation = None;
        }
        if !(pairs_edit && selection.origin == SelectionOrigin::Typing) {
            self.log_event(EventPayload::Selection {
                source: ActionSource::User,
                file,
                line: selection.line,
                column: selection.column,
            });
        }
        self.log_post_action_observation();
    }

    /// The active document changed.
    pub fn record_tab_switch(&mut self, file: Option<&Path>) {
        if self.session.is_none() {
            return;
        }
        self.note_user_action();
        let file = file.map(|f| self.relative(f));
        self.log_event(EventPayload::TabSwitch {
            source: ActionSource::User,
            file,
        });
        self.log_post_action_observation();
    }

    // ========================================================================
    // Terminal signals
    // ========================================================================

    /// A terminal process appeared; assign its stable id. Identity is
    /// tracked whether or not a session is live.
    pub fn terminal_opened(&mut self, name: &str) -> String {
        self.terminals.register(name)
    }

    /// A terminal went away; its buffer and identity are discarded.
    pub fn terminal_closed(&mut self, id: &str) {
        self.terminals.close(id);
    }

    pub fn record_terminal_focus(&mut self, id: &str) {
        let Some((id, name)) = self.terminals.focus(id) else {
            return;
        };
        if self.session.is_none() {
            return;
        }
        self.note_user_action();
        self.log_event(EventPayload::TerminalFocus {
            source: ActionSource::User,
            terminal_id: id,
            name,
        });
        self.log_post_action_observation();
    }

    pub fn record_terminal_command(&mut self, id: &str, command: &str) {
        self.terminals.command_started(id, command);
        if self.session.is_none() {
            return;
        }
        self.note_user_action();
        self.log_event(EventPayload::TerminalCommand {
            source: ActionSource::User,
            terminal_id: id.to_string(),
            command: command.to_string(),
        });
        self.log_post_action_observation();
    }

    /// An output chunk drained from a terminal's stream. Buffered always;
    /// logged only while recording. Output is the shell's doing, not the
    /// user's, so no observation follows.
    pub fn record_terminal_output(&mut self, id: &str, chunk: &str) {
        self.terminals.append_output(id, chunk);
        if self.session.is_none() {
            return;
        }
        self.log_event(EventPayload::TerminalOutput {
            source: ActionSource::External,
            terminal_id: id.to_string(),
            output: chunk.to_string(),
        });
    }

    // ========================================================================
    // Filesystem signals
    // ========================================================================

    /// One raw filesystem notification. VCS metadata routes to the git
    /// detector, excluded paths drop, and surviving content deltas go
    /// through three-way attribution.
    pub async fn handle_fs_notification(&mut self, notification: &FsNotification) {
        if self.session.is_none() {
            return;
        }
        let path = notification.path();
        if IgnoreFilter::is_vcs_metadata(path) {
            self.git.observe(path);
            return;
        }
        if self.ignore.is_excluded(path) {
            return;
        }
        let Some(delta) = self.detector.process(&mut self.cache, notification).await else {
            return;
        };
        self.record_file_change(delta);
    }

    /// Classify a content delta and log the resulting FileChange.
    fn record_file_change(&mut self, delta: FileDelta) {
        let file = self.relative(&delta.path);
        let old = delta.old.unwrap_or_default();
        let new = delta.new.unwrap_or_default();

        let (source, content_delta) = match self.git.recent_operation() {
            Some(op) => {
                // A VCS operation rewrote the working tree; buffered user
                // edits no longer describe anything real.
                self.pending.clear_all();
                let source = match op {
                    VcsOperation::Generic => ActionSource::Vcs,
                    VcsOperation::Checkout => ActionSource::VcsCheckout,
                };
                (source, ContentDelta::compute(&old, &new))
            }
            None => match delta.kind {
                FileChangeKind::Created | FileChangeKind::Deleted => {
                    // No baseline exists to attribute against.
                    (ActionSource::Unknown, ContentDelta::compute(&old, &new))
                }
                FileChangeKind::Modified => match self.pending.take(&file) {
                    None => (ActionSource::Agent, ContentDelta::compute(&old, &new)),
                    Some(edits) => match replay(&old, &edits) {
                        None => (ActionSource::Agent, ContentDelta::compute(&old, &new)),
                        Some(baseline) if baseline == new => {
                            // Fully explained by the user's own edits.
                            return;
                        }
                        Some(baseline) => {
                            (ActionSource::Agent, ContentDelta::compute(&baseline, &new))
                        }
                    },
                },
            },
        };

        if source == ActionSource::Agent {
            self.begin_agent_batch();
        }
        self.log_event(EventPayload::FileChange {
            source,
            file,
            change: delta.kind,
            delta: content_delta,
        });
    }

    /// First agent change of a batch: log the workspace snapshot reference
    /// and capture the artifact in the background.
    fn begin_agent_batch(&mut self) {
        if self.batch_active {
            return;
        }
        self.batch_active = true;

        let Some((stamp, session_id)) = self
            .store
            .as_ref()
            .zip(self.session.as_ref())
            .map(|(store, session)| (store.stamp().to_string(), session.session_id.clone()))
        else {
            return;
        };

        let artifact = SnapshotWriter::artifact_name(&stamp, &session_id, self.snapshot_index);
        self.snapshot_index += 1;
        self.log_event(EventPayload::WorkspaceSnapshot {
            artifact: artifact.clone(),
        });

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; skipping workspace snapshot capture");
            return;
        };
        let writer = SnapshotWriter::new(
            &self.config.workspace_root,
            &self.config.effective_export_dir(),
            self.config.max_tracked_file_bytes,
            self.config.snapshot_part_bytes,
        );
        let uploader = self.uploader.clone();
        handle.spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                let paths = writer.write(&artifact)?;
                if let Some(uploader) = uploader {
                    uploader.upload_all(&paths)?;
                }
                anyhow::Ok(())
            })
            .await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Workspace snapshot failed: {e:#}"),
                Err(e) => tracing::warn!("Workspace snapshot task failed: {e}"),
            }
        });
    }

    // ========================================================================
    // Background results and timers
    // ========================================================================

    /// A file read by the warm-up walk; never clobbers change-driven entries.
    pub fn absorb_warm_content(&mut self, path: PathBuf, content: String) {
        if self.session.is_none() {
            return;
        }
        self.cache.insert_if_absent(path, content);
    }

    /// Host notified that visible ranges changed.
    pub fn mark_viewport_dirty(&mut self) {
        self.sampler.mark_dirty();
    }

    /// Sampler tick: scroll-triggered, deduplicated observation.
    pub fn sample_tick(&mut self) {
        if self.session.is_none() {
            return;
        }
        let terminal = self.focused_terminal_viewport();
        if let Some((viewport, terminal)) = self.sampler.sample(&*self.view, terminal) {
            self.log_event(EventPayload::Observation { viewport, terminal });
        }
    }

    /// Low-frequency terminal poll: observe the focused terminal whenever
    /// output landed since the last poll.
    pub fn terminal_poll_tick(&mut self) {
        if self.session.is_none() {
            return;
        }
        let Some(id) = self.terminals.focused_id().map(str::to_string) else {
            return;
        };
        if !self.terminals.take_new_output(&id) {
            return;
        }
        let terminal = self
            .terminals
            .viewport(&id, self.config.terminal_viewport_lines);
        self.log_event(EventPayload::Observation {
            viewport: None,
            terminal,
        });
    }

    /// Drain the in-memory log into a compressed chunk. Skips (never queues)
    /// when a save is already in flight. Two consecutive failures force-stop
    /// the session to bound data loss.
    pub async fn save_chunk(&mut self) -> Option<PathBuf> {
        if self.save_in_flight {
            tracing::debug!("Chunk save already in flight; skipping tick");
            return None;
        }
        let Some(store) = self.store.as_mut() else {
            return None;
        };
        let Some(session) = self.session.as_mut() else {
            return None;
        };
        if session.events.is_empty() {
            return None;
        }
        let events = session.drain_events();
        let start_time = session.start_time;

        self.save_in_flight = true;
        let result = store.write_chunk(start_time, events).await;
        self.save_in_flight = false;

        match result {
            Ok(path) => {
                self.save_failures = 0;
                self.spawn_upload(path.clone());
                Some(path)
            }
            Err(e) => {
                self.save_failures += 1;
                tracing::error!("Failed to write session chunk: {}", e);
                if self.save_failures >= 2 {
                    tracing::error!("Persistent chunk write failure; force-stopping recording");
                    self.session = None;
                    self.store = None;
                    self.uploader = None;
                }
                None
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn note_user_action(&mut self) {
        self.batch_active = false;
    }

    fn log_event(&mut self, payload: EventPayload) {
        let timestamp = self.time.epoch_millis();
        if let Some(session) = self.session.as_mut() {
            session.push(timestamp, payload);
        }
    }

    /// Capture and log the observation that follows a user action.
    fn log_post_action_observation(&mut self) {
        let terminal = self.focused_terminal_viewport();
        let (viewport, terminal) = self.sampler.capture_now(&*self.view, terminal);
        self.log_event(EventPayload::Observation { viewport, terminal });
    }

    fn focused_terminal_viewport(&self) -> Option<TerminalViewport> {
        let id = self.terminals.focused_id()?;
        self.terminals
            .viewport(id, self.config.terminal_viewport_lines)
    }

    fn spawn_upload(&self, path: PathBuf) {
        let Some(uploader) = self.uploader.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            let result = tokio::task::spawn_blocking(move || uploader.upload_file(&path)).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Chunk upload failed: {e:#}"),
                Err(e) => tracing::warn!("Chunk upload task failed: {e}"),
            }
        });
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.config.workspace_root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}
