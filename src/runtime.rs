//! The serialized run loop owning the capture engine.
//!
//! One logical thread of control per session: every host notification,
//! marshaled background result and timer tick is handled here, one at a
//! time, so no two callbacks ever interleave their mutation of the event log
//! or the sequence counter. Output draining and cache warm-up run as
//! cancellable background tasks that only communicate by sending messages
//! back into this loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::CaptureEngine;
use crate::host::{HostNotification, TerminalOpened};
use crate::services::fs_detector::spawn_cache_warm;

/// Results marshaled back from background tasks.
#[derive(Debug)]
enum EngineMsg {
    TerminalChunk { id: String, chunk: String },
}

/// Control operations exposed to the host's UI glue.
#[derive(Debug, Clone, Copy)]
pub enum ControlCommand {
    StartRecording,
    StopRecording,
    RedactRecent,
}

/// Everything the runtime consumes, in one serialized stream.
#[derive(Debug)]
pub enum RuntimeInput {
    Host(HostNotification),
    Control(ControlCommand),
}

/// Runs the engine against host notifications and timers until the input
/// channel closes.
pub struct CaptureRuntime {
    engine: CaptureEngine,
    input_rx: mpsc::UnboundedReceiver<RuntimeInput>,
    msg_tx: mpsc::UnboundedSender<EngineMsg>,
    msg_rx: mpsc::UnboundedReceiver<EngineMsg>,
    warm_tx: mpsc::UnboundedSender<(PathBuf, String)>,
    warm_rx: mpsc::UnboundedReceiver<(PathBuf, String)>,
    /// Stable terminal id per host terminal key
    terminal_ids: HashMap<u64, String>,
    /// Output drain task per host terminal key
    drain_tasks: HashMap<u64, JoinHandle<()>>,
    warm_task: Option<JoinHandle<()>>,
}

impl CaptureRuntime {
    /// Wrap an engine; the returned sender is the host's way in.
    pub fn new(engine: CaptureEngine) -> (Self, mpsc::UnboundedSender<RuntimeInput>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (warm_tx, warm_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            engine,
            input_rx,
            msg_tx,
            msg_rx,
            warm_tx,
            warm_rx,
            terminal_ids: HashMap::new(),
            drain_tasks: HashMap::new(),
            warm_task: None,
        };
        (runtime, input_tx)
    }

    /// Drive the engine until the host drops its sender. Stops any live
    /// session on the way out and cancels background tasks; in-flight work
    /// completes but its results are discarded.
    pub async fn run(mut self) {
        let config = self.engine.config();
        let mut sample = tokio::time::interval(Duration::from_millis(config.sample_interval_ms));
        let mut terminal_poll =
            tokio::time::interval(Duration::from_millis(config.terminal_poll_interval_ms));
        let mut save = tokio::time::interval(Duration::from_secs(config.save_interval_secs));
        sample.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        terminal_poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        save.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                input = self.input_rx.recv() => {
                    match input {
                        Some(RuntimeInput::Host(notification)) => {
                            self.on_host(notification).await;
                        }
                        Some(RuntimeInput::Control(command)) => {
                            self.on_control(command).await;
                        }
                        None => break,
                    }
                }
                Some(msg) = self.msg_rx.recv() => self.on_msg(msg),
                Some((path, content)) = self.warm_rx.recv() => {
                    self.engine.absorb_warm_content(path, content);
                }
                _ = sample.tick() => self.engine.sample_tick(),
                _ = terminal_poll.tick() => self.engine.terminal_poll_tick(),
                _ = save.tick() => { self.engine.save_chunk().await; }
            }
        }

        self.engine.stop_recording().await;
        self.cancel_background_tasks();
    }

    async fn on_control(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::StartRecording => match self.engine.start_recording() {
                Ok(true) => {
                    let config = self.engine.config();
                    self.warm_task = Some(spawn_cache_warm(
                        config.workspace_root.clone(),
                        config.max_tracked_file_bytes,
                        self.warm_tx.clone(),
                    ));
                }
                Ok(false) => tracing::debug!("Already recording; start ignored"),
                Err(e) => tracing::error!("Recording could not start: {e:#}"),
            },
            ControlCommand::StopRecording => {
                if !self.engine.stop_recording().await {
                    tracing::debug!("Not recording; stop ignored");
                }
                if let Some(task) = self.warm_task.take() {
                    task.abort();
                }
            }
            ControlCommand::RedactRecent => {
                self.engine.redact_recent();
            }
        }
    }

    async fn on_host(&mut self, notification: HostNotification) {
        match notification {
            HostNotification::Edit(edit) => self.engine.record_edit(&edit),
            HostNotification::Selection(selection) => self.engine.record_selection(&selection),
            HostNotification::TabSwitch { file } => {
                self.engine.record_tab_switch(file.as_deref());
            }
            HostNotification::ViewportChanged => self.engine.mark_viewport_dirty(),
            HostNotification::TerminalOpened(opened) => self.on_terminal_opened(opened),
            HostNotification::TerminalFocused { key } => {
                if let Some(id) = self.terminal_ids.get(&key).cloned() {
                    self.engine.record_terminal_focus(&id);
                }
            }
            HostNotification::TerminalCommand { key, command } => {
                if let Some(id) = self.terminal_ids.get(&key).cloned() {
                    self.engine.record_terminal_command(&id, &command);
                }
            }
            HostNotification::TerminalClosed { key } => {
                if let Some(task) = self.drain_tasks.remove(&key) {
                    task.abort();
                }
                if let Some(id) = self.terminal_ids.remove(&key) {
                    self.engine.terminal_closed(&id);
                }
            }
            HostNotification::Fs(notification) => {
                self.engine.handle_fs_notification(&notification).await;
            }
        }
    }

    fn on_msg(&mut self, msg: EngineMsg) {
        match msg {
            EngineMsg::TerminalChunk { id, chunk } => {
                self.engine.record_terminal_output(&id, &chunk);
            }
        }
    }

    /// Register the terminal and start draining its output stream in the
    /// background; chunks come back through the message channel so they are
    /// consumed on the serialized path.
    fn on_terminal_opened(&mut self, opened: TerminalOpened) {
        let TerminalOpened {
            key,
            name,
            mut output,
        } = opened;
        let id = self.engine.terminal_opened(&name);
        self.terminal_ids.insert(key, id.clone());

        let msg_tx = self.msg_tx.clone();
        let drain = tokio::spawn(async move {
            while let Some(chunk) = output.recv().await {
                if msg_tx.send(EngineMsg::TerminalChunk {
                    id: id.clone(),
                    chunk,
                }).is_err() {
                    break;
                }
            }
        });
        if let Some(stale) = self.drain_tasks.insert(key, drain) {
            stale.abort();
        }
    }

    fn cancel_background_tasks(&mut self) {
        if let Some(task) = self.warm_task.take() {
            task.abort();
        }
        for (_, task) in self.drain_tasks.drain() {
            task.abort();
        }
    }
}
