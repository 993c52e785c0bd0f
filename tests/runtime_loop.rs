//! Driving the serialized run loop over channels, end to end: control
//! commands, terminal lifecycle with a drained output stream, and the final
//! chunk flush when recording stops.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedView;
use scribe::config::CaptureConfig;
use scribe::engine::CaptureEngine;
use scribe::host::{HostNotification, TerminalOpened};
use scribe::model::event::EventPayload;
use scribe::runtime::{CaptureRuntime, ControlCommand, RuntimeInput};
use scribe::services::persistence::read_chunk;
use scribe::services::time_source::RealTimeSource;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_runtime_records_terminal_activity_and_flushes() {
    common::tracing::init_tracing_from_env();

    let workspace = TempDir::new().unwrap();
    let export = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("readme.md"), "hello").unwrap();

    let mut config = CaptureConfig::new(workspace.path());
    config.export_dir = Some(export.path().to_path_buf());
    let engine = CaptureEngine::new(
        config,
        Arc::new(ScriptedView::default()),
        RealTimeSource::shared(),
    );
    let (runtime, tx) = CaptureRuntime::new(engine);
    let loop_handle = tokio::spawn(runtime.run());

    tx.send(RuntimeInput::Control(ControlCommand::StartRecording))
        .unwrap();

    // A terminal opens, takes focus, runs a command and prints output.
    let (out_tx, out_rx) = mpsc::channel(8);
    tx.send(RuntimeInput::Host(HostNotification::TerminalOpened(
        TerminalOpened {
            key: 1,
            name: "zsh".to_string(),
            output: out_rx,
        },
    )))
    .unwrap();
    tx.send(RuntimeInput::Host(HostNotification::TerminalFocused { key: 1 }))
        .unwrap();
    tx.send(RuntimeInput::Host(HostNotification::TerminalCommand {
        key: 1,
        command: "cargo build".to_string(),
    }))
    .unwrap();
    out_tx.send("Compiling scribe\n".to_string()).await.unwrap();

    // Give the drain task and the serialized loop a moment to marshal the
    // chunk back, then stop and shut the loop down.
    tokio::time::sleep(Duration::from_millis(300)).await;
    tx.send(RuntimeInput::Control(ControlCommand::StopRecording))
        .unwrap();
    drop(tx);
    drop(out_tx);
    loop_handle.await.unwrap();

    let chunks: Vec<_> = std::fs::read_dir(export.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".json.gz"))
        .collect();
    assert_eq!(chunks.len(), 1, "stop flushes exactly one chunk");

    let chunk = read_chunk(&chunks[0].path()).unwrap();
    common::assert_contiguous(&chunk.events);

    let mut saw_focus = false;
    let mut saw_command = false;
    let mut saw_output = false;
    let mut terminal_id = None;
    for event in &chunk.events {
        match &event.payload {
            EventPayload::TerminalFocus { terminal_id: id, name, .. } => {
                saw_focus = true;
                assert_eq!(name, "zsh");
                terminal_id = Some(id.clone());
            }
            EventPayload::TerminalCommand { command, terminal_id: id, .. } => {
                saw_command = true;
                assert_eq!(command, "cargo build");
                assert_eq!(Some(id), terminal_id.as_ref());
            }
            EventPayload::TerminalOutput { output, .. } => {
                saw_output = true;
                assert_eq!(output, "Compiling scribe\n");
            }
            _ => {}
        }
    }
    assert!(saw_focus, "terminal focus was recorded");
    assert!(saw_command, "terminal command was recorded");
    assert!(saw_output, "drained output chunk was recorded");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_without_recording_is_a_quiet_notice() {
    let workspace = TempDir::new().unwrap();
    let export = TempDir::new().unwrap();
    let mut config = CaptureConfig::new(workspace.path());
    config.export_dir = Some(export.path().to_path_buf());

    let engine = CaptureEngine::new(
        config,
        Arc::new(ScriptedView::default()),
        RealTimeSource::shared(),
    );
    let (runtime, tx) = CaptureRuntime::new(engine);
    let loop_handle = tokio::spawn(runtime.run());

    tx.send(RuntimeInput::Control(ControlCommand::StopRecording))
        .unwrap();
    tx.send(RuntimeInput::Control(ControlCommand::RedactRecent))
        .unwrap();
    drop(tx);
    loop_handle.await.unwrap();

    assert_eq!(std::fs::read_dir(export.path()).unwrap().count(), 0);
}
