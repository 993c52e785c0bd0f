//! Asynchronous services and external integrations
//!
//! This module contains all code that deals with I/O, background tasks and
//! the stateful trackers feeding the attribution engine.

pub mod content_cache;
pub mod fs_detector;
pub mod git_detector;
pub mod ignore_filter;
pub mod persistence;
pub mod snapshot;
pub mod terminal_tracker;
pub mod time_source;
pub mod tracing_setup;
pub mod upload;
pub mod viewport_sampler;
