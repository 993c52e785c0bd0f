// Capture engine library - exposes all core modules for testing

pub mod config;
pub mod engine;
pub mod host;
pub mod model;
pub mod runtime;
pub mod services;

pub use config::CaptureConfig;
pub use engine::CaptureEngine;
pub use runtime::{CaptureRuntime, ControlCommand, RuntimeInput};
