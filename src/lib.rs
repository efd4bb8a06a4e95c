//! Emu Frontend - presentation loop and input core for an emulated console
//!
//! The crate drives an emulated device's output at a fixed cadence on a
//! dedicated render thread, and turns host keyboard, pointer and gamepad
//! input into normalized per-frame controller state.

pub mod config;
pub mod frontend;
pub mod headless;
pub mod input;
pub mod paths;
pub mod present;

pub use config::{AppConfig, ConfigWatcher};
pub use frontend::{Frontend, FrontendEvent, FrontendListener};
