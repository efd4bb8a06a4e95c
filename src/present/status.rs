//! Events published by the render thread

use super::clock::{FrameRates, FrameTiming};

/// Fired once per presented frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub vsync_enabled: bool,
    pub host_fps: String,
    pub game_fps: String,
    /// Clock counters at the time the frame was presented
    pub timing: FrameTiming,
}

impl StatusEvent {
    pub fn new(vsync_enabled: bool, rates: FrameRates, timing: FrameTiming) -> Self {
        Self {
            vsync_enabled,
            host_fps: rates.host_text(),
            game_fps: rates.game_text(),
            timing,
        }
    }
}

/// Render thread → UI thread messages.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentEvent {
    Status(StatusEvent),
    /// The loop ended on its own; carries the error text if it failed.
    Stopped(Option<String>),
}
