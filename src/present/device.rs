//! Collaborator interfaces of the presentation loop
//!
//! The emulated console is consumed only through [`EmulatedDevice`]; the
//! host graphics API only through [`GraphicsContext`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Rendering backend a device or context is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    OpenGl,
    Vulkan,
    Software,
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RendererKind::OpenGl => "OpenGL",
            RendererKind::Vulkan => "Vulkan",
            RendererKind::Software => "software",
        };
        f.write_str(name)
    }
}

/// The emulated console as seen by the presentation loop.
///
/// Shared between the UI thread and the render thread, so every method
/// takes `&self`.
pub trait EmulatedDevice: Send + Sync {
    fn renderer_kind(&self) -> RendererKind;

    /// Non-blocking: is a produced output waiting to be processed?
    fn has_pending_output(&self) -> bool;

    /// Process one pending output.
    fn produce_output(&self) -> anyhow::Result<()>;

    /// Present the current frame. The device calls `swap` exactly when the
    /// back buffer should be shown.
    fn present_frame(&self, swap: &mut dyn FnMut()) -> anyhow::Result<()>;

    /// Record one host frame time.
    fn record_frame_time(&self, frame_time: Duration);

    /// Total frames the device has produced.
    fn game_frames(&self) -> u64;

    /// Wake whatever in the device waits for vertical sync.
    fn signal_vsync(&self);
}

/// Graphics context owned by exactly one thread at a time.
pub trait GraphicsContext: Send {
    fn kind(&self) -> RendererKind;

    fn make_current(&mut self) -> anyhow::Result<()>;

    fn release_current(&mut self);

    fn swap_buffers(&mut self);

    /// Enable or disable waiting for vblank on swap.
    fn set_swap_interval(&mut self, vsync: bool);
}
