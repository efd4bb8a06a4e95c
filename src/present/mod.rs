//! Presentation: frame pacing and the render thread

pub mod clock;
pub mod device;
pub mod render_thread;
pub mod status;

use thiserror::Error;

pub use clock::{FrameClock, FrameRates, FrameTiming, TARGET_HZ};
pub use device::{EmulatedDevice, GraphicsContext, RendererKind};
pub use render_thread::{LoopState, PresentationLoop};
pub use status::{PresentEvent, StatusEvent};

/// Presentation loop errors
#[derive(Debug, Error)]
pub enum PresentError {
    #[error("unsupported renderer: expected {expected}, found {found}")]
    UnsupportedRenderer { expected: RendererKind, found: RendererKind },

    #[error("graphics context error: {0:#}")]
    Context(anyhow::Error),

    #[error("emulated device error: {0:#}")]
    Device(anyhow::Error),

    #[error("presentation loop already started")]
    AlreadyStarted,

    #[error("render thread error: {0}")]
    RenderThread(String),
}
