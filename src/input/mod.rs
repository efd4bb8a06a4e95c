//! Input: host devices → normalized controller state
//!
//! Raw host input (keyboard, pointer, physical gamepads) is read through
//! [`host::HostInput`], decoded per virtual controller by the
//! [`mapper::DeviceMapper`] and [`aggregator::InputAggregator`], and learned
//! interactively by [`capture::CaptureSession`].

pub mod aggregator;
pub mod binding;
pub mod capture;
pub mod gamepad;
pub mod host;
pub mod hotkeys;
pub mod keys;
pub mod mapper;
pub mod raw;
pub mod state;
pub mod touch;

use thiserror::Error;

pub use aggregator::{AggregatorSettings, InputAggregator, InputSurface, PolledController};
pub use binding::{BindTarget, ControllerBinding, ControllerSource};
pub use capture::{CaptureOutcome, CaptureRequest, CaptureResult, CaptureSession, CaptureSource, CaptureState};
pub use host::{HostInput, HostInputHub, PointerState, WindowInput, WindowState};
pub use hotkeys::{Hotkey, HotkeyDetector, HotkeySet};
pub use keys::{Key, KeyMatrix};
pub use raw::{RawDeviceState, RawInput};
pub use state::{ButtonSet, NormalizedControllerState, PadButton, Side, StickVector, TouchPoint};

/// Binding label errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("invalid input label '{0}' (expected ButtonN, AxisN+/AxisN- or HatN<Up|Down|Left|Right>)")]
    InvalidInputLabel(String),

    #[error("invalid key label '{0}'")]
    InvalidKeyLabel(String),
}
