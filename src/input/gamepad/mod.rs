//! Gamepad input support using GilRs
//!
//! Provides physical gamepads as a [`DeviceSource`](crate::input::host::DeviceSource)
//! with hot-plug support and a fixed raw layout.

pub mod diagnostics;
pub mod layout;
pub mod provider;
pub mod slot;

use std::time::Duration;
use tracing::{info, warn};

pub use diagnostics::print_device_diagnostics;
pub use provider::{GamepadSlots, GilrsBackend};

/// Start the gamepad backend, or continue without gamepads
///
/// # Returns
/// Running backend, or None if initialization fails
pub fn init(poll_interval: Duration) -> Option<GilrsBackend> {
    info!("Initializing gamepad input...");

    match GilrsBackend::start(poll_interval) {
        Ok(backend) => {
            info!("✅ Gamepad input initialized");
            Some(backend)
        }
        Err(e) => {
            warn!("Failed to initialize gamepad backend: {}. Continuing without gamepad.", e);
            None
        }
    }
}
