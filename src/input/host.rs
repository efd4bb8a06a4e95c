//! Host input backend
//!
//! [`HostInput`] is the read side every consumer polls: the aggregator once
//! per tick, capture workers at their own interval. [`WindowInput`] collects
//! keyboard, pointer and window events pushed by the windowing layer;
//! [`HostInputHub`] joins it with a physical device source such as the
//! gilrs backend.

use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

use super::keys::Key;
use super::raw::RawDeviceState;

/// Pointer position in window pixels plus primary button state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub primary_down: bool,
}

/// Host window state checked periodically by the UI loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub focused: bool,
    pub minimized: bool,
}

impl Default for WindowState {
    fn default() -> Self {
        Self { focused: true, minimized: false }
    }
}

/// Everything the core reads from the host.
pub trait HostInput: Send + Sync {
    /// Keys currently held. Untranslatable keys appear as [`Key::Unknown`].
    fn pressed_keys(&self) -> Vec<Key>;

    fn pointer(&self) -> PointerState;

    /// Window client size in pixels.
    fn window_size(&self) -> (u32, u32);

    fn window_state(&self) -> WindowState;

    /// Snapshot of device slot `index`, `None` when disconnected.
    fn device_state(&self, index: usize) -> Option<RawDeviceState>;

    fn device_name(&self, index: usize) -> Option<String>;

    fn connected_devices(&self) -> Vec<usize>;
}

/// Physical device half of the host backend.
pub trait DeviceSource: Send + Sync {
    fn device_state(&self, index: usize) -> Option<RawDeviceState>;
    fn device_name(&self, index: usize) -> Option<String>;
    fn connected_devices(&self) -> Vec<usize>;
}

#[derive(Debug, Default)]
struct WindowInputState {
    keys: BTreeSet<Key>,
    pointer: PointerState,
    size: (u32, u32),
    window: WindowState,
}

/// Thread-safe store fed by the host window's event handlers.
#[derive(Debug, Default)]
pub struct WindowInput {
    state: RwLock<WindowInputState>,
}

impl WindowInput {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: RwLock::new(WindowInputState {
                size: (width, height),
                ..Default::default()
            }),
        }
    }

    pub fn key_down(&self, key: Key) {
        trace!("Key down: {}", key);
        self.state.write().keys.insert(key);
    }

    pub fn key_up(&self, key: Key) {
        trace!("Key up: {}", key);
        self.state.write().keys.remove(&key);
    }

    pub fn pointer_moved(&self, x: f32, y: f32) {
        let mut state = self.state.write();
        state.pointer.x = x;
        state.pointer.y = y;
    }

    pub fn pointer_button(&self, down: bool) {
        self.state.write().pointer.primary_down = down;
    }

    pub fn resized(&self, width: u32, height: u32) {
        debug!("Window resized to {}x{}", width, height);
        self.state.write().size = (width, height);
    }

    pub fn focus_changed(&self, focused: bool) {
        let mut state = self.state.write();
        state.window.focused = focused;
        // Held keys never see their release once focus is gone.
        if !focused {
            state.keys.clear();
            state.pointer.primary_down = false;
        }
    }

    pub fn minimized(&self, minimized: bool) {
        self.state.write().window.minimized = minimized;
    }
}

impl HostInput for WindowInput {
    fn pressed_keys(&self) -> Vec<Key> {
        self.state.read().keys.iter().copied().collect()
    }

    fn pointer(&self) -> PointerState {
        self.state.read().pointer
    }

    fn window_size(&self) -> (u32, u32) {
        self.state.read().size
    }

    fn window_state(&self) -> WindowState {
        self.state.read().window
    }

    fn device_state(&self, _index: usize) -> Option<RawDeviceState> {
        None
    }

    fn device_name(&self, _index: usize) -> Option<String> {
        None
    }

    fn connected_devices(&self) -> Vec<usize> {
        Vec::new()
    }
}

/// Window input plus an optional physical device source.
pub struct HostInputHub {
    window: Arc<WindowInput>,
    devices: Option<Arc<dyn DeviceSource>>,
}

impl HostInputHub {
    pub fn new(window: Arc<WindowInput>, devices: Option<Arc<dyn DeviceSource>>) -> Self {
        Self { window, devices }
    }
}

impl HostInput for HostInputHub {
    fn pressed_keys(&self) -> Vec<Key> {
        self.window.pressed_keys()
    }

    fn pointer(&self) -> PointerState {
        self.window.pointer()
    }

    fn window_size(&self) -> (u32, u32) {
        self.window.window_size()
    }

    fn window_state(&self) -> WindowState {
        self.window.window_state()
    }

    fn device_state(&self, index: usize) -> Option<RawDeviceState> {
        self.devices.as_ref()?.device_state(index)
    }

    fn device_name(&self, index: usize) -> Option<String> {
        self.devices.as_ref()?.device_name(index)
    }

    fn connected_devices(&self) -> Vec<usize> {
        self.devices
            .as_ref()
            .map(|d| d.connected_devices())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OnePad;

    impl DeviceSource for OnePad {
        fn device_state(&self, index: usize) -> Option<RawDeviceState> {
            (index == 0).then(|| RawDeviceState { buttons: vec![true], ..Default::default() })
        }

        fn device_name(&self, index: usize) -> Option<String> {
            (index == 0).then(|| "Test Pad".to_string())
        }

        fn connected_devices(&self) -> Vec<usize> {
            vec![0]
        }
    }

    #[test]
    fn test_window_input_tracks_keys() {
        let window = WindowInput::new(640, 480);
        window.key_down(Key::A);
        window.key_down(Key::Enter);
        window.key_up(Key::A);
        assert_eq!(window.pressed_keys(), vec![Key::Enter]);
    }

    #[test]
    fn test_focus_loss_releases_everything() {
        let window = WindowInput::new(640, 480);
        window.key_down(Key::A);
        window.pointer_button(true);
        window.focus_changed(false);

        assert!(window.pressed_keys().is_empty());
        assert!(!window.pointer().primary_down);
        assert!(!window.window_state().focused);
    }

    #[test]
    fn test_hub_routes_devices() {
        let window = Arc::new(WindowInput::new(640, 480));
        let hub = HostInputHub::new(window.clone(), Some(Arc::new(OnePad)));
        window.key_down(Key::Space);

        assert_eq!(hub.pressed_keys(), vec![Key::Space]);
        assert!(hub.device_state(0).is_some());
        assert!(hub.device_state(1).is_none());
        assert_eq!(hub.device_name(0).as_deref(), Some("Test Pad"));
        assert_eq!(hub.connected_devices(), vec![0]);

        let bare = HostInputHub::new(window, None);
        assert!(bare.device_state(0).is_none());
        assert!(bare.connected_devices().is_empty());
    }
}
