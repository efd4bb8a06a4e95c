//! Input aggregator
//!
//! Polls every configured virtual controller once per tick, builds its
//! [`NormalizedControllerState`] and forwards it to the emulated input
//! surface. The aggregator owns the surface; nothing else writes to it.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::binding::{ControllerBinding, ControllerSource, DirectionKeys, KeyboardBinding};
use super::hotkeys::HotkeySet;
use super::host::HostInput;
use super::keys::{Key, KeyMatrix};
use super::mapper::{apply_inversion, stick_direction_flags, DeviceMapper};
use super::state::{ButtonSet, NormalizedControllerState, Side, StickVector, STICK_MAX};
use super::touch::touch_from_pointer;

/// Emulated console input surface.
pub trait InputSurface: Send {
    fn write_controller(&mut self, index: usize, state: &NormalizedControllerState);
}

/// Aggregation tunables taken from the `input` and `display` config sections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorSettings {
    /// Stick magnitude at which digital stick-direction flags are set
    pub stick_direction_threshold: f32,
    /// Logical touch panel resolution
    pub panel: (u16, u16),
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self { stick_direction_threshold: 0.5, panel: (320, 240) }
    }
}

/// Result of one poll for one controller.
#[derive(Debug, Clone, PartialEq)]
pub struct PolledController {
    pub index: usize,
    pub state: NormalizedControllerState,
    /// Hotkey combinations currently held (level, not edge)
    pub hotkeys: HotkeySet,
}

pub struct InputAggregator {
    host: Arc<dyn HostInput>,
    surface: Box<dyn InputSurface>,
    bindings: Vec<ControllerBinding>,
    settings: AggregatorSettings,
    device_connected: HashMap<usize, bool>,
}

impl InputAggregator {
    pub fn new(
        host: Arc<dyn HostInput>,
        surface: Box<dyn InputSurface>,
        bindings: Vec<ControllerBinding>,
        settings: AggregatorSettings,
    ) -> Self {
        info!("Input aggregator ready with {} controller(s)", bindings.len());
        Self {
            host,
            surface,
            bindings,
            settings,
            device_connected: HashMap::new(),
        }
    }

    pub fn bindings(&self) -> &[ControllerBinding] {
        &self.bindings
    }

    /// Swap bindings between ticks (config reload, applied capture)
    pub fn set_bindings(&mut self, bindings: Vec<ControllerBinding>, settings: AggregatorSettings) {
        debug!("Aggregator bindings replaced ({} controller(s))", bindings.len());
        self.bindings = bindings;
        self.settings = settings;
    }

    /// Poll every controller and forward each state to the surface
    pub fn poll(&mut self) -> Vec<PolledController> {
        let keys = KeyMatrix::from_keys(self.host.pressed_keys());
        let touch = touch_from_pointer(&self.host.pointer(), self.host.window_size(), self.settings.panel);

        let mut polled = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let (mut state, hotkeys) = match &binding.source {
                ControllerSource::Keyboard(keyboard) => keyboard_state(keyboard, keys),
                ControllerSource::Device(device) => {
                    let raw = self.host.device_state(device.device);
                    track_connection(&mut self.device_connected, device.device, raw.is_some(), binding.index);

                    let mapper = DeviceMapper::new(binding, device);
                    let state = NormalizedControllerState {
                        buttons: mapper.buttons(raw.as_ref()),
                        left_stick: apply_inversion(mapper.left_stick(raw.as_ref()), binding.invert_x, binding.invert_y),
                        right_stick: apply_inversion(mapper.right_stick(raw.as_ref()), binding.invert_x, binding.invert_y),
                        ..Default::default()
                    };
                    (state, HotkeySet::EMPTY)
                }
            };

            let threshold = self.settings.stick_direction_threshold;
            state.buttons = state
                .buttons
                .union(stick_direction_flags(state.left_stick, threshold, Side::Left))
                .union(stick_direction_flags(state.right_stick, threshold, Side::Right));

            if binding.pointer_touch {
                state.touch = touch;
            }

            self.surface.write_controller(binding.index, &state);
            polled.push(PolledController { index: binding.index, state, hotkeys });
        }

        polled
    }
}

fn track_connection(seen: &mut HashMap<usize, bool>, device: usize, connected: bool, controller: usize) {
    let previous = seen.insert(device, connected);
    match (previous, connected) {
        (Some(false) | None, true) => info!("Device {} active for controller {}", device, controller),
        (Some(true), false) => warn!("🔌 Device {} disconnected, controller {} is neutral", device, controller),
        _ => {},
    }
}

fn keyboard_state(binding: &KeyboardBinding, keys: KeyMatrix) -> (NormalizedControllerState, HotkeySet) {
    let buttons: ButtonSet = binding
        .buttons
        .iter()
        .filter(|(_, key)| keys.contains(**key))
        .map(|(button, _)| *button)
        .collect();

    let hotkeys: HotkeySet = binding
        .hotkeys
        .iter()
        .filter(|(_, combo)| keys.contains_all(combo))
        .map(|(hotkey, _)| *hotkey)
        .collect();

    let state = NormalizedControllerState {
        buttons,
        left_stick: binding.left_stick.map_or(StickVector::NEUTRAL, |d| key_stick(&d, keys)),
        right_stick: binding.right_stick.map_or(StickVector::NEUTRAL, |d| key_stick(&d, keys)),
        keyboard: Some(keys),
        touch: None,
    };

    (state, hotkeys)
}

/// Full deflection per held direction; opposite keys cancel.
fn key_stick(directions: &DirectionKeys, keys: KeyMatrix) -> StickVector {
    let axis = |positive: Key, negative: Key| {
        let mut value: i16 = 0;
        if keys.contains(positive) {
            value += STICK_MAX;
        }
        if keys.contains(negative) {
            value -= STICK_MAX;
        }
        value
    };

    StickVector {
        x: axis(directions.right, directions.left),
        y: axis(directions.up, directions.down),
    }
}
