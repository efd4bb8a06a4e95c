//! Controller binding tables
//!
//! A [`ControllerBinding`] ties one virtual controller to either the host
//! keyboard or one physical device, together with its analog tuning. The
//! two classes are a tagged sum type (`type: keyboard | device`) and are
//! dispatched by pattern match during aggregation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::hotkeys::Hotkey;
use super::keys::Key;
use super::raw::{HatDirection, RawInput};
use super::state::{PadButton, Side};

/// Binding for one virtual controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerBinding {
    /// Virtual controller index
    pub index: usize,

    /// Keyboard-class or device-class source
    #[serde(flatten)]
    pub source: ControllerSource,

    /// Deadzone for the left stick (0.0-1.0)
    #[serde(default = "default_deadzone")]
    pub deadzone_left: f32,

    /// Deadzone for the right stick (0.0-1.0)
    #[serde(default = "default_deadzone")]
    pub deadzone_right: f32,

    /// Axis value above which an axis bound to a button counts as pressed
    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: f32,

    /// Mirror both sticks horizontally
    #[serde(default)]
    pub invert_x: bool,

    /// Mirror both sticks vertically
    #[serde(default)]
    pub invert_y: bool,

    /// Route pointer touches to this controller
    #[serde(default, skip_serializing_if = "is_false")]
    pub pointer_touch: bool,
}

fn default_deadzone() -> f32 {
    0.15
}

fn default_trigger_threshold() -> f32 {
    0.5
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Input source of a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerSource {
    Keyboard(KeyboardBinding),
    Device(DeviceBinding),
}

/// Host keyboard bindings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyboardBinding {
    #[serde(default)]
    pub buttons: BTreeMap<PadButton, Key>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_stick: Option<DirectionKeys>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_stick: Option<DirectionKeys>,

    /// Key combinations, all keys held together
    #[serde(default)]
    pub hotkeys: BTreeMap<Hotkey, Vec<Key>>,
}

/// Four keys emulating one stick at full deflection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionKeys {
    pub up: Key,
    pub down: Key,
    pub left: Key,
    pub right: Key,
}

/// Physical device bindings, split by controller half.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceBinding {
    /// Host device slot
    pub device: usize,

    #[serde(default)]
    pub left: SideBinding,

    #[serde(default)]
    pub right: SideBinding,
}

impl DeviceBinding {
    pub fn side(&self, side: Side) -> &SideBinding {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideBinding {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// Button and stick bindings for one controller half.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideBinding {
    #[serde(default)]
    pub buttons: BTreeMap<PadButton, RawInput>,

    /// Axis index read as the stick's horizontal component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stick_x: Option<u16>,

    /// Axis index read as the stick's vertical component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stick_y: Option<u16>,
}

/// Stick component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StickAxis {
    X,
    Y,
}

/// Control a capture result is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindTarget {
    Button(PadButton),
    Stick { side: Side, axis: StickAxis },
}

impl ControllerBinding {
    /// Default keyboard layout.
    pub fn keyboard(index: usize) -> Self {
        let buttons = [
            (PadButton::A, Key::X),
            (PadButton::B, Key::Z),
            (PadButton::X, Key::S),
            (PadButton::Y, Key::A),
            (PadButton::L, Key::Q),
            (PadButton::R, Key::W),
            (PadButton::Zl, Key::Num1),
            (PadButton::Zr, Key::Num2),
            (PadButton::Start, Key::Enter),
            (PadButton::Select, Key::Backspace),
            (PadButton::Home, Key::M),
            (PadButton::DpadUp, Key::T),
            (PadButton::DpadDown, Key::G),
            (PadButton::DpadLeft, Key::F),
            (PadButton::DpadRight, Key::H),
        ]
        .into_iter()
        .collect();

        Self {
            index,
            source: ControllerSource::Keyboard(KeyboardBinding {
                buttons,
                left_stick: Some(DirectionKeys {
                    up: Key::Up,
                    down: Key::Down,
                    left: Key::Left,
                    right: Key::Right,
                }),
                right_stick: Some(DirectionKeys {
                    up: Key::I,
                    down: Key::K,
                    left: Key::J,
                    right: Key::L,
                }),
                hotkeys: [(Hotkey::VsyncToggle, vec![Key::F7])].into_iter().collect(),
            }),
            deadzone_left: default_deadzone(),
            deadzone_right: default_deadzone(),
            trigger_threshold: default_trigger_threshold(),
            invert_x: false,
            invert_y: false,
            pointer_touch: false,
        }
    }

    /// Default layout for a standard gamepad in the canonical gilrs order
    /// (see `gamepad::layout`).
    pub fn device(index: usize, device: usize) -> Self {
        let hat = |direction| RawInput::Hat { index: 0, direction };
        let left = SideBinding {
            buttons: [
                (PadButton::DpadUp, hat(HatDirection::Up)),
                (PadButton::DpadDown, hat(HatDirection::Down)),
                (PadButton::DpadLeft, hat(HatDirection::Left)),
                (PadButton::DpadRight, hat(HatDirection::Right)),
                (PadButton::L, RawInput::Button(4)),
                (PadButton::Zl, RawInput::Button(6)),
                (PadButton::Select, RawInput::Button(8)),
                (PadButton::LeftStickClick, RawInput::Button(11)),
            ]
            .into_iter()
            .collect(),
            stick_x: Some(0),
            stick_y: Some(1),
        };
        let right = SideBinding {
            buttons: [
                (PadButton::A, RawInput::Button(1)),
                (PadButton::B, RawInput::Button(0)),
                (PadButton::X, RawInput::Button(2)),
                (PadButton::Y, RawInput::Button(3)),
                (PadButton::R, RawInput::Button(5)),
                (PadButton::Zr, RawInput::Button(7)),
                (PadButton::Start, RawInput::Button(9)),
                (PadButton::Home, RawInput::Button(10)),
                (PadButton::RightStickClick, RawInput::Button(12)),
            ]
            .into_iter()
            .collect(),
            stick_x: Some(3),
            stick_y: Some(4),
        };

        Self {
            index,
            source: ControllerSource::Device(DeviceBinding { device, left, right }),
            deadzone_left: default_deadzone(),
            deadzone_right: default_deadzone(),
            trigger_threshold: default_trigger_threshold(),
            invert_x: false,
            invert_y: false,
            pointer_touch: false,
        }
    }

    pub fn deadzone(&self, side: Side) -> f32 {
        match side {
            Side::Left => self.deadzone_left,
            Side::Right => self.deadzone_right,
        }
    }

    /// Physical device slot, for device-class bindings.
    pub fn device_index(&self) -> Option<usize> {
        match &self.source {
            ControllerSource::Device(device) => Some(device.device),
            ControllerSource::Keyboard(_) => None,
        }
    }

    /// Bind a captured device input. Returns false when the target does not
    /// accept it (keyboard-class binding, or a stick fed a non-axis input).
    pub fn bind_device_input(&mut self, target: BindTarget, input: RawInput) -> bool {
        let ControllerSource::Device(device) = &mut self.source else {
            return false;
        };

        match target {
            BindTarget::Button(button) => {
                // One physical input drives one button per controller.
                for side in [Side::Left, Side::Right] {
                    device.side_mut(side).buttons.retain(|_, bound| *bound != input);
                }
                device.side_mut(button.side()).buttons.insert(button, input);
                true
            }
            BindTarget::Stick { side, axis } => {
                let RawInput::Axis { index, .. } = input else {
                    return false;
                };
                let binding = device.side_mut(side);
                match axis {
                    StickAxis::X => binding.stick_x = Some(index),
                    StickAxis::Y => binding.stick_y = Some(index),
                }
                true
            }
        }
    }

    /// Bind a captured key to a button. [`Key::Unknown`] is never bound.
    pub fn bind_key(&mut self, target: BindTarget, key: Key) -> bool {
        let ControllerSource::Keyboard(keyboard) = &mut self.source else {
            return false;
        };
        let BindTarget::Button(button) = target else {
            return false;
        };
        if key == Key::Unknown {
            return false;
        }

        keyboard.buttons.retain(|_, bound| *bound != key);
        keyboard.buttons.insert(button, key);
        true
    }
}
