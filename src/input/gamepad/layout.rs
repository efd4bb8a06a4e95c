//! Canonical gilrs control layout
//!
//! gilrs reports standardized controls (South, East, LeftStickX...). This
//! module fixes one index per control so raw identifiers such as `Button1`
//! or `Axis3+` mean the same physical control on every pad:
//!
//! ```text
//! Buttons                          Axes
//!  0 South   5 RightTrigger  10 Mode        0 LeftStickX   3 RightStickX
//!  1 East    6 LeftTrigger2  11 LeftThumb   1 LeftStickY   4 RightStickY
//!  2 North   7 RightTrigger2 12 RightThumb  2 LeftZ        5 RightZ
//!  3 West    8 Select        13 C
//!  4 LeftTrigger 9 Start     14 Z           Hat 0: D-pad
//! ```
//!
//! Stick Y axes are negated so that, like most raw HID devices, pushing
//! the stick down yields a positive value.

use gilrs::{Axis, Button, Gamepad};

use crate::input::raw::{HatDirection, HatState, RawDeviceState};

pub const BUTTONS: [Button; 15] = [
    Button::South,
    Button::East,
    Button::North,
    Button::West,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
    Button::C,
    Button::Z,
];

pub const AXES: [Axis; 6] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
];

/// Raw button index of a gilrs button (`None` for the D-pad)
pub fn button_index(button: Button) -> Option<u16> {
    BUTTONS.iter().position(|b| *b == button).map(|i| i as u16)
}

/// Raw axis index of a gilrs axis
pub fn axis_index(axis: Axis) -> Option<u16> {
    AXES.iter().position(|a| *a == axis).map(|i| i as u16)
}

/// Convert a gilrs axis value to raw device convention
pub fn to_device_convention(axis: Axis, value: f32) -> f32 {
    match axis {
        Axis::LeftStickY | Axis::RightStickY => -value,
        _ => value,
    }
}

/// D-pad as one hat. Pads that expose it as DPadX/DPadY axes are folded in.
pub fn dpad_hat(pressed: impl Fn(Button) -> bool, value: impl Fn(Axis) -> f32) -> HatState {
    HatState::CENTERED
        .with(HatDirection::Up, pressed(Button::DPadUp) || value(Axis::DPadY) > 0.5)
        .with(HatDirection::Down, pressed(Button::DPadDown) || value(Axis::DPadY) < -0.5)
        .with(HatDirection::Left, pressed(Button::DPadLeft) || value(Axis::DPadX) < -0.5)
        .with(HatDirection::Right, pressed(Button::DPadRight) || value(Axis::DPadX) > 0.5)
}

/// Snapshot a connected gamepad
pub fn snapshot(gamepad: &Gamepad<'_>) -> RawDeviceState {
    RawDeviceState {
        buttons: BUTTONS.iter().map(|b| gamepad.is_pressed(*b)).collect(),
        axes: AXES
            .iter()
            .map(|a| to_device_convention(*a, gamepad.value(*a)))
            .collect(),
        hats: vec![dpad_hat(|b| gamepad.is_pressed(b), |a| gamepad.value(a))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_buttons() {
        assert_eq!(button_index(Button::South), Some(0));
        assert_eq!(button_index(Button::East), Some(1));
        assert_eq!(button_index(Button::West), Some(3));
        assert_eq!(button_index(Button::DPadUp), None);
    }

    #[test]
    fn test_stick_axes() {
        assert_eq!(axis_index(Axis::LeftStickY), Some(1));
        assert_eq!(axis_index(Axis::RightStickX), Some(3));
        assert_eq!(axis_index(Axis::DPadX), None);
    }

    #[test]
    fn test_vertical_axes_are_flipped() {
        assert_eq!(to_device_convention(Axis::LeftStickY, 0.75), -0.75);
        assert_eq!(to_device_convention(Axis::RightStickY, -1.0), 1.0);
        assert_eq!(to_device_convention(Axis::LeftStickX, 0.75), 0.75);
    }

    #[test]
    fn test_dpad_from_buttons_or_axes() {
        let hat = dpad_hat(|b| b == Button::DPadUp, |_| 0.0);
        assert!(hat.contains(HatDirection::Up));
        assert!(!hat.contains(HatDirection::Down));

        let hat = dpad_hat(|_| false, |a| if a == Axis::DPadX { -1.0 } else { 0.0 });
        assert!(hat.contains(HatDirection::Left));
        assert!(!hat.contains(HatDirection::Up));
    }
}
