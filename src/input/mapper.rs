//! Device mapper: raw device snapshot → semantic controller signals
//!
//! Each call looks at one half (left/right) of one device-class binding.
//! A disconnected device (`None` snapshot) yields neutral output.

use super::binding::{ControllerBinding, DeviceBinding, SideBinding};
use super::raw::RawDeviceState;
use super::state::{ButtonSet, PadButton, Side, StickVector, STICK_MAX};

/// Scale an analog axis value to a signed 16-bit stick component
///
/// # Arguments
/// * `value` - Axis value (-1.0 to 1.0)
/// * `deadzone` - Magnitude at or below which the axis is neutral
///
/// # Returns
/// `value * 32767`, clamped to ±32767; 0 inside the deadzone
pub fn scale_axis(value: f32, deadzone: f32) -> i16 {
    if value.is_nan() || value.abs() <= deadzone {
        return 0;
    }

    let max = f32::from(STICK_MAX);
    (value * max).clamp(-max, max) as i16
}

/// Apply per-axis inversion to a stick vector
pub fn apply_inversion(stick: StickVector, invert_x: bool, invert_y: bool) -> StickVector {
    StickVector {
        x: if invert_x { stick.x.saturating_neg() } else { stick.x },
        y: if invert_y { stick.y.saturating_neg() } else { stick.y },
    }
}

/// Digital direction flags for a stick vector
///
/// Nothing is set below `threshold` magnitude. Above it, each component
/// contributes its direction when it carries at least sin(22.5°) of the
/// deflection, which gives 8-way output.
pub fn stick_direction_flags(stick: StickVector, threshold: f32, side: Side) -> ButtonSet {
    const COMPONENT_SHARE: f32 = 0.382_683_43;

    let magnitude = stick.magnitude();
    let mut flags = ButtonSet::EMPTY;
    if stick.is_neutral() || magnitude < threshold {
        return flags;
    }

    let [right, left, up, down] = PadButton::stick_directions(side);
    let x = f32::from(stick.x) / f32::from(STICK_MAX) / magnitude;
    let y = f32::from(stick.y) / f32::from(STICK_MAX) / magnitude;

    flags.insert_if(right, x >= COMPONENT_SHARE);
    flags.insert_if(left, x <= -COMPONENT_SHARE);
    flags.insert_if(up, y >= COMPONENT_SHARE);
    flags.insert_if(down, y <= -COMPONENT_SHARE);
    flags
}

/// Mapper for one device-class binding
///
/// Tuning (deadzones, trigger threshold) comes from the owning
/// [`ControllerBinding`].
pub struct DeviceMapper<'a> {
    controller: &'a ControllerBinding,
    binding: &'a DeviceBinding,
}

impl<'a> DeviceMapper<'a> {
    pub fn new(controller: &'a ControllerBinding, binding: &'a DeviceBinding) -> Self {
        Self { controller, binding }
    }

    /// Buttons pressed on both halves
    pub fn buttons(&self, raw: Option<&RawDeviceState>) -> ButtonSet {
        self.side_buttons(raw, Side::Left)
            .union(self.side_buttons(raw, Side::Right))
    }

    /// Buttons pressed on one half
    pub fn side_buttons(&self, raw: Option<&RawDeviceState>, side: Side) -> ButtonSet {
        let Some(raw) = raw else {
            return ButtonSet::EMPTY;
        };

        self.binding
            .side(side)
            .buttons
            .iter()
            .filter(|(_, input)| raw.is_active(**input, self.controller.trigger_threshold))
            .map(|(button, _)| *button)
            .collect()
    }

    pub fn left_stick(&self, raw: Option<&RawDeviceState>) -> StickVector {
        self.stick(raw, Side::Left)
    }

    pub fn right_stick(&self, raw: Option<&RawDeviceState>) -> StickVector {
        self.stick(raw, Side::Right)
    }

    /// Stick vector for one half. Raw Y grows downward, so it is negated.
    pub fn stick(&self, raw: Option<&RawDeviceState>, side: Side) -> StickVector {
        let Some(raw) = raw else {
            return StickVector::NEUTRAL;
        };

        let deadzone = self.controller.deadzone(side);
        let SideBinding { stick_x, stick_y, .. } = self.binding.side(side);

        StickVector {
            x: stick_x.map_or(0, |axis| scale_axis(raw.axis(axis), deadzone)),
            y: stick_y.map_or(0, |axis| scale_axis(-raw.axis(axis), deadzone)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::binding::ControllerBinding;
    use crate::input::binding::ControllerSource;
    use crate::input::raw::{HatDirection, HatState};
    use proptest::prelude::*;

    fn default_device() -> (ControllerBinding, DeviceBinding) {
        let controller = ControllerBinding::device(0, 0);
        match controller.source.clone() {
            ControllerSource::Device(device) => (controller, device),
            ControllerSource::Keyboard(_) => unreachable!(),
        }
    }

    fn idle_state() -> RawDeviceState {
        RawDeviceState {
            buttons: vec![false; 15],
            axes: vec![0.0; 6],
            hats: vec![HatState::CENTERED],
        }
    }

    #[test]
    fn test_full_deflection_scales_to_max() {
        assert_eq!(scale_axis(1.0, 0.1), 32767);
        assert_eq!(scale_axis(-1.0, 0.1), -32767);
    }

    #[test]
    fn test_out_of_range_values_clamp_both_sides() {
        assert_eq!(scale_axis(1.5, 0.1), 32767);
        assert_eq!(scale_axis(-1.5, 0.1), -32767);
    }

    #[test]
    fn test_deadzone_boundary_is_neutral() {
        assert_eq!(scale_axis(0.15, 0.15), 0);
        assert_eq!(scale_axis(-0.15, 0.15), 0);
        assert_ne!(scale_axis(0.16, 0.15), 0);
        assert_eq!(scale_axis(f32::NAN, 0.15), 0);
    }

    #[test]
    fn test_disconnected_device_is_neutral() {
        let (controller, device) = default_device();
        let mapper = DeviceMapper::new(&controller, &device);
        assert!(mapper.buttons(None).is_empty());
        assert_eq!(mapper.left_stick(None), StickVector::NEUTRAL);
        assert_eq!(mapper.right_stick(None), StickVector::NEUTRAL);
    }

    #[test]
    fn test_y_axis_is_negated() {
        let (controller, device) = default_device();
        let mapper = DeviceMapper::new(&controller, &device);
        let mut raw = idle_state();
        raw.axes[0] = 1.0;
        raw.axes[1] = 1.0; // pushed down in device convention

        assert_eq!(mapper.left_stick(Some(&raw)), StickVector::new(32767, -32767));
        assert_eq!(mapper.right_stick(Some(&raw)), StickVector::NEUTRAL);
    }

    #[test]
    fn test_buttons_and_hats() {
        let (controller, device) = default_device();
        let mapper = DeviceMapper::new(&controller, &device);
        let mut raw = idle_state();
        raw.buttons[1] = true;
        raw.hats[0] = HatState::from_directions(&[HatDirection::Up, HatDirection::Left]);

        let buttons = mapper.buttons(Some(&raw));
        assert!(buttons.contains(PadButton::A));
        assert!(buttons.contains(PadButton::DpadUp));
        assert!(buttons.contains(PadButton::DpadLeft));
        assert!(!buttons.contains(PadButton::DpadDown));
        assert!(!buttons.contains(PadButton::B));
        assert!(mapper.side_buttons(Some(&raw), Side::Right).contains(PadButton::A));
        assert!(!mapper.side_buttons(Some(&raw), Side::Right).contains(PadButton::DpadUp));
    }

    #[test]
    fn test_axis_bound_button_uses_trigger_threshold() {
        let (controller, mut device) = default_device();
        device.left.buttons.insert(
            PadButton::Zl,
            crate::input::raw::RawInput::Axis {
                index: 2,
                polarity: crate::input::raw::AxisPolarity::Positive,
            },
        );
        let mapper = DeviceMapper::new(&controller, &device);
        let mut raw = idle_state();

        raw.axes[2] = 0.5;
        assert!(!mapper.buttons(Some(&raw)).contains(PadButton::Zl));
        raw.axes[2] = 0.51;
        assert!(mapper.buttons(Some(&raw)).contains(PadButton::Zl));
    }

    #[test]
    fn test_each_stick_uses_its_own_deadzone() {
        let (mut controller, device) = default_device();
        controller.deadzone_left = 0.1;
        controller.deadzone_right = 0.6;
        let mapper = DeviceMapper::new(&controller, &device);
        let mut raw = idle_state();
        raw.axes[0] = 0.5;
        raw.axes[3] = 0.5;

        assert_eq!(mapper.left_stick(Some(&raw)).x, scale_axis(0.5, 0.1));
        assert!(mapper.right_stick(Some(&raw)).is_neutral());
        raw.axes[3] = 0.7;
        assert!(!mapper.right_stick(Some(&raw)).is_neutral());
    }

    #[test]
    fn test_inversion() {
        let stick = StickVector::new(100, -32767);
        assert_eq!(apply_inversion(stick, true, true), StickVector::new(-100, 32767));
        assert_eq!(apply_inversion(stick, false, false), stick);
    }

    #[test]
    fn test_direction_flags() {
        let up_right = stick_direction_flags(StickVector::new(20000, 20000), 0.5, Side::Left);
        assert!(up_right.contains(PadButton::LeftStickUp));
        assert!(up_right.contains(PadButton::LeftStickRight));

        let mostly_left = stick_direction_flags(StickVector::new(-30000, 2000), 0.5, Side::Right);
        assert_eq!(mostly_left, [PadButton::RightStickLeft].into_iter().collect());

        assert!(stick_direction_flags(StickVector::new(1000, 0), 0.5, Side::Left).is_empty());
        assert!(stick_direction_flags(StickVector::NEUTRAL, 0.0, Side::Left).is_empty());
    }

    proptest! {
        #[test]
        fn prop_inside_deadzone_is_zero(deadzone in 0.0f32..0.99, frac in 0.0f32..=1.0) {
            let value = deadzone * frac;
            prop_assert_eq!(scale_axis(value, deadzone), 0);
            prop_assert_eq!(scale_axis(-value, deadzone), 0);
        }

        #[test]
        fn prop_output_is_symmetric_and_bounded(value in -4.0f32..4.0, deadzone in 0.0f32..0.5) {
            let out = scale_axis(value, deadzone);
            prop_assert!(out >= -32767);
            prop_assert_eq!(scale_axis(-value, deadzone), -out);
        }
    }
}
