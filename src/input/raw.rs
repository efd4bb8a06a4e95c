//! Raw physical-device inputs
//!
//! A raw input identifier names one physical control on a host device: a
//! discrete button, one direction of an analog axis, or one direction of a
//! hat switch. Identifiers have two interchangeable forms:
//!
//! - a human-readable label (`Button3`, `Axis1+`, `Hat0Up`) used in config
//!   files and capture results
//! - a numeric code split into three ranges (buttons, axes, hats)
//!
//! Hat codes are built from an explicit per-hat base plus a direction
//! offset, so hat 1 "up" can never decode as a direction of hat 0.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::BindingError;

/// First code of the axis range; codes below are buttons.
pub const AXIS_BASE: u32 = 1000;
/// First code of the hat range.
pub const HAT_BASE: u32 = 2000;
/// Codes reserved per hat (one per cardinal direction).
pub const HAT_STRIDE: u32 = 4;
/// One past the last valid code.
pub const CODE_LIMIT: u32 = 3000;

/// Direction of an analog axis that counts as "pressed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AxisPolarity {
    Positive,
    Negative,
}

impl AxisPolarity {
    /// Signed value of `value` measured in this direction.
    pub fn apply(self, value: f32) -> f32 {
        match self {
            AxisPolarity::Positive => value,
            AxisPolarity::Negative => -value,
        }
    }

    fn symbol(self) -> char {
        match self {
            AxisPolarity::Positive => '+',
            AxisPolarity::Negative => '-',
        }
    }
}

/// One cardinal direction of a hat switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HatDirection {
    Up,
    Right,
    Down,
    Left,
}

impl HatDirection {
    pub const ALL: [HatDirection; 4] = [
        HatDirection::Up,
        HatDirection::Right,
        HatDirection::Down,
        HatDirection::Left,
    ];

    /// Offset of this direction inside a hat's code block.
    pub fn offset(self) -> u32 {
        match self {
            HatDirection::Up => 0,
            HatDirection::Right => 1,
            HatDirection::Down => 2,
            HatDirection::Left => 3,
        }
    }

    pub fn from_offset(offset: u32) -> Option<Self> {
        Self::ALL.get(offset as usize).copied()
    }

    /// Bit used for this direction in a [`HatState`].
    fn mask(self) -> u8 {
        1 << self.offset()
    }

    fn name(self) -> &'static str {
        match self {
            HatDirection::Up => "Up",
            HatDirection::Right => "Right",
            HatDirection::Down => "Down",
            HatDirection::Left => "Left",
        }
    }
}

/// Combined state of one hat switch. Diagonals set two direction bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HatState(u8);

impl HatState {
    pub const CENTERED: HatState = HatState(0);

    pub fn from_directions(directions: &[HatDirection]) -> Self {
        HatState(directions.iter().fold(0, |acc, d| acc | d.mask()))
    }

    pub fn contains(self, direction: HatDirection) -> bool {
        self.0 & direction.mask() != 0
    }

    pub fn is_centered(self) -> bool {
        self.0 == 0
    }

    pub fn with(self, direction: HatDirection, pressed: bool) -> Self {
        if pressed {
            HatState(self.0 | direction.mask())
        } else {
            HatState(self.0 & !direction.mask())
        }
    }
}

/// Identifier of one raw physical input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RawInput {
    Button(u16),
    Axis { index: u16, polarity: AxisPolarity },
    Hat { index: u16, direction: HatDirection },
}

impl RawInput {
    /// Classify a numeric code into its range and decode it.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            c if c < AXIS_BASE => Some(RawInput::Button(c as u16)),
            c if c < HAT_BASE => {
                let rel = c - AXIS_BASE;
                let polarity = if rel % 2 == 0 {
                    AxisPolarity::Positive
                } else {
                    AxisPolarity::Negative
                };
                Some(RawInput::Axis { index: (rel / 2) as u16, polarity })
            }
            c if c < CODE_LIMIT => {
                let rel = c - HAT_BASE;
                let index = rel / HAT_STRIDE;
                let direction = HatDirection::from_offset(rel - index * HAT_STRIDE)?;
                Some(RawInput::Hat { index: index as u16, direction })
            }
            _ => None,
        }
    }

    /// Numeric code of this identifier.
    pub fn code(self) -> u32 {
        match self {
            RawInput::Button(index) => u32::from(index),
            RawInput::Axis { index, polarity } => {
                let polarity = match polarity {
                    AxisPolarity::Positive => 0,
                    AxisPolarity::Negative => 1,
                };
                AXIS_BASE + u32::from(index) * 2 + polarity
            }
            RawInput::Hat { index, direction } => {
                HAT_BASE + u32::from(index) * HAT_STRIDE + direction.offset()
            }
        }
    }

    /// Human-readable label, e.g. `Button3`.
    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RawInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawInput::Button(index) => write!(f, "Button{}", index),
            RawInput::Axis { index, polarity } => write!(f, "Axis{}{}", index, polarity.symbol()),
            RawInput::Hat { index, direction } => write!(f, "Hat{}{}", index, direction.name()),
        }
    }
}

impl FromStr for RawInput {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BindingError::InvalidInputLabel(s.to_string());
        let label = s.trim();

        if let Some(rest) = label.strip_prefix("Button") {
            let index = rest.parse::<u16>().map_err(|_| invalid())?;
            let input = RawInput::Button(index);
            return if input.code() < AXIS_BASE { Ok(input) } else { Err(invalid()) };
        }

        if let Some(rest) = label.strip_prefix("Axis") {
            let (digits, polarity) = if let Some(d) = rest.strip_suffix('+') {
                (d, AxisPolarity::Positive)
            } else if let Some(d) = rest.strip_suffix('-') {
                (d, AxisPolarity::Negative)
            } else {
                return Err(invalid());
            };
            let index = digits.parse::<u16>().map_err(|_| invalid())?;
            let input = RawInput::Axis { index, polarity };
            return if input.code() < HAT_BASE { Ok(input) } else { Err(invalid()) };
        }

        if let Some(rest) = label.strip_prefix("Hat") {
            let split = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
            let (digits, name) = rest.split_at(split);
            let index = digits.parse::<u16>().map_err(|_| invalid())?;
            let direction = HatDirection::ALL
                .into_iter()
                .find(|d| d.name().eq_ignore_ascii_case(name))
                .ok_or_else(invalid)?;
            let input = RawInput::Hat { index, direction };
            return if input.code() < CODE_LIMIT { Ok(input) } else { Err(invalid()) };
        }

        Err(invalid())
    }
}

impl TryFrom<String> for RawInput {
    type Error = BindingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RawInput> for String {
    fn from(input: RawInput) -> Self {
        input.to_string()
    }
}

/// Snapshot of one physical device at poll time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDeviceState {
    pub buttons: Vec<bool>,
    /// Axis values in [-1.0, 1.0], device convention (Y grows downward).
    pub axes: Vec<f32>,
    pub hats: Vec<HatState>,
}

impl RawDeviceState {
    pub fn button(&self, index: u16) -> bool {
        self.buttons.get(index as usize).copied().unwrap_or(false)
    }

    pub fn axis(&self, index: u16) -> f32 {
        self.axes.get(index as usize).copied().unwrap_or(0.0)
    }

    pub fn hat(&self, index: u16) -> HatState {
        self.hats.get(index as usize).copied().unwrap_or(HatState::CENTERED)
    }

    /// Whether `input` is active. Axes count once the signed value in the
    /// bound direction exceeds `threshold`.
    pub fn is_active(&self, input: RawInput, threshold: f32) -> bool {
        match input {
            RawInput::Button(index) => self.button(index),
            RawInput::Axis { index, polarity } => polarity.apply(self.axis(index)) > threshold,
            RawInput::Hat { index, direction } => self.hat(index).contains(direction),
        }
    }

    /// Every active input in capture priority order: buttons, then axes,
    /// then hats.
    pub fn active_inputs(&self, threshold: f32) -> impl Iterator<Item = RawInput> + '_ {
        let buttons = (0..self.buttons.len() as u16).map(RawInput::Button);
        let axes = (0..self.axes.len() as u16).flat_map(|index| {
            [AxisPolarity::Positive, AxisPolarity::Negative]
                .into_iter()
                .map(move |polarity| RawInput::Axis { index, polarity })
        });
        let hats = (0..self.hats.len() as u16).flat_map(|index| {
            HatDirection::ALL
                .into_iter()
                .map(move |direction| RawInput::Hat { index, direction })
        });

        buttons
            .chain(axes)
            .chain(hats)
            .filter(move |input| self.is_active(*input, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(RawInput::Button(3).to_string(), "Button3");
        assert_eq!(
            RawInput::Axis { index: 1, polarity: AxisPolarity::Negative }.to_string(),
            "Axis1-"
        );
        assert_eq!(
            RawInput::Hat { index: 0, direction: HatDirection::Left }.to_string(),
            "Hat0Left"
        );
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("Button12".parse::<RawInput>().unwrap(), RawInput::Button(12));
        assert_eq!(
            "Axis2+".parse::<RawInput>().unwrap(),
            RawInput::Axis { index: 2, polarity: AxisPolarity::Positive }
        );
        assert_eq!(
            "Hat1Up".parse::<RawInput>().unwrap(),
            RawInput::Hat { index: 1, direction: HatDirection::Up }
        );
        assert!("Axis2".parse::<RawInput>().is_err());
        assert!("Hat1Diagonal".parse::<RawInput>().is_err());
        assert!("Button1000".parse::<RawInput>().is_err());
        assert!("Trigger".parse::<RawInput>().is_err());
    }

    #[test]
    fn test_code_ranges() {
        assert_eq!(RawInput::from_code(7), Some(RawInput::Button(7)));
        assert_eq!(
            RawInput::from_code(AXIS_BASE + 3),
            Some(RawInput::Axis { index: 1, polarity: AxisPolarity::Negative })
        );
        assert_eq!(RawInput::from_code(CODE_LIMIT), None);
    }

    #[test]
    fn test_hat_one_up_never_decodes_as_hat_zero() {
        let hat1_up = RawInput::Hat { index: 1, direction: HatDirection::Up };
        let code = hat1_up.code();
        assert_eq!(code, HAT_BASE + HAT_STRIDE);

        let decoded = RawInput::from_code(code).unwrap();
        assert_eq!(decoded, hat1_up);
        for direction in HatDirection::ALL {
            assert_ne!(decoded, RawInput::Hat { index: 0, direction });
        }
    }

    #[test]
    fn test_hat_state_activity() {
        let state = RawDeviceState {
            hats: vec![HatState::CENTERED, HatState::from_directions(&[HatDirection::Up])],
            ..Default::default()
        };
        assert!(state.is_active(RawInput::Hat { index: 1, direction: HatDirection::Up }, 0.5));
        assert!(!state.is_active(RawInput::Hat { index: 0, direction: HatDirection::Up }, 0.5));
    }

    #[test]
    fn test_axis_threshold() {
        let state = RawDeviceState { axes: vec![0.0, -0.8], ..Default::default() };
        let neg = RawInput::Axis { index: 1, polarity: AxisPolarity::Negative };
        let pos = RawInput::Axis { index: 1, polarity: AxisPolarity::Positive };
        assert!(state.is_active(neg, 0.5));
        assert!(!state.is_active(pos, 0.5));
        assert!(!state.is_active(neg, 0.8));
    }

    #[test]
    fn test_active_inputs_priority() {
        let state = RawDeviceState {
            buttons: vec![false, false, true],
            axes: vec![0.9],
            hats: vec![HatState::from_directions(&[HatDirection::Down])],
        };
        let active: Vec<_> = state.active_inputs(0.5).collect();
        assert_eq!(
            active,
            vec![
                RawInput::Button(2),
                RawInput::Axis { index: 0, polarity: AxisPolarity::Positive },
                RawInput::Hat { index: 0, direction: HatDirection::Down },
            ]
        );
    }

    #[test]
    fn test_out_of_range_reads_are_neutral() {
        let state = RawDeviceState::default();
        assert!(!state.button(40));
        assert_eq!(state.axis(9), 0.0);
        assert!(state.hat(3).is_centered());
    }

    #[test]
    fn test_serde_uses_labels() {
        let yaml = serde_yaml::to_string(&RawInput::Button(3)).unwrap();
        assert_eq!(yaml.trim(), "Button3");
        let parsed: RawInput = serde_yaml::from_str("Hat0Right").unwrap();
        assert_eq!(parsed, RawInput::Hat { index: 0, direction: HatDirection::Right });
    }
}
