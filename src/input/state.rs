//! Normalized per-frame controller state

use serde::{Deserialize, Serialize};

use super::keys::KeyMatrix;

/// Largest stick magnitude on either axis. The range is symmetric.
pub const STICK_MAX: i16 = i16::MAX;

/// Left or right half of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Semantic controller button. Discriminants are bit positions in a
/// [`ButtonSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadButton {
    A = 0,
    B = 1,
    Select = 2,
    Start = 3,
    DpadRight = 4,
    DpadLeft = 5,
    DpadUp = 6,
    DpadDown = 7,
    R = 8,
    L = 9,
    X = 10,
    Y = 11,
    Zl = 12,
    Zr = 13,
    LeftStickClick = 14,
    RightStickClick = 15,
    Home = 16,
    LeftStickRight = 20,
    LeftStickLeft = 21,
    LeftStickUp = 22,
    LeftStickDown = 23,
    RightStickRight = 24,
    RightStickLeft = 25,
    RightStickUp = 26,
    RightStickDown = 27,
}

impl PadButton {
    /// Physical buttons that can be bound. Stick-direction flags are derived
    /// from the stick vectors instead.
    pub const BINDABLE: [PadButton; 17] = [
        PadButton::A,
        PadButton::B,
        PadButton::Select,
        PadButton::Start,
        PadButton::DpadRight,
        PadButton::DpadLeft,
        PadButton::DpadUp,
        PadButton::DpadDown,
        PadButton::R,
        PadButton::L,
        PadButton::X,
        PadButton::Y,
        PadButton::Zl,
        PadButton::Zr,
        PadButton::LeftStickClick,
        PadButton::RightStickClick,
        PadButton::Home,
    ];

    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Controller half the button belongs to.
    pub fn side(self) -> Side {
        match self {
            PadButton::Select
            | PadButton::DpadRight
            | PadButton::DpadLeft
            | PadButton::DpadUp
            | PadButton::DpadDown
            | PadButton::L
            | PadButton::Zl
            | PadButton::LeftStickClick
            | PadButton::LeftStickRight
            | PadButton::LeftStickLeft
            | PadButton::LeftStickUp
            | PadButton::LeftStickDown => Side::Left,
            _ => Side::Right,
        }
    }

    /// Digital direction flags for one stick: (right, left, up, down).
    pub fn stick_directions(side: Side) -> [PadButton; 4] {
        match side {
            Side::Left => [
                PadButton::LeftStickRight,
                PadButton::LeftStickLeft,
                PadButton::LeftStickUp,
                PadButton::LeftStickDown,
            ],
            Side::Right => [
                PadButton::RightStickRight,
                PadButton::RightStickLeft,
                PadButton::RightStickUp,
                PadButton::RightStickDown,
            ],
        }
    }
}

/// Bitmask of pressed [`PadButton`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ButtonSet(u32);

impl ButtonSet {
    pub const EMPTY: ButtonSet = ButtonSet(0);

    pub fn insert(&mut self, button: PadButton) {
        self.0 |= button.bit();
    }

    pub fn insert_if(&mut self, button: PadButton, pressed: bool) {
        if pressed {
            self.insert(button);
        }
    }

    pub fn contains(&self, button: PadButton) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn union(self, other: ButtonSet) -> ButtonSet {
        ButtonSet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl FromIterator<PadButton> for ButtonSet {
    fn from_iter<I: IntoIterator<Item = PadButton>>(iter: I) -> Self {
        let mut set = ButtonSet::EMPTY;
        for button in iter {
            set.insert(button);
        }
        set
    }
}

/// Signed stick deflection. Positive Y is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StickVector {
    pub x: i16,
    pub y: i16,
}

impl StickVector {
    pub const NEUTRAL: StickVector = StickVector { x: 0, y: 0 };

    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// Deflection magnitude in [0.0, ~1.414].
    pub fn magnitude(&self) -> f32 {
        let x = f32::from(self.x) / f32::from(STICK_MAX);
        let y = f32::from(self.y) / f32::from(STICK_MAX);
        (x * x + y * y).sqrt()
    }

    pub fn is_neutral(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

/// One touch contact in logical panel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TouchPoint {
    pub x: u16,
    pub y: u16,
}

/// Everything one virtual controller reports for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedControllerState {
    pub buttons: ButtonSet,
    pub left_stick: StickVector,
    pub right_stick: StickVector,
    pub keyboard: Option<KeyMatrix>,
    pub touch: Option<TouchPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_bits_are_distinct() {
        let all: ButtonSet = PadButton::BINDABLE.into_iter().collect();
        assert_eq!(all.bits().count_ones() as usize, PadButton::BINDABLE.len());
    }

    #[test]
    fn test_sides() {
        assert_eq!(PadButton::DpadUp.side(), Side::Left);
        assert_eq!(PadButton::A.side(), Side::Right);
        assert_eq!(PadButton::Zl.side(), Side::Left);
        assert_eq!(PadButton::Zr.side(), Side::Right);
    }

    #[test]
    fn test_stick_magnitude() {
        assert_eq!(StickVector::NEUTRAL.magnitude(), 0.0);
        assert!((StickVector::new(STICK_MAX, 0).magnitude() - 1.0).abs() < 1e-6);
    }
}
