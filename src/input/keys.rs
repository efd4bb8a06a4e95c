//! Host keyboard keys and the per-tick key matrix

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::BindingError;

macro_rules! keys {
    ($($variant:ident => $label:literal),+ $(,)?) => {
        /// A host keyboard key, identified by its label.
        ///
        /// Keys the host layer cannot translate arrive as [`Key::Unknown`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum Key {
            $($variant,)+
            Unknown,
        }

        impl Key {
            /// Every translatable key, in matrix bit order.
            pub const ALL: &'static [Key] = &[$(Key::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $(Key::$variant => $label,)+
                    Key::Unknown => "Unknown",
                }
            }

            pub fn from_label(label: &str) -> Option<Key> {
                match label {
                    $($label => Some(Key::$variant),)+
                    "Unknown" => Some(Key::Unknown),
                    _ => None,
                }
            }
        }
    };
}

keys! {
    A => "A", B => "B", C => "C", D => "D", E => "E", F => "F", G => "G",
    H => "H", I => "I", J => "J", K => "K", L => "L", M => "M", N => "N",
    O => "O", P => "P", Q => "Q", R => "R", S => "S", T => "T", U => "U",
    V => "V", W => "W", X => "X", Y => "Y", Z => "Z",
    Num0 => "Digit0", Num1 => "Digit1", Num2 => "Digit2", Num3 => "Digit3", Num4 => "Digit4",
    Num5 => "Digit5", Num6 => "Digit6", Num7 => "Digit7", Num8 => "Digit8", Num9 => "Digit9",
    F1 => "F1", F2 => "F2", F3 => "F3", F4 => "F4", F5 => "F5", F6 => "F6",
    F7 => "F7", F8 => "F8", F9 => "F9", F10 => "F10", F11 => "F11", F12 => "F12",
    Up => "Up", Down => "Down", Left => "Left", Right => "Right",
    Enter => "Enter", Escape => "Escape", Space => "Space", Tab => "Tab",
    Backspace => "Backspace",
    LeftShift => "LeftShift", RightShift => "RightShift",
    LeftCtrl => "LeftCtrl", RightCtrl => "RightCtrl",
    LeftAlt => "LeftAlt", RightAlt => "RightAlt",
    Insert => "Insert", Delete => "Delete", Home => "Home", End => "End",
    PageUp => "PageUp", PageDown => "PageDown",
    Minus => "Minus", Equals => "Equals", Comma => "Comma", Period => "Period",
    Slash => "Slash", Semicolon => "Semicolon",
}

impl Key {
    /// Bit position in a [`KeyMatrix`]; `None` for [`Key::Unknown`].
    pub fn matrix_bit(self) -> Option<u32> {
        Key::ALL.iter().position(|k| *k == self).map(|p| p as u32)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Key {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::from_label(s.trim()).ok_or_else(|| BindingError::InvalidKeyLabel(s.to_string()))
    }
}

impl TryFrom<String> for Key {
    type Error = BindingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.label().to_string()
    }
}

/// Set of keys held during one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyMatrix(u128);

impl KeyMatrix {
    pub fn from_keys<I: IntoIterator<Item = Key>>(keys: I) -> Self {
        keys.into_iter().fold(KeyMatrix::default(), |mut matrix, key| {
            matrix.press(key);
            matrix
        })
    }

    pub fn press(&mut self, key: Key) {
        if let Some(bit) = key.matrix_bit() {
            self.0 |= 1u128 << bit;
        }
    }

    pub fn contains(&self, key: Key) -> bool {
        key.matrix_bit().is_some_and(|bit| self.0 & (1u128 << bit) != 0)
    }

    /// True when every key of `combo` is held. An empty combo never matches.
    pub fn contains_all(&self, combo: &[Key]) -> bool {
        !combo.is_empty() && combo.iter().all(|k| self.contains(*k))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u128 {
        self.0
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        Key::ALL.iter().copied().filter(|k| self.contains(*k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_fits_u128() {
        assert!(Key::ALL.len() <= 128);
    }

    #[test]
    fn test_label_round_trip() {
        for key in Key::ALL {
            assert_eq!(Key::from_label(key.label()), Some(*key));
        }
        assert_eq!("F7".parse::<Key>().unwrap(), Key::F7);
        assert!("Hyper".parse::<Key>().is_err());
    }

    #[test]
    fn test_unknown_never_enters_matrix() {
        let matrix = KeyMatrix::from_keys([Key::Unknown]);
        assert!(matrix.is_empty());
        assert!(!matrix.contains(Key::Unknown));
    }

    #[test]
    fn test_combo_matching() {
        let matrix = KeyMatrix::from_keys([Key::LeftAlt, Key::Enter, Key::A]);
        assert!(matrix.contains_all(&[Key::LeftAlt, Key::Enter]));
        assert!(!matrix.contains_all(&[Key::LeftCtrl, Key::Enter]));
        assert!(!matrix.contains_all(&[]));
        assert_eq!(matrix.keys().count(), 3);
    }
}
