//! Hotkey edge detection
//!
//! Hotkey combinations are sampled every poll. A hotkey fires once on the
//! unset→set transition and stays quiet while the combination is held.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Actions bound to keyboard combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hotkey {
    VsyncToggle,
}

impl Hotkey {
    pub const ALL: [Hotkey; 1] = [Hotkey::VsyncToggle];

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Bitmask of held or fired hotkeys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HotkeySet(u32);

impl HotkeySet {
    pub const EMPTY: HotkeySet = HotkeySet(0);

    pub fn insert(&mut self, hotkey: Hotkey) {
        self.0 |= hotkey.bit();
    }

    pub fn contains(&self, hotkey: Hotkey) -> bool {
        self.0 & hotkey.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Hotkey> + '_ {
        Hotkey::ALL.into_iter().filter(|h| self.contains(*h))
    }

    /// Flags set in `self` but not in `previous`.
    fn rising_since(self, previous: HotkeySet) -> HotkeySet {
        HotkeySet(self.0 & !previous.0)
    }
}

impl FromIterator<Hotkey> for HotkeySet {
    fn from_iter<I: IntoIterator<Item = Hotkey>>(iter: I) -> Self {
        let mut set = HotkeySet::EMPTY;
        for hotkey in iter {
            set.insert(hotkey);
        }
        set
    }
}

/// Remembers the previous poll's hotkey flags per controller.
#[derive(Debug, Default)]
pub struct HotkeyDetector {
    previous: HashMap<usize, HotkeySet>,
}

impl HotkeyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this poll's flags for `controller` and return the hotkeys that
    /// just became active.
    pub fn update(&mut self, controller: usize, current: HotkeySet) -> HotkeySet {
        let previous = self.previous.insert(controller, current).unwrap_or_default();
        current.rising_since(previous)
    }

    /// Forget all history (e.g. after bindings change).
    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(held: bool) -> HotkeySet {
        if held {
            [Hotkey::VsyncToggle].into_iter().collect()
        } else {
            HotkeySet::EMPTY
        }
    }

    #[test]
    fn test_fires_once_per_press() {
        let mut detector = HotkeyDetector::new();
        let fired: Vec<bool> = [false, true, true, true, false]
            .into_iter()
            .map(|held| detector.update(0, flags(held)).contains(Hotkey::VsyncToggle))
            .collect();

        assert_eq!(fired, vec![false, true, false, false, false]);
    }

    #[test]
    fn test_fired_set_lists_hotkeys() {
        let mut detector = HotkeyDetector::new();
        let fired = detector.update(0, flags(true));
        assert_eq!(fired.iter().collect::<Vec<_>>(), vec![Hotkey::VsyncToggle]);
        assert_eq!(detector.update(0, flags(true)).iter().count(), 0);
    }

    #[test]
    fn test_refires_after_release() {
        let mut detector = HotkeyDetector::new();
        assert!(!detector.update(0, flags(true)).is_empty());
        assert!(detector.update(0, flags(false)).is_empty());
        assert!(!detector.update(0, flags(true)).is_empty());
    }

    #[test]
    fn test_controllers_are_independent() {
        let mut detector = HotkeyDetector::new();
        assert!(!detector.update(0, flags(true)).is_empty());
        assert!(!detector.update(1, flags(true)).is_empty());
        assert!(detector.update(0, flags(true)).is_empty());
    }
}
