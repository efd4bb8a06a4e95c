//! Gamepad slot management for multi-gamepad support
//!
//! Each connected gamepad occupies a slot whose index is the device index
//! bindings refer to (`device: 0`, `device: 1`, ...). Slots are handed out
//! in connection order and survive disconnects:
//! - A reconnecting gamepad reclaims the slot its name last held
//! - Otherwise it takes the first free slot, or a new one
//! - A disconnected slot reports no snapshot (neutral input)

use parking_lot::RwLock;
use std::fmt::Debug;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::input::host::DeviceSource;
use crate::input::raw::RawDeviceState;

/// One device position
#[derive(Debug, Clone)]
pub struct GamepadSlot<I> {
    /// Slot index (0-based device index)
    pub slot_index: usize,

    /// Currently connected gamepad ID (None if disconnected)
    pub connected_id: Option<I>,

    /// Name of the gamepad that last held this slot
    pub name: Option<String>,

    /// Timestamp of last connection/disconnection event
    pub last_change: Instant,

    /// Latest snapshot while connected
    pub state: Option<RawDeviceState>,
}

impl<I: Copy + PartialEq> GamepadSlot<I> {
    fn new(slot_index: usize) -> Self {
        Self {
            slot_index,
            connected_id: None,
            name: None,
            last_change: Instant::now(),
            state: None,
        }
    }

    fn connect(&mut self, id: I, name: &str) {
        self.connected_id = Some(id);
        self.name = Some(name.to_string());
        self.last_change = Instant::now();
    }

    fn disconnect(&mut self) {
        self.connected_id = None;
        self.state = None;
        self.last_change = Instant::now();
    }

    pub fn is_connected(&self) -> bool {
        self.connected_id.is_some()
    }
}

/// Manages gamepad slot assignments
#[derive(Debug)]
pub struct SlotManager<I> {
    slots: Vec<GamepadSlot<I>>,
}

impl<I> Default for SlotManager<I> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<I: Copy + PartialEq + Debug> SlotManager<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the slot a gamepad should use
    ///
    /// # Returns
    /// `(slot_index, is_reconnect)`; the index may be one past the end when
    /// a new slot is needed
    pub fn find_slot_for_gamepad(&self, id: I, name: &str) -> (usize, bool) {
        if let Some(idx) = self.slots.iter().position(|s| s.connected_id == Some(id)) {
            return (idx, true);
        }

        if let Some(idx) = self
            .slots
            .iter()
            .position(|s| !s.is_connected() && s.name.as_deref() == Some(name))
        {
            debug!("Gamepad \"{}\" reclaims slot {}", name, idx);
            return (idx, true);
        }

        if let Some(idx) = self.slots.iter().position(|s| !s.is_connected() && s.name.is_none()) {
            return (idx, false);
        }

        // Free slots last held by other pads are reused only when nothing
        // else is available.
        match self.slots.iter().position(|s| !s.is_connected()) {
            Some(idx) => (idx, false),
            None => (self.slots.len(), false),
        }
    }

    /// Attach a gamepad and return its slot index
    pub fn try_connect(&mut self, id: I, name: &str) -> usize {
        let (slot_idx, is_reconnect) = self.find_slot_for_gamepad(id, name);
        if slot_idx == self.slots.len() {
            self.slots.push(GamepadSlot::new(slot_idx));
        }

        let slot = &mut self.slots[slot_idx];
        if slot.connected_id != Some(id) {
            slot.connect(id, name);
            info!(
                "✅ Gamepad {} {}connected: {} (ID: {:?})",
                slot_idx,
                if is_reconnect { "re" } else { "" },
                name,
                id
            );
        }
        slot_idx
    }

    /// Attach the gamepads already present at startup, in enumeration order
    ///
    /// # Returns
    /// Slot index of each pad, in the order given
    pub fn connect_all(&mut self, pads: &[(I, String)]) -> Vec<usize> {
        pads.iter().map(|(id, name)| self.try_connect(*id, name)).collect()
    }

    /// Detach a gamepad, returning the slot it held
    pub fn disconnect(&mut self, id: I) -> Option<usize> {
        let slot = self.slots.iter_mut().find(|s| s.connected_id == Some(id))?;
        warn!(
            "🔌 Gamepad {} disconnected: {}",
            slot.slot_index,
            slot.name.as_deref().unwrap_or("Unknown")
        );
        slot.disconnect();
        Some(slot.slot_index)
    }

    /// Drop every slot whose gamepad `is_present` no longer reports
    pub fn check_disconnections(&mut self, is_present: impl Fn(I) -> bool) -> Vec<usize> {
        let gone: Vec<I> = self
            .slots
            .iter()
            .filter_map(|s| s.connected_id)
            .filter(|id| !is_present(*id))
            .collect();

        gone.into_iter().filter_map(|id| self.disconnect(id)).collect()
    }

    pub fn update_state(&mut self, id: I, state: RawDeviceState) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.connected_id == Some(id)) {
            slot.state = Some(state);
        }
    }

    pub fn slots(&self) -> &[GamepadSlot<I>] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Slot manager shared between the polling thread and input readers
#[derive(Debug)]
pub struct SlotTable<I> {
    inner: RwLock<SlotManager<I>>,
}

impl<I> Default for SlotTable<I> {
    fn default() -> Self {
        Self { inner: RwLock::new(SlotManager::default()) }
    }
}

impl<I: Copy + PartialEq + Debug> SlotTable<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access (polling thread)
    pub fn update<R>(&self, f: impl FnOnce(&mut SlotManager<I>) -> R) -> R {
        f(&mut self.inner.write())
    }
}

impl<I: Copy + PartialEq + Debug + Send + Sync> DeviceSource for SlotTable<I> {
    fn device_state(&self, index: usize) -> Option<RawDeviceState> {
        self.inner.read().slots.get(index)?.state.clone()
    }

    fn device_name(&self, index: usize) -> Option<String> {
        let manager = self.inner.read();
        let slot = manager.slots.get(index)?;
        if slot.is_connected() { slot.name.clone() } else { None }
    }

    fn connected_devices(&self) -> Vec<usize> {
        self.inner
            .read()
            .slots
            .iter()
            .filter(|s| s.is_connected())
            .map(|s| s.slot_index)
            .collect()
    }
}
