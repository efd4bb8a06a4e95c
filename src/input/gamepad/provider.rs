//! GilRs gamepad backend with hot-plug support
//!
//! `Gilrs` is not `Send`, so it lives on a dedicated polling thread. The
//! thread drains gilrs events, keeps the slot table in sync with
//! connections, and publishes a fresh [`RawDeviceState`] per connected pad
//! every poll. Readers only ever see the shared [`SlotTable`].
//!
//! [`RawDeviceState`]: crate::input::raw::RawDeviceState

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use gilrs::{Event, EventType, GamepadId, Gilrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::layout;
use super::slot::SlotTable;

/// Shared slot table type published by the backend
pub type GamepadSlots = SlotTable<GamepadId>;

/// Interval between presence checks for pads that vanished without an event
const PRESENCE_CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// GilRs polling thread handle
pub struct GilrsBackend {
    slots: Arc<GamepadSlots>,
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl GilrsBackend {
    /// Start the polling thread
    ///
    /// # Arguments
    /// * `poll_interval` - Sleep between polls
    ///
    /// # Returns
    /// Running backend, or an error if gilrs cannot be initialized
    pub fn start(poll_interval: Duration) -> Result<Self> {
        let slots = Arc::new(GamepadSlots::new());
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = channel::bounded::<Result<(), String>>(1);

        let thread_slots = slots.clone();
        let thread = thread::Builder::new()
            .name("gilrs".to_string())
            .spawn(move || {
                // Initialize gilrs in this thread (not Send-safe)
                let gilrs = match Gilrs::new() {
                    Ok(g) => {
                        info!("GilRs initialized");
                        let _ = ready_tx.send(Ok(()));
                        g
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("{:?}", e)));
                        return;
                    }
                };
                Self::event_loop_blocking(gilrs, &thread_slots, &shutdown_rx, poll_interval);
            })
            .context("Failed to spawn gilrs thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => anyhow::bail!("Failed to initialize GilRs: {}", e),
            Err(_) => anyhow::bail!("GilRs thread exited during startup"),
        }

        Ok(Self {
            slots,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Shared slot table (a [`DeviceSource`](crate::input::host::DeviceSource))
    pub fn slots(&self) -> Arc<GamepadSlots> {
        self.slots.clone()
    }

    /// Main event loop (runs in dedicated blocking thread)
    fn event_loop_blocking(
        mut gilrs: Gilrs,
        slots: &GamepadSlots,
        shutdown_rx: &Receiver<()>,
        poll_interval: Duration,
    ) {
        let initial: Vec<(GamepadId, String)> = gilrs
            .gamepads()
            .filter(|(_, gp)| gp.is_connected())
            .map(|(id, gp)| (id, gp.name().to_string()))
            .collect();

        if initial.is_empty() {
            info!("No gamepads connected yet, waiting for hot-plug");
        }
        slots.update(|manager| manager.connect_all(&initial));

        let mut last_presence_check = Instant::now();

        loop {
            // Check for shutdown signal (non-blocking)
            match shutdown_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    info!("Gamepad backend shutting down");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            // Process gilrs events; this also refreshes each pad's cached state
            while let Some(Event { id, event, .. }) = gilrs.next_event() {
                match event {
                    EventType::Connected => {
                        let name = gilrs.gamepad(id).name().to_string();
                        slots.update(|m| m.try_connect(id, &name));
                    }
                    EventType::Disconnected => {
                        slots.update(|m| m.disconnect(id));
                    }
                    _ => {}
                }
            }

            if last_presence_check.elapsed() >= PRESENCE_CHECK_INTERVAL {
                last_presence_check = Instant::now();
                let gone = slots.update(|m| m.check_disconnections(|id| gilrs.connected_gamepad(id).is_some()));
                if !gone.is_empty() {
                    debug!("Presence check released slots {:?}", gone);
                }
            }

            let snapshots: Vec<_> = gilrs
                .gamepads()
                .filter(|(_, gp)| gp.is_connected())
                .map(|(id, gp)| (id, layout::snapshot(&gp)))
                .collect();
            slots.update(|m| {
                for (id, state) in snapshots {
                    m.update_state(id, state);
                }
            });

            thread::sleep(poll_interval);
        }
    }

    /// Stop the polling thread and wait for it
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Gamepad thread panicked");
            }
        }
    }
}

impl Drop for GilrsBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}
