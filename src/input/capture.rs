//! Binding capture
//!
//! A capture waits, on a short-lived worker thread, for the next physical
//! input the user activates and reports it over a channel the owner drains.
//! Only one capture runs at a time; requests made while one is waiting are
//! ignored.
//!
//! Inputs already held when the capture starts do not count: the worker
//! keeps the previous poll's snapshot and only reports inputs that became
//! active since then.

use crossbeam::channel::{self, Receiver, Sender};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::binding::{BindTarget, ControllerBinding};
use super::host::HostInput;
use super::keys::Key;
use super::raw::{RawDeviceState, RawInput};

/// Where the next input is expected from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureSource {
    Keyboard,
    Device {
        device: usize,
        /// Axis value that counts as an activation
        threshold: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    /// Virtual controller whose binding is being learned
    pub controller: usize,
    pub target: BindTarget,
    pub source: CaptureSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Key(Key),
    Input(RawInput),
    Cancelled,
    Disconnected,
}

impl CaptureOutcome {
    /// Label of the captured input (`"Button3"`, `"F7"`, `"Unknown"`)
    pub fn label(&self) -> Option<String> {
        match self {
            CaptureOutcome::Key(key) => Some(key.label().to_string()),
            CaptureOutcome::Input(input) => Some(input.label()),
            CaptureOutcome::Cancelled | CaptureOutcome::Disconnected => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureResult {
    pub request: CaptureRequest,
    pub outcome: CaptureOutcome,
}

impl CaptureResult {
    /// Write the captured input into `binding`. Cancelled and disconnected
    /// captures leave it untouched and return false.
    pub fn apply_to(&self, binding: &mut ControllerBinding) -> bool {
        match self.outcome {
            CaptureOutcome::Key(key) => binding.bind_key(self.request.target, key),
            CaptureOutcome::Input(input) => binding.bind_device_input(self.request.target, input),
            CaptureOutcome::Cancelled | CaptureOutcome::Disconnected => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    WaitingForInput,
}

/// Owner of the capture worker and its completion channel.
pub struct CaptureSession {
    host: Arc<dyn HostInput>,
    poll_interval: Duration,
    waiting: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    tx: Sender<CaptureResult>,
    rx: Receiver<CaptureResult>,
}

impl CaptureSession {
    pub fn new(host: Arc<dyn HostInput>, poll_interval: Duration) -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            host,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            waiting: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    pub fn state(&self) -> CaptureState {
        if self.waiting.load(Ordering::Acquire) {
            CaptureState::WaitingForInput
        } else {
            CaptureState::Idle
        }
    }

    /// Start a capture. Returns false if one is already waiting.
    pub fn begin(&self, request: CaptureRequest) -> bool {
        if self
            .waiting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Capture already in progress, ignoring request for controller {}", request.controller);
            return false;
        }
        self.cancel.store(false, Ordering::Release);

        let host = self.host.clone();
        let cancel = self.cancel.clone();
        let tx = self.tx.clone();
        let idle = IdleOnDrop(self.waiting.clone());
        let poll_interval = self.poll_interval;

        let spawned = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let outcome = wait_for_activation(host.as_ref(), request.source, &cancel, poll_interval);
                match outcome.label() {
                    Some(label) => info!("🎯 Captured {} for controller {}", label, request.controller),
                    None => info!("Capture for controller {} ended: {:?}", request.controller, outcome),
                }

                // Idle before the result is visible, so the owner may start
                // the next capture as soon as it sees this one.
                drop(idle);
                if tx.send(CaptureResult { request, outcome }).is_err() {
                    warn!("Capture result dropped, session is gone");
                }
            });

        match spawned {
            Ok(_) => {
                info!("Waiting for input for controller {} ({:?})", request.controller, request.source);
                true
            }
            Err(e) => {
                // The closure (and its guard) was dropped, so the flag is clear again.
                warn!("Failed to spawn capture worker: {}", e);
                false
            }
        }
    }

    /// Ask the running worker to stop. It reports [`CaptureOutcome::Cancelled`].
    pub fn cancel(&self) {
        if self.state() == CaptureState::WaitingForInput {
            self.cancel.store(true, Ordering::Release);
        }
    }

    /// Completed captures since the last call
    pub fn drain_completed(&self) -> Vec<CaptureResult> {
        self.rx.try_iter().collect()
    }

    /// Block until the next capture completes or `timeout` elapses
    pub fn wait_completed(&self, timeout: Duration) -> Option<CaptureResult> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Clears the waiting flag when the worker finishes, panics included.
struct IdleOnDrop(Arc<AtomicBool>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn wait_for_activation(
    host: &dyn HostInput,
    source: CaptureSource,
    cancel: &AtomicBool,
    poll_interval: Duration,
) -> CaptureOutcome {
    let mut watcher = ActivationWatcher::new(host, source);
    loop {
        if cancel.load(Ordering::Acquire) {
            return CaptureOutcome::Cancelled;
        }
        if let Some(outcome) = watcher.poll(host) {
            return outcome;
        }
        thread::sleep(poll_interval);
    }
}

/// Previous-poll snapshot used to detect new activations.
struct ActivationWatcher {
    source: CaptureSource,
    keys: BTreeSet<Key>,
    pointer_down: bool,
    device: Option<RawDeviceState>,
}

impl ActivationWatcher {
    fn new(host: &dyn HostInput, source: CaptureSource) -> Self {
        let device = match source {
            CaptureSource::Device { device, .. } => host.device_state(device),
            CaptureSource::Keyboard => None,
        };
        Self {
            source,
            keys: host.pressed_keys().into_iter().collect(),
            pointer_down: host.pointer().primary_down,
            device,
        }
    }

    fn poll(&mut self, host: &dyn HostInput) -> Option<CaptureOutcome> {
        let pointer_down = host.pointer().primary_down;
        let pointer_pressed = pointer_down && !self.pointer_down;
        self.pointer_down = pointer_down;

        let keys: BTreeSet<Key> = host.pressed_keys().into_iter().collect();
        let new_key = keys.difference(&self.keys).next().copied();
        let escape = keys.contains(&Key::Escape) && !self.keys.contains(&Key::Escape);
        self.keys = keys;

        if pointer_pressed {
            return Some(CaptureOutcome::Cancelled);
        }

        match self.source {
            CaptureSource::Keyboard => {
                if escape {
                    return Some(CaptureOutcome::Cancelled);
                }
                new_key.map(CaptureOutcome::Key)
            }
            CaptureSource::Device { device, threshold } => {
                if new_key.is_some() {
                    return Some(CaptureOutcome::Cancelled);
                }

                let Some(state) = host.device_state(device) else {
                    return Some(CaptureOutcome::Disconnected);
                };
                let previous = self.device.replace(state);
                let state = self.device.as_ref()?;

                state
                    .active_inputs(threshold)
                    .find(|input| !previous.as_ref().is_some_and(|p| p.is_active(*input, threshold)))
                    .map(CaptureOutcome::Input)
            }
        }
    }
}
