//! Frontend runtime: the cooperative UI loop
//!
//! Runs on the thread that owns the window. Every tick it aggregates input
//! and feeds the emulated surface, fires hotkeys, periodically checks the
//! fullscreen combination and window state, and drains the messages coming
//! back from the render thread and the capture worker. Observers subscribe
//! to [`FrontendEvent`]s instead of reaching into the loop.

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, ConfigWatcher};
use crate::input::aggregator::{InputAggregator, InputSurface};
use crate::input::capture::{CaptureRequest, CaptureResult, CaptureSession, CaptureState};
use crate::input::host::{HostInput, WindowState};
use crate::input::hotkeys::{Hotkey, HotkeyDetector};
use crate::input::keys::KeyMatrix;
use crate::present::{
    EmulatedDevice, GraphicsContext, LoopState, PresentError, PresentEvent, PresentationLoop,
    StatusEvent,
};

/// Notifications for the window layer and status displays.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendEvent {
    /// Per presented frame
    Status(StatusEvent),
    /// The fullscreen combination was pressed
    ToggleFullscreen,
    WindowStateChanged(WindowState),
    CaptureFinished(CaptureResult),
    /// The render thread ended on its own; carries the error text if it failed
    PresentationStopped(Option<String>),
}

pub type FrontendListener = Arc<dyn Fn(&FrontendEvent) + Send + Sync>;

pub struct Frontend {
    config: AppConfig,
    host: Arc<dyn HostInput>,
    aggregator: InputAggregator,
    hotkeys: HotkeyDetector,
    presentation: Arc<PresentationLoop>,
    present_rx: Receiver<PresentEvent>,
    capture: CaptureSession,
    listeners: Vec<FrontendListener>,
    fullscreen_held: bool,
    window_state: WindowState,
    last_window_check: Option<Instant>,
}

impl Frontend {
    /// Build the loop around `device`
    ///
    /// # Errors
    /// [`PresentError::UnsupportedRenderer`] when the device was not built
    /// for the configured renderer.
    pub fn new(
        config: AppConfig,
        host: Arc<dyn HostInput>,
        surface: Box<dyn InputSurface>,
        device: Arc<dyn EmulatedDevice>,
    ) -> Result<Self, PresentError> {
        let (present_tx, present_rx) = channel::unbounded();
        let presentation = PresentationLoop::new(
            device,
            config.frame.renderer,
            config.frame.target_hz,
            config.frame.vsync,
            present_tx,
        )?;

        let aggregator = InputAggregator::new(
            host.clone(),
            surface,
            config.controllers.clone(),
            config.aggregator_settings(),
        );
        let capture = CaptureSession::new(host.clone(), config.input.capture_poll_interval());
        let window_state = host.window_state();

        Ok(Self {
            config,
            host,
            aggregator,
            hotkeys: HotkeyDetector::new(),
            presentation: Arc::new(presentation),
            present_rx,
            capture,
            listeners: Vec::new(),
            fullscreen_held: false,
            window_state,
            last_window_check: None,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn presentation(&self) -> &Arc<PresentationLoop> {
        &self.presentation
    }

    pub fn subscribe(&mut self, listener: FrontendListener) {
        self.listeners.push(listener);
    }

    /// Hand the graphics context to the render thread
    pub fn start(&self, context: Box<dyn GraphicsContext>) -> Result<(), PresentError> {
        self.presentation.start(context)
    }

    /// Start learning a binding. Ignored (false) while another capture waits.
    pub fn begin_capture(&self, request: CaptureRequest) -> bool {
        self.capture.begin(request)
    }

    pub fn cancel_capture(&self) {
        self.capture.cancel();
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    /// Swap in a reloaded config between ticks
    ///
    /// Frame rate and renderer are fixed for the life of the render thread;
    /// changes to them take effect on the next start.
    pub fn apply_config(&mut self, config: AppConfig) {
        if config.frame.vsync != self.config.frame.vsync {
            self.presentation.set_vsync(config.frame.vsync);
            info!("Vsync {} (config)", if config.frame.vsync { "enabled" } else { "disabled" });
        }
        if config.frame.target_hz != self.config.frame.target_hz
            || config.frame.renderer != self.config.frame.renderer
        {
            warn!("⚠️  Frame rate / renderer changes apply after restart");
        }
        if config.input.poll_interval_ms != self.config.input.poll_interval_ms {
            warn!("⚠️  Poll interval changes apply after restart");
        }

        self.aggregator
            .set_bindings(config.controllers.clone(), config.aggregator_settings());
        self.hotkeys.reset();
        self.config = config;
        info!("✅ Bindings updated ({} controller(s))", self.config.controllers.len());
    }

    /// One UI loop iteration
    ///
    /// # Returns
    /// `false` once the render thread has stopped and the loop should end
    pub fn tick(&mut self, now: Instant) -> bool {
        for polled in self.aggregator.poll() {
            let fired = self.hotkeys.update(polled.index, polled.hotkeys);
            for hotkey in fired.iter() {
                match hotkey {
                    Hotkey::VsyncToggle => {
                        let enabled = self.presentation.toggle_vsync();
                        self.config.frame.vsync = enabled;
                        info!("Vsync {} (controller {})", if enabled { "enabled" } else { "disabled" }, polled.index);
                    }
                }
            }
        }

        let check_due = self
            .last_window_check
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.input.fullscreen_check_interval());
        if check_due {
            self.last_window_check = Some(now);
            self.check_window();
        }

        let mut running = true;
        for event in self.present_rx.try_iter() {
            match event {
                PresentEvent::Status(status) => self.emit(&FrontendEvent::Status(status)),
                PresentEvent::Stopped(reason) => {
                    running = false;
                    self.emit(&FrontendEvent::PresentationStopped(reason));
                }
            }
        }

        for result in self.capture.drain_completed() {
            self.finish_capture(result);
        }

        running && self.presentation.state() != LoopState::Stopped
    }

    /// Run ticks until `shutdown` resolves or the render thread stops, then
    /// join the render thread
    pub async fn run(
        &mut self,
        mut watcher: Option<ConfigWatcher>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.input.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("Frontend loop running ({:?} tick)", self.config.input.poll_interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.tick(Instant::now()) {
                        info!("Presentation stopped, leaving frontend loop");
                        break;
                    }
                }

                Some(config) = next_reload(&mut watcher) => {
                    info!("📝 Configuration file changed, applying...");
                    self.apply_config(config);
                }

                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping frontend loop");
                    break;
                }
            }
        }

        self.capture.cancel();
        self.presentation.exit().context("Presentation loop failed")?;
        Ok(())
    }

    fn check_window(&mut self) {
        let keys = KeyMatrix::from_keys(self.host.pressed_keys());
        let held = keys.contains_all(&self.config.input.fullscreen_combo);
        if held && !self.fullscreen_held {
            debug!("Fullscreen combination pressed");
            self.emit(&FrontendEvent::ToggleFullscreen);
        }
        self.fullscreen_held = held;

        let state = self.host.window_state();
        if state != self.window_state {
            debug!("Window state: {:?} -> {:?}", self.window_state, state);
            self.window_state = state;
            if !state.focused {
                // Held combos are dropped with focus; re-arm them.
                self.hotkeys.reset();
            }
            self.emit(&FrontendEvent::WindowStateChanged(state));
        }
    }

    fn finish_capture(&mut self, result: CaptureResult) {
        let controller = result.request.controller;
        let applied = match self.config.binding_mut(controller) {
            Some(binding) => result.apply_to(binding),
            None => {
                warn!("Captured input for unknown controller {}", controller);
                false
            }
        };

        if applied {
            self.aggregator
                .set_bindings(self.config.controllers.clone(), self.config.aggregator_settings());
            info!(
                "✅ Controller {} {:?} bound to {}",
                controller,
                result.request.target,
                result.outcome.label().unwrap_or_default()
            );
        } else {
            debug!("Capture for controller {} left bindings unchanged ({:?})", controller, result.outcome);
        }

        self.emit(&FrontendEvent::CaptureFinished(result));
    }

    fn emit(&self, event: &FrontendEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

async fn next_reload(watcher: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}
