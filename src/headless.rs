//! Headless console stand-in
//!
//! [`HeadlessDevice`] produces game frames at a fixed rate and
//! [`HeadlessContext`] counts swaps instead of drawing, so the whole
//! pipeline (aggregation, presentation, hotkeys, capture) runs without a
//! console core or a GPU.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::input::aggregator::InputSurface;
use crate::input::state::NormalizedControllerState;
use crate::present::{EmulatedDevice, GraphicsContext, RendererKind};

/// Frame times kept for the rolling average
const FRAME_TIME_HISTORY: usize = 120;

pub struct HeadlessDevice {
    game_hz: u32,
    started: Instant,
    produced: AtomicU64,
    presented: AtomicU64,
    vsync_signals: AtomicU64,
    frame_times: Mutex<VecDeque<Duration>>,
}

impl HeadlessDevice {
    /// Device producing `game_hz` frames per second of host time
    pub fn new(game_hz: u32) -> Self {
        Self {
            game_hz: game_hz.max(1),
            started: Instant::now(),
            produced: AtomicU64::new(0),
            presented: AtomicU64::new(0),
            vsync_signals: AtomicU64::new(0),
            frame_times: Mutex::new(VecDeque::with_capacity(FRAME_TIME_HISTORY)),
        }
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented.load(Ordering::Acquire)
    }

    pub fn vsync_signals(&self) -> u64 {
        self.vsync_signals.load(Ordering::Acquire)
    }

    /// Mean of the recent host frame times
    pub fn average_frame_time(&self) -> Option<Duration> {
        let times = self.frame_times.lock();
        let count = u32::try_from(times.len()).ok().filter(|n| *n > 0)?;
        Some(times.iter().sum::<Duration>() / count)
    }

    fn frames_owed(&self) -> u64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        (elapsed * f64::from(self.game_hz)) as u64
    }
}

impl EmulatedDevice for HeadlessDevice {
    fn renderer_kind(&self) -> RendererKind {
        RendererKind::Software
    }

    fn has_pending_output(&self) -> bool {
        self.frames_owed() > self.produced.load(Ordering::Acquire)
    }

    fn produce_output(&self) -> anyhow::Result<()> {
        let frame = self.produced.fetch_add(1, Ordering::AcqRel) + 1;
        trace!("Headless frame {} produced", frame);
        Ok(())
    }

    fn present_frame(&self, swap: &mut dyn FnMut()) -> anyhow::Result<()> {
        swap();
        self.presented.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn record_frame_time(&self, frame_time: Duration) {
        let mut times = self.frame_times.lock();
        if times.len() == FRAME_TIME_HISTORY {
            times.pop_front();
        }
        times.push_back(frame_time);
    }

    fn game_frames(&self) -> u64 {
        self.produced.load(Ordering::Acquire)
    }

    fn signal_vsync(&self) {
        self.vsync_signals.fetch_add(1, Ordering::AcqRel);
    }
}

/// Software "context": tracks currency and counts swaps.
#[derive(Debug, Default)]
pub struct HeadlessContext {
    current: bool,
    swap_interval: Option<bool>,
    swaps: Arc<AtomicU64>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap counter that stays readable after the context moves to the
    /// render thread
    pub fn swap_counter(&self) -> Arc<AtomicU64> {
        self.swaps.clone()
    }
}

impl GraphicsContext for HeadlessContext {
    fn kind(&self) -> RendererKind {
        RendererKind::Software
    }

    fn make_current(&mut self) -> anyhow::Result<()> {
        if self.current {
            anyhow::bail!("headless context is already current");
        }
        self.current = true;
        debug!("Headless context current on {:?}", std::thread::current().name());
        Ok(())
    }

    fn release_current(&mut self) {
        self.current = false;
    }

    fn swap_buffers(&mut self) {
        self.swaps.fetch_add(1, Ordering::Relaxed);
    }

    fn set_swap_interval(&mut self, vsync: bool) {
        if self.swap_interval != Some(vsync) {
            debug!("Headless swap interval: {}", u8::from(vsync));
            self.swap_interval = Some(vsync);
        }
    }
}

/// Input surface that logs controller state changes.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    last: HashMap<usize, NormalizedControllerState>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_state(&self, index: usize) -> Option<&NormalizedControllerState> {
        self.last.get(&index)
    }
}

impl InputSurface for HeadlessSurface {
    fn write_controller(&mut self, index: usize, state: &NormalizedControllerState) {
        if self.last.get(&index) != Some(state) {
            trace!(
                "Controller {}: buttons={:#010x} left=({}, {}) right=({}, {}) touch={:?}",
                index,
                state.buttons.bits(),
                state.left_stick.x,
                state.left_stick.y,
                state.right_stick.x,
                state.right_stick.y,
                state.touch
            );
            self.last.insert(index, state.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::state::{ButtonSet, PadButton};

    #[test]
    fn test_device_owes_frames_over_time() {
        let device = HeadlessDevice::new(1000);
        std::thread::sleep(Duration::from_millis(20));
        assert!(device.has_pending_output());

        while device.has_pending_output() {
            device.produce_output().unwrap();
        }
        assert!(device.game_frames() >= 20);
    }

    #[test]
    fn test_present_swaps_and_counts() {
        let device = HeadlessDevice::new(60);
        let mut context = HeadlessContext::new();
        let swaps = context.swap_counter();

        device.present_frame(&mut || context.swap_buffers()).unwrap();
        device.signal_vsync();
        assert_eq!(swaps.load(Ordering::Relaxed), 1);
        assert_eq!(device.presented_frames(), 1);
        assert_eq!(device.vsync_signals(), 1);
    }

    #[test]
    fn test_average_frame_time_window() {
        let device = HeadlessDevice::new(60);
        assert_eq!(device.average_frame_time(), None);

        for _ in 0..FRAME_TIME_HISTORY {
            device.record_frame_time(Duration::from_millis(100));
        }
        for _ in 0..FRAME_TIME_HISTORY {
            device.record_frame_time(Duration::from_millis(10));
        }
        assert_eq!(device.average_frame_time(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_context_cannot_be_made_current_twice() {
        let mut context = HeadlessContext::new();
        context.make_current().unwrap();
        assert!(context.make_current().is_err());
        context.release_current();
        context.make_current().unwrap();
    }

    #[test]
    fn test_surface_keeps_last_state() {
        let mut surface = HeadlessSurface::new();
        let state = NormalizedControllerState {
            buttons: [PadButton::A].into_iter().collect::<ButtonSet>(),
            ..Default::default()
        };
        surface.write_controller(2, &state);
        assert_eq!(surface.last_state(2), Some(&state));
        assert_eq!(surface.last_state(0), None);
    }
}
