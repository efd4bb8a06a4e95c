//! Frame clock: fixed-cadence presentation timing
//!
//! Elapsed host time is accumulated as timer ticks. A frame is due once the
//! accumulator holds one frame's worth (`frequency / target_hz`). After a
//! frame is presented one frame is subtracted and the residual is clamped
//! to at most one frame interval, so a stall never causes a burst of
//! catch-up frames.

use std::time::{Duration, Instant};

/// Fixed presentation target.
pub const TARGET_HZ: u32 = 60;

/// Host timer resolution (ticks are nanoseconds).
pub const HOST_TIMER_FREQUENCY: u64 = 1_000_000_000;

/// Length of one FPS averaging window.
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Accumulator and counters, readable by status consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub accumulated_ticks: u64,
    pub ticks_per_frame: u64,
    /// Frames presented by the host
    pub host_frames: u64,
    /// Frames produced by the emulated device
    pub game_frames: u64,
}

/// Rolling frame rates over the last completed window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameRates {
    pub host_fps: f32,
    pub game_fps: f32,
}

impl FrameRates {
    pub fn host_text(&self) -> String {
        fps_text(self.host_fps)
    }

    pub fn game_text(&self) -> String {
        fps_text(self.game_fps)
    }
}

/// Format a frame rate for display, e.g. `59.9 FPS`
pub fn fps_text(fps: f32) -> String {
    format!("{:.1} FPS", fps)
}

#[derive(Debug)]
pub struct FrameClock {
    timing: FrameTiming,
    frequency: u64,
    last_tick: Option<Instant>,
    window_start: Option<Instant>,
    window_host_frames: u64,
    window_game_frames: u64,
    rates: FrameRates,
}

impl FrameClock {
    pub fn new(target_hz: u32) -> Self {
        Self::with_frequency(HOST_TIMER_FREQUENCY, target_hz)
    }

    pub fn with_frequency(frequency: u64, target_hz: u32) -> Self {
        let ticks_per_frame = (frequency / u64::from(target_hz.max(1))).max(1);
        Self {
            timing: FrameTiming {
                accumulated_ticks: 0,
                ticks_per_frame,
                host_frames: 0,
                game_frames: 0,
            },
            frequency,
            last_tick: None,
            window_start: None,
            window_host_frames: 0,
            window_game_frames: 0,
            rates: FrameRates::default(),
        }
    }

    /// Add raw timer ticks to the accumulator
    pub fn advance(&mut self, elapsed_ticks: u64) {
        self.timing.accumulated_ticks = self.timing.accumulated_ticks.saturating_add(elapsed_ticks);
    }

    /// Accumulate host time elapsed since the previous call
    pub fn tick(&mut self, now: Instant) {
        if let Some(last) = self.last_tick {
            let elapsed = now.saturating_duration_since(last);
            let ticks = elapsed.as_nanos().saturating_mul(u128::from(self.frequency)) / 1_000_000_000;
            self.advance(u64::try_from(ticks).unwrap_or(u64::MAX));
        }
        self.last_tick = Some(now);
    }

    pub fn frame_due(&self) -> bool {
        self.timing.accumulated_ticks >= self.timing.ticks_per_frame
    }

    /// Consume one frame; the residual never exceeds one frame interval
    pub fn complete_frame(&mut self) {
        let tpf = self.timing.ticks_per_frame;
        let residual = self.timing.accumulated_ticks.saturating_sub(tpf);
        self.timing.accumulated_ticks = residual.min(tpf);
    }

    /// Count a presented frame and roll the FPS window when it is full
    ///
    /// # Arguments
    /// * `now` - Presentation time
    /// * `game_frames` - Total frames the emulated device has produced
    pub fn record_presented(&mut self, now: Instant, game_frames: u64) {
        self.timing.host_frames += 1;
        self.timing.game_frames = game_frames;

        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            self.window_host_frames = self.timing.host_frames;
            self.window_game_frames = game_frames;
            return;
        };

        let elapsed = now.saturating_duration_since(start);
        if elapsed >= FPS_WINDOW {
            let secs = elapsed.as_secs_f32();
            self.rates = FrameRates {
                host_fps: (self.timing.host_frames - self.window_host_frames) as f32 / secs,
                game_fps: game_frames.saturating_sub(self.window_game_frames) as f32 / secs,
            };
            self.window_start = Some(now);
            self.window_host_frames = self.timing.host_frames;
            self.window_game_frames = game_frames;
        }
    }

    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    pub fn rates(&self) -> FrameRates {
        self.rates
    }

    pub fn frame_interval(&self) -> Duration {
        self.ticks_to_duration(self.timing.ticks_per_frame)
    }

    /// Host time left until the next frame is due
    pub fn time_until_due(&self) -> Duration {
        self.ticks_to_duration(self.timing.ticks_per_frame.saturating_sub(self.timing.accumulated_ticks))
    }

    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let nanos = u128::from(ticks) * 1_000_000_000 / u128::from(self.frequency.max(1));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}
