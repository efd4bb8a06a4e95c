//! Presentation loop on a dedicated render thread
//!
//! The render thread exclusively owns the graphics context once started.
//! It shares only the device handle and two flags with the rest of the
//! program: the loop state (Inactive → Active → Stopped) and the vsync
//! setting, both atomics with acquire/release ordering.

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::clock::FrameClock;
use super::device::{EmulatedDevice, GraphicsContext, RendererKind};
use super::status::{PresentEvent, StatusEvent};
use super::PresentError;

const INACTIVE: u8 = 0;
const ACTIVE: u8 = 1;
const STOPPED: u8 = 2;

/// Frames slower than this are logged as hitches.
const HITCH_THRESHOLD: Duration = Duration::from_millis(250);

/// Idle iterations sleep instead of yielding while the next frame is
/// further away than this.
const SLEEP_MARGIN: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Inactive,
    Active,
    Stopped,
}

#[derive(Debug)]
struct LoopFlags {
    state: AtomicU8,
    vsync: AtomicBool,
}

impl LoopFlags {
    fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) == ACTIVE
    }
}

pub struct PresentationLoop {
    flags: Arc<LoopFlags>,
    device: Arc<dyn EmulatedDevice>,
    target_hz: u32,
    events: Sender<PresentEvent>,
    thread: Mutex<Option<JoinHandle<Result<(), PresentError>>>>,
}

impl PresentationLoop {
    /// Create an inactive loop for `device`
    ///
    /// Fails with [`PresentError::UnsupportedRenderer`] when the device was
    /// not built for `renderer`.
    pub fn new(
        device: Arc<dyn EmulatedDevice>,
        renderer: RendererKind,
        target_hz: u32,
        vsync: bool,
        events: Sender<PresentEvent>,
    ) -> Result<Self, PresentError> {
        let found = device.renderer_kind();
        if found != renderer {
            return Err(PresentError::UnsupportedRenderer { expected: renderer, found });
        }

        Ok(Self {
            flags: Arc::new(LoopFlags {
                state: AtomicU8::new(INACTIVE),
                vsync: AtomicBool::new(vsync),
            }),
            device,
            target_hz,
            events,
            thread: Mutex::new(None),
        })
    }

    pub fn state(&self) -> LoopState {
        match self.flags.state.load(Ordering::Acquire) {
            INACTIVE => LoopState::Inactive,
            ACTIVE => LoopState::Active,
            _ => LoopState::Stopped,
        }
    }

    pub fn vsync(&self) -> bool {
        self.flags.vsync.load(Ordering::Acquire)
    }

    pub fn set_vsync(&self, enabled: bool) {
        self.flags.vsync.store(enabled, Ordering::Release);
    }

    /// Flip vsync and return the new setting
    pub fn toggle_vsync(&self) -> bool {
        !self.flags.vsync.fetch_xor(true, Ordering::AcqRel)
    }

    /// Hand `context` to a new render thread and start presenting
    ///
    /// The calling thread releases the context before the render thread
    /// makes it current.
    pub fn start(&self, mut context: Box<dyn GraphicsContext>) -> Result<(), PresentError> {
        let found = context.kind();
        let expected = self.device.renderer_kind();
        if found != expected {
            return Err(PresentError::UnsupportedRenderer { expected, found });
        }

        // Held until the handle is stored: exit() must find the thread to join.
        let mut handle_slot = self.thread.lock();
        if self
            .flags
            .state
            .compare_exchange(INACTIVE, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PresentError::AlreadyStarted);
        }

        context.release_current();

        let flags = self.flags.clone();
        let device = self.device.clone();
        let events = self.events.clone();
        let target_hz = self.target_hz;

        let spawned = thread::Builder::new()
            .name("present".to_string())
            .spawn(move || {
                let result = run(context.as_mut(), device.as_ref(), &flags, &events, target_hz);
                if let Err(e) = &result {
                    flags.state.store(STOPPED, Ordering::Release);
                    error!("Presentation loop failed: {}", e);
                    let _ = events.send(PresentEvent::Stopped(Some(e.to_string())));
                }
                result
            });

        match spawned {
            Ok(handle) => {
                *handle_slot = Some(handle);
                info!("Presentation loop started at {} Hz", self.target_hz);
                Ok(())
            }
            Err(e) => {
                self.flags.state.store(STOPPED, Ordering::Release);
                Err(PresentError::RenderThread(e.to_string()))
            }
        }
    }

    /// Stop the loop and join the render thread
    ///
    /// Idempotent: once the thread is joined, further calls return `Ok(())`.
    /// A failure inside the loop is returned by the first call, even when
    /// the loop already stopped on its own.
    pub fn exit(&self) -> Result<(), PresentError> {
        self.flags.state.store(STOPPED, Ordering::Release);

        let Some(handle) = self.thread.lock().take() else {
            return Ok(());
        };
        let result = handle
            .join()
            .map_err(|_| PresentError::RenderThread("render thread panicked".to_string()))?;
        info!("Presentation loop stopped");
        result
    }
}

impl Drop for PresentationLoop {
    fn drop(&mut self) {
        if let Err(e) = self.exit() {
            warn!("Presentation loop ended with error: {}", e);
        }
    }
}

fn run(
    context: &mut dyn GraphicsContext,
    device: &dyn EmulatedDevice,
    flags: &LoopFlags,
    events: &Sender<PresentEvent>,
    target_hz: u32,
) -> Result<(), PresentError> {
    context.make_current().map_err(PresentError::Context)?;
    let result = pump(context, device, flags, events, target_hz);
    context.release_current();
    result
}

fn pump(
    context: &mut dyn GraphicsContext,
    device: &dyn EmulatedDevice,
    flags: &LoopFlags,
    events: &Sender<PresentEvent>,
    target_hz: u32,
) -> Result<(), PresentError> {
    let mut clock = FrameClock::new(target_hz);
    let mut applied_vsync = None;
    let mut last_present = Instant::now();
    clock.tick(last_present);

    while flags.is_active() {
        clock.tick(Instant::now());
        let mut worked = false;

        if device.has_pending_output() {
            device.produce_output().map_err(PresentError::Device)?;
            worked = true;
        }

        if clock.frame_due() {
            let vsync = flags.vsync.load(Ordering::Acquire);
            if applied_vsync != Some(vsync) {
                debug!("Swap interval set (vsync {})", if vsync { "on" } else { "off" });
                context.set_swap_interval(vsync);
                applied_vsync = Some(vsync);
            }

            device
                .present_frame(&mut || context.swap_buffers())
                .map_err(PresentError::Device)?;

            let now = Instant::now();
            let frame_time = now.saturating_duration_since(last_present);
            last_present = now;
            device.record_frame_time(frame_time);
            if frame_time > HITCH_THRESHOLD {
                warn!("Frame took {:?}, expected {:?}", frame_time, clock.frame_interval());
            }

            clock.record_presented(now, device.game_frames());
            // A missing receiver only means nobody is watching.
            let _ = events.send(PresentEvent::Status(StatusEvent::new(vsync, clock.rates(), clock.timing())));
            device.signal_vsync();
            clock.complete_frame();
            worked = true;
        }

        if !worked {
            if clock.time_until_due() > SLEEP_MARGIN {
                thread::sleep(Duration::from_millis(1));
            } else {
                thread::yield_now();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{self, Receiver};
    use std::sync::atomic::AtomicU64;

    /// Device that produces an output every other check and can fail after
    /// a number of presented frames.
    struct ScriptedDevice {
        kind: RendererKind,
        fail_after: Option<u64>,
        checks: AtomicU64,
        produced: AtomicU64,
        presented: AtomicU64,
        vsync_signals: AtomicU64,
        frame_times: Mutex<Vec<Duration>>,
    }

    impl ScriptedDevice {
        fn new(kind: RendererKind) -> Self {
            Self {
                kind,
                fail_after: None,
                checks: AtomicU64::new(0),
                produced: AtomicU64::new(0),
                presented: AtomicU64::new(0),
                vsync_signals: AtomicU64::new(0),
                frame_times: Mutex::new(Vec::new()),
            }
        }
    }

    impl EmulatedDevice for ScriptedDevice {
        fn renderer_kind(&self) -> RendererKind {
            self.kind
        }

        fn has_pending_output(&self) -> bool {
            self.checks.fetch_add(1, Ordering::Relaxed) % 2 == 0
        }

        fn produce_output(&self) -> anyhow::Result<()> {
            self.produced.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn present_frame(&self, swap: &mut dyn FnMut()) -> anyhow::Result<()> {
            let presented = self.presented.fetch_add(1, Ordering::Relaxed);
            if self.fail_after.is_some_and(|n| presented >= n) {
                anyhow::bail!("GPU hang");
            }
            swap();
            Ok(())
        }

        fn record_frame_time(&self, frame_time: Duration) {
            self.frame_times.lock().push(frame_time);
        }

        fn game_frames(&self) -> u64 {
            self.produced.load(Ordering::Relaxed)
        }

        fn signal_vsync(&self) {
            self.vsync_signals.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[derive(Debug, Default)]
    struct ContextLog {
        released_on: Vec<Option<String>>,
        current_on: Option<String>,
        swaps: u64,
        swap_intervals: Vec<bool>,
    }

    struct FakeContext {
        kind: RendererKind,
        log: Arc<Mutex<ContextLog>>,
    }

    impl FakeContext {
        fn new(kind: RendererKind) -> (Self, Arc<Mutex<ContextLog>>) {
            let log = Arc::new(Mutex::new(ContextLog::default()));
            (Self { kind, log: log.clone() }, log)
        }
    }

    impl GraphicsContext for FakeContext {
        fn kind(&self) -> RendererKind {
            self.kind
        }

        fn make_current(&mut self) -> anyhow::Result<()> {
            self.log.lock().current_on = thread::current().name().map(str::to_string);
            Ok(())
        }

        fn release_current(&mut self) {
            self.log.lock().released_on.push(thread::current().name().map(str::to_string));
        }

        fn swap_buffers(&mut self) {
            self.log.lock().swaps += 1;
        }

        fn set_swap_interval(&mut self, vsync: bool) {
            self.log.lock().swap_intervals.push(vsync);
        }
    }

    const WAIT: Duration = Duration::from_secs(2);

    fn new_loop(device: Arc<ScriptedDevice>) -> (PresentationLoop, Receiver<PresentEvent>) {
        let (tx, rx) = channel::unbounded();
        let presentation = PresentationLoop::new(device, RendererKind::Software, 240, false, tx).unwrap();
        (presentation, rx)
    }

    fn next_status(rx: &Receiver<PresentEvent>) -> StatusEvent {
        match rx.recv_timeout(WAIT).unwrap() {
            PresentEvent::Status(status) => status,
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_renderer_mismatch_is_fatal() {
        let (tx, _rx) = channel::unbounded();
        let device = Arc::new(ScriptedDevice::new(RendererKind::Vulkan));
        let err = PresentationLoop::new(device, RendererKind::OpenGl, 60, true, tx).err().unwrap();
        assert!(matches!(
            err,
            PresentError::UnsupportedRenderer { expected: RendererKind::OpenGl, found: RendererKind::Vulkan }
        ));
    }

    #[test]
    fn test_context_of_wrong_kind_is_rejected() {
        let (presentation, _rx) = new_loop(Arc::new(ScriptedDevice::new(RendererKind::Software)));
        let (context, _log) = FakeContext::new(RendererKind::OpenGl);
        assert!(matches!(
            presentation.start(Box::new(context)),
            Err(PresentError::UnsupportedRenderer { .. })
        ));
        assert_eq!(presentation.state(), LoopState::Inactive);
    }

    #[test]
    fn test_presents_frames_on_render_thread() {
        let device = Arc::new(ScriptedDevice::new(RendererKind::Software));
        let (presentation, rx) = new_loop(device.clone());
        let (context, log) = FakeContext::new(RendererKind::Software);

        assert_eq!(presentation.state(), LoopState::Inactive);
        presentation.start(Box::new(context)).unwrap();
        assert_eq!(presentation.state(), LoopState::Active);

        let mut last_frame = 0;
        for _ in 0..3 {
            let status = next_status(&rx);
            assert!(!status.vsync_enabled);
            assert!(status.host_fps.ends_with(" FPS"));
            assert_eq!(status.timing.host_frames, last_frame + 1);
            assert!(status.timing.accumulated_ticks >= status.timing.ticks_per_frame);
            last_frame = status.timing.host_frames;
        }

        presentation.exit().unwrap();
        assert_eq!(presentation.state(), LoopState::Stopped);

        let log = log.lock();
        assert_eq!(log.current_on.as_deref(), Some("present"));
        // Released by the starting thread first, then by the render thread on exit.
        assert_eq!(log.released_on.len(), 2);
        assert_eq!(log.released_on[1].as_deref(), Some("present"));
        assert!(log.swaps >= 3);
        assert_eq!(log.swap_intervals.first(), Some(&false));

        assert!(device.vsync_signals.load(Ordering::Relaxed) >= 3);
        assert!(device.produced.load(Ordering::Relaxed) > 0);
        assert_eq!(device.frame_times.lock().len() as u64, log.swaps);
    }

    #[test]
    fn test_vsync_flag_reaches_render_thread() {
        let (presentation, rx) = new_loop(Arc::new(ScriptedDevice::new(RendererKind::Software)));
        let (context, log) = FakeContext::new(RendererKind::Software);
        presentation.start(Box::new(context)).unwrap();
        assert!(!next_status(&rx).vsync_enabled);

        assert!(presentation.toggle_vsync());
        assert!(presentation.vsync());
        let mut seen = false;
        for _ in 0..50 {
            if next_status(&rx).vsync_enabled {
                seen = true;
                break;
            }
        }
        assert!(seen);
        presentation.exit().unwrap();
        assert_eq!(log.lock().swap_intervals, vec![false, true]);
    }

    #[test]
    fn test_exit_is_idempotent() {
        let (presentation, _rx) = new_loop(Arc::new(ScriptedDevice::new(RendererKind::Software)));
        let (context, _log) = FakeContext::new(RendererKind::Software);
        presentation.start(Box::new(context)).unwrap();

        presentation.exit().unwrap();
        presentation.exit().unwrap();
        assert_eq!(presentation.state(), LoopState::Stopped);

        let (context, _log) = FakeContext::new(RendererKind::Software);
        assert!(matches!(presentation.start(Box::new(context)), Err(PresentError::AlreadyStarted)));
    }

    #[test]
    fn test_concurrent_exit_joins_started_thread() {
        for _ in 0..20 {
            let (presentation, _rx) = new_loop(Arc::new(ScriptedDevice::new(RendererKind::Software)));
            let presentation = Arc::new(presentation);
            let (context, log) = FakeContext::new(RendererKind::Software);

            let stopper = {
                let presentation = presentation.clone();
                thread::spawn(move || presentation.exit())
            };
            let started = presentation.start(Box::new(context));
            stopper.join().unwrap().unwrap();
            presentation.exit().unwrap();

            assert_eq!(presentation.state(), LoopState::Stopped);
            assert!(presentation.thread.lock().is_none());
            if started.is_ok() {
                // The render thread ran to completion and released the context.
                assert_eq!(log.lock().released_on.last().unwrap().as_deref(), Some("present"));
            }
        }
    }

    #[test]
    fn test_exit_before_start() {
        let (presentation, _rx) = new_loop(Arc::new(ScriptedDevice::new(RendererKind::Software)));
        presentation.exit().unwrap();
        assert_eq!(presentation.state(), LoopState::Stopped);
    }

    #[test]
    fn test_device_error_stops_loop_and_surfaces() {
        let mut device = ScriptedDevice::new(RendererKind::Software);
        device.fail_after = Some(2);
        let (presentation, rx) = new_loop(Arc::new(device));
        let (context, _log) = FakeContext::new(RendererKind::Software);
        presentation.start(Box::new(context)).unwrap();

        let stopped = loop {
            match rx.recv_timeout(WAIT).unwrap() {
                PresentEvent::Status(_) => continue,
                PresentEvent::Stopped(reason) => break reason,
            }
        };
        assert!(stopped.unwrap().contains("GPU hang"));

        // The render thread marks the loop stopped before reporting.
        assert_eq!(presentation.state(), LoopState::Stopped);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(presentation.state(), LoopState::Stopped);
        let (context, _log) = FakeContext::new(RendererKind::Software);
        assert!(matches!(presentation.start(Box::new(context)), Err(PresentError::AlreadyStarted)));

        assert!(matches!(presentation.exit(), Err(PresentError::Device(_))));
        // The error is reported once.
        presentation.exit().unwrap();
    }
}
