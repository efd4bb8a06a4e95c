//! Emu Frontend
//!
//! Runs the presentation loop and input aggregation against the headless
//! console stand-in, lists gamepads, or learns a gamepad binding.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use emu_frontend::config::{AppConfig, ConfigWatcher};
use emu_frontend::frontend::{Frontend, FrontendEvent};
use emu_frontend::headless::{HeadlessContext, HeadlessDevice, HeadlessSurface};
use emu_frontend::input::binding::BindTarget;
use emu_frontend::input::capture::{CaptureOutcome, CaptureRequest, CaptureSession, CaptureSource};
use emu_frontend::input::gamepad;
use emu_frontend::input::host::{DeviceSource, HostInput, HostInputHub, WindowInput};
use emu_frontend::input::state::PadButton;
use emu_frontend::paths::AppPaths;

/// Emu Frontend - emulated console presentation and input core
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the application data dir)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write logs to a daily rolling file in the logs directory
    #[arg(long)]
    log_file: bool,

    /// List connected gamepads and their raw inputs
    #[arg(long)]
    list_devices: bool,

    /// Wait for the next input on this gamepad slot and print its label
    #[arg(long, value_name = "SLOT")]
    capture: Option<usize>,

    /// With --capture: bind the captured input to this button and save the config
    #[arg(long, value_name = "BUTTON", value_parser = parse_pad_button, requires = "capture")]
    bind: Option<PadButton>,

    /// Stop after this many presented frames
    #[arg(long, value_name = "N")]
    headless_frames: Option<u64>,
}

fn parse_pad_button(value: &str) -> Result<PadButton, String> {
    serde_yaml::from_str(value).map_err(|_| format!("unknown button '{}'", value))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let paths = AppPaths::detect();
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => {
            paths.ensure_directories()?;
            paths.config.to_string_lossy().to_string()
        }
    };

    let log_dir = if args.log_file {
        std::fs::create_dir_all(&paths.logs_dir)
            .with_context(|| format!("Failed to create {}", paths.logs_dir.display()))?;
        Some(paths.logs_dir.as_path())
    } else {
        None
    };
    let _log_guard = init_logging(&args.log_level, log_dir)?;

    if args.list_devices {
        gamepad::print_device_diagnostics(Duration::from_secs(1));
        return Ok(());
    }

    info!("Starting Emu Frontend v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {} ({})", config_path, if paths.is_portable { "portable" } else { "installed" });

    let (watcher, config) = ConfigWatcher::new(config_path.as_str()).await?;

    let mut backend = gamepad::init(config.input.gamepad_poll_interval());
    let devices = backend
        .as_ref()
        .map(|b| b.slots() as Arc<dyn DeviceSource>);
    let window = Arc::new(WindowInput::new(config.display.window_width, config.display.window_height));
    let host: Arc<dyn HostInput> = Arc::new(HostInputHub::new(window, devices));

    let result = match args.capture {
        Some(slot) => run_capture(host, config, &config_path, slot, args.bind).await,
        None => run_headless(host, config, watcher, args.headless_frames).await,
    };

    if let Some(backend) = backend.as_mut() {
        backend.shutdown();
    }
    info!("Emu Frontend shutdown complete");
    result
}

async fn run_headless(
    host: Arc<dyn HostInput>,
    config: AppConfig,
    watcher: ConfigWatcher,
    frame_limit: Option<u64>,
) -> Result<()> {
    let device = Arc::new(HeadlessDevice::new(config.frame.target_hz));
    let mut frontend = Frontend::new(config, host, Box::new(HeadlessSurface::new()), device.clone())
        .context("Failed to create presentation loop")?;

    frontend.subscribe(Arc::new(|event: &FrontendEvent| match event {
        FrontendEvent::Status(status) => trace!(
            "vsync={} host={} game={} frames={}/{}",
            status.vsync_enabled,
            status.host_fps,
            status.game_fps,
            status.timing.host_frames,
            status.timing.game_frames
        ),
        FrontendEvent::ToggleFullscreen => info!("Fullscreen toggle requested (no window in headless mode)"),
        FrontendEvent::WindowStateChanged(state) => debug!("Window state: {:?}", state),
        FrontendEvent::CaptureFinished(result) => debug!("Capture finished: {:?}", result.outcome),
        FrontendEvent::PresentationStopped(Some(reason)) => warn!("⚠️  Presentation stopped: {}", reason),
        FrontendEvent::PresentationStopped(None) => info!("Presentation stopped"),
    }));

    frontend
        .start(Box::new(HeadlessContext::new()))
        .context("Failed to start presentation loop")?;
    info!("✅ Headless presentation running");

    let presented = device.clone();
    let shutdown = async move {
        tokio::select! {
            _ = shutdown_signal() => {}
            _ = frames_presented(&presented, frame_limit) => {
                info!("Frame limit reached");
            }
        }
    };

    frontend.run(Some(watcher), shutdown).await?;

    info!(
        "Presented {} frames, average frame time {:?}",
        device.presented_frames(),
        device.average_frame_time().unwrap_or_default()
    );
    Ok(())
}

async fn frames_presented(device: &HeadlessDevice, limit: Option<u64>) {
    let Some(limit) = limit else {
        return std::future::pending().await;
    };
    while device.presented_frames() < limit {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn run_capture(
    host: Arc<dyn HostInput>,
    mut config: AppConfig,
    config_path: &str,
    slot: usize,
    bind: Option<PadButton>,
) -> Result<()> {
    // Give the backend a moment to enumerate already-connected pads.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while host.device_state(slot).is_none() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let name = host.device_name(slot).unwrap_or_else(|| "not connected".to_string());

    let binding = config.controllers.iter().find(|b| b.device_index() == Some(slot));
    let request = CaptureRequest {
        controller: binding.map_or(0, |b| b.index),
        target: BindTarget::Button(bind.unwrap_or(PadButton::A)),
        source: CaptureSource::Device {
            device: slot,
            threshold: binding.map_or(0.5, |b| b.trigger_threshold),
        },
    };

    let session = CaptureSession::new(host, config.input.capture_poll_interval());
    println!(
        "{} Press a control on device {} ({}), Ctrl+C to cancel",
        "▶".cyan(),
        slot,
        name.bright_white()
    );
    session.begin(request);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut cancelled = false;
    let result = loop {
        if let Some(result) = session.drain_completed().pop() {
            break result;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            _ = &mut shutdown, if !cancelled => {
                cancelled = true;
                session.cancel();
            }
        }
    };

    match result.outcome {
        CaptureOutcome::Input(input) => println!("{} {}", "Captured:".bold(), input.label().green()),
        CaptureOutcome::Key(key) => println!("{} {}", "Captured key:".bold(), key.label().green()),
        CaptureOutcome::Cancelled => println!("{}", "Capture cancelled".yellow()),
        CaptureOutcome::Disconnected => println!("{}", format!("Device {} is not connected", slot).red()),
    }

    if bind.is_none() {
        return Ok(());
    }
    let Some(binding) = config.binding_mut(request.controller) else {
        warn!("No controller is bound to device {}, nothing saved", slot);
        return Ok(());
    };
    if result.apply_to(binding) {
        config.save(config_path).await?;
        info!("✅ Saved binding for controller {} to {}", request.controller, config_path);
    }
    Ok(())
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .try_init()
            .context("Failed to initialize logging")?;
        return Ok(None);
    };

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "emu-frontend.log"));
    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(fmt::layer().with_ansi(false).with_thread_names(true).with_writer(writer))
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(Some(guard))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C ({}), running until stopped", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
