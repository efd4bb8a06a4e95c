//! Gamepad diagnostics listing (`--list-devices`)

use colored::*;
use gilrs::{Event, EventType, Gilrs};
use std::thread;
use std::time::{Duration, Instant};

use super::layout;
use super::slot::SlotManager;
use crate::input::raw::RawInput;

/// Print every detected gamepad with its raw layout and active inputs
///
/// Useful for writing bindings by hand: active inputs are shown with the
/// exact labels the config file expects.
pub fn print_device_diagnostics(scan: Duration) {
    println!("\n{}", "=== Gamepad Diagnostics ===".bold().cyan());
    println!("Platform: {}", std::env::consts::OS);

    let mut gilrs = match Gilrs::new() {
        Ok(g) => g,
        Err(e) => {
            println!("{} Failed to initialize GilRs: {:?}", "✗".red(), e);
            println!("  This may indicate missing system libraries or permissions issues.");
            return;
        }
    };

    println!("Waiting {:.1}s for gamepads to connect...", scan.as_secs_f32());
    let start = Instant::now();
    while start.elapsed() < scan {
        while let Some(Event { event, .. }) = gilrs.next_event() {
            if event == EventType::Connected {
                println!("  {} connection detected", "+".green());
            }
        }
        thread::sleep(Duration::from_millis(100));
    }

    // Same slot assignment the backend makes at startup, so the numbers
    // below are the `device:` indices bindings use.
    let pads: Vec<_> = gilrs
        .gamepads()
        .filter(|(_, gp)| gp.is_connected())
        .map(|(id, gp)| (id, gp.name().to_string()))
        .collect();
    if pads.is_empty() {
        println!("\n{}", "No gamepads detected".yellow());
        println!("  - Check the USB cable or Bluetooth pairing");
        println!("  - Check that the OS sees the device");
        return;
    }

    println!("\n{} {}", "Found".bold(), format!("{} gamepad(s)", pads.len()).green());

    let slots = SlotManager::new().connect_all(&pads);
    for ((id, _), device) in pads.into_iter().zip(slots) {
        let gamepad = gilrs.gamepad(id);
        let state = layout::snapshot(&gamepad);
        println!("\n  {} {}", format!("device {}", device).bright_white().bold(), gamepad.name().cyan());
        println!("    ID: {:?}", id);
        println!("    Connected: {}", if gamepad.is_connected() { "yes".green() } else { "no".red() });
        println!("    Power: {:?}", gamepad.power_info());
        println!(
            "    Layout: {} buttons, {} axes, {} hat",
            state.buttons.len(),
            state.axes.len(),
            state.hats.len()
        );

        let active: Vec<String> = state.active_inputs(0.5).map(RawInput::label).collect();
        if active.is_empty() {
            println!("    Active: {}", "(none, hold a control while listing to see its label)".dimmed());
        } else {
            println!("    Active: {}", active.join(", ").yellow());
        }

        for (index, value) in state.axes.iter().enumerate() {
            if value.abs() > 0.01 {
                println!("    Axis{}: {:+.3}", index, value);
            }
        }
    }
    println!();
}
