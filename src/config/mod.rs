//! Configuration management
//!
//! Handles loading, parsing, validation and hot-reloading of the YAML
//! configuration file.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::fs;

use crate::input::aggregator::AggregatorSettings;
use crate::input::binding::{ControllerBinding, ControllerSource};
use crate::input::keys::Key;
use crate::present::RendererKind;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default = "default_controllers")]
    pub controllers: Vec<ControllerBinding>,
}

/// Presentation timing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FrameConfig {
    /// Presentation cadence in Hz
    #[serde(default = "default_target_hz")]
    pub target_hz: u32,
    /// Initial vsync state (toggled at runtime by hotkey)
    #[serde(default = "default_true")]
    pub vsync: bool,
    /// Renderer the emulated device must have been built for
    #[serde(default = "default_renderer")]
    pub renderer: RendererKind,
}

/// Polling and hotkey configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputConfig {
    /// UI loop tick (ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Capture worker poll interval (ms)
    #[serde(default = "default_capture_poll_interval")]
    pub capture_poll_interval_ms: u64,
    /// Gamepad backend poll interval (ms)
    #[serde(default = "default_gamepad_poll_interval")]
    pub gamepad_poll_interval_ms: u64,
    /// How often the fullscreen combo and window state are checked (ms)
    #[serde(default = "default_fullscreen_check_interval")]
    pub fullscreen_check_interval_ms: u64,
    /// Keys held together to toggle fullscreen
    #[serde(default = "default_fullscreen_combo")]
    pub fullscreen_combo: Vec<Key>,
    /// Stick magnitude (0.0-1.0) that sets the digital stick-direction flags
    #[serde(default = "default_stick_direction_threshold")]
    pub stick_direction_threshold: f32,
}

/// Display geometry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// Logical touch panel resolution
    #[serde(default = "default_panel_width")]
    pub panel_width: u16,
    #[serde(default = "default_panel_height")]
    pub panel_height: u16,
    /// Initial host window size
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            target_hz: default_target_hz(),
            vsync: default_true(),
            renderer: default_renderer(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            capture_poll_interval_ms: default_capture_poll_interval(),
            gamepad_poll_interval_ms: default_gamepad_poll_interval(),
            fullscreen_check_interval_ms: default_fullscreen_check_interval(),
            fullscreen_combo: default_fullscreen_combo(),
            stick_direction_threshold: default_stick_direction_threshold(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            panel_width: default_panel_width(),
            panel_height: default_panel_height(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            input: InputConfig::default(),
            display: DisplayConfig::default(),
            controllers: default_controllers(),
        }
    }
}

impl InputConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn capture_poll_interval(&self) -> Duration {
        Duration::from_millis(self.capture_poll_interval_ms)
    }

    pub fn gamepad_poll_interval(&self) -> Duration {
        Duration::from_millis(self.gamepad_poll_interval_ms)
    }

    pub fn fullscreen_check_interval(&self) -> Duration {
        Duration::from_millis(self.fullscreen_check_interval_ms)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate configuration text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.frame.target_hz == 0 || self.frame.target_hz > 1000 {
            anyhow::bail!("frame.target_hz must be between 1 and 1000 (got {})", self.frame.target_hz);
        }

        if self.display.panel_width == 0 || self.display.panel_height == 0 {
            anyhow::bail!("display panel size cannot be zero");
        }

        for (name, value) in [
            ("poll_interval_ms", self.input.poll_interval_ms),
            ("capture_poll_interval_ms", self.input.capture_poll_interval_ms),
            ("gamepad_poll_interval_ms", self.input.gamepad_poll_interval_ms),
            ("fullscreen_check_interval_ms", self.input.fullscreen_check_interval_ms),
        ] {
            if value == 0 {
                anyhow::bail!("input.{} must be at least 1", name);
            }
        }

        let threshold = self.input.stick_direction_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            anyhow::bail!("input.stick_direction_threshold must be in (0, 1] (got {})", threshold);
        }

        let mut indices = HashSet::new();
        for binding in &self.controllers {
            if !indices.insert(binding.index) {
                anyhow::bail!("Controller index {} is defined more than once", binding.index);
            }

            for (name, value) in [
                ("deadzone_left", binding.deadzone_left),
                ("deadzone_right", binding.deadzone_right),
                ("trigger_threshold", binding.trigger_threshold),
            ] {
                if !(0.0..1.0).contains(&value) {
                    anyhow::bail!("Controller {}: {} must be in [0, 1) (got {})", binding.index, name, value);
                }
            }

            if let ControllerSource::Keyboard(keyboard) = &binding.source {
                if let Some((hotkey, _)) = keyboard.hotkeys.iter().find(|(_, combo)| combo.is_empty()) {
                    anyhow::bail!("Controller {}: hotkey {:?} has no keys", binding.index, hotkey);
                }
            }
        }

        if self.controllers.iter().filter(|b| b.pointer_touch).count() > 1 {
            anyhow::bail!("Only one controller can receive pointer touches");
        }

        Ok(())
    }

    /// Aggregation settings derived from the `input` and `display` sections
    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            stick_direction_threshold: self.input.stick_direction_threshold,
            panel: (self.display.panel_width, self.display.panel_height),
        }
    }

    pub fn binding_mut(&mut self, index: usize) -> Option<&mut ControllerBinding> {
        self.controllers.iter_mut().find(|b| b.index == index)
    }
}

fn default_controllers() -> Vec<ControllerBinding> {
    let mut keyboard = ControllerBinding::keyboard(0);
    keyboard.pointer_touch = true;
    vec![keyboard, ControllerBinding::device(1, 0)]
}

fn default_target_hz() -> u32 { 60 }
fn default_true() -> bool { true }
fn default_renderer() -> RendererKind { RendererKind::Software }
fn default_poll_interval() -> u64 { 1 }
fn default_capture_poll_interval() -> u64 { 2 }
fn default_gamepad_poll_interval() -> u64 { 4 }
fn default_fullscreen_check_interval() -> u64 { 16 }
fn default_fullscreen_combo() -> Vec<Key> { vec![Key::LeftAlt, Key::Enter] }
fn default_stick_direction_threshold() -> f32 { 0.5 }
fn default_panel_width() -> u16 { 320 }
fn default_panel_height() -> u16 { 240 }
fn default_window_width() -> u32 { 960 }
fn default_window_height() -> u32 { 720 }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::state::PadButton;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.frame.target_hz, 60);
        assert_eq!(config.input.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.controllers.len(), 2);
        assert!(config.controllers[0].pointer_touch);
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
frame:
  vsync: false
input:
  fullscreen_combo: [F11]
controllers:
  - index: 0
    type: device
    device: 1
    invert_y: true
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert!(!config.frame.vsync);
        assert_eq!(config.frame.target_hz, 60);
        assert_eq!(config.input.fullscreen_combo, vec![Key::F11]);
        assert_eq!(config.controllers.len(), 1);
        assert!(config.controllers[0].invert_y);
        assert_eq!(config.controllers[0].device_index(), Some(1));
    }

    #[test]
    fn test_validation_errors() {
        let duplicate = "controllers:\n  - {index: 0, type: keyboard}\n  - {index: 0, type: keyboard}\n";
        let err = AppConfig::from_yaml(duplicate).unwrap_err();
        assert!(format!("{:#}", err).contains("more than once"));

        let bad_deadzone = "controllers:\n  - {index: 0, type: keyboard, deadzone_left: 1.2}\n";
        assert!(AppConfig::from_yaml(bad_deadzone).is_err());

        assert!(AppConfig::from_yaml("frame: {target_hz: 0}").is_err());
        assert!(AppConfig::from_yaml("input: {poll_interval_ms: 0}").is_err());
        assert!(AppConfig::from_yaml("display: {panel_width: 0}").is_err());
    }

    #[tokio::test]
    async fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");
        let path = path.to_string_lossy().to_string();

        let mut config = AppConfig::default();
        config.frame.vsync = false;
        if let Some(binding) = config.binding_mut(0) {
            binding.bind_key(crate::input::binding::BindTarget::Button(PadButton::A), Key::Space);
        }
        config.save(&path).await?;

        let loaded = AppConfig::load(&path).await?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = AppConfig::load("/definitely/not/here.yaml").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
