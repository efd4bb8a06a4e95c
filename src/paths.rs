//! Application paths for portable and installed layouts.
//!
//! - **Dev**: `frontend.yaml` in the working directory (debug builds only).
//! - **Portable**: a `.portable` marker next to the executable keeps the
//!   config and logs beside it.
//! - **Installed** (default): everything lives under the platform data dir,
//!   e.g. `~/.local/share/Emu Frontend`.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::AppConfig;

/// Directory name used in installed mode
const APP_NAME: &str = "Emu Frontend";

/// Config file name in every layout
pub const CONFIG_FILE: &str = "frontend.yaml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config: PathBuf,
    pub logs_dir: PathBuf,
    pub is_portable: bool,
}

impl AppPaths {
    /// Resolve the layout for this run.
    ///
    /// Runs before logging is set up, so diagnostics go to stderr.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join(CONFIG_FILE).exists() {
                eprintln!("[paths] DEV mode ({} found in {})", CONFIG_FILE, cwd.display());
                return Self::portable(&cwd);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] PORTABLE mode ({})", exe_dir.display());
            return Self::portable(&exe_dir);
        }

        let base = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no platform data dir, using {}", exe_dir.display());
                exe_dir.clone()
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!("[paths] INSTALLED mode ({})", base.display());

        Self::installed(&base)
    }

    /// Layout with config and logs directly under `dir`
    pub fn portable(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            logs_dir: dir.join("logs"),
            is_portable: true,
        }
    }

    fn installed(base: &Path) -> Self {
        Self {
            config: base.join(CONFIG_FILE),
            logs_dir: base.join("logs"),
            is_portable: false,
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Create the logs and config directories, and write a default config
    /// when none exists yet.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [self.logs_dir.clone(), self.base_dir()] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }

        if !self.config.exists() {
            self.write_default_config()?;
        }

        Ok(())
    }

    fn write_default_config(&self) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(&AppConfig::default())
            .context("Failed to serialize default config")?;
        std::fs::write(&self.config, yaml)
            .with_context(|| format!("Failed to write default config to {}", self.config.display()))?;
        info!("📝 Wrote default config to {}", self.config.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_portable_layout() {
        let paths = AppPaths::portable(Path::new("emu"));
        assert!(paths.is_portable);
        assert_eq!(paths.config, PathBuf::from("emu").join(CONFIG_FILE));
        assert_eq!(paths.logs_dir, PathBuf::from("emu/logs"));
        assert_eq!(paths.base_dir(), PathBuf::from("emu"));
    }

    #[test]
    fn test_ensure_directories_writes_loadable_default() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = AppPaths::installed(&temp_dir.path().join(APP_NAME));

        paths.ensure_directories()?;
        assert!(paths.logs_dir.is_dir());

        let written = std::fs::read_to_string(&paths.config)?;
        assert_eq!(AppConfig::from_yaml(&written)?, AppConfig::default());

        // An existing config is left alone.
        std::fs::write(&paths.config, "frame: {vsync: false}\n")?;
        paths.ensure_directories()?;
        assert_eq!(std::fs::read_to_string(&paths.config)?, "frame: {vsync: false}\n");
        Ok(())
    }
}
