//! Hot-reload of the configuration file

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Wait after a write event before re-reading, so editors finish writing.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the config file and yields each successfully reloaded config.
///
/// A file that fails to parse or validate is logged and skipped; the
/// frontend keeps running on the last good config.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Load the config at `config_path` and start watching it
    ///
    /// # Returns
    /// The watcher and the initially loaded config
    pub async fn new(config_path: impl Into<PathBuf>) -> Result<(Self, AppConfig)> {
        let path: PathBuf = config_path.into();
        let path_str = path.to_string_lossy().to_string();

        let initial = AppConfig::load(&path_str)
            .await
            .context("Failed to load initial config")?;

        let (tx, rx) = mpsc::channel(10);

        // notify calls back on its own thread, outside the runtime
        let runtime = tokio::runtime::Handle::current();
        let reload_path = path_str.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!("Config watch error: {}", e);
                    return;
                }
            };

            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            debug!("Config file changed: {:?}", event.paths);

            let path = reload_path.clone();
            let tx = tx.clone();
            runtime.spawn(async move {
                tokio::time::sleep(DEBOUNCE).await;

                match AppConfig::load(&path).await {
                    Ok(config) => {
                        info!("🔄 Configuration reloaded");
                        if tx.send(config).await.is_err() {
                            debug!("Config receiver dropped");
                        }
                    }
                    Err(e) => warn!("⚠️  Config reload rejected, keeping current config: {:#}", e),
                }
            });
        })?;

        watcher
            .watch(Path::new(&path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", path_str))?;

        info!("Watching config file: {}", path_str);

        Ok((Self { _watcher: watcher, rx, path }, initial))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next reloaded config. `None` once the watcher is gone.
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reload_on_change() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("frontend.yaml");
        fs::write(&config_path, "frame:\n  target_hz: 60\n  vsync: true\n")?;

        let (mut watcher, config) = ConfigWatcher::new(&config_path).await?;
        assert!(config.frame.vsync);
        assert_eq!(watcher.path(), config_path.as_path());

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&config_path, "frame:\n  target_hz: 50\n  vsync: false\n")?;

        let reloaded = tokio::time::timeout(Duration::from_secs(2), watcher.next_config()).await?;
        if let Some(reloaded) = reloaded {
            assert_eq!(reloaded.frame.target_hz, 50);
            assert!(!reloaded.frame.vsync);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_initial_config_fails() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("broken.yaml");
        fs::write(&config_path, "display:\n  panel_width: 0\n")?;

        assert!(ConfigWatcher::new(&config_path).await.is_err());
        Ok(())
    }
}
