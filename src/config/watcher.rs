//! Configuration file watcher for hot-reload support

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Quiet period after the last modification before the file is reloaded
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the configuration file and yields one reloaded config per save
///
/// An editor save often fires several modify events. Each event bumps a
/// generation counter and schedules a reload after the debounce; a reload
/// whose generation is no longer current is skipped, so a burst of events
/// produces a single reload.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    pub async fn new(config_path: PathBuf) -> Result<(Self, Arc<AppConfig>)> {
        Self::with_debounce(config_path, RELOAD_DEBOUNCE).await
    }

    pub async fn with_debounce(
        config_path: PathBuf,
        debounce: Duration,
    ) -> Result<(Self, Arc<AppConfig>)> {
        let (tx, rx) = mpsc::channel(4);

        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;
        let initial_config = Arc::new(initial_config);

        let watched_path = config_path.clone();
        let generation = Arc::new(AtomicU64::new(0));

        // notify callbacks run on their own OS thread, outside the runtime
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!("Watch error: {}", e);
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_)) {
                return;
            }

            let scheduled = generation.fetch_add(1, Ordering::SeqCst) + 1;
            debug!("Config file modified ({}): {:?}", scheduled, event.paths);

            let config_path = watched_path.clone();
            let generation = Arc::clone(&generation);
            let tx = tx.clone();
            runtime_handle.spawn(async move {
                tokio::time::sleep(debounce).await;
                if generation.load(Ordering::SeqCst) != scheduled {
                    return;
                }

                match AppConfig::load(&config_path).await {
                    Ok(new_config) => {
                        info!("Configuration reloaded successfully");
                        if let Err(e) = tx.send(new_config).await {
                            error!("Failed to send config update: {}", e);
                        }
                    }
                    Err(e) => {
                        warn!("Failed to reload config (keeping old config): {:#}", e);
                    }
                }
            });
        })?;

        watcher
            .watch(&config_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path.display()))?;

        info!("Config file watcher started for: {}", config_path.display());

        Ok((Self { _watcher: watcher, rx }, initial_config))
    }

    /// Wait for the next config update; `None` once the watcher is gone
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
    async fn test_config_watcher_basic() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("surface.yaml");

        let initial_config = r#"
device:
  input_port: "push"
  output_port: "push"
engine:
  poll_interval_ms: 33
"#;

        fs::write(&config_path, initial_config)?;

        let (mut watcher, config) = ConfigWatcher::new(config_path.clone()).await?;

        assert_eq!(config.device.input_port, "push");
        assert_eq!(config.engine.poll_interval_ms, 33);

        let modified_config = r#"
device:
  input_port: "push-modified"
  output_port: "push"
engine:
  poll_interval_ms: 50
"#;

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&config_path, modified_config)?;

        let new_config = tokio::time::timeout(Duration::from_secs(2), watcher.next_config()).await?;

        if let Some(new_config) = new_config {
            assert_eq!(new_config.device.input_port, "push-modified");
            assert_eq!(new_config.engine.poll_interval_ms, 50);
        }

        Ok(())
    }

    fn config_yaml(poll_interval_ms: u64) -> String {
        format!(
            "device:\n  input_port: push\n  output_port: push\nengine:\n  poll_interval_ms: {}\n",
            poll_interval_ms
        )
    }

    #[tokio::test]
    async fn test_burst_of_writes_reloads_once() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("surface.yaml");
        fs::write(&config_path, config_yaml(33))?;

        let (mut watcher, _) =
            ConfigWatcher::with_debounce(config_path.clone(), Duration::from_millis(300)).await?;

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&config_path, config_yaml(40))?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        fs::write(&config_path, config_yaml(50))?;

        let reloaded = tokio::time::timeout(Duration::from_secs(2), watcher.next_config()).await?;
        assert_eq!(reloaded.map(|c| c.engine.poll_interval_ms), Some(50));

        let second = tokio::time::timeout(Duration::from_millis(600), watcher.next_config()).await;
        assert!(second.is_err(), "a single save burst must reload once");

        Ok(())
    }
}
