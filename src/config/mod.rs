//! Configuration management for surface-bind
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::binder::BinderSettings;
use crate::surface::{Category, ProfileKind};

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Hardware selection and MIDI port patterns
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub profile: ProfileKind,
    pub input_port: String,
    pub output_port: String,
    /// Display frames buffered before new ones are dropped
    #[serde(default = "default_frame_queue")]
    pub frame_queue: usize,
    /// Write every transmitted frame to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_dump: Option<PathBuf>,
}

/// Engine tuning, re-applied on hot reload
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_encoder_step")]
    pub encoder_step: f32,
    #[serde(default = "default_fine_scale")]
    pub fine_scale: f32,
    #[serde(default = "default_retrigger")]
    pub retrigger_ms: u64,
    #[serde(default = "default_mixer_grace")]
    pub mixer_grace_ms: u64,
    #[serde(default = "default_adjust_priority")]
    pub adjust_priority_ms: u64,
    #[serde(default = "default_message_duration")]
    pub message_duration_ms: u64,
    #[serde(default = "default_reset_hold_off")]
    pub reset_hold_off_ms: u64,
    #[serde(default = "default_page_encoder_step")]
    pub page_encoder_step: f32,
    #[serde(default = "default_event_queue")]
    pub event_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            encoder_step: default_encoder_step(),
            fine_scale: default_fine_scale(),
            retrigger_ms: default_retrigger(),
            mixer_grace_ms: default_mixer_grace(),
            adjust_priority_ms: default_adjust_priority(),
            message_duration_ms: default_message_duration(),
            reset_hold_off_ms: default_reset_hold_off(),
            page_encoder_step: default_page_encoder_step(),
            event_queue: default_event_queue(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn mixer_grace(&self) -> Duration {
        Duration::from_millis(self.mixer_grace_ms)
    }

    pub fn message_duration(&self) -> Duration {
        Duration::from_millis(self.message_duration_ms)
    }

    pub fn binder_settings(&self) -> BinderSettings {
        BinderSettings {
            step: self.encoder_step,
            fine_scale: self.fine_scale,
            retrigger: Duration::from_millis(self.retrigger_ms),
            adjust_priority: Duration::from_millis(self.adjust_priority_ms),
            page_step: self.page_encoder_step,
            reset_hold_off: Duration::from_millis(self.reset_hold_off_ms),
        }
    }
}

/// Modules and tracks seeding the in-memory graph of the binary
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DemoConfig {
    /// `[min_x, min_y, max_x, max_y]` of the visible canvas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<[f32; 4]>,
    #[serde(default)]
    pub tracks: Vec<DemoTrack>,
    #[serde(default)]
    pub modules: Vec<DemoModule>,
    #[serde(default)]
    pub spawnables: Vec<DemoSpawnable>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoTrack {
    pub name: String,
    #[serde(default = "default_track_color")]
    pub color: u8,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoModule {
    pub name: String,
    #[serde(default)]
    pub category: Category,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub params: Vec<DemoParam>,
    /// Expose a toggle grid through the delegation interface
    #[serde(default)]
    pub grid: bool,
    #[serde(default = "default_grid_color")]
    pub grid_color: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoParam {
    pub name: String,
    #[serde(default)]
    pub kind: DemoParamKind,
    #[serde(default = "default_param_value")]
    pub value: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DemoParamKind {
    #[default]
    Slider,
    Button,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoSpawnable {
    pub name: String,
    #[serde(default)]
    pub category: Category,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.device.input_port.is_empty() {
            anyhow::bail!("device input_port cannot be empty");
        }
        if self.device.output_port.is_empty() {
            anyhow::bail!("device output_port cannot be empty");
        }
        if self.device.frame_queue == 0 {
            anyhow::bail!("device frame_queue must be at least 1");
        }

        let engine = &self.engine;
        if engine.poll_interval_ms == 0 {
            anyhow::bail!("engine poll_interval_ms must be greater than zero");
        }
        if !(engine.encoder_step > 0.0) {
            anyhow::bail!("engine encoder_step must be positive (got {})", engine.encoder_step);
        }
        if !(engine.page_encoder_step > 0.0) {
            anyhow::bail!(
                "engine page_encoder_step must be positive (got {})",
                engine.page_encoder_step
            );
        }
        if !(engine.fine_scale > 0.0 && engine.fine_scale <= 1.0) {
            anyhow::bail!("engine fine_scale must be in (0, 1] (got {})", engine.fine_scale);
        }
        if engine.event_queue == 0 {
            anyhow::bail!("engine event_queue must be at least 1");
        }

        for (idx, module) in self.demo.modules.iter().enumerate() {
            if module.name.is_empty() {
                anyhow::bail!("Demo module {} name cannot be empty", idx);
            }
            for param in &module.params {
                if param.name.is_empty() {
                    anyhow::bail!("Parameter name in module '{}' cannot be empty", module.name);
                }
                if !(0.0..=1.0).contains(&param.value) {
                    anyhow::bail!(
                        "Parameter '{}' in module '{}' has value {} outside 0..1",
                        param.name,
                        module.name,
                        param.value
                    );
                }
            }
            if let Some(track) = &module.track {
                if !self.demo.tracks.iter().any(|t| &t.name == track) {
                    anyhow::bail!("Module '{}' references unknown track '{}'", module.name, track);
                }
            }
        }
        for track in &self.demo.tracks {
            if track.name.is_empty() {
                anyhow::bail!("Demo track name cannot be empty");
            }
        }
        if let Some([min_x, min_y, max_x, max_y]) = self.demo.viewport {
            if !(min_x < max_x && min_y < max_y) {
                anyhow::bail!("Demo viewport must have a positive extent");
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_frame_queue() -> usize { 2 }
fn default_poll_interval() -> u64 { 33 }
fn default_encoder_step() -> f32 { 0.005 }
fn default_fine_scale() -> f32 { 0.5 }
fn default_retrigger() -> u64 { 400 }
fn default_mixer_grace() -> u64 { 300 }
fn default_adjust_priority() -> u64 { 200 }
fn default_message_duration() -> u64 { 500 }
fn default_reset_hold_off() -> u64 { 1000 }
fn default_page_encoder_step() -> f32 { 0.07 }
fn default_event_queue() -> usize { 256 }
fn default_track_color() -> u8 { 122 }
fn default_grid_color() -> u8 { 21 }
fn default_param_value() -> f32 { 0.5 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
device:
  input_port: "Ableton Push 2"
  output_port: "Ableton Push 2"
"#;

    const FULL: &str = r#"
device:
  profile: move
  input_port: "move"
  output_port: "move"
  frame_queue: 4
engine:
  poll_interval_ms: 20
  fine_scale: 0.25
demo:
  viewport: [0, 0, 800, 600]
  tracks:
    - name: "Lead"
      color: 5
  modules:
    - name: "Osc"
      category: synth
      x: 100
      y: 50
      track: "Lead"
      params:
        - name: "pitch"
          steps: 24
        - name: "sync"
          kind: button
    - name: "Steps"
      category: pulse
      x: 400
      y: 300
      grid: true
  spawnables:
    - name: "Filter"
      category: audio
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.device.profile, ProfileKind::Push2);
        assert_eq!(config.device.frame_queue, 2);
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.poll_interval(), Duration::from_millis(33));
        assert!(config.demo.modules.is_empty());
    }

    #[test]
    fn test_full_config_parses() {
        let config: AppConfig = serde_yaml::from_str(FULL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.device.profile, ProfileKind::Move);
        assert_eq!(config.engine.poll_interval_ms, 20);
        assert_eq!(config.engine.fine_scale, 0.25);
        // Unspecified engine fields keep their defaults
        assert_eq!(config.engine.retrigger_ms, 400);

        let osc = &config.demo.modules[0];
        assert_eq!(osc.category, Category::Synth);
        assert_eq!(osc.params[0].kind, DemoParamKind::Slider);
        assert_eq!(osc.params[0].steps, Some(24));
        assert_eq!(osc.params[0].value, 0.5);
        assert_eq!(osc.params[1].kind, DemoParamKind::Button);
        assert!(config.demo.modules[1].grid);
        assert_eq!(config.demo.spawnables[0].category, Category::Audio);
    }

    #[test]
    fn test_binder_settings_from_engine_config() {
        let engine = EngineConfig {
            retrigger_ms: 250,
            ..EngineConfig::default()
        };
        let settings = engine.binder_settings();
        assert_eq!(settings.retrigger, Duration::from_millis(250));
        assert_eq!(settings.step, 0.005);
        assert_eq!(settings.fine_scale, 0.5);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.device.input_port.clear();
        assert!(config.validate().is_err());

        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.engine.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.engine.fine_scale = 1.5;
        assert!(config.validate().is_err());

        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.engine.encoder_step = 0.0;
        assert!(config.validate().is_err());

        let mut config: AppConfig = serde_yaml::from_str(FULL).unwrap();
        config.demo.modules[0].track = Some("Bass".into());
        assert!(config.validate().is_err());

        let mut config: AppConfig = serde_yaml::from_str(FULL).unwrap();
        config.demo.modules[1].name.clear();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_and_save() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("surface.yaml");
        std::fs::write(&path, FULL)?;

        let config = AppConfig::load(&path).await?;
        assert_eq!(config.demo.tracks[0].name, "Lead");

        let copy = temp_dir.path().join("copy.yaml");
        config.save(&copy).await?;
        let reloaded = AppConfig::load(&copy).await?;
        assert_eq!(reloaded.engine, config.engine);
        assert_eq!(reloaded.demo.modules.len(), 2);
        assert_eq!(reloaded.demo.viewport, Some([0.0, 0.0, 800.0, 600.0]));
        Ok(())
    }

    #[tokio::test]
    async fn test_load_reports_invalid_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("surface.yaml");
        std::fs::write(&path, "device:\n  input_port: \"\"\n  output_port: \"x\"\n")?;

        let err = AppConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("input_port"));
        Ok(())
    }
}
