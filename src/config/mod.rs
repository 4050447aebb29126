//! Daemon configuration. A JSON file next to the ledgers; missing fields
//! fall back to defaults so old config files keep working after upgrades.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
    pub hotkeys: HotkeyConfig,
    pub notifications: NotificationConfig,
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Sampling rates by activity, in frames per second.
    pub idle_fps: f64,
    pub active_fps: f64,
    pub business_fps: f64,
    /// Consecutive capture failures before money tracking is degraded.
    pub failure_threshold: u32,
    /// Monitor index to capture. `None` means the primary monitor.
    pub monitor: Option<u32>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            idle_fps: 0.5,
            active_fps: 2.0,
            business_fps: 4.0,
            failure_threshold: 10,
            monitor: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayMode {
    Overlay,
    Window,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub mode: DisplayMode,
    pub overlay_opacity: f64,
    pub overlay_position: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Overlay,
            overlay_opacity: 0.9,
            overlay_position: "top-right".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub toggle_overlay: String,
    pub toggle_tracking: String,
    pub show_window: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            toggle_overlay: "F9".to_string(),
            toggle_tracking: "F10".to_string(),
            show_window: "F11".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub audio_enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            audio_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Money deltas at or above this absolute value are treated as OCR
    /// misreads and rejected.
    pub sanity_threshold: i64,
    /// Seconds without any gameplay cue before reverting to idle.
    pub grace_period_secs: u64,
    /// Seconds a completion banner state is held before going idle.
    pub complete_linger_secs: u64,
    /// Seconds between repeated advisories for the same business.
    pub advisory_cooldown_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            sanity_threshold: 10_000_000,
            grace_period_secs: 120,
            complete_linger_secs: 15,
            advisory_cooldown_secs: 600,
        }
    }
}

impl AppConfig {
    /// Loads the config file, creating it with defaults on first run.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<AppConfig>(&raw)
                .with_context(|| format!("Failed to parse config at {path:?}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {path:?}, writing defaults");
                let config = AppConfig::default();
                std::fs::write(path, serde_json::to_vec_pretty(&config)?)?;
                config
            }
            Err(e) => return Err(e).context(format!("Failed to read config at {path:?}")),
        };
        Ok(config.validated())
    }

    /// Clamps out-of-range values instead of failing on them.
    pub fn validated(mut self) -> Self {
        self.capture.idle_fps = self.capture.idle_fps.clamp(0.1, 60.0);
        self.capture.active_fps = self.capture.active_fps.clamp(0.1, 60.0);
        self.capture.business_fps = self.capture.business_fps.clamp(0.1, 60.0);
        self.capture.failure_threshold = self.capture.failure_threshold.max(1);
        self.display.overlay_opacity = self.display.overlay_opacity.clamp(0.1, 1.0);
        self.tracking.sanity_threshold = self.tracking.sanity_threshold.max(1);
        self.tracking.grace_period_secs = self.tracking.grace_period_secs.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let config: AppConfig =
            serde_json::from_str(r#"{"capture":{"idle_fps":1.0}}"#).unwrap();
        assert_eq!(config.capture.idle_fps, 1.0);
        assert_eq!(config.capture.active_fps, 2.0);
        assert_eq!(config.tracking.sanity_threshold, 10_000_000);
    }

    #[test]
    fn test_validation_clamps() {
        let mut config = AppConfig::default();
        config.capture.idle_fps = 0.0;
        config.display.overlay_opacity = 3.0;
        let config = config.validated();
        assert_eq!(config.capture.idle_fps, 0.1);
        assert_eq!(config.display.overlay_opacity, 1.0);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let first = AppConfig::load_or_create(&path).unwrap();
        assert!(path.exists());

        let second = AppConfig::load_or_create(&path).unwrap();
        assert_eq!(first, second);
    }
}
