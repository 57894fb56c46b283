//! Engine configuration.

use crate::time::Seconds;
use crate::types::ExportSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub sync: SyncConfig,

    /// Settings used when a project does not carry its own.
    pub export: ExportSettings,

    pub logging: LoggingConfig,

    /// Snap distance for drags, in seconds.
    pub snap_threshold: Seconds,
}

/// Media synchronization tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Drift (seconds) above which a playing resource is re-seeked.
    pub drift_threshold: Seconds,

    /// How often a playing resource's position is checked.
    pub poll_interval_ms: u64,

    /// Delay before a rejected seek/play is retried.
    pub retry_delay_ms: u64,

    /// Distance (seconds) between the playhead and a clip beyond which the
    /// clip's media resource is closed.
    pub release_distance: Seconds,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelcut_render=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            export: ExportSettings::default(),
            logging: LoggingConfig::default(),
            snap_threshold: 0.1,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.3,
            poll_interval_ms: 250,
            retry_delay_ms: 150,
            release_distance: 30.0,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load config from `path`. A missing file yields the defaults; a file
    /// that cannot be read or parsed is an error.
    pub fn try_load(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Like [`EngineConfig::try_load`], but logs the failure and falls back
    /// to defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::try_load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config at {:?}: {}", path, e);
            Self::default()
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// `$XDG_CONFIG_HOME/reelcut/config.json`, with the usual `~/.config` fallback.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelcut").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sync.drift_threshold, 0.3);
        assert_eq!(config.sync.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.sync.retry_delay(), Duration::from_millis(150));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.export.width, 1920);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load(dir.path().join("nope.json"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(EngineConfig::load(&path), EngineConfig::default());
    }

    #[test]
    fn try_load_reports_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ broken").unwrap();
        assert!(matches!(
            EngineConfig::try_load(&path),
            Err(crate::error::CoreError::Json(_))
        ));
        assert_eq!(
            EngineConfig::try_load(dir.path().join("nope.json")).unwrap(),
            EngineConfig::default()
        );
    }

    #[test]
    fn partial_file_fills_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"sync":{"drift_threshold":0.5},"snap_threshold":0.2}"#).unwrap();
        let config = EngineConfig::load(&path);
        assert_eq!(config.sync.drift_threshold, 0.5);
        assert_eq!(config.sync.poll_interval_ms, 250);
        assert_eq!(config.sync.release_distance, 30.0);
        assert_eq!(config.snap_threshold, 0.2);
        assert!(!config.logging.json);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = EngineConfig::default();
        config.logging.json = true;
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path), config);
    }
}
