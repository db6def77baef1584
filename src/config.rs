//! Configuration file handling for screenshare-probe.
//!
//! Loads configuration from `~/.config/screenshare-probe/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::FfmpegSettings;
use crate::preview::CharSet;

/// Configuration file structure for screenshare-probe.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// FFmpeg executable name or path
    pub ffmpeg: String,
    /// Screen number to capture, as printed by `list-screens`
    pub screen: usize,
    /// X11 display (Linux only); `$DISPLAY` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Ideal capture frame rate
    pub frame_rate: u32,
    /// Seconds to wait for the capture to start
    pub request_timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            screen: 0,
            display: None,
            frame_rate: 30,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: bool,
    /// Preview width in characters
    pub width: u16,
    /// Preview height in characters
    pub height: u16,
    /// Preview refresh rate
    pub fps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// Invert brightness (for light terminals)
    pub invert: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 64,
            height: 20,
            fps: 5,
            charset: None,
            invert: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Where the last status is kept; defaults to the user data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_file: Option<PathBuf>,
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed or is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        let config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                source: e,
            })?;
            log::debug!("Loaded config from {}", path.display());
            config
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=120).contains(&self.capture.frame_rate) {
            return Err(ConfigError::Invalid {
                field: "capture.frame_rate",
                message: format!("must be between 1 and 120 fps, got {}", self.capture.frame_rate),
            });
        }
        if self.capture.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "capture.request_timeout_secs",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.preview.width == 0 || self.preview.height == 0 {
            return Err(ConfigError::Invalid {
                field: "preview.width/height",
                message: "must be greater than 0".to_string(),
            });
        }
        if !(1..=30).contains(&self.preview.fps) {
            return Err(ConfigError::Invalid {
                field: "preview.fps",
                message: format!("must be between 1 and 30, got {}", self.preview.fps),
            });
        }
        if let Some(name) = &self.preview.charset {
            if CharSet::from_name(name).is_none() {
                return Err(ConfigError::Invalid {
                    field: "preview.charset",
                    message: format!("unknown charset '{}' (standard, blocks, minimal)", name),
                });
            }
        }
        Ok(())
    }

    /// Settings for the FFmpeg capture host.
    ///
    /// Preview frames are requested at twice the character grid so each
    /// cell averages a few pixels.
    pub fn ffmpeg_settings(&self) -> FfmpegSettings {
        let preview_size = self.preview.enabled.then(|| {
            (
                u32::from(self.preview.width) * 2,
                u32::from(self.preview.height) * 2,
            )
        });
        FfmpegSettings {
            binary: self.capture.ffmpeg.clone(),
            screen: self.capture.screen,
            display: self.capture.display.clone(),
            preview_size,
            preview_fps: self.preview.fps,
            request_timeout: Duration::from_secs(self.capture.request_timeout_secs),
        }
    }

    pub fn charset(&self) -> CharSet {
        self.preview
            .charset
            .as_deref()
            .and_then(CharSet::from_name)
            .unwrap_or_default()
    }

    /// Status file location, honoring `[storage] status_file`.
    pub fn status_file(&self) -> PathBuf {
        self.storage
            .status_file
            .clone()
            .unwrap_or_else(crate::store::default_path)
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("screenshare-probe").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/screenshare-probe/config.toml")
        })
}
