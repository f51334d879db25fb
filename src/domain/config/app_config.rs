//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::recording::RecordingLimit;

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Preferred input device name; the platform default is used when absent or missing
    pub input_device: Option<String>,
    /// Directory that finished recordings are saved into
    pub recordings_dir: Option<String>,
    /// Cap on a single recording, e.g. "5m"
    pub max_duration: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            input_device: None,
            recordings_dir: Some(Self::default_recordings_dir().to_string_lossy().to_string()),
            max_duration: Some(RecordingLimit::default().to_string()),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            input_device: other.input_device.or(self.input_device),
            recordings_dir: other.recordings_dir.or(self.recordings_dir),
            max_duration: other.max_duration.or(self.max_duration),
        }
    }

    fn default_recordings_dir() -> PathBuf {
        dirs::audio_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voice-memo")
    }

    /// Get max_duration as a parsed limit, or the default if not set/invalid
    pub fn max_duration_or_default(&self) -> RecordingLimit {
        self.max_duration
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get the recordings directory, or the platform audio directory
    pub fn recordings_dir_or_default(&self) -> PathBuf {
        self.recordings_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_recordings_dir)
    }

    /// Preferred input device, if one is configured
    pub fn input_device(&self) -> Option<&str> {
        self.input_device.as_deref().filter(|s| !s.is_empty())
    }
}
