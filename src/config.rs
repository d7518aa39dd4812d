use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::AppError;

/// Channel order of the frames the preview stream hands to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewFormat {
    Rgb,
    Bgr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Device index handed to the capture backend.
    pub index: u32,
    /// Channel order of the low-resolution preview stream.
    pub low_res_format: PreviewFormat,
    /// Width the preview stream is downscaled to.
    pub preview_width: u32,
    /// Width a captured still is downscaled to, preserving aspect ratio.
    pub target_capture_width: u32,
    /// How long a snapshot request may wait before it is reported as failed.
    pub snapshot_timeout_secs: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: 0,
            low_res_format: PreviewFormat::Rgb,
            preview_width: 640,
            target_capture_width: 800,
            snapshot_timeout_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Endpoint of the hosted vision-language model.
    pub endpoint: String,
    /// API key, kept in memory only. Empty means not configured.
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: String::new(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub camera: CameraSettings,
    pub vision: VisionSettings,
}

impl Settings {
    /// Loads settings from an optional `medscan.toml` next to the binary,
    /// with `MEDSCAN__`-prefixed environment variables taking precedence
    /// (e.g. `MEDSCAN__VISION__API_KEY`).
    pub fn load() -> Result<Self, AppError> {
        let config = Config::builder()
            .add_source(File::new("medscan", FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("MEDSCAN").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
