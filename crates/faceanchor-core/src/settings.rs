//! Process-wide tracking settings.
//!
//! Fixed when an [`Engine`](crate::Engine) is constructed. Loadable from TOML;
//! every field is optional and falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const DEFAULT_ROTATION_OFFSET_X: f64 = 0.0;
const DEFAULT_PIVOT_OFFSET_YZ: [f64; 2] = [0.2, 0.6];
const DEFAULT_DETECTION_THRESHOLD: f64 = 0.8;
const DEFAULT_DETECTION_HYSTERESIS: f64 = 0.02;
const DEFAULT_CAMERA_MIN_VIDEO_DIM_FOV: f64 = 35.0;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("bad settings TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("detection threshold must be in (0, 1), got {0}")]
    Threshold(f64),
    #[error("detection hysteresis must be >= 0 and below the threshold {threshold}, got {hysteresis}")]
    Hysteresis { threshold: f64, hysteresis: f64 },
    #[error("camera field of view must be positive and below 180 degrees, got {0}")]
    FieldOfView(f64),
}

/// Tuning for visibility hysteresis, pivot placement and the camera FOV baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Extra pitch added to every detection, in radians. Negative looks up.
    pub rotation_offset_x: f64,
    /// Y and Z distance from the overlay origin to the rotation pivot.
    pub pivot_offset_yz: [f64; 2],
    /// Confidence level a face must cross to be shown, in (0, 1).
    pub detection_threshold: f64,
    /// Half-width of the dead band around the threshold.
    pub detection_hysteresis: f64,
    /// Vertical FOV in degrees for the smallest video dimension.
    pub camera_min_video_dim_fov: f64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            rotation_offset_x: DEFAULT_ROTATION_OFFSET_X,
            pivot_offset_yz: DEFAULT_PIVOT_OFFSET_YZ,
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            detection_hysteresis: DEFAULT_DETECTION_HYSTERESIS,
            camera_min_video_dim_fov: DEFAULT_CAMERA_MIN_VIDEO_DIM_FOV,
        }
    }
}

impl CalibrationSettings {
    /// Parse settings from a TOML string. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let threshold = self.detection_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(SettingsError::Threshold(threshold));
        }
        let hysteresis = self.detection_hysteresis;
        if !(hysteresis >= 0.0 && hysteresis < threshold) {
            return Err(SettingsError::Hysteresis { threshold, hysteresis });
        }
        let fov = self.camera_min_video_dim_fov;
        if !(fov > 0.0 && fov < 180.0) {
            return Err(SettingsError::FieldOfView(fov));
        }
        Ok(())
    }

    pub fn pivot_offset_y(&self) -> f64 {
        self.pivot_offset_yz[0]
    }

    pub fn pivot_offset_z(&self) -> f64 {
        self.pivot_offset_yz[1]
    }
}
