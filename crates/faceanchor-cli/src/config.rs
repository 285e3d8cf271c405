use anyhow::{Context, Result};
use faceanchor_core::CalibrationSettings;
use std::path::Path;

const DEFAULT_MAX_FACES: usize = 1;

/// CLI configuration: tracking settings plus the slot count.
pub struct Config {
    pub settings: CalibrationSettings,
    /// Number of face slots to track.
    pub max_faces: usize,
}

impl Config {
    /// Load settings from `path` (or defaults), then apply `FACEANCHOR_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => CalibrationSettings::from_file(p)
                .with_context(|| format!("loading settings from {}", p.display()))?,
            None => CalibrationSettings::default(),
        };
        let config = Self::with_overrides(base, |key| std::env::var(key).ok());
        config.settings.validate().context("settings after environment overrides")?;
        Ok(config)
    }

    fn with_overrides(base: CalibrationSettings, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let f64_var = |key: &str, default: f64| env_f64(&lookup, key, default);
        let [pivot_y, pivot_z] = base.pivot_offset_yz;

        let settings = CalibrationSettings {
            rotation_offset_x: f64_var("FACEANCHOR_ROTATION_OFFSET_X", base.rotation_offset_x),
            pivot_offset_yz: [
                f64_var("FACEANCHOR_PIVOT_OFFSET_Y", pivot_y),
                f64_var("FACEANCHOR_PIVOT_OFFSET_Z", pivot_z),
            ],
            detection_threshold: f64_var("FACEANCHOR_DETECTION_THRESHOLD", base.detection_threshold),
            detection_hysteresis: f64_var("FACEANCHOR_DETECTION_HYSTERESIS", base.detection_hysteresis),
            camera_min_video_dim_fov: f64_var("FACEANCHOR_CAMERA_FOV", base.camera_min_video_dim_fov),
        };

        Self {
            settings,
            max_faces: env_usize(&lookup, "FACEANCHOR_MAX_FACES", DEFAULT_MAX_FACES),
        }
    }
}

fn env_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
