//! faceanchor-core — Keeps 3D overlays locked onto tracked faces.
//!
//! Turns per-frame face detections into stable visibility decisions and
//! camera-space poses, and keeps the render camera's FOV and crop window
//! consistent with the video feed. Renderer-agnostic: the scene objects and
//! camera are reached through the [`OverlayObject`] and [`SceneCamera`] traits.

pub mod camera;
pub mod engine;
pub mod occluder;
pub mod pose;
pub mod settings;
pub mod types;
pub mod visibility;

pub use camera::{
    calibrate, CalibrationError, CalibrationUpdate, CameraCalibration, CameraCalibrator, CropAxis,
    PerspectiveCamera, SceneCamera, ViewOffset,
};
pub use engine::{DetectionCallback, Engine, SlotUpdate};
pub use occluder::{create_occluder, DepthOnlyMaterial, Occluder};
pub use pose::{compose_pose, PoseContext, PoseError};
pub use settings::{CalibrationSettings, SettingsError};
pub use types::{
    DetectionRecord, EulerZyx, OverlayObject, OverlayTransform, Pose, VideoSize, VideoSource, ViewportSize,
};
pub use visibility::{Hysteresis, Visibility, VisibilityChange, VisibilityTracker};
