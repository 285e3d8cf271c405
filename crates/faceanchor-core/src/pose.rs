//! Back-projection of a 2D detection window into a camera-space pose.
//!
//! The overlay is modelled as a unit cube whose front face matches the
//! detection window. Its apparent width fixes the distance through the
//! pinhole relation; its rotation is applied around a pivot offset from the
//! cube origin.

use crate::camera::CameraCalibration;
use crate::settings::CalibrationSettings;
use crate::types::{DetectionRecord, EulerZyx, Pose};
use glam::DVec3;
use thiserror::Error;

/// Depth of the unit bounding volume; the pose targets its center.
const UNIT_DEPTH: f64 = 1.0;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PoseError {
    #[error("detection window scale {0} is degenerate (zero or not finite)")]
    InvalidDetectionScale(f64),
}

/// Camera quantities the compositor needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseContext {
    /// `tan` of half the horizontal FOV.
    pub half_tan_fov_x: f64,
    /// Viewport-to-video normalization factor.
    pub scale_w: f64,
    /// Viewport width over height.
    pub canvas_aspect: f64,
}

impl PoseContext {
    /// Build from a camera's aspect ratio and vertical FOV in degrees.
    pub fn new(camera_aspect: f64, camera_fov_deg: f64, scale_w: f64) -> Self {
        Self {
            half_tan_fov_x: half_tan_fov_x(camera_aspect, camera_fov_deg),
            scale_w,
            canvas_aspect: camera_aspect,
        }
    }

    pub fn from_calibration(calibration: &CameraCalibration) -> Self {
        Self {
            half_tan_fov_x: half_tan_fov_x(calibration.canvas_aspect, calibration.fov),
            scale_w: calibration.scale_w,
            canvas_aspect: calibration.canvas_aspect,
        }
    }
}

/// `tan(aspect * fov_deg * π / 360)`, the horizontal half-FOV tangent used for placement.
pub fn half_tan_fov_x(camera_aspect: f64, camera_fov_deg: f64) -> f64 {
    (camera_aspect * camera_fov_deg * std::f64::consts::PI / 360.0).tan()
}

/// Position of the pivot relative to the overlay origin, before rotation.
pub fn pivot_offset(rz: f64, pivot_y: f64, pivot_z: f64) -> DVec3 {
    DVec3::new(-rz.sin() * pivot_y, -rz.cos() * pivot_y, -pivot_z)
}

/// Center of the detection volume in view space (camera looks down -Z).
fn window_center(det: &DetectionRecord, ctx: &PoseContext) -> Result<DVec3, PoseError> {
    let w = det.s * ctx.scale_w;
    if w == 0.0 || !w.is_finite() {
        return Err(PoseError::InvalidDetectionScale(det.s));
    }

    let distance_front = 1.0 / (2.0 * w * ctx.half_tan_fov_x);
    let d = distance_front + UNIT_DEPTH / 2.0;

    let xv = det.x * ctx.scale_w;
    let yv = det.y * ctx.scale_w;

    Ok(DVec3::new(
        xv * d * ctx.half_tan_fov_x,
        yv * d * ctx.half_tan_fov_x / ctx.canvas_aspect,
        -d,
    ))
}

/// Compose the overlay pose for one detection.
pub fn compose_pose(
    det: &DetectionRecord,
    ctx: &PoseContext,
    settings: &CalibrationSettings,
) -> Result<Pose, PoseError> {
    let center = window_center(det, ctx)?;
    let (pivot_y, pivot_z) = (settings.pivot_offset_y(), settings.pivot_offset_z());

    let rotation = EulerZyx::new(det.rx + settings.rotation_offset_x, det.ry, det.rz);
    let pivot = rotation.to_mat3() * pivot_offset(det.rz, pivot_y, pivot_z);
    let translation = center + DVec3::new(0.0, pivot_y, pivot_z);

    Ok(Pose {
        position: pivot + translation,
        rotation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_35deg() -> PoseContext {
        PoseContext::new(4.0 / 3.0, 35.0, 1.0)
    }

    fn centered(s: f64) -> DetectionRecord {
        DetectionRecord {
            detected: 1.0,
            s,
            ..DetectionRecord::ABSENT
        }
    }

    #[test]
    fn test_pivot_offset_without_roll() {
        let p = pivot_offset(0.0, 0.2, 0.6);
        assert_eq!(p, DVec3::new(0.0, -0.2, -0.6));
    }

    #[test]
    fn test_pivot_offset_quarter_roll() {
        let p = pivot_offset(std::f64::consts::FRAC_PI_2, 0.2, 0.6);
        assert!((p.x + 0.2).abs() < 1e-12);
        assert!(p.y.abs() < 1e-12);
        assert_eq!(p.z, -0.6);
    }

    #[test]
    fn test_centered_face_sits_on_axis() {
        let pose = compose_pose(&centered(0.1), &ctx_35deg(), &CalibrationSettings::default()).unwrap();
        assert!(pose.position.z < 0.0);
        assert!(pose.position.x.abs() < 1e-9, "x = {}", pose.position.x);
        assert!(pose.position.y.abs() < 1e-9, "y = {}", pose.position.y);
    }

    #[test]
    fn test_distance_matches_pinhole() {
        let ctx = ctx_35deg();
        let pose = compose_pose(&centered(0.1), &ctx, &CalibrationSettings::default()).unwrap();
        let expected = 1.0 / (2.0 * 0.1 * ctx.half_tan_fov_x) + 0.5;
        assert!((pose.position.z + expected).abs() < 1e-9);
    }

    #[test]
    fn test_smaller_window_is_farther() {
        let settings = CalibrationSettings::default();
        let near = compose_pose(&centered(0.4), &ctx_35deg(), &settings).unwrap();
        let far = compose_pose(&centered(0.1), &ctx_35deg(), &settings).unwrap();
        assert!(far.position.z < near.position.z);
    }

    #[test]
    fn test_offset_window_moves_sideways() {
        let ctx = ctx_35deg();
        let det = DetectionRecord { x: 0.5, y: -0.5, ..centered(0.2) };
        let pose = compose_pose(&det, &ctx, &CalibrationSettings::default()).unwrap();
        assert!(pose.position.x > 0.0);
        assert!(pose.position.y < 0.0);
        // Vertical offset is divided by the canvas aspect.
        let ratio = pose.position.x / -pose.position.y;
        assert!((ratio - ctx.canvas_aspect).abs() < 1e-9, "ratio = {ratio}");
    }

    #[test]
    fn test_rotation_includes_pitch_offset() {
        let settings = CalibrationSettings {
            rotation_offset_x: -0.1,
            ..Default::default()
        };
        let det = DetectionRecord { rx: 0.3, ry: 0.2, rz: -0.4, ..centered(0.2) };
        let pose = compose_pose(&det, &ctx_35deg(), &settings).unwrap();
        assert!((pose.rotation.x - 0.2).abs() < 1e-12);
        assert_eq!(pose.rotation.y, 0.2);
        assert_eq!(pose.rotation.z, -0.4);
    }

    #[test]
    fn test_pivot_rotates_in_place() {
        // With no pivot the rotation must not change the position at all.
        let settings = CalibrationSettings {
            pivot_offset_yz: [0.0, 0.0],
            ..Default::default()
        };
        let still = compose_pose(&centered(0.2), &ctx_35deg(), &settings).unwrap();
        let turned = DetectionRecord { rx: 0.5, ry: -0.3, rz: 0.2, ..centered(0.2) };
        let turned = compose_pose(&turned, &ctx_35deg(), &settings).unwrap();
        assert!((still.position - turned.position).length() < 1e-12);

        // With a pivot, a yaw swings the origin around the pivot point.
        let defaults = CalibrationSettings::default();
        let a = compose_pose(&centered(0.2), &ctx_35deg(), &defaults).unwrap();
        let yawed = DetectionRecord { ry: 0.5, ..centered(0.2) };
        let b = compose_pose(&yawed, &ctx_35deg(), &defaults).unwrap();
        assert!((a.position - b.position).length() > 1e-3);
    }

    #[test]
    fn test_deterministic() {
        let det = DetectionRecord {
            detected: 0.9,
            x: 0.13,
            y: -0.27,
            s: 0.31,
            rx: 0.11,
            ry: -0.42,
            rz: 0.05,
        };
        let ctx = PoseContext::new(16.0 / 9.0, 35.0, 0.75);
        let settings = CalibrationSettings::default();
        let a = compose_pose(&det, &ctx, &settings).unwrap();
        let b = compose_pose(&det, &ctx, &settings).unwrap();
        assert_eq!(a.position.to_array().map(f64::to_bits), b.position.to_array().map(f64::to_bits));
        assert_eq!(a.rotation, b.rotation);
    }

    #[test]
    fn test_zero_scale_rejected() {
        let err = compose_pose(&centered(0.0), &ctx_35deg(), &CalibrationSettings::default()).unwrap_err();
        assert_eq!(err, PoseError::InvalidDetectionScale(0.0));
    }

    #[test]
    fn test_non_finite_scale_rejected() {
        let det = centered(f64::INFINITY);
        let result = compose_pose(&det, &ctx_35deg(), &CalibrationSettings::default());
        assert!(matches!(result, Err(PoseError::InvalidDetectionScale(_))));
    }
}
