//! Camera calibration — reconciles the video's native aspect ratio with the
//! viewport's, producing the vertical FOV, crop window and normalization
//! factor the pose compositor works in.
//!
//! The render camera itself is external and reached through [`SceneCamera`].
//! [`PerspectiveCamera`] is a self-contained implementation with the usual
//! GL-style projection and view-offset cropping.

use crate::types::{VideoSize, ViewportSize};
use glam::{DMat4, DVec3, DVec4};
use serde::Serialize;
use thiserror::Error;

const DEFAULT_NEAR: f64 = 0.1;
const DEFAULT_FAR: f64 = 2000.0;
const DEFAULT_FOV: f64 = 50.0;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CalibrationError {
    #[error("video dimensions {width}x{height} are not usable (stream not ready?)")]
    InvalidVideoDimensions { width: u32, height: u32 },
    #[error("viewport dimensions {width}x{height} are not usable")]
    InvalidViewportSize { width: f64, height: f64 },
}

/// Which pair of video margins falls outside the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CropAxis {
    /// Viewport is wider than the video: top and bottom are cut.
    TopBottom,
    /// Viewport is narrower than the video: left and right are cut.
    LeftRight,
}

/// Sub-window of a larger virtual frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewOffset {
    pub full_width: f64,
    pub full_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Result of reconciling one viewport size with one video size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraCalibration {
    pub viewport: ViewportSize,
    pub video: VideoSize,
    pub canvas_aspect: f64,
    pub video_aspect: f64,
    /// Vertical field of view in degrees.
    pub fov: f64,
    pub crop: CropAxis,
    /// Video size scaled to cover the viewport.
    pub full_width: f64,
    pub full_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    /// Viewport width over scaled video width.
    pub scale_w: f64,
}

impl CameraCalibration {
    pub fn view_offset(&self) -> ViewOffset {
        ViewOffset {
            full_width: self.full_width,
            full_height: self.full_height,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            width: self.viewport.width,
            height: self.viewport.height,
        }
    }
}

/// Compute the calibration for a viewport showing a video of the given size.
///
/// `min_video_dim_fov` is the vertical FOV in degrees spanned by the smaller
/// video dimension; portrait video widens the vertical FOV accordingly.
pub fn calibrate(
    viewport: ViewportSize,
    video: VideoSize,
    min_video_dim_fov: f64,
) -> Result<CameraCalibration, CalibrationError> {
    if video.width == 0 || video.height == 0 {
        return Err(CalibrationError::InvalidVideoDimensions {
            width: video.width,
            height: video.height,
        });
    }
    let (w, h) = (viewport.width, viewport.height);
    if !(w > 0.0 && h > 0.0 && w.is_finite() && h.is_finite()) {
        return Err(CalibrationError::InvalidViewportSize { width: w, height: h });
    }

    let (vw, vh) = (f64::from(video.width), f64::from(video.height));
    let canvas_aspect = w / h;
    let video_aspect = vw / vh;

    let fov_factor = if video_aspect < 1.0 { 1.0 / video_aspect } else { 1.0 };
    let fov = min_video_dim_fov * fov_factor;

    let (crop, scale) = if canvas_aspect > video_aspect {
        (CropAxis::TopBottom, w / vw)
    } else {
        (CropAxis::LeftRight, h / vh)
    };

    let full_width = vw * scale;
    let full_height = vh * scale;

    Ok(CameraCalibration {
        viewport,
        video,
        canvas_aspect,
        video_aspect,
        fov,
        crop,
        full_width,
        full_height,
        offset_x: (full_width - w) / 2.0,
        offset_y: (full_height - h) / 2.0,
        scale_w: w / full_width,
    })
}

/// Render camera owned by the host renderer.
pub trait SceneCamera {
    fn set_aspect(&mut self, aspect: f64);
    /// Set the vertical field of view in degrees.
    fn set_fov(&mut self, fov: f64);
    /// Install a crop window, or clear it with `None`.
    fn set_view_offset(&mut self, view: Option<ViewOffset>);
    fn set_position(&mut self, position: DVec3);
    fn matrix_auto_update(&self) -> bool;
    fn set_matrix_auto_update(&mut self, enabled: bool);
    /// Recompute the world matrix after a manual transform change.
    fn update_matrix(&mut self) {}
    fn update_projection_matrix(&mut self);
    fn projection_matrix(&self) -> DMat4;
}

/// GL-style perspective camera with optional view-offset cropping.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub fov: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    pub position: DVec3,
    pub matrix_auto_update: bool,
    pub view: Option<ViewOffset>,
    projection: DMat4,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(DEFAULT_FOV, 1.0, DEFAULT_NEAR, DEFAULT_FAR)
    }
}

impl PerspectiveCamera {
    pub fn new(fov: f64, aspect: f64, near: f64, far: f64) -> Self {
        let mut camera = Self {
            fov,
            aspect,
            near,
            far,
            position: DVec3::ZERO,
            matrix_auto_update: true,
            view: None,
            projection: DMat4::IDENTITY,
        };
        camera.projection = camera.compute_projection();
        camera
    }

    fn compute_projection(&self) -> DMat4 {
        let near = self.near;
        let mut top = near * (self.fov.to_radians() * 0.5).tan();
        let mut height = 2.0 * top;
        let mut width = self.aspect * height;
        let mut left = -0.5 * width;

        if let Some(view) = &self.view {
            left += view.offset_x * width / view.full_width;
            top -= view.offset_y * height / view.full_height;
            width *= view.width / view.full_width;
            height *= view.height / view.full_height;
        }

        frustum(left, left + width, top, top - height, near, self.far)
    }
}

/// Off-axis perspective projection mapping depth to GL clip space [-1, 1].
fn frustum(left: f64, right: f64, top: f64, bottom: f64, near: f64, far: f64) -> DMat4 {
    let x = 2.0 * near / (right - left);
    let y = 2.0 * near / (top - bottom);
    let a = (right + left) / (right - left);
    let b = (top + bottom) / (top - bottom);
    let c = -(far + near) / (far - near);
    let d = -2.0 * far * near / (far - near);

    DMat4::from_cols(
        DVec4::new(x, 0.0, 0.0, 0.0),
        DVec4::new(0.0, y, 0.0, 0.0),
        DVec4::new(a, b, c, -1.0),
        DVec4::new(0.0, 0.0, d, 0.0),
    )
}

impl SceneCamera for PerspectiveCamera {
    fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
    }

    fn set_fov(&mut self, fov: f64) {
        self.fov = fov;
    }

    fn set_view_offset(&mut self, view: Option<ViewOffset>) {
        self.view = view;
    }

    fn set_position(&mut self, position: DVec3) {
        self.position = position;
    }

    fn matrix_auto_update(&self) -> bool {
        self.matrix_auto_update
    }

    fn set_matrix_auto_update(&mut self, enabled: bool) {
        self.matrix_auto_update = enabled;
    }

    fn update_projection_matrix(&mut self) {
        self.projection = self.compute_projection();
    }

    fn projection_matrix(&self) -> DMat4 {
        self.projection
    }
}

/// What the calibrator last pushed into the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CalibrationCache {
    viewport: ViewportSize,
    fov: f64,
    offset_x: f64,
    offset_y: f64,
    projection: DMat4,
}

impl CalibrationCache {
    fn matches(&self, calibration: &CameraCalibration, projection: &DMat4) -> bool {
        self.viewport == calibration.viewport
            && self.fov == calibration.fov
            && self.offset_x == calibration.offset_x
            && self.offset_y == calibration.offset_y
            && self.projection == *projection
    }
}

/// Outcome of one [`CameraCalibrator::update`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationUpdate {
    pub calibration: CameraCalibration,
    /// `false` when the camera already matched and was left untouched.
    pub applied: bool,
}

/// Keeps a [`SceneCamera`] in sync with the viewport and video sizes.
#[derive(Debug, Clone)]
pub struct CameraCalibrator {
    min_video_dim_fov: f64,
    cache: Option<CalibrationCache>,
}

impl CameraCalibrator {
    pub fn new(min_video_dim_fov: f64) -> Self {
        Self {
            min_video_dim_fov,
            cache: None,
        }
    }

    /// Recalibrate `camera` if the viewport, video or camera changed since the last call.
    pub fn update<C: SceneCamera + ?Sized>(
        &mut self,
        viewport: ViewportSize,
        video: VideoSize,
        camera: &mut C,
    ) -> Result<CalibrationUpdate, CalibrationError> {
        // Pose math assumes a camera fixed at the origin.
        if camera.matrix_auto_update() {
            camera.set_matrix_auto_update(false);
            camera.set_position(DVec3::ZERO);
            camera.update_matrix();
        }

        let calibration = calibrate(viewport, video, self.min_video_dim_fov)?;

        let projection = camera.projection_matrix();
        if self
            .cache
            .as_ref()
            .is_some_and(|cache| cache.matches(&calibration, &projection))
        {
            return Ok(CalibrationUpdate {
                calibration,
                applied: false,
            });
        }

        camera.set_aspect(calibration.canvas_aspect);
        camera.set_fov(calibration.fov);
        camera.set_view_offset(None);
        camera.set_view_offset(Some(calibration.view_offset()));
        camera.update_projection_matrix();

        tracing::info!(
            fov = calibration.fov,
            aspect = calibration.canvas_aspect,
            offset_x = calibration.offset_x,
            offset_y = calibration.offset_y,
            "camera vertical FOV estimated"
        );

        self.cache = Some(CalibrationCache {
            viewport,
            fov: calibration.fov,
            offset_x: calibration.offset_x,
            offset_y: calibration.offset_y,
            projection: camera.projection_matrix(),
        });

        Ok(CalibrationUpdate {
            calibration,
            applied: true,
        })
    }
}
