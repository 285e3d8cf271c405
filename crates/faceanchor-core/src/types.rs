use glam::{DMat3, DVec3, EulerRot};
use serde::{Deserialize, Serialize};

/// One tracker output for a single face slot, valid for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionRecord {
    /// Detection confidence in [0, 1].
    pub detected: f64,
    /// Normalized center of the detection window.
    pub x: f64,
    pub y: f64,
    /// Window scale relative to the full reference width.
    pub s: f64,
    /// Head pitch, yaw and roll in radians.
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl DetectionRecord {
    /// Record used for slots the tracker did not report this frame.
    pub const ABSENT: DetectionRecord = DetectionRecord {
        detected: 0.0,
        x: 0.0,
        y: 0.0,
        s: 0.0,
        rx: 0.0,
        ry: 0.0,
        rz: 0.0,
    };
}

/// Euler angles applied intrinsically in Z-Y-X order (roll, then yaw, then pitch).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerZyx {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl EulerZyx {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Rotation matrix `Rz * Ry * Rx`.
    pub fn to_mat3(self) -> DMat3 {
        DMat3::from_euler(EulerRot::ZYX, self.z, self.y, self.x)
    }
}

/// Camera-space placement of one overlay object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: DVec3,
    pub rotation: EulerZyx,
}

/// Transform record for one face slot, as written into a scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayTransform {
    pub position: DVec3,
    pub rotation: EulerZyx,
    pub visible: bool,
}

impl Default for OverlayTransform {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: EulerZyx::default(),
            visible: false,
        }
    }
}

/// An externally-owned, transformable scene object bound to one face slot.
pub trait OverlayObject {
    fn set_visible(&mut self, visible: bool);
    fn set_position(&mut self, position: DVec3);
    fn set_rotation(&mut self, rotation: EulerZyx);
}

impl OverlayObject for OverlayTransform {
    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn set_position(&mut self, position: DVec3) {
        self.position = position;
    }

    fn set_rotation(&mut self, rotation: EulerZyx) {
        self.rotation = rotation;
    }
}

impl<T: OverlayObject + ?Sized> OverlayObject for &mut T {
    fn set_visible(&mut self, visible: bool) {
        (**self).set_visible(visible);
    }

    fn set_position(&mut self, position: DVec3) {
        (**self).set_position(position);
    }

    fn set_rotation(&mut self, rotation: EulerZyx) {
        (**self).set_rotation(rotation);
    }
}

/// Pixel dimensions of the on-screen viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Native pixel dimensions of the video stream. Zero until the stream is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Anything that can report the native size of the live video.
pub trait VideoSource {
    fn video_size(&self) -> VideoSize;
}

impl VideoSource for VideoSize {
    fn video_size(&self) -> VideoSize {
        *self
    }
}

impl VideoSource for std::cell::Cell<VideoSize> {
    fn video_size(&self) -> VideoSize {
        self.get()
    }
}

impl<T: VideoSource + ?Sized> VideoSource for std::rc::Rc<T> {
    fn video_size(&self) -> VideoSize {
        (**self).video_size()
    }
}
