//! Per-frame tracking facade.
//!
//! One [`Engine`] owns the settings, per-slot visibility and the camera
//! calibration cache for one tracker. The host calls
//! [`update_camera`](Engine::update_camera) when the viewport or video may
//! have changed and [`update`](Engine::update) once per rendered frame with
//! that frame's detections.

use crate::camera::{CalibrationError, CalibrationUpdate, CameraCalibration, CameraCalibrator, SceneCamera};
use crate::occluder::{self, Occluder};
use crate::pose::{compose_pose, PoseContext, PoseError};
use crate::settings::{CalibrationSettings, SettingsError};
use crate::types::{DetectionRecord, OverlayObject, OverlayTransform, Pose, VideoSource, ViewportSize};
use crate::visibility::{Hysteresis, Visibility, VisibilityTracker};

/// Called with `(slot, visible)` whenever a slot is shown or hidden.
pub type DetectionCallback = Box<dyn FnMut(usize, bool)>;

/// Result of one frame for one face slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotUpdate {
    pub slot: usize,
    pub visible: bool,
    /// Visibility flipped this frame.
    pub changed: bool,
    /// Present only while visible. An `Err` means this frame's detection
    /// could not be placed; the caller may keep the previous transform.
    pub pose: Option<Result<Pose, PoseError>>,
}

impl SlotUpdate {
    /// Transform to write into the scene, if a pose was produced.
    pub fn transform(&self) -> Option<OverlayTransform> {
        match &self.pose {
            Some(Ok(pose)) => Some(OverlayTransform {
                position: pose.position,
                rotation: pose.rotation,
                visible: self.visible,
            }),
            _ => None,
        }
    }

    /// Write visibility, and the pose when there is one, into `object`.
    pub fn apply_to<O: OverlayObject + ?Sized>(&self, object: &mut O) {
        object.set_visible(self.visible);
        if let Some(Ok(pose)) = &self.pose {
            object.set_rotation(pose.rotation);
            object.set_position(pose.position);
        }
    }
}

/// State that exists only after [`Engine::init`].
struct Session {
    visibility: VisibilityTracker,
    video: Box<dyn VideoSource>,
    callback: Option<DetectionCallback>,
}

/// Face-tracked overlay engine for up to `max_faces` slots.
pub struct Engine {
    settings: CalibrationSettings,
    calibrator: CameraCalibrator,
    session: Option<Session>,
    last_calibration: Option<CameraCalibration>,
}

impl Engine {
    pub fn new(settings: CalibrationSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            calibrator: CameraCalibrator::new(settings.camera_min_video_dim_fov),
            settings,
            session: None,
            last_calibration: None,
        })
    }

    pub fn settings(&self) -> &CalibrationSettings {
        &self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Number of configured face slots, 0 before `init`.
    pub fn max_faces(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.visibility.slots())
    }

    pub fn visibility(&self, slot: usize) -> Visibility {
        self.session
            .as_ref()
            .map_or(Visibility::Hidden, |s| s.visibility.state(slot))
    }

    /// Most recent successful camera calibration.
    pub fn calibration(&self) -> Option<&CameraCalibration> {
        self.last_calibration.as_ref()
    }

    /// Configure the slot count, video source and optional visibility callback.
    ///
    /// Does nothing when `max_faces` is 0. Calling it again starts a fresh
    /// session with every slot hidden.
    pub fn init<V: VideoSource + 'static>(
        &mut self,
        max_faces: usize,
        video: V,
        callback: Option<DetectionCallback>,
    ) {
        if max_faces == 0 {
            tracing::warn!("init called without face slots; engine stays uninitialized");
            return;
        }
        if self.session.is_some() {
            tracing::debug!("re-initializing engine; visibility state reset");
        }

        self.session = Some(Session {
            visibility: VisibilityTracker::new(Hysteresis::from_settings(&self.settings), max_faces),
            video: Box::new(video),
            callback,
        });
        tracing::info!(
            max_faces,
            threshold = self.settings.detection_threshold,
            hysteresis = self.settings.detection_hysteresis,
            "engine initialized"
        );
    }

    /// Advance visibility and compose poses for every slot.
    ///
    /// `detections[i]` belongs to slot `i`; missing entries count as no
    /// detection. Returns an empty list before `init`.
    pub fn update(
        &mut self,
        detections: &[DetectionRecord],
        calibration: &CameraCalibration,
    ) -> Vec<SlotUpdate> {
        let ctx = PoseContext::from_calibration(calibration);
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        (0..session.visibility.slots())
            .map(|slot| {
                let det = detections.get(slot).unwrap_or(&DetectionRecord::ABSENT);
                step_slot(session, &self.settings, &ctx, slot, det)
            })
            .collect()
    }

    /// Like [`update`](Self::update), writing results into host-owned objects.
    ///
    /// A slot whose object is `None` (or missing from `objects`) is skipped
    /// entirely for this frame: its visibility does not advance.
    pub fn update_objects<O: OverlayObject>(
        &mut self,
        detections: &[DetectionRecord],
        calibration: &CameraCalibration,
        objects: &mut [Option<O>],
    ) -> Vec<SlotUpdate> {
        let ctx = PoseContext::from_calibration(calibration);
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let mut updates = Vec::with_capacity(session.visibility.slots());
        for slot in 0..session.visibility.slots() {
            let Some(object) = objects.get_mut(slot).and_then(Option::as_mut) else {
                continue;
            };
            let det = detections.get(slot).unwrap_or(&DetectionRecord::ABSENT);
            let update = step_slot(session, &self.settings, &ctx, slot, det);
            update.apply_to(object);
            updates.push(update);
        }
        updates
    }

    /// Recalibrate `camera` for the current viewport and video size.
    ///
    /// Returns `Ok(None)` before `init`. On error the camera is left as it
    /// was and the caller should skip calibration for this frame.
    pub fn update_camera<C: SceneCamera + ?Sized>(
        &mut self,
        viewport: ViewportSize,
        camera: &mut C,
    ) -> Result<Option<CalibrationUpdate>, CalibrationError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(None);
        };
        let video = session.video.video_size();

        let update = self.calibrator.update(viewport, video, camera).map_err(|e| {
            tracing::debug!(error = %e, "camera calibration skipped");
            e
        })?;
        self.last_calibration = Some(update.calibration);
        Ok(Some(update))
    }

    pub fn create_occluder<G>(&self, geometry: G) -> Occluder<G> {
        occluder::create_occluder(geometry)
    }
}

/// Visibility then pose for one slot. The callback sees each edge before it is committed.
fn step_slot(
    session: &mut Session,
    settings: &CalibrationSettings,
    ctx: &PoseContext,
    slot: usize,
    det: &DetectionRecord,
) -> SlotUpdate {
    let change = session.visibility.peek(slot, det.detected);
    if let Some(change) = change {
        if let Some(callback) = session.callback.as_mut() {
            callback(slot, change.visible);
        }
        session.visibility.commit(change);
        tracing::debug!(slot, visible = change.visible, confidence = det.detected, "face visibility changed");
    }

    let visible = session.visibility.state(slot).is_shown();
    let pose = visible.then(|| compose_pose(det, ctx, settings));
    if let Some(Err(err)) = &pose {
        tracing::debug!(slot, error = %err, "pose rejected");
    }

    SlotUpdate {
        slot,
        visible,
        changed: change.is_some(),
        pose,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{calibrate, PerspectiveCamera};
    use crate::types::VideoSize;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn engine() -> Engine {
        Engine::new(CalibrationSettings::default()).unwrap()
    }

    fn calibration_800x600() -> CameraCalibration {
        calibrate(ViewportSize::new(800.0, 600.0), VideoSize::new(640, 480), 35.0).unwrap()
    }

    fn face(detected: f64) -> DetectionRecord {
        DetectionRecord {
            detected,
            s: 0.1,
            ..DetectionRecord::ABSENT
        }
    }

    fn recording_callback() -> (Rc<RefCell<Vec<(usize, bool)>>>, DetectionCallback) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        (events, Box::new(move |slot: usize, visible: bool| sink.borrow_mut().push((slot, visible))))
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let settings = CalibrationSettings {
            detection_hysteresis: -0.1,
            ..Default::default()
        };
        assert!(Engine::new(settings).is_err());
    }

    #[test]
    fn test_uninitialized_engine_is_inert() {
        let mut e = engine();
        let cal = calibration_800x600();
        assert!(e.update(&[face(0.99)], &cal).is_empty());

        let mut cam = PerspectiveCamera::default();
        let before = cam.clone();
        assert_eq!(e.update_camera(ViewportSize::new(800.0, 600.0), &mut cam), Ok(None));
        assert_eq!(cam, before);
    }

    #[test]
    fn test_init_with_zero_faces_is_ignored() {
        let mut e = engine();
        e.init(0, VideoSize::new(640, 480), None);
        assert!(!e.is_initialized());
        assert_eq!(e.max_faces(), 0);
    }

    #[test]
    fn test_end_to_end_single_face() {
        let (events, callback) = recording_callback();
        let mut e = engine();
        e.init(1, VideoSize::new(640, 480), Some(callback));

        let mut cam = PerspectiveCamera::default();
        let cal = e
            .update_camera(ViewportSize::new(800.0, 600.0), &mut cam)
            .unwrap()
            .unwrap()
            .calibration;

        for c in [0.5, 0.6, 0.7, 0.8, 0.81, 0.82] {
            let out = e.update(&[face(c)], &cal);
            assert!(!out[0].visible, "shown too early at {c}");
            assert!(out[0].pose.is_none());
        }
        assert!(events.borrow().is_empty());

        let out = e.update(&[face(0.83)], &cal);
        assert!(out[0].visible && out[0].changed);
        assert_eq!(*events.borrow(), vec![(0, true)]);

        let out = e.update(&[face(0.9)], &cal);
        assert!(!out[0].changed);
        assert_eq!(events.borrow().len(), 1);

        let t = out[0].transform().unwrap();
        assert!(t.visible);
        assert!(t.position.z < 0.0);
        assert!(t.position.x.abs() < 1e-9);
        assert!(t.position.y.abs() < 1e-9);
    }

    #[test]
    fn test_missing_detections_hide_slots() {
        let (events, callback) = recording_callback();
        let mut e = engine();
        e.init(2, VideoSize::new(640, 480), Some(callback));
        let cal = calibration_800x600();

        e.update(&[face(0.95), face(0.95)], &cal);
        let out = e.update(&[face(0.95)], &cal);
        assert_eq!(out.len(), 2);
        assert!(out[0].visible);
        assert!(!out[1].visible);
        assert_eq!(*events.borrow(), vec![(0, true), (1, true), (1, false)]);
    }

    #[test]
    fn test_degenerate_scale_is_reported() {
        let mut e = engine();
        e.init(1, VideoSize::new(640, 480), None);
        let cal = calibration_800x600();
        let det = DetectionRecord { s: 0.0, ..face(0.95) };
        let out = e.update(&[det], &cal);
        assert!(out[0].visible);
        assert_eq!(out[0].pose, Some(Err(PoseError::InvalidDetectionScale(0.0))));
        assert!(out[0].transform().is_none());
    }

    #[test]
    fn test_update_objects_skips_missing_slots() {
        let mut e = engine();
        e.init(3, VideoSize::new(640, 480), None);
        let cal = calibration_800x600();

        let mut objects = [Some(OverlayTransform::default()), None, Some(OverlayTransform::default())];
        let out = e.update_objects(&[face(0.95), face(0.95), face(0.1)], &cal, &mut objects);

        assert_eq!(out.iter().map(|u| u.slot).collect::<Vec<_>>(), vec![0, 2]);
        let first = objects[0].unwrap();
        assert!(first.visible);
        assert!(first.position.z < 0.0);
        assert!(!objects[2].unwrap().visible);
        // Skipped slot did not advance.
        assert_eq!(e.visibility(1), Visibility::Hidden);
    }

    #[test]
    fn test_hidden_object_keeps_last_transform() {
        let mut e = engine();
        e.init(1, VideoSize::new(640, 480), None);
        let cal = calibration_800x600();
        let mut objects = [Some(OverlayTransform::default())];

        e.update_objects(&[face(0.95)], &cal, &mut objects);
        let shown = objects[0].unwrap();
        e.update_objects(&[face(0.1)], &cal, &mut objects);
        let hidden = objects[0].unwrap();

        assert!(!hidden.visible);
        assert_eq!(hidden.position, shown.position);
    }

    #[test]
    fn test_update_camera_follows_video_source() {
        let video = Rc::new(Cell::new(VideoSize::default()));
        let mut e = engine();
        e.init(1, video.clone(), None);
        let mut cam = PerspectiveCamera::default();
        let viewport = ViewportSize::new(1280.0, 720.0);

        let err = e.update_camera(viewport, &mut cam).unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidVideoDimensions { .. }));
        assert!(e.calibration().is_none());

        video.set(VideoSize::new(640, 480));
        let first = e.update_camera(viewport, &mut cam).unwrap().unwrap();
        assert!(first.applied);
        let second = e.update_camera(viewport, &mut cam).unwrap().unwrap();
        assert!(!second.applied);
        assert_eq!(e.calibration(), Some(&second.calibration));
    }

    #[test]
    fn test_reinit_resets_visibility() {
        let mut e = engine();
        e.init(1, VideoSize::new(640, 480), None);
        let cal = calibration_800x600();
        e.update(&[face(0.95)], &cal);
        assert!(e.visibility(0).is_shown());

        e.init(2, VideoSize::new(640, 480), None);
        assert_eq!(e.max_faces(), 2);
        assert_eq!(e.visibility(0), Visibility::Hidden);
    }

    #[test]
    fn test_engine_occluder() {
        let e = engine();
        let occ = e.create_occluder(());
        assert!(!occ.material.color_write);
        assert_eq!(occ.render_order, -1);
    }
}
