//! Boundary to the external tracking engine.
//!
//! The engine owns pose estimation, plane finding and image recognition. This
//! crate only sees what one [`TrackingEngine::update`] call hands back.

use crate::display::{CameraCharacteristics, DisplayGeometry};
use crate::error::Result;
use crate::hit_test::HitTestResult;
use crate::marker::MarkerObservation;
use crate::plane::Plane;
use crate::types::{Pose, TrackingState};

/// Opaque handle of an engine-created anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    pub tracking_state: TrackingState,
    pub pose: Pose,
    pub view_matrix: Pose,
}

/// Everything the engine produced for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineFrame {
    pub camera: CameraFrame,
    pub display_geometry_changed: bool,
    /// x, y, z, confidence per point.
    pub point_cloud: Vec<f32>,
    pub updated_planes: Vec<Plane>,
    pub updated_markers: Vec<MarkerObservation>,
}

pub trait TrackingEngine {
    /// Advances to the latest camera frame.
    fn update(&mut self) -> Result<EngineFrame>;

    /// Maps the 8-float quad UVs through the current display transform.
    fn transform_display_uv(&self, uv: &[f32; 8]) -> Result<[f32; 8]>;

    fn projection_matrix(&self, near: f32, far: f32) -> Result<Pose>;

    /// Ray-casts from screen pixel (x, y) against the latest frame.
    fn hit_test(&self, x: f32, y: f32) -> Result<Vec<HitTestResult>>;

    fn create_anchor(&mut self, pose: &Pose) -> Result<AnchorId>;

    /// Current engine estimate of an anchor's pose.
    fn anchor_pose(&self, anchor: AnchorId) -> Option<Pose>;

    fn set_camera_texture(&mut self, texture_id: u32);

    fn set_display_geometry(&mut self, geometry: DisplayGeometry);

    fn pause(&mut self);

    fn resume(&mut self) -> Result<()>;

    fn camera_characteristics(&self) -> Option<CameraCharacteristics> {
        None
    }
}
