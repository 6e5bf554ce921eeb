//! A deterministic [`TrackingEngine`] that plays back recorded frames.
//!
//! Used by the `arsync-replay` binary and by tests that need an engine without
//! a device. Scripts are JSON, see [`SessionScript`].

use std::collections::VecDeque;
use std::path::Path;

use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::display::{CameraCharacteristics, DisplayGeometry, DisplayRotation};
use crate::engine::{AnchorId, CameraFrame, EngineFrame, TrackingEngine};
use crate::error::{ArError, Result};
use crate::hit_test::HitTestResult;
use crate::io::object_from_json;
use crate::marker::{MarkerDatabase, MarkerObservation};
use crate::plane::Plane;
use crate::session::SessionFactory;
use crate::types::{Pose, TrackingState, identity_pose};

/// Vertical field of view used for projection when the script gives no optics.
const DEFAULT_FOVY: f32 = std::f32::consts::FRAC_PI_3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedFrame {
    #[serde(default)]
    pub tracking_state: TrackingState,
    #[serde(default = "identity_pose")]
    pub camera_pose: Pose,
    /// Defaults to the inverse of `camera_pose`.
    #[serde(default)]
    pub view_matrix: Option<Pose>,
    #[serde(default)]
    pub display_geometry_changed: bool,
    #[serde(default)]
    pub point_cloud: Vec<f32>,
    #[serde(default)]
    pub planes: Vec<Plane>,
    #[serde(default)]
    pub markers: Vec<MarkerObservation>,
    #[serde(default)]
    pub hits: Vec<HitTestResult>,
    /// Makes `update` fail with a camera error for this frame.
    #[serde(default)]
    pub camera_unavailable: bool,
}

impl Default for ScriptedFrame {
    fn default() -> Self {
        Self {
            tracking_state: TrackingState::Stopped,
            camera_pose: identity_pose(),
            view_matrix: None,
            display_geometry_changed: false,
            point_cloud: Vec::new(),
            planes: Vec::new(),
            markers: Vec::new(),
            hits: Vec::new(),
            camera_unavailable: false,
        }
    }
}

impl ScriptedFrame {
    pub fn tracking(camera_pose: Pose) -> ScriptedFrame {
        ScriptedFrame {
            tracking_state: TrackingState::Tracking,
            camera_pose,
            ..Default::default()
        }
    }

    pub fn lost() -> ScriptedFrame {
        ScriptedFrame {
            tracking_state: TrackingState::Paused,
            ..Default::default()
        }
    }

    pub fn camera_error() -> ScriptedFrame {
        ScriptedFrame {
            camera_unavailable: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionScript {
    #[serde(default)]
    pub camera: Option<CameraCharacteristics>,
    pub frames: Vec<ScriptedFrame>,
}

impl SessionScript {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SessionScript> {
        object_from_json(path)
    }
}

pub struct ScriptedEngine {
    frames: VecDeque<ScriptedFrame>,
    current: Option<ScriptedFrame>,
    camera: Option<CameraCharacteristics>,
    anchors: Vec<Pose>,
    geometry: Option<DisplayGeometry>,
    texture_id: Option<u32>,
    paused: bool,
}

impl ScriptedEngine {
    pub fn new(script: SessionScript) -> ScriptedEngine {
        ScriptedEngine {
            frames: script.frames.into(),
            current: None,
            camera: script.camera,
            anchors: Vec::new(),
            geometry: None,
            texture_id: None,
            paused: true,
        }
    }

    pub fn from_frames(frames: Vec<ScriptedFrame>) -> ScriptedEngine {
        Self::new(SessionScript {
            camera: None,
            frames,
        })
    }

    pub fn push_frame(&mut self, frame: ScriptedFrame) {
        self.frames.push_back(frame);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn texture_id(&self) -> Option<u32> {
        self.texture_id
    }

    pub fn display_geometry(&self) -> Option<DisplayGeometry> {
        self.geometry
    }

    /// Moves an anchor, as the engine would when refining its map.
    pub fn move_anchor(&mut self, anchor: AnchorId, pose: Pose) {
        if let Some(p) = self.anchors.get_mut(anchor.0 as usize) {
            *p = pose;
        }
    }

    /// Next scripted frame, or the last one again with nothing updated.
    fn next_frame(&mut self) -> Option<ScriptedFrame> {
        match self.frames.pop_front() {
            Some(frame) => Some(frame),
            None => self.current.clone().map(|last| ScriptedFrame {
                display_geometry_changed: false,
                planes: Vec::new(),
                markers: Vec::new(),
                camera_unavailable: false,
                ..last
            }),
        }
    }
}

fn rotate_uv(u: f32, v: f32, rotation: DisplayRotation) -> (f32, f32) {
    match rotation {
        DisplayRotation::Rotation0 => (u, v),
        DisplayRotation::Rotation90 => (v, 1.0 - u),
        DisplayRotation::Rotation180 => (1.0 - u, 1.0 - v),
        DisplayRotation::Rotation270 => (1.0 - v, u),
    }
}

impl TrackingEngine for ScriptedEngine {
    fn update(&mut self) -> Result<EngineFrame> {
        if self.paused {
            return Err(ArError::CameraUnavailable);
        }
        let frame = self.next_frame().ok_or(ArError::CameraUnavailable)?;
        if frame.camera_unavailable {
            return Err(ArError::CameraUnavailable);
        }
        let view_matrix = frame
            .view_matrix
            .or_else(|| frame.camera_pose.try_inverse())
            .unwrap_or_else(Pose::zeros);
        let engine_frame = EngineFrame {
            camera: CameraFrame {
                tracking_state: frame.tracking_state,
                pose: frame.camera_pose,
                view_matrix,
            },
            display_geometry_changed: frame.display_geometry_changed,
            point_cloud: frame.point_cloud.clone(),
            updated_planes: frame.planes.clone(),
            updated_markers: frame.markers.clone(),
        };
        self.current = Some(frame);
        Ok(engine_frame)
    }

    fn transform_display_uv(&self, uv: &[f32; 8]) -> Result<[f32; 8]> {
        let rotation = self.geometry.map(|g| g.rotation).unwrap_or_default();
        let mut out = [0.0; 8];
        for (src, dst) in uv.chunks_exact(2).zip(out.chunks_exact_mut(2)) {
            let (u, v) = rotate_uv(src[0], src[1], rotation);
            dst[0] = u;
            dst[1] = v;
        }
        Ok(out)
    }

    fn projection_matrix(&self, near: f32, far: f32) -> Result<Pose> {
        let aspect = self.geometry.map(|g| g.aspect()).unwrap_or(1.0);
        let fovy = self
            .camera
            .map(|c| c.vertical_fov())
            .unwrap_or(DEFAULT_FOVY);
        Ok(na::Perspective3::new(aspect, fovy, near, far).to_homogeneous())
    }

    fn hit_test(&self, _x: f32, _y: f32) -> Result<Vec<HitTestResult>> {
        Ok(self
            .current
            .as_ref()
            .map(|f| f.hits.clone())
            .unwrap_or_default())
    }

    fn create_anchor(&mut self, pose: &Pose) -> Result<AnchorId> {
        let tracking = self
            .current
            .as_ref()
            .is_some_and(|f| f.tracking_state == TrackingState::Tracking);
        if !tracking {
            return Err(ArError::NotTracking);
        }
        self.anchors.push(*pose);
        Ok(AnchorId(self.anchors.len() as u64 - 1))
    }

    fn anchor_pose(&self, anchor: AnchorId) -> Option<Pose> {
        self.anchors.get(anchor.0 as usize).copied()
    }

    fn set_camera_texture(&mut self, texture_id: u32) {
        self.texture_id = Some(texture_id);
    }

    fn set_display_geometry(&mut self, geometry: DisplayGeometry) {
        self.geometry = Some(geometry);
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) -> Result<()> {
        self.paused = false;
        Ok(())
    }

    fn camera_characteristics(&self) -> Option<CameraCharacteristics> {
        self.camera
    }
}

/// Hands out [`ScriptedEngine`]s built from a fixed script.
pub struct ScriptedFactory {
    script: SessionScript,
    failure: Option<String>,
}

impl ScriptedFactory {
    pub fn new(script: SessionScript) -> ScriptedFactory {
        ScriptedFactory {
            script,
            failure: None,
        }
    }

    /// Every creation fails with [`ArError::EngineUnavailable`].
    pub fn unavailable(reason: &str) -> ScriptedFactory {
        ScriptedFactory {
            script: SessionScript::default(),
            failure: Some(reason.to_string()),
        }
    }
}

impl SessionFactory for ScriptedFactory {
    type Engine = ScriptedEngine;

    fn create(
        &mut self,
        config: &SessionConfig,
        database: Option<&MarkerDatabase>,
    ) -> Result<ScriptedEngine> {
        if let Some(reason) = &self.failure {
            return Err(ArError::EngineUnavailable(reason.clone()));
        }
        if let Some(db) = database {
            log::debug!("scripted session with {} reference images", db.len());
        }
        let mut engine = ScriptedEngine::new(self.script.clone());
        engine.set_display_geometry(config.display_geometry());
        Ok(engine)
    }
}
