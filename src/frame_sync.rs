//! Per-frame orchestration between the tracking engine and the renderer.
//!
//! [`FrameSync::tick`] is called once per rendered frame from a single thread.
//! It never fails: engine errors are logged, reported in the returned
//! [`TickOutcome`], and leave every published buffer as it was. Renderer-facing
//! accessors return snapshots that stay valid until the next tick.

use glam::Vec2;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::display::{QUAD_TEXCOORDS, quad_tex_coords};
use crate::engine::{AnchorId, EngineFrame, TrackingEngine};
use crate::error::{ArError, ErrorKind, Result};
use crate::hit_test::{HitPose, HitTestSelector};
use crate::marker::{AugmentedImageRecord, MarkerDatabase, MarkerSlotTable};
use crate::packer::{HIT_RECORD_LEN, MARKER_RECORD_LEN, pack_point_cloud, pack_pose};
use crate::plane::PlaneRegistry;
use crate::session::{PendingSession, SessionHandle, SessionPoll};
use crate::types::{MATRIX_LEN, Pose, TrackingState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    /// No tracked frame processed yet.
    Uninitialized,
    /// Last frame was tracking.
    Ready,
    /// Last frame was not tracking; outputs are frozen.
    Lost,
}

/// What a single [`FrameSync::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No engine attached yet, nothing happened.
    NoSession,
    Tracked,
    /// Frame processed, but the camera was not tracking.
    Lost,
    /// Engine error; previous state retained.
    Failed(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraState {
    pub tracking_state: TrackingState,
    pub pose: Pose,
    pub view_matrix: Pose,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            tracking_state: TrackingState::Stopped,
            pose: Pose::zeros(),
            view_matrix: Pose::zeros(),
        }
    }
}

/// Everything the renderer can read, captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub tick: u64,
    pub state: SyncState,
    pub tracking: bool,
    pub view_matrix: [f32; MATRIX_LEN],
    /// Last projection obtained from the engine, zeros before the first.
    pub projection: [f32; MATRIX_LEN],
    pub texture_uv: [f32; 8],
    pub point_cloud: Vec<f32>,
    pub planes: Vec<Vec<f32>>,
    pub image_matrices: Vec<[f32; MARKER_RECORD_LEN]>,
    pub anchors: Vec<[f32; MATRIX_LEN]>,
}

pub struct FrameSync<E: TrackingEngine> {
    config: SessionConfig,
    engine: Option<E>,
    pending: Option<PendingSession<E>>,
    session_error: Option<ErrorKind>,
    state: SyncState,
    camera: CameraState,
    projection: Pose,
    texture_uv: [f32; 8],
    texture_uv_dirty: bool,
    point_cloud: Vec<f32>,
    planes: PlaneRegistry,
    plane_records: Vec<Vec<f32>>,
    database: Option<MarkerDatabase>,
    markers: Option<MarkerSlotTable>,
    anchors: Vec<AnchorId>,
    anchor_matrix: [f32; MATRIX_LEN],
    hit_selector: HitTestSelector,
    has_frame: bool,
    tick_count: u64,
}

impl<E: TrackingEngine> FrameSync<E> {
    /// Validates `config` and, when marker recognition is on, builds the
    /// marker database from its reference image directory.
    pub fn new(config: SessionConfig) -> Result<FrameSync<E>> {
        config.validate()?;
        let database = if config.enable_augmented_images {
            Some(MarkerDatabase::from_dir(&config.marker_directory)?)
        } else {
            None
        };
        Ok(Self::build(config, database))
    }

    /// Validates `config`; marker slots are sized from `database`, `None`
    /// disables marker output.
    pub fn with_database(
        config: SessionConfig,
        database: Option<MarkerDatabase>,
    ) -> Result<FrameSync<E>> {
        config.validate()?;
        Ok(Self::build(config, database))
    }

    fn build(config: SessionConfig, database: Option<MarkerDatabase>) -> FrameSync<E> {
        let markers = database.as_ref().map(MarkerSlotTable::with_database);
        let hit_selector = HitTestSelector::new(config.hit_test_cutoff);
        FrameSync {
            config,
            engine: None,
            pending: None,
            session_error: None,
            state: SyncState::Uninitialized,
            camera: CameraState::default(),
            projection: Pose::zeros(),
            texture_uv: QUAD_TEXCOORDS,
            texture_uv_dirty: false,
            point_cloud: Vec::new(),
            planes: PlaneRegistry::new(),
            plane_records: Vec::new(),
            database,
            markers,
            anchors: Vec::new(),
            anchor_matrix: [0.0; MATRIX_LEN],
            hit_selector,
            has_frame: false,
            tick_count: 0,
        }
    }

    /// Asks the session host for an engine; the result is picked up by later ticks.
    pub fn request_session(&mut self, handle: &SessionHandle<E>) {
        self.session_error = None;
        self.pending = Some(handle.request_session(self.config.clone(), self.database.clone()));
    }

    pub fn attach_engine(&mut self, mut engine: E) {
        engine.set_camera_texture(self.config.texture_id);
        engine.set_display_geometry(self.config.display_geometry());
        if let Err(e) = engine.resume() {
            log::warn!("could not resume AR session: {}", e);
        }
        log::info!("AR session attached");
        self.engine = Some(engine);
        self.session_error = None;
    }

    fn poll_session(&mut self) {
        let Some(pending) = &self.pending else {
            return;
        };
        match pending.poll() {
            SessionPoll::Pending => {}
            SessionPoll::Ready(engine) => {
                self.pending = None;
                self.attach_engine(engine);
            }
            SessionPoll::Failed(e) => {
                self.pending = None;
                log::error!("AR session unavailable: {}", e);
                self.session_error = Some(e.kind());
            }
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.poll_session();
        if self.engine.is_none() {
            return TickOutcome::NoSession;
        }
        self.tick_count += 1;
        match self.advance() {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_transient() {
                    log::warn!("tick {} skipped: {}", self.tick_count, e);
                } else {
                    log::error!("tick {} rejected: {}", self.tick_count, e);
                }
                TickOutcome::Failed(e.kind())
            }
        }
    }

    fn advance(&mut self) -> Result<TickOutcome> {
        let engine = self.engine.as_mut().ok_or(ArError::SessionNotReady)?;
        let frame = engine.update()?;
        let texture_uv = if frame.display_geometry_changed {
            Some(engine.transform_display_uv(&QUAD_TEXCOORDS)?)
        } else {
            None
        };
        let tracking = frame.camera.tracking_state == TrackingState::Tracking;
        if tracking {
            if let Some(table) = &self.markers {
                table.validate(&frame.updated_markers)?;
            }
        }

        // nothing below can fail, the frame is committed from here on
        self.has_frame = true;
        if let Some(uv) = texture_uv {
            self.texture_uv = uv;
            self.texture_uv_dirty = true;
        }
        self.camera.tracking_state = frame.camera.tracking_state;
        if !tracking {
            if self.state == SyncState::Ready {
                log::info!("tracking lost ({:?})", frame.camera.tracking_state);
                self.state = SyncState::Lost;
            }
            return Ok(TickOutcome::Lost);
        }

        let EngineFrame {
            camera,
            point_cloud,
            updated_planes,
            updated_markers,
            ..
        } = frame;
        self.camera.pose = camera.pose;
        self.camera.view_matrix = camera.view_matrix;
        self.point_cloud = pack_point_cloud(&point_cloud);
        if self.state != SyncState::Ready {
            log::info!("tracking acquired");
            self.state = SyncState::Ready;
        }

        let summary = self.planes.update(updated_planes);
        log::trace!(
            "tick {}: planes +{} -{} ~{} ({} live)",
            self.tick_count,
            summary.inserted,
            summary.removed,
            summary.refreshed,
            self.planes.len()
        );
        self.plane_records = self.planes.snapshot();

        if let Some(table) = self.markers.as_mut() {
            let tracked = table.update(&updated_markers)?;
            log::trace!("tick {}: {} markers fully tracked", self.tick_count, tracked);
        }
        Ok(TickOutcome::Tracked)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    pub fn has_session(&self) -> bool {
        self.engine.is_some()
    }

    /// Set once when session creation failed; such failures are not retried.
    pub fn session_error(&self) -> Option<ErrorKind> {
        self.session_error
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// True once any frame has been tracked, and stays true.
    pub fn is_initialized(&self) -> bool {
        self.state != SyncState::Uninitialized
    }

    pub fn is_ready(&self) -> bool {
        self.state == SyncState::Ready
    }

    pub fn is_tracking(&self) -> bool {
        self.camera.tracking_state == TrackingState::Tracking
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn view_matrix(&self) -> [f32; MATRIX_LEN] {
        pack_pose(&self.camera.view_matrix)
    }

    pub fn camera_pose_matrix(&self) -> [f32; MATRIX_LEN] {
        pack_pose(&self.camera.pose)
    }

    /// Queries the engine once initialized; otherwise, or on error, the last
    /// matrix obtained is returned.
    pub fn projection_matrix(&mut self, near: f32, far: f32) -> [f32; MATRIX_LEN] {
        if self.is_initialized() {
            if let Some(engine) = &self.engine {
                match engine.projection_matrix(near, far) {
                    Ok(projection) => self.projection = projection,
                    Err(e) => log::warn!("projection matrix unavailable: {}", e),
                }
            }
        }
        pack_pose(&self.projection)
    }

    /// [`Self::projection_matrix`] with the configured clip planes.
    pub fn default_projection_matrix(&mut self) -> [f32; MATRIX_LEN] {
        let (near, far) = (self.config.near, self.config.far);
        self.projection_matrix(near, far)
    }

    pub fn texture_uv(&self) -> [f32; 8] {
        self.texture_uv
    }

    pub fn quad_tex_coords(&self) -> [Vec2; 4] {
        quad_tex_coords(&self.texture_uv)
    }

    /// Consumes the texture-UV dirty flag: true once per display change.
    pub fn take_texture_uv_dirty(&mut self) -> bool {
        std::mem::take(&mut self.texture_uv_dirty)
    }

    /// x, y, z, confidence per point.
    pub fn point_cloud(&self) -> &[f32] {
        &self.point_cloud
    }

    pub fn planes(&self) -> &[Vec<f32>] {
        &self.plane_records
    }

    pub fn plane_registry(&self) -> &PlaneRegistry {
        &self.planes
    }

    /// Consumes the plane dirty flag.
    pub fn take_planes_dirty(&mut self) -> bool {
        self.planes.take_dirty()
    }

    pub fn marker_database(&self) -> Option<&MarkerDatabase> {
        self.database.as_ref()
    }

    pub fn marker_table(&self) -> Option<&MarkerSlotTable> {
        self.markers.as_ref()
    }

    /// One 20-float record per database image; empty when markers are disabled.
    pub fn image_matrices(&self) -> Vec<[f32; MARKER_RECORD_LEN]> {
        self.markers
            .as_ref()
            .map(MarkerSlotTable::records)
            .unwrap_or_default()
    }

    pub fn augmented_images(&self) -> Vec<AugmentedImageRecord> {
        self.image_matrices()
            .iter()
            .map(|r| AugmentedImageRecord::from_record(r, self.database.as_ref()))
            .collect()
    }

    /// Nearest eligible hit at screen pixel (x, y); found = 0 without a frame.
    pub fn hit_test(&self, x: f32, y: f32) -> [f32; HIT_RECORD_LEN] {
        let hits = match &self.engine {
            Some(engine) if self.has_frame => match engine.hit_test(x, y) {
                Ok(hits) => hits,
                Err(e) => {
                    log::warn!("hit test at ({}, {}) failed: {}", x, y, e);
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };
        self.hit_selector.select_record(&hits)
    }

    pub fn hit_pose(&self, x: f32, y: f32) -> Option<HitPose> {
        HitPose::from_record(&self.hit_test(x, y))
    }

    /// Anchors the latest camera pose; returns the new anchor's index.
    ///
    /// Skipped (with a log line) before the first tracked frame or when the
    /// engine reports it is not tracking.
    pub fn add_anchor(&mut self) -> Option<usize> {
        if !self.is_initialized() {
            log::debug!("anchor skipped, no tracked frame yet");
            return None;
        }
        let engine = self.engine.as_mut()?;
        match engine.create_anchor(&self.camera.pose) {
            Ok(id) => {
                self.anchors.push(id);
                log::debug!("anchor {} created", self.anchors.len() - 1);
                Some(self.anchors.len() - 1)
            }
            Err(ArError::NotTracking) => {
                log::warn!("anchor skipped, camera not tracking");
                None
            }
            Err(e) => {
                log::warn!("anchor creation failed: {}", e);
                None
            }
        }
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Out-of-range indices return the last anchor matrix handed out.
    pub fn anchor_pose_matrix(&mut self, index: usize) -> [f32; MATRIX_LEN] {
        if let (Some(id), Some(engine)) = (self.anchors.get(index), &self.engine) {
            if let Some(pose) = engine.anchor_pose(*id) {
                self.anchor_matrix = pack_pose(&pose);
            }
        }
        self.anchor_matrix
    }

    pub fn pause(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            log::info!("pausing AR session");
            engine.pause();
        }
    }

    /// No-op without a session.
    pub fn resume(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            log::info!("resuming AR session");
            if let Err(e) = engine.resume() {
                log::warn!("could not resume AR session: {}", e);
            }
        }
    }

    /// Points the engine at a freshly created camera texture.
    pub fn reload_texture(&mut self, texture_id: u32) {
        self.config.texture_id = texture_id;
        if let Some(engine) = self.engine.as_mut() {
            engine.set_camera_texture(texture_id);
        }
    }

    /// (horizontal, vertical) field of view in radians, if the engine knows its optics.
    pub fn field_of_view(&self) -> Option<(f32, f32)> {
        let c = self.engine.as_ref()?.camera_characteristics()?;
        Some((c.horizontal_fov(), c.vertical_fov()))
    }

    pub fn screen_dpi(&self) -> Option<f32> {
        Some(self.engine.as_ref()?.camera_characteristics()?.dpi)
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        let anchors = match &self.engine {
            Some(engine) => self
                .anchors
                .iter()
                .map(|id| {
                    engine
                        .anchor_pose(*id)
                        .map(|p| pack_pose(&p))
                        .unwrap_or([0.0; MATRIX_LEN])
                })
                .collect(),
            None => Vec::new(),
        };
        FrameSnapshot {
            tick: self.tick_count,
            state: self.state,
            tracking: self.is_tracking(),
            view_matrix: self.view_matrix(),
            projection: pack_pose(&self.projection),
            texture_uv: self.texture_uv,
            point_cloud: self.point_cloud.clone(),
            planes: self.plane_records.clone(),
            image_matrices: self.image_matrices(),
            anchors,
        }
    }
}
