use ar_frame_sync::config::SessionConfig;
use ar_frame_sync::display::{CameraCharacteristics, DisplayRotation, QUAD_TEXCOORDS};
use ar_frame_sync::error::ErrorKind;
use ar_frame_sync::frame_sync::SyncState;
use ar_frame_sync::hit_test::HitTestResult;
use ar_frame_sync::marker::{MarkerDatabase, MarkerObservation};
use ar_frame_sync::packer::{HIT_FOUND, MARKER_TRACKING};
use ar_frame_sync::plane::Plane;
use ar_frame_sync::replay::{ScriptedEngine, ScriptedFrame, SessionScript};
use ar_frame_sync::types::{PlaneId, Pose, ToFlatMatrix, TrackableRef, TrackingMethod, TrackingState};
use ar_frame_sync::{FrameSync, TickOutcome};
use glam::Vec2;
use nalgebra as na;

fn at(x: f32, y: f32, z: f32) -> Pose {
    Pose::new_translation(&na::Vector3::new(x, y, z))
}

fn plane(id: u64) -> Plane {
    Plane::new(PlaneId(id), at(0.0, -1.0, id as f32), 2.0, 2.0).with_polygon(vec![
        Vec2::new(1.0, 1.0),
        Vec2::new(-1.0, 1.0),
        Vec2::new(-1.0, -1.0),
    ])
}

fn marker(index: usize, method: TrackingMethod) -> MarkerObservation {
    MarkerObservation {
        index,
        tracking_state: TrackingState::Tracking,
        tracking_method: method,
        center_pose: at(index as f32, 0.0, -2.0),
        extent_x: 0.3,
        extent_z: 0.2,
    }
}

fn three_images() -> MarkerDatabase {
    MarkerDatabase::from_names(vec![
        "a.png".to_string(),
        "b.png".to_string(),
        "c.png".to_string(),
    ])
}

fn sync_with(frames: Vec<ScriptedFrame>) -> FrameSync<ScriptedEngine> {
    env_logger::try_init().ok();
    let mut sync =
        FrameSync::with_database(SessionConfig::default(), Some(three_images())).unwrap();
    sync.attach_engine(ScriptedEngine::from_frames(frames));
    sync
}

fn tracked_frame() -> ScriptedFrame {
    ScriptedFrame {
        point_cloud: vec![0.0, 0.0, -1.0, 0.8, 1.0, 0.0, -1.0, 0.5],
        planes: vec![plane(1), plane(2)],
        markers: vec![marker(1, TrackingMethod::FullTracking)],
        ..ScriptedFrame::tracking(at(0.0, 1.5, 0.0))
    }
}

#[test]
fn test_tick_without_session_is_noop() {
    let mut sync: FrameSync<ScriptedEngine> =
        FrameSync::with_database(SessionConfig::default(), None).unwrap();
    assert_eq!(sync.tick(), TickOutcome::NoSession);
    assert_eq!(sync.tick_count(), 0);
    assert_eq!(sync.state(), SyncState::Uninitialized);
    assert!(!sync.has_session());
}

#[test]
fn test_attach_configures_engine() {
    let config = SessionConfig {
        texture_id: 7,
        rotation: DisplayRotation::Rotation90,
        ..Default::default()
    };
    let mut sync = FrameSync::with_database(config, None).unwrap();
    sync.attach_engine(ScriptedEngine::from_frames(Vec::new()));
    let engine = sync.engine().unwrap();
    assert_eq!(engine.texture_id(), Some(7));
    assert!(!engine.is_paused());
    assert_eq!(
        engine.display_geometry().map(|g| g.rotation),
        Some(DisplayRotation::Rotation90)
    );
}

#[test]
fn test_tracked_frame_publishes_everything() {
    let mut sync = sync_with(vec![tracked_frame()]);
    assert_eq!(sync.tick(), TickOutcome::Tracked);

    assert!(sync.is_ready());
    assert!(sync.is_tracking());
    assert_eq!(sync.camera_pose_matrix()[13], 1.5);
    assert!((sync.view_matrix()[13] + 1.5).abs() < 1e-6);
    assert_eq!(sync.point_cloud().len(), 8);
    assert_eq!(sync.planes().len(), 2);
    assert!(sync.take_planes_dirty());

    let images = sync.image_matrices();
    assert_eq!(images.len(), 3);
    assert_eq!(images[0][MARKER_TRACKING], 0.0);
    assert_eq!(images[1][MARKER_TRACKING], 1.0);
    assert_eq!(images[2][MARKER_TRACKING], 0.0);

    let named: Vec<_> = sync
        .augmented_images()
        .into_iter()
        .filter(|i| i.is_tracking)
        .map(|i| i.name)
        .collect();
    assert_eq!(named, vec![Some("b.png".to_string())]);
}

#[test]
fn test_three_image_end_to_end() {
    let p = at(0.4, 0.0, -1.2);
    let mut sync = sync_with(vec![
        ScriptedFrame::tracking(Pose::identity()),
        ScriptedFrame {
            markers: vec![MarkerObservation {
                index: 1,
                tracking_state: TrackingState::Tracking,
                tracking_method: TrackingMethod::FullTracking,
                center_pose: p,
                extent_x: 0.1,
                extent_z: 0.2,
            }],
            ..ScriptedFrame::tracking(Pose::identity())
        },
    ]);

    assert_eq!(sync.image_matrices().len(), 3);
    sync.tick();
    let first = sync.image_matrices();
    for (i, r) in first.iter().enumerate() {
        assert!(r[..16].iter().all(|v| *v == 0.0));
        assert_eq!(r[18], i as f32);
        assert_eq!(r[MARKER_TRACKING], 0.0);
    }

    sync.tick();
    let second = sync.image_matrices();
    assert_eq!(&second[1][..16], &p.to_flat());
    assert_eq!(&second[1][16..], &[0.1, 0.2, 1.0, 1.0]);
    assert_eq!(second[0], first[0]);
    assert_eq!(second[2], first[2]);
}

#[test]
fn test_marker_degrade_clears_slot() {
    let mut sync = sync_with(vec![
        tracked_frame(),
        ScriptedFrame {
            markers: vec![marker(1, TrackingMethod::LastKnownPose)],
            ..ScriptedFrame::tracking(at(0.0, 1.5, 0.0))
        },
    ]);
    sync.tick();
    sync.tick();
    let images = sync.image_matrices();
    assert_eq!(images[1][MARKER_TRACKING], 0.0);
    assert!(images[1][..16].iter().all(|v| *v == 0.0));
}

#[test]
fn test_texture_uv_dirty_once_per_change() {
    let config = SessionConfig {
        rotation: DisplayRotation::Rotation90,
        ..Default::default()
    };
    let mut sync = FrameSync::with_database(config, None).unwrap();
    sync.attach_engine(ScriptedEngine::from_frames(vec![
        ScriptedFrame {
            display_geometry_changed: true,
            ..ScriptedFrame::tracking(Pose::identity())
        },
        ScriptedFrame::tracking(Pose::identity()),
    ]));
    assert_eq!(sync.texture_uv(), QUAD_TEXCOORDS);
    assert!(!sync.take_texture_uv_dirty());

    sync.tick();
    assert_eq!(sync.texture_uv(), [1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    assert!(sync.take_texture_uv_dirty());
    assert!(!sync.take_texture_uv_dirty());

    sync.tick();
    assert!(!sync.take_texture_uv_dirty());
}

#[test]
fn test_lost_tracking_freezes_outputs() {
    let mut sync = sync_with(vec![
        tracked_frame(),
        ScriptedFrame {
            point_cloud: vec![9.0; 4],
            planes: vec![plane(3)],
            ..ScriptedFrame::lost()
        },
    ]);
    sync.tick();
    let view = sync.view_matrix();
    let images = sync.image_matrices();

    assert_eq!(sync.tick(), TickOutcome::Lost);
    assert_eq!(sync.state(), SyncState::Lost);
    assert!(sync.is_initialized());
    assert!(!sync.is_tracking());
    assert_eq!(sync.view_matrix(), view);
    assert_eq!(sync.point_cloud().len(), 8);
    assert_eq!(sync.planes().len(), 2);
    assert_eq!(sync.image_matrices(), images);
}

#[test]
fn test_lost_frame_still_updates_texture_uv() {
    let config = SessionConfig {
        rotation: DisplayRotation::Rotation180,
        ..Default::default()
    };
    let mut sync = FrameSync::with_database(config, None).unwrap();
    sync.attach_engine(ScriptedEngine::from_frames(vec![
        ScriptedFrame::tracking(Pose::identity()),
        ScriptedFrame {
            display_geometry_changed: true,
            ..ScriptedFrame::lost()
        },
        ScriptedFrame::tracking(Pose::identity()),
    ]));
    assert_eq!(sync.tick(), TickOutcome::Tracked);
    assert!(!sync.take_texture_uv_dirty());

    assert_eq!(sync.tick(), TickOutcome::Lost);
    assert_eq!(sync.state(), SyncState::Lost);
    assert_eq!(sync.texture_uv(), [1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    assert!(sync.take_texture_uv_dirty());
    assert!(!sync.take_texture_uv_dirty());

    assert_eq!(sync.tick(), TickOutcome::Tracked);
    assert_eq!(sync.state(), SyncState::Ready);
    assert!(!sync.take_texture_uv_dirty());
}

#[test]
fn test_untracked_start_stays_uninitialized() {
    let mut sync = sync_with(vec![ScriptedFrame::lost(), tracked_frame()]);
    assert_eq!(sync.tick(), TickOutcome::Lost);
    assert_eq!(sync.state(), SyncState::Uninitialized);
    assert!(!sync.is_initialized());
    assert_eq!(sync.tick(), TickOutcome::Tracked);
    assert!(sync.is_initialized());
}

#[test]
fn test_camera_error_keeps_previous_state() {
    let mut sync = sync_with(vec![tracked_frame(), ScriptedFrame::camera_error()]);
    sync.tick();
    let before = sync.snapshot();

    assert_eq!(
        sync.tick(),
        TickOutcome::Failed(ErrorKind::CameraUnavailable)
    );
    assert_eq!(sync.tick_count(), 2);
    let after = sync.snapshot();
    assert_eq!(after.view_matrix, before.view_matrix);
    assert_eq!(after.planes, before.planes);
    assert_eq!(after.image_matrices, before.image_matrices);
    assert_eq!(after.state, before.state);
}

#[test]
fn test_bad_marker_index_rejects_whole_frame() {
    let mut sync = sync_with(vec![
        tracked_frame(),
        ScriptedFrame {
            planes: vec![plane(7)],
            markers: vec![
                marker(0, TrackingMethod::FullTracking),
                marker(3, TrackingMethod::FullTracking),
            ],
            ..ScriptedFrame::tracking(at(5.0, 0.0, 0.0))
        },
    ]);
    sync.tick();
    sync.take_planes_dirty();

    assert_eq!(
        sync.tick(),
        TickOutcome::Failed(ErrorKind::IndexOutOfRange)
    );
    assert_eq!(sync.planes().len(), 2);
    assert!(!sync.take_planes_dirty());
    assert_eq!(sync.camera_pose_matrix()[12], 0.0);
    assert_eq!(sync.image_matrices()[0][MARKER_TRACKING], 0.0);
}

#[test]
fn test_subsumed_plane_leaves_snapshot() {
    let mut sync = sync_with(vec![
        tracked_frame(),
        ScriptedFrame {
            planes: vec![plane(2).subsumed(PlaneId(1))],
            ..ScriptedFrame::tracking(Pose::identity())
        },
    ]);
    sync.tick();
    sync.tick();
    assert_eq!(sync.planes().len(), 1);
    assert_eq!(
        sync.plane_registry().resolve(PlaneId(2)).map(|p| p.id),
        Some(PlaneId(1))
    );
}

#[test]
fn test_hit_test_needs_a_frame() {
    let hits = vec![HitTestResult {
        pose: at(0.0, -1.0, -2.0),
        distance: 2.2,
        trackable: Some(TrackableRef::Plane(PlaneId(1))),
    }];
    let mut sync = sync_with(vec![ScriptedFrame {
        hits,
        ..tracked_frame()
    }]);
    assert_eq!(sync.hit_test(540.0, 960.0)[HIT_FOUND], 0.0);
    assert!(sync.hit_pose(540.0, 960.0).is_none());

    sync.tick();
    let hit = sync.hit_pose(540.0, 960.0).unwrap();
    assert_eq!(hit.distance, 2.2);
    assert_eq!(hit.pose[(2, 3)], -2.0);
}

#[test]
fn test_anchor_lifecycle() {
    let mut sync = sync_with(vec![tracked_frame(), ScriptedFrame::lost()]);
    assert_eq!(sync.add_anchor(), None);
    assert_eq!(sync.anchor_pose_matrix(0), [0.0; 16]);

    sync.tick();
    assert_eq!(sync.add_anchor(), Some(0));
    assert_eq!(sync.anchor_count(), 1);
    let matrix = sync.anchor_pose_matrix(0);
    assert_eq!(matrix, at(0.0, 1.5, 0.0).to_flat());

    // out of range hands back the last matrix
    assert_eq!(sync.anchor_pose_matrix(4), matrix);

    sync.tick();
    assert_eq!(sync.add_anchor(), None);
    assert_eq!(sync.anchor_count(), 1);
}

#[test]
fn test_anchor_follows_engine_refinement() {
    let mut sync = sync_with(vec![tracked_frame()]);
    sync.tick();
    sync.add_anchor();
    let moved = at(0.1, 1.5, 0.0);
    let id = ar_frame_sync::engine::AnchorId(0);
    sync.engine_mut().unwrap().move_anchor(id, moved);
    assert_eq!(sync.anchor_pose_matrix(0), moved.to_flat());
    assert_eq!(sync.snapshot().anchors, vec![moved.to_flat()]);
}

#[test]
fn test_pause_and_resume() {
    let mut sync = sync_with(vec![tracked_frame(), tracked_frame()]);
    sync.pause();
    assert_eq!(
        sync.tick(),
        TickOutcome::Failed(ErrorKind::CameraUnavailable)
    );
    sync.resume();
    assert_eq!(sync.tick(), TickOutcome::Tracked);
}

#[test]
fn test_reload_texture_reaches_engine() {
    let mut sync = sync_with(Vec::new());
    sync.reload_texture(42);
    assert_eq!(sync.config().texture_id, 42);
    assert_eq!(sync.engine().unwrap().texture_id(), Some(42));
}

#[test]
fn test_projection_only_after_tracking() {
    let mut sync = sync_with(vec![tracked_frame()]);
    assert_eq!(sync.projection_matrix(0.1, 100.0), [0.0; 16]);
    sync.tick();
    let projection = sync.projection_matrix(0.1, 100.0);
    assert_ne!(projection, [0.0; 16]);
    assert_eq!(projection[11], -1.0);
}

#[test]
fn test_default_projection_uses_config_clip_planes() {
    let config = SessionConfig {
        near: 0.5,
        far: 20.0,
        ..Default::default()
    };
    let mut sync = FrameSync::with_database(config, None).unwrap();
    sync.attach_engine(ScriptedEngine::from_frames(vec![tracked_frame()]));
    sync.tick();

    let projection = sync.default_projection_matrix();
    assert_eq!(projection, sync.projection_matrix(0.5, 20.0));
    assert_ne!(projection, sync.projection_matrix(0.1, 100.0));

    sync.default_projection_matrix();
    assert_eq!(sync.snapshot().projection, projection);
}

#[test]
fn test_with_database_rejects_invalid_config() {
    let config = SessionConfig {
        hit_test_cutoff: 0.0,
        ..Default::default()
    };
    assert!(FrameSync::<ScriptedEngine>::with_database(config, None).is_err());
    let config = SessionConfig {
        far: f32::NAN,
        ..Default::default()
    };
    assert!(FrameSync::<ScriptedEngine>::with_database(config, Some(three_images())).is_err());
}

#[test]
fn test_field_of_view_from_engine_optics() {
    let script = SessionScript {
        camera: Some(CameraCharacteristics {
            sensor_width: 4.0,
            sensor_height: 4.0,
            focal_length: 2.0,
            dpi: 420.0,
        }),
        frames: Vec::new(),
    };
    let mut sync: FrameSync<ScriptedEngine> =
        FrameSync::with_database(SessionConfig::default(), None).unwrap();
    assert!(sync.field_of_view().is_none());
    sync.attach_engine(ScriptedEngine::new(script));
    let (h, v) = sync.field_of_view().unwrap();
    assert!((h - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    assert!((v - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    assert_eq!(sync.screen_dpi(), Some(420.0));
}

#[test]
fn test_markers_disabled_gives_no_images() {
    let mut sync: FrameSync<ScriptedEngine> = FrameSync::new(SessionConfig::default()).unwrap();
    sync.attach_engine(ScriptedEngine::from_frames(vec![tracked_frame()]));
    assert_eq!(sync.tick(), TickOutcome::Tracked);
    assert!(sync.image_matrices().is_empty());
    assert!(sync.marker_table().is_none());
}

#[test]
fn test_new_fails_on_missing_marker_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        enable_augmented_images: true,
        marker_directory: dir.path().join("nope"),
        ..Default::default()
    };
    assert!(FrameSync::<ScriptedEngine>::new(config).is_err());
}

#[test]
fn test_snapshot_serializes() {
    let mut sync = sync_with(vec![tracked_frame()]);
    sync.tick();
    let json = serde_json::to_value(sync.snapshot()).unwrap();
    assert_eq!(json["tick"], 1);
    assert_eq!(json["state"], "Ready");
    assert_eq!(json["planes"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["image_matrices"].as_array().map(Vec::len), Some(3));
}
