use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rerun::RecordingStream;

use crate::frame_sync::FrameSnapshot;
use crate::packer::{
    MARKER_HEIGHT, MARKER_RECORD_LEN, MARKER_TRACKING, MARKER_WIDTH, POINT_STRIDE,
    pack_plane_extent_vertices,
};
use crate::plane::PlaneMesh;
use crate::types::{Pose, pose_from_flat};

pub fn id_to_color(id: usize) -> (u8, u8, u8, u8) {
    let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
    let color_num = rng.random_range(0..2u32.pow(24));
    (
        ((color_num >> 16) % 256) as u8,
        ((color_num >> 8) % 256) as u8,
        (color_num % 256) as u8,
        255,
    )
}

fn transform(pose: &Pose, p: [f32; 3]) -> [f32; 3] {
    let w = pose.transform_point(&na::Point3::new(p[0], p[1], p[2]));
    [w.x, w.y, w.z]
}

/// Logs the camera pose; the view matrix is the inverse of the pose.
pub fn log_camera(
    recording: &RecordingStream,
    topic: &str,
    view_matrix: &[f32],
) -> rerun::RecordingStreamResult<()> {
    let Some(pose) = pose_from_flat(view_matrix).and_then(|v| v.try_inverse()) else {
        return Ok(());
    };
    let rotation =
        na::Rotation3::from_matrix_unchecked(pose.fixed_view::<3, 3>(0, 0).into_owned());
    let q = na::UnitQuaternion::from_rotation_matrix(&rotation);
    recording.log(
        format!("{}/camera", topic),
        &rerun::Transform3D::from_translation([pose[(0, 3)], pose[(1, 3)], pose[(2, 3)]])
            .with_quaternion(rerun::Quaternion::from_xyzw([q.i, q.j, q.k, q.w])),
    )
}

pub fn log_point_cloud(
    recording: &RecordingStream,
    topic: &str,
    point_cloud: &[f32],
) -> rerun::RecordingStreamResult<()> {
    let (pts, colors): (Vec<_>, Vec<_>) = point_cloud
        .chunks_exact(POINT_STRIDE)
        .map(|p| {
            let c = (p[3].clamp(0.0, 1.0) * 255.0) as u8;
            ([p[0], p[1], p[2]], (c, c, 255, 255))
        })
        .unzip();
    recording.log(
        format!("{}/points", topic),
        &rerun::Points3D::new(pts)
            .with_colors(colors)
            .with_radii([rerun::Radius::new_ui_points(2.0)]),
    )
}

/// Each plane boundary becomes a closed world-space line strip.
pub fn log_planes(
    recording: &RecordingStream,
    topic: &str,
    planes: &[Vec<f32>],
) -> rerun::RecordingStreamResult<()> {
    let (strips, colors): (Vec<_>, Vec<_>) = planes
        .iter()
        .filter_map(|r| PlaneMesh::from_record(r))
        .enumerate()
        .map(|(i, mesh)| {
            let mut strip: Vec<[f32; 3]> =
                mesh.world_vertices().iter().map(|v| [v.x, v.y, v.z]).collect();
            if let Some(first) = strip.first().copied() {
                strip.push(first);
            }
            (strip, id_to_color(i))
        })
        .unzip();
    recording.log(
        format!("{}/planes", topic),
        &rerun::LineStrips3D::new(strips).with_colors(colors),
    )
}

/// Outlines of tracked markers, labelled with their image index.
pub fn log_markers(
    recording: &RecordingStream,
    topic: &str,
    records: &[[f32; MARKER_RECORD_LEN]],
) -> rerun::RecordingStreamResult<()> {
    let mut strips = Vec::new();
    let mut labels = Vec::new();
    for (i, r) in records.iter().enumerate() {
        if r[MARKER_TRACKING] != 1.0 {
            continue;
        }
        let Some(pose) = pose_from_flat(r) else {
            continue;
        };
        let corners = pack_plane_extent_vertices(r[MARKER_WIDTH], r[MARKER_HEIGHT]);
        let mut strip: Vec<[f32; 3]> = corners
            .chunks_exact(3)
            .map(|c| transform(&pose, [c[0], c[1], c[2]]))
            .collect();
        let first = strip[0];
        strip.push(first);
        strips.push(strip);
        labels.push(format!("marker {}", i));
    }
    recording.log(
        format!("{}/markers", topic),
        &rerun::LineStrips3D::new(strips).with_labels(labels),
    )
}

pub fn log_snapshot(
    recording: &RecordingStream,
    topic: &str,
    snapshot: &FrameSnapshot,
) -> rerun::RecordingStreamResult<()> {
    recording.set_time("tick", rerun::TimeCell::from_sequence(snapshot.tick as i64));
    if snapshot.tracking {
        log_camera(recording, topic, &snapshot.view_matrix)?;
    }
    log_point_cloud(recording, topic, &snapshot.point_cloud)?;
    log_planes(recording, topic, &snapshot.planes)?;
    log_markers(recording, topic, &snapshot.image_matrices)
}
