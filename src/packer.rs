//! Fixed-layout float packing for renderer-facing buffers.
//!
//! Every record starts with a column-major 4x4 pose so a consumer can hand the
//! first 16 floats straight to a matrix uniform.

use glam::Vec2;

use crate::types::{MATRIX_LEN, Pose, ToFlatMatrix};

/// Floats per marker record: pose, width, height, image index, tracking flag.
pub const MARKER_RECORD_LEN: usize = 20;
/// Floats per hit record: pose, distance, found flag.
pub const HIT_RECORD_LEN: usize = 18;
/// Floats per point-cloud point: x, y, z, confidence.
pub const POINT_STRIDE: usize = 4;
/// Floats per plane boundary vertex.
pub const VERTEX_STRIDE: usize = 3;

pub const MARKER_WIDTH: usize = 16;
pub const MARKER_HEIGHT: usize = 17;
pub const MARKER_INDEX: usize = 18;
pub const MARKER_TRACKING: usize = 19;
pub const HIT_DISTANCE: usize = 16;
pub const HIT_FOUND: usize = 17;

pub fn pack_pose(pose: &Pose) -> [f32; MATRIX_LEN] {
    pose.to_flat()
}

/// Lifts plane-local (x, z) boundary points into the pose's horizontal plane.
pub fn pack_boundary(polygon: &[Vec2]) -> Vec<f32> {
    polygon.iter().flat_map(|p| [p.x, 0.0, p.y]).collect()
}

/// Splits interleaved engine polygon data into (x, z) points.
///
/// A trailing odd float is dropped.
pub fn polygon_from_interleaved(data: &[f32]) -> Vec<Vec2> {
    data.chunks_exact(2).map(|xz| Vec2::new(xz[0], xz[1])).collect()
}

/// One variable-length plane record: center pose followed by boundary vertices.
pub fn pack_plane_record(center_pose: &Pose, polygon: &[Vec2]) -> Vec<f32> {
    let mut record = Vec::with_capacity(MATRIX_LEN + polygon.len() * VERTEX_STRIDE);
    record.extend_from_slice(&pack_pose(center_pose));
    record.extend(pack_boundary(polygon));
    record
}

/// Axis-aligned rectangle covering a plane's extents, counter-clockwise from +X+Z.
pub fn pack_plane_extent_vertices(extent_x: f32, extent_z: f32) -> [f32; 12] {
    let hx = extent_x / 2.0;
    let hz = extent_z / 2.0;
    [
        hx, 0.0, hz, //
        -hx, 0.0, hz, //
        -hx, 0.0, -hz, //
        hx, 0.0, -hz,
    ]
}

pub fn pack_marker_record(
    pose: &Pose,
    width: f32,
    height: f32,
    image_index: usize,
    tracking: bool,
) -> [f32; MARKER_RECORD_LEN] {
    let mut record = [0.0; MARKER_RECORD_LEN];
    record[..MATRIX_LEN].copy_from_slice(&pack_pose(pose));
    record[MARKER_WIDTH] = width;
    record[MARKER_HEIGHT] = height;
    record[MARKER_INDEX] = image_index as f32;
    record[MARKER_TRACKING] = if tracking { 1.0 } else { 0.0 };
    record
}

/// Packs a selected hit; `None` yields an all-zero record with found = 0.
pub fn pack_hit_record(hit: Option<(&Pose, f32)>) -> [f32; HIT_RECORD_LEN] {
    let mut record = [0.0; HIT_RECORD_LEN];
    if let Some((pose, distance)) = hit {
        record[..MATRIX_LEN].copy_from_slice(&pack_pose(pose));
        record[HIT_DISTANCE] = distance;
        record[HIT_FOUND] = 1.0;
    }
    record
}

/// Copies a point cloud into a new buffer, dropping any incomplete trailing point.
pub fn pack_point_cloud(points: &[f32]) -> Vec<f32> {
    let complete = points.len() - points.len() % POINT_STRIDE;
    if complete != points.len() {
        log::warn!(
            "point cloud length {} is not a multiple of {}, truncating",
            points.len(),
            POINT_STRIDE
        );
    }
    points[..complete].to_vec()
}
