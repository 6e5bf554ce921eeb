use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Rigid transform from a trackable's local frame to world, column-major like GL.
pub type Pose = na::Matrix4<f32>;

/// Number of floats in a packed 4x4 matrix.
pub const MATRIX_LEN: usize = 16;

pub fn identity_pose() -> Pose {
    Pose::identity()
}

pub trait ToFlatMatrix {
    fn to_flat(&self) -> [f32; MATRIX_LEN];
}

impl ToFlatMatrix for Pose {
    fn to_flat(&self) -> [f32; MATRIX_LEN] {
        let mut out = [0.0; MATRIX_LEN];
        out.copy_from_slice(self.as_slice());
        out
    }
}

/// Reads the first 16 floats of `data` as a column-major matrix.
pub fn pose_from_flat(data: &[f32]) -> Option<Pose> {
    if data.len() < MATRIX_LEN {
        return None;
    }
    Some(Pose::from_column_slice(&data[..MATRIX_LEN]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackingState {
    #[default]
    Stopped,
    Paused,
    Tracking,
}

/// How confidently the engine is following an augmented image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackingMethod {
    #[default]
    NotTracking,
    FullTracking,
    LastKnownPose,
}

/// Engine-assigned identity of a plane, stable across frames for one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlaneId(pub u64);

/// What a hit-test ray struck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackableRef {
    Plane(PlaneId),
    Image(usize),
    Point,
}
