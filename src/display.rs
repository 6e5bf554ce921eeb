use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Full-screen quad UVs before the display transform, as (u, v) pairs.
pub const QUAD_TEXCOORDS: [f32; 8] = [
    0.0, 1.0, //
    0.0, 0.0, //
    1.0, 1.0, //
    1.0, 0.0,
];

/// Renderer quad corner i takes transformed UV pair `QUAD_UV_ORDER[i]`.
pub const QUAD_UV_ORDER: [usize; 4] = [2, 0, 1, 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    pub rotation: DisplayRotation,
    pub width: u32,
    pub height: u32,
}

impl DisplayGeometry {
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Texture coordinates for the renderer's quad, top-left origin.
pub fn quad_tex_coords(uv: &[f32; 8]) -> [Vec2; 4] {
    QUAD_UV_ORDER.map(|i| Vec2::new(uv[i * 2], 1.0 - uv[i * 2 + 1]))
}

/// Back-camera optics, all lengths in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraCharacteristics {
    pub sensor_width: f32,
    pub sensor_height: f32,
    pub focal_length: f32,
    /// Horizontal screen density.
    pub dpi: f32,
}

impl CameraCharacteristics {
    /// Radians.
    pub fn horizontal_fov(&self) -> f32 {
        2.0 * (self.sensor_width / (2.0 * self.focal_length)).atan()
    }

    /// Radians.
    pub fn vertical_fov(&self) -> f32 {
        2.0 * (self.sensor_height / (2.0 * self.focal_length)).atan()
    }
}
