use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::display::{DisplayGeometry, DisplayRotation};
use crate::error::{ArError, Result};
use crate::hit_test::DEFAULT_HIT_CUTOFF;
use crate::io::object_from_json;

/// Setup parameters for one AR session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Texture the engine streams the camera image into.
    pub texture_id: u32,
    pub width: u32,
    pub height: u32,
    pub rotation: DisplayRotation,
    pub enable_augmented_images: bool,
    pub marker_directory: PathBuf,
    pub near: f32,
    pub far: f32,
    pub hit_test_cutoff: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            texture_id: 0,
            width: 1080,
            height: 1920,
            rotation: DisplayRotation::Rotation0,
            enable_augmented_images: false,
            marker_directory: PathBuf::from("AugmentedImageDatabase"),
            near: 0.1,
            far: 100.0,
            hit_test_cutoff: DEFAULT_HIT_CUTOFF,
        }
    }
}

impl SessionConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<SessionConfig> {
        let config: SessionConfig = object_from_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ArError::Config(format!(
                "surface size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        let clip_ok = self.near > 0.0 && self.near < self.far;
        if !clip_ok {
            return Err(ArError::Config(format!(
                "clip planes must satisfy 0 < near < far, got near={} far={}",
                self.near, self.far
            )));
        }
        // rejects NaN too
        let cutoff_ok = self.hit_test_cutoff > 0.0;
        if !cutoff_ok {
            return Err(ArError::Config(format!(
                "hit test cutoff must be positive, got {}",
                self.hit_test_cutoff
            )));
        }
        Ok(())
    }

    pub fn display_geometry(&self) -> DisplayGeometry {
        DisplayGeometry {
            rotation: self.rotation,
            width: self.width,
            height: self.height,
        }
    }
}
