use std::path::{Path, PathBuf};

use glob::glob;
use serde::{Deserialize, Serialize};

use crate::error::{ArError, Result};
use crate::packer::{
    MARKER_HEIGHT, MARKER_INDEX, MARKER_RECORD_LEN, MARKER_TRACKING, MARKER_WIDTH,
    pack_marker_record,
};
use crate::types::{Pose, TrackingMethod, TrackingState, identity_pose, pose_from_flat};

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    if let Ok(p) = rp {
        for ext in &[".png", ".jpg"] {
            if p.as_os_str().to_string_lossy().ends_with(ext) {
                return Some(p);
            }
        }
    }
    None
}

/// Names of the reference images, in image-index order.
///
/// The index of a name is fixed once the database is built and is what the
/// engine reports back for a recognized image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerDatabase {
    names: Vec<String>,
}

impl MarkerDatabase {
    pub fn from_names(names: Vec<String>) -> MarkerDatabase {
        MarkerDatabase { names }
    }

    /// Lists `.png`/`.jpg` files in `dir`, sorted by path.
    ///
    /// Only file names are read, the images themselves are decoded by the engine.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<MarkerDatabase> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ArError::Config(format!(
                "marker directory {} does not exist",
                dir.display()
            )));
        }
        let pattern = format!("{}/*", dir.display());
        let mut paths: Vec<PathBuf> = glob(&pattern)?.filter_map(img_filter).collect();
        paths.sort();
        let names: Vec<String> = paths
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        if names.is_empty() {
            log::warn!("no reference images found in {}", dir.display());
        }
        for (i, name) in names.iter().enumerate() {
            log::debug!("marker {} -> {}", i, name);
        }
        Ok(MarkerDatabase { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One augmented image reported in the engine's updated-this-frame set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    pub index: usize,
    pub tracking_state: TrackingState,
    pub tracking_method: TrackingMethod,
    #[serde(default = "identity_pose")]
    pub center_pose: Pose,
    #[serde(default)]
    pub extent_x: f32,
    #[serde(default)]
    pub extent_z: f32,
}

impl MarkerObservation {
    pub fn is_fully_tracked(&self) -> bool {
        self.tracking_state == TrackingState::Tracking
            && self.tracking_method == TrackingMethod::FullTracking
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerSlot {
    pub pose: Pose,
    pub width: f32,
    pub height: f32,
    pub image_index: usize,
    pub tracking: bool,
}

impl MarkerSlot {
    /// Zero pose and extents, not tracking.
    pub fn empty(image_index: usize) -> MarkerSlot {
        MarkerSlot {
            pose: Pose::zeros(),
            width: 0.0,
            height: 0.0,
            image_index,
            tracking: false,
        }
    }

    pub fn to_record(&self) -> [f32; MARKER_RECORD_LEN] {
        pack_marker_record(
            &self.pose,
            self.width,
            self.height,
            self.image_index,
            self.tracking,
        )
    }
}

/// Dense, fixed-capacity table with one slot per database image.
#[derive(Debug, Clone)]
pub struct MarkerSlotTable {
    slots: Box<[MarkerSlot]>,
}

impl MarkerSlotTable {
    pub fn new(capacity: usize) -> MarkerSlotTable {
        MarkerSlotTable {
            slots: (0..capacity).map(MarkerSlot::empty).collect(),
        }
    }

    pub fn with_database(database: &MarkerDatabase) -> MarkerSlotTable {
        Self::new(database.len())
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&MarkerSlot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[MarkerSlot] {
        &self.slots
    }

    /// Fails on the first out-of-range index without touching any slot.
    pub fn validate(&self, observations: &[MarkerObservation]) -> Result<()> {
        match observations.iter().find(|o| o.index >= self.slots.len()) {
            Some(o) => Err(ArError::IndexOutOfRange {
                index: o.index,
                capacity: self.slots.len(),
            }),
            None => Ok(()),
        }
    }

    /// Overwrites the slot of every reported marker.
    ///
    /// Fully tracked markers get their fresh pose and extents; anything weaker
    /// resets the slot to zero geometry with the tracking flag cleared. Slots of
    /// markers absent from `observations` are left as they were.
    ///
    /// Returns the number of slots now tracking among those written.
    pub fn update(&mut self, observations: &[MarkerObservation]) -> Result<usize> {
        self.validate(observations)?;
        let mut tracked = 0;
        for obs in observations {
            let slot = &mut self.slots[obs.index];
            if obs.is_fully_tracked() {
                *slot = MarkerSlot {
                    pose: obs.center_pose,
                    width: obs.extent_x,
                    height: obs.extent_z,
                    image_index: obs.index,
                    tracking: true,
                };
                tracked += 1;
            } else {
                if slot.tracking {
                    log::debug!("marker {} dropped out of full tracking", obs.index);
                }
                *slot = MarkerSlot::empty(obs.index);
            }
        }
        Ok(tracked)
    }

    pub fn records(&self) -> Vec<[f32; MARKER_RECORD_LEN]> {
        self.slots.iter().map(MarkerSlot::to_record).collect()
    }

    pub fn tracked(&self) -> impl Iterator<Item = &MarkerSlot> {
        self.slots.iter().filter(|s| s.tracking)
    }
}

/// Typed view of a 20-float marker record, with the image name resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedImageRecord {
    pub pose: Pose,
    pub width: f32,
    pub height: f32,
    pub index: usize,
    pub is_tracking: bool,
    pub name: Option<String>,
}

impl AugmentedImageRecord {
    pub fn from_record(
        record: &[f32; MARKER_RECORD_LEN],
        database: Option<&MarkerDatabase>,
    ) -> AugmentedImageRecord {
        let index = record[MARKER_INDEX] as usize;
        AugmentedImageRecord {
            pose: pose_from_flat(record).unwrap_or_else(Pose::zeros),
            width: record[MARKER_WIDTH],
            height: record[MARKER_HEIGHT],
            index,
            is_tracking: record[MARKER_TRACKING] == 1.0,
            name: database.and_then(|db| db.name(index)).map(str::to_string),
        }
    }
}
