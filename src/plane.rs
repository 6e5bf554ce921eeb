use std::collections::{BTreeMap, HashMap};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::packer::{VERTEX_STRIDE, pack_plane_record, polygon_from_interleaved};
use crate::types::{MATRIX_LEN, PlaneId, Pose, identity_pose, pose_from_flat};

/// A plane as reported by the engine in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub id: PlaneId,
    #[serde(default = "identity_pose")]
    pub center_pose: Pose,
    #[serde(default)]
    pub extent_x: f32,
    #[serde(default)]
    pub extent_z: f32,
    /// Boundary in plane-local space, `x` is local X and `y` is local Z.
    ///
    /// Serialized in the engine's flat `[x0, z0, x1, z1, ...]` layout.
    #[serde(
        default,
        serialize_with = "serialize_polygon",
        deserialize_with = "deserialize_polygon"
    )]
    pub polygon: Vec<Vec2>,
    #[serde(default)]
    pub subsumed_by: Option<PlaneId>,
}

impl Plane {
    pub fn new(id: PlaneId, center_pose: Pose, extent_x: f32, extent_z: f32) -> Plane {
        Plane {
            id,
            center_pose,
            extent_x,
            extent_z,
            polygon: Vec::new(),
            subsumed_by: None,
        }
    }

    pub fn with_polygon(mut self, polygon: Vec<Vec2>) -> Plane {
        self.polygon = polygon;
        self
    }

    /// Takes the boundary as the engine hands it over, interleaved (x, z) floats.
    pub fn with_interleaved_polygon(self, data: &[f32]) -> Plane {
        self.with_polygon(polygon_from_interleaved(data))
    }

    pub fn subsumed(mut self, by: PlaneId) -> Plane {
        self.subsumed_by = Some(by);
        self
    }

    pub fn is_subsumed(&self) -> bool {
        self.subsumed_by.is_some()
    }
}

fn serialize_polygon<S: Serializer>(polygon: &[Vec2], serializer: S) -> Result<S::Ok, S::Error> {
    let flat: Vec<f32> = polygon.iter().flat_map(|p| [p.x, p.y]).collect();
    flat.serialize(serializer)
}

fn deserialize_polygon<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec2>, D::Error> {
    let flat = Vec::<f32>::deserialize(deserializer)?;
    if flat.len() % 2 != 0 {
        log::warn!("plane polygon has an odd float count {}, dropping the tail", flat.len());
    }
    Ok(polygon_from_interleaved(&flat))
}

/// Structural effect of one [`PlaneRegistry::update`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaneUpdateSummary {
    pub inserted: usize,
    pub removed: usize,
    pub refreshed: usize,
}

impl PlaneUpdateSummary {
    pub fn changed(&self) -> bool {
        self.inserted + self.removed + self.refreshed > 0
    }
}

/// Live planes keyed by engine identity.
///
/// Ordered by id, so one packing pass always assigns the same positions for
/// the same membership. Positions shift when membership changes.
///
/// Subsumption redirects are kept for the whole session so [`Self::resolve`]
/// can follow any absorbed id; there is one entry per distinct subsumed plane,
/// dropped only if that id is registered again.
#[derive(Debug, Default)]
pub struct PlaneRegistry {
    planes: BTreeMap<PlaneId, Plane>,
    redirects: HashMap<PlaneId, PlaneId>,
    dirty: bool,
}

impl PlaneRegistry {
    pub fn new() -> PlaneRegistry {
        PlaneRegistry::default()
    }

    /// Folds the engine's updated-this-frame planes into the live set.
    pub fn update<I>(&mut self, updated: I) -> PlaneUpdateSummary
    where
        I: IntoIterator<Item = Plane>,
    {
        let mut summary = PlaneUpdateSummary::default();
        for plane in updated {
            if let Some(parent) = plane.subsumed_by {
                // redirect first, then delete; a missing entry is fine
                self.redirects.insert(plane.id, parent);
                if self.planes.remove(&plane.id).is_some() {
                    log::debug!("plane {:?} subsumed by {:?}, removed", plane.id, parent);
                    summary.removed += 1;
                }
            } else if let Some(existing) = self.planes.get_mut(&plane.id) {
                *existing = plane;
                summary.refreshed += 1;
            } else {
                log::debug!("plane {:?} registered", plane.id);
                self.redirects.remove(&plane.id);
                self.planes.insert(plane.id, plane);
                summary.inserted += 1;
            }
        }
        if summary.changed() {
            self.dirty = true;
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn contains(&self, id: PlaneId) -> bool {
        self.planes.contains_key(&id)
    }

    pub fn get(&self, id: PlaneId) -> Option<&Plane> {
        self.planes.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plane> {
        self.planes.values()
    }

    /// Follows subsumption redirects to the live plane that absorbed `id`.
    pub fn resolve(&self, id: PlaneId) -> Option<&Plane> {
        let mut current = id;
        // bounded walk, redirect chains can never be longer than the map
        for _ in 0..=self.redirects.len() {
            if let Some(plane) = self.planes.get(&current) {
                return Some(plane);
            }
            current = *self.redirects.get(&current)?;
        }
        None
    }

    /// Number of retained subsumption redirects.
    pub fn redirect_count(&self) -> usize {
        self.redirects.len()
    }

    /// Packs every live plane as `[center pose, (x, 0, z)...]`.
    pub fn snapshot(&self) -> Vec<Vec<f32>> {
        self.planes
            .values()
            .map(|p| pack_plane_record(&p.center_pose, &p.polygon))
            .collect()
    }

    /// Returns whether the live set changed since the last call, and clears it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

/// Triangle mesh rebuilt from a packed plane record on the renderer side.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneMesh {
    pub pose: Pose,
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl PlaneMesh {
    pub fn from_record(record: &[f32]) -> Option<PlaneMesh> {
        let pose = pose_from_flat(record)?;
        let vertices: Vec<Vec3> = record[MATRIX_LEN..]
            .chunks_exact(VERTEX_STRIDE)
            .map(|v| Vec3::new(v[0], v[1], v[2]))
            .collect();
        let triangle_count = vertices.len().saturating_sub(2);
        let indices = (0..triangle_count as u32)
            .flat_map(|j| [j, j + 1, j + 2])
            .collect();
        Some(PlaneMesh {
            pose,
            vertices,
            indices,
        })
    }

    /// Boundary vertices transformed by the record's center pose.
    pub fn world_vertices(&self) -> Vec<Vec3> {
        self.vertices
            .iter()
            .map(|v| {
                let p = self
                    .pose
                    .transform_point(&nalgebra::Point3::new(v.x, v.y, v.z));
                Vec3::new(p.x, p.y, p.z)
            })
            .collect()
    }
}
