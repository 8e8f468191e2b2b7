//! Cone lights and the spatial light grid.
//!
//! Lights are directional cones. Each light is indexed in a uniform spatial
//! hash grid keyed by world-space cell so that "which lights touch this
//! AABB" is answered in time proportional to the cells touched. Objects keep
//! a fixed-size array of light-table indices assigned closest-first from the
//! grid query.

use glam::Vec3;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::scene::bounds::Aabb;

/// Number of light-table indices stored per object; unused slots hold −1.
pub const MAX_NUM_LIGHT_INDICES: usize = 8;

/// Grid cell side length in world units.
pub const LIGHT_GRID_CELL_W: f32 = 64.0;

/// Cap on the cell span walked per axis for one AABB query, so a
/// pathologically large box cannot scan the whole grid.
const MAX_CELL_SPAN: i32 = 16;

new_key_type! {
    /// Stable handle to a light in the grid.
    pub struct LightKey;
}

// ============================================================================
// Light
// ============================================================================

/// A directional cone light.
#[derive(Debug, Clone)]
pub struct Light {
    pub pos: Vec3,
    /// Unit direction of the cone axis.
    pub dir: Vec3,
    /// Cosine of the cone half-angle at which falloff starts; smaller values
    /// widen the cone.
    pub cone_cos_angle: f32,
    /// Maximum illumination distance along the axis.
    pub max_dist: f32,
    /// Linear RGB intensity.
    pub colour: Vec3,
    /// Row index this light owns in the GPU light table; assigned on
    /// insertion into the renderer.
    pub buffer_index: i32,
}

impl Light {
    #[must_use]
    pub fn new(pos: Vec3, dir: Vec3, cone_cos_angle: f32, max_dist: f32, colour: Vec3) -> Self {
        Self {
            pos,
            dir: dir.normalize_or_zero(),
            cone_cos_angle,
            max_dist,
            colour,
            buffer_index: -1,
        }
    }

    /// AABB of the illumination volume: the cone tip plus the base disc at
    /// `max_dist` along the axis.
    #[must_use]
    pub fn volume_aabb(&self) -> Aabb {
        let cos = self.cone_cos_angle.clamp(0.05, 0.999_9);
        let sin = (1.0 - cos * cos).sqrt();
        let disc_radius = self.max_dist * (sin / cos);
        let disc_centre = self.pos + self.dir * self.max_dist;

        // Per-axis extent of a disc with normal `dir`:
        // r * sqrt(1 - dir[axis]^2).
        let d2 = self.dir * self.dir;
        let extent = Vec3::new(
            (1.0 - d2.x).max(0.0).sqrt(),
            (1.0 - d2.y).max(0.0).sqrt(),
            (1.0 - d2.z).max(0.0).sqrt(),
        ) * disc_radius;

        let mut b = Aabb::from_points([self.pos]);
        b.enlarge_to_include_point(disc_centre - extent);
        b.enlarge_to_include_point(disc_centre + extent);
        b
    }
}

// ============================================================================
// LightGrid
// ============================================================================

type Cell = (i32, i32, i32);

struct LightRecord {
    light: Light,
    aabb: Aabb,
    cells: SmallVec<[Cell; 8]>,
}

/// Uniform spatial hash grid over light volumes.
///
/// Cells are `LIGHT_GRID_CELL_W` on a side; bucket management is left to the
/// hash map rather than a fixed-size bucket table, so heavily clustered
/// lights degrade gracefully instead of colliding.
pub struct LightGrid {
    lights: SlotMap<LightKey, LightRecord>,
    cells: FxHashMap<Cell, SmallVec<[LightKey; 4]>>,
}

impl Default for LightGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl LightGrid {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lights: SlotMap::with_key(),
            cells: FxHashMap::default(),
        }
    }

    #[inline]
    fn cell_for(p: Vec3) -> Cell {
        (
            (p.x / LIGHT_GRID_CELL_W).floor() as i32,
            (p.y / LIGHT_GRID_CELL_W).floor() as i32,
            (p.z / LIGHT_GRID_CELL_W).floor() as i32,
        )
    }

    /// Cell range covering `aabb`, span-capped per axis.
    fn cell_range(aabb: &Aabb) -> (Cell, Cell) {
        let lo = Self::cell_for(aabb.min);
        let hi_raw = Self::cell_for(aabb.max);
        let hi = (
            hi_raw.0.min(lo.0 + MAX_CELL_SPAN),
            hi_raw.1.min(lo.1 + MAX_CELL_SPAN),
            hi_raw.2.min(lo.2 + MAX_CELL_SPAN),
        );
        (lo, hi)
    }

    pub fn insert(&mut self, light: Light) -> LightKey {
        let aabb = light.volume_aabb();
        let key = self.lights.insert(LightRecord {
            light,
            aabb,
            cells: SmallVec::new(),
        });
        self.index_light(key);
        key
    }

    pub fn remove(&mut self, key: LightKey) -> Option<Light> {
        let rec = self.lights.remove(key)?;
        for cell in &rec.cells {
            if let Some(bucket) = self.cells.get_mut(cell) {
                bucket.retain(|k| *k != key);
                if bucket.is_empty() {
                    self.cells.remove(cell);
                }
            }
        }
        Some(rec.light)
    }

    /// Moves or reshapes a light, reindexing its bounding volume.
    pub fn update(&mut self, key: LightKey, light: Light) {
        let Some(rec) = self.lights.get_mut(key) else {
            return;
        };
        let cells = std::mem::take(&mut rec.cells);
        rec.light = light;
        rec.aabb = rec.light.volume_aabb();
        for cell in &cells {
            if let Some(bucket) = self.cells.get_mut(cell) {
                bucket.retain(|k| *k != key);
                if bucket.is_empty() {
                    self.cells.remove(cell);
                }
            }
        }
        self.index_light(key);
    }

    fn index_light(&mut self, key: LightKey) {
        let aabb = self.lights[key].aabb;
        let (lo, hi) = Self::cell_range(&aabb);
        let mut cells = SmallVec::new();
        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for z in lo.2..=hi.2 {
                    let cell = (x, y, z);
                    self.cells.entry(cell).or_default().push(key);
                    cells.push(cell);
                }
            }
        }
        self.lights[key].cells = cells;
    }

    #[must_use]
    pub fn get(&self, key: LightKey) -> Option<&Light> {
        self.lights.get(key).map(|r| &r.light)
    }

    pub fn get_mut(&mut self, key: LightKey) -> Option<&mut Light> {
        self.lights.get_mut(key).map(|r| &mut r.light)
    }

    #[must_use]
    pub fn light_aabb(&self, key: LightKey) -> Option<Aabb> {
        self.lights.get(key).map(|r| r.aabb)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LightKey, &Light)> {
        self.lights.iter().map(|(k, r)| (k, &r.light))
    }

    /// Lights whose volume AABB touches `aabb`, sorted closest-first by
    /// squared distance of the light position to the box centroid,
    /// deduplicated across cells.
    #[must_use]
    pub fn query_aabb(&self, aabb: &Aabb) -> SmallVec<[LightKey; MAX_NUM_LIGHT_INDICES]> {
        let centroid = aabb.centroid();
        let (lo, hi) = Self::cell_range(aabb);

        let mut found: SmallVec<[(f32, LightKey); 16]> = SmallVec::new();
        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for z in lo.2..=hi.2 {
                    let Some(bucket) = self.cells.get(&(x, y, z)) else {
                        continue;
                    };
                    for &key in bucket {
                        let rec = &self.lights[key];
                        if !rec.aabb.intersects(aabb) {
                            continue;
                        }
                        let d2 = rec.light.pos.distance_squared(centroid);
                        if !found.iter().any(|(_, k)| *k == key) {
                            found.push((d2, key));
                        }
                    }
                }
            }
        }

        found.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
        found
            .into_iter()
            .take(MAX_NUM_LIGHT_INDICES)
            .map(|(_, k)| k)
            .collect()
    }

    /// Fills an object's light-index array from a grid query: closest-first
    /// light-table row indices, remaining slots set to −1.
    #[must_use]
    pub fn assign_light_indices(&self, aabb: &Aabb) -> [i32; MAX_NUM_LIGHT_INDICES] {
        let mut out = [-1i32; MAX_NUM_LIGHT_INDICES];
        for (slot, key) in self.query_aabb(aabb).into_iter().enumerate() {
            out[slot] = self.lights[key].light.buffer_index;
        }
        out
    }
}
