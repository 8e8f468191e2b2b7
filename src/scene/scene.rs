//! Scenes: object sets, lights, camera and per-scene knobs.
//!
//! A scene holds every admitted object plus the index sets the passes draw
//! from. An object lives in exactly one of the two primary sets (`objects`
//! or `always_visible_objects`) and in zero or more secondary sets
//! (`transparent`, `alpha_blended`, `decal`, `water`, `materialise`,
//! `animated`). Set membership is derived from object and material flags by
//! [`Scene::insert_into_sets`] and reversed exactly by
//! [`Scene::remove_from_sets`].
//!
//! Several scenes may coexist; the engine marks exactly one as current.

use glam::{Vec3, Vec4};
use rustc_hash::FxHashSet;
use slotmap::SlotMap;

use crate::resources::material::MaterialFlags;
use crate::scene::camera::Camera;
use crate::scene::light::LightGrid;
use crate::scene::object::{Object, ObjectFlags, ObjectKey};
use crate::scene::overlay::{OverlayObject, OverlayKey};

/// Per-scene rendering knobs.
#[derive(Debug, Clone)]
pub struct SceneParams {
    /// Unit vector pointing toward the sun.
    pub sun_dir: Vec3,
    pub background_colour: Vec4,
    pub water_level_z: f32,
    pub wind_strength: f32,
    pub bloom_strength: f32,
    pub dof_blur_strength: f32,
    pub dof_focus_distance: f32,
    pub exposure: f32,
    pub saturation: f32,
    /// Furthest distance a caster can shadow from, used by the shadow and
    /// animation culling volumes.
    pub max_shadowing_dist: f32,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            sun_dir: Vec3::new(0.3, 0.2, 0.93).normalize(),
            background_colour: Vec4::new(0.1, 0.1, 0.1, 1.0),
            water_level_z: 0.0,
            wind_strength: 0.0,
            bloom_strength: 0.0,
            dof_blur_strength: 0.0,
            dof_focus_distance: 10.0,
            exposure: 1.0,
            saturation: 1.0,
            max_shadowing_dist: 250.0,
        }
    }
}

pub struct Scene {
    pub objects: SlotMap<ObjectKey, Object>,

    /// Primary set: frustum-culled, depth-tested objects.
    pub object_set: FxHashSet<ObjectKey>,
    /// Primary set: objects drawn by the always-visible pass instead.
    pub always_visible_objects: FxHashSet<ObjectKey>,

    // Secondary index sets.
    pub transparent_objects: FxHashSet<ObjectKey>,
    pub alpha_blended_objects: FxHashSet<ObjectKey>,
    pub decal_objects: FxHashSet<ObjectKey>,
    pub water_objects: FxHashSet<ObjectKey>,
    pub materialise_objects: FxHashSet<ObjectKey>,
    pub animated_objects: FxHashSet<ObjectKey>,

    /// Current selection, drawn by the outline pass.
    pub selected_objects: Vec<ObjectKey>,

    pub overlay_objects: SlotMap<OverlayKey, OverlayObject>,

    pub lights: LightGrid,
    pub camera: Camera,
    pub params: SceneParams,
}

impl Scene {
    #[must_use]
    pub fn new(reverse_z: bool) -> Self {
        Self {
            objects: SlotMap::with_key(),
            object_set: FxHashSet::default(),
            always_visible_objects: FxHashSet::default(),
            transparent_objects: FxHashSet::default(),
            alpha_blended_objects: FxHashSet::default(),
            decal_objects: FxHashSet::default(),
            water_objects: FxHashSet::default(),
            materialise_objects: FxHashSet::default(),
            animated_objects: FxHashSet::default(),
            selected_objects: Vec::new(),
            overlay_objects: SlotMap::with_key(),
            lights: LightGrid::new(),
            camera: Camera::new(reverse_z),
            params: SceneParams::default(),
        }
    }

    /// Files `key` into the primary and secondary sets its flags call for.
    /// The object must already be stored in `objects`.
    pub fn insert_into_sets(&mut self, key: ObjectKey) {
        let Some(ob) = self.objects.get(key) else {
            return;
        };

        if ob.flags.contains(ObjectFlags::ALWAYS_VISIBLE) {
            self.always_visible_objects.insert(key);
        } else {
            self.object_set.insert(key);
        }

        let mut any = MaterialFlags::empty();
        for m in &ob.materials {
            any |= m.flags;
        }
        if any.contains(MaterialFlags::TRANSPARENT) {
            self.transparent_objects.insert(key);
        }
        if any.contains(MaterialFlags::ALPHA_BLEND)
            || any.contains(MaterialFlags::PARTICIPATING_MEDIA)
        {
            self.alpha_blended_objects.insert(key);
        }
        if any.contains(MaterialFlags::DECAL) {
            self.decal_objects.insert(key);
        }
        if any.contains(MaterialFlags::WATER) {
            self.water_objects.insert(key);
        }
        if any.contains(MaterialFlags::MATERIALISE_EFFECT) {
            self.materialise_objects.insert(key);
        }
        if ob.is_animated() {
            self.animated_objects.insert(key);
        }
    }

    /// Removes `key` from every set; the exact inverse of
    /// [`insert_into_sets`](Self::insert_into_sets).
    pub fn remove_from_sets(&mut self, key: ObjectKey) {
        self.object_set.remove(&key);
        self.always_visible_objects.remove(&key);
        self.transparent_objects.remove(&key);
        self.alpha_blended_objects.remove(&key);
        self.decal_objects.remove(&key);
        self.water_objects.remove(&key);
        self.materialise_objects.remove(&key);
        self.animated_objects.remove(&key);
        self.selected_objects.retain(|k| *k != key);
    }

    /// Checks the exactly-one-primary-set invariant for `key`.
    #[must_use]
    pub fn primary_set_membership_ok(&self, key: ObjectKey) -> bool {
        usize::from(self.object_set.contains(&key))
            + usize::from(self.always_visible_objects.contains(&key))
            == 1
    }

    #[must_use]
    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }
}
