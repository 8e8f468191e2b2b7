//! Axis-aligned bounding boxes.
//!
//! `Aabb` is the culling currency of the whole renderer: every object keeps a
//! local-space box and the derived world-space box, the frustum keeps a world
//! box as a cheap disjoint prefilter, and the light grid indexes light volumes
//! by their boxes.

use glam::{Mat4, Vec3, Vec4};

/// World- or local-space axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box: unioning anything into it yields that thing.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    #[inline]
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all `points`. Returns [`Aabb::EMPTY`] for an
    /// empty iterator.
    #[must_use]
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut b = Self::EMPTY;
        for p in points {
            b.min = b.min.min(p);
            b.max = b.max.max(p);
        }
        b
    }

    #[inline]
    #[must_use]
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Longest edge length. Used for the shadow-pass small-object cutoff.
    #[inline]
    #[must_use]
    pub fn longest_side(&self) -> f32 {
        let s = self.size();
        s.x.max(s.y).max(s.z)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn enlarge_to_include_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Overlap test. Boxes that merely touch (shared face, edge or corner)
    /// count as intersecting.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    #[inline]
    #[must_use]
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// The 8 corner points.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let (mn, mx) = (self.min, self.max);
        [
            Vec3::new(mn.x, mn.y, mn.z),
            Vec3::new(mx.x, mn.y, mn.z),
            Vec3::new(mx.x, mx.y, mn.z),
            Vec3::new(mn.x, mx.y, mn.z),
            Vec3::new(mn.x, mn.y, mx.z),
            Vec3::new(mx.x, mn.y, mx.z),
            Vec3::new(mx.x, mx.y, mx.z),
            Vec3::new(mn.x, mx.y, mx.z),
        ]
    }

    /// Box containing this box transformed by `m`.
    ///
    /// Uses the centre/half-extent absolute-matrix form rather than
    /// transforming all 8 corners.
    #[must_use]
    pub fn transformed(&self, m: &Mat4) -> Self {
        let centre = self.centroid();
        let half = self.size() * 0.5;
        let new_centre = m.transform_point3(centre);
        let abs_x = m.x_axis.truncate().abs();
        let abs_y = m.y_axis.truncate().abs();
        let abs_z = m.z_axis.truncate().abs();
        let new_half = abs_x * half.x + abs_y * half.y + abs_z * half.z;
        Self {
            min: new_centre - new_half,
            max: new_centre + new_half,
        }
    }

    /// Signed distance of the box's p-vertex (farthest corner along the plane
    /// normal) from `plane` (`xyz` = normal, `w` = offset, inward-positive).
    ///
    /// A non-negative result means the box is at least tangent to the
    /// half-space; tangency is *not* disjoint.
    #[inline]
    #[must_use]
    pub fn p_vertex_dist(&self, plane: Vec4) -> f32 {
        let p = Vec3::new(
            if plane.x >= 0.0 { self.max.x } else { self.min.x },
            if plane.y >= 0.0 { self.max.y } else { self.min.y },
            if plane.z >= 0.0 { self.max.z } else { self.min.z },
        );
        plane.x * p.x + plane.y * p.y + plane.z * p.z + plane.w
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}
