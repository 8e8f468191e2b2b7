//! Camera, projection modes and culling volumes.
//!
//! The camera supports four projection modes: perspective with an infinite
//! far plane, orthographic, diagonal-orthographic (an orthographic volume
//! sheared along the view axis, used for imposter capture), and identity.
//! All projection matrices target the `[0, 1]` clip-space depth range; when
//! reverse-Z is active the mapping is far→0 / near→1 and the main passes
//! compare with `Greater`.
//!
//! Every camera setter recomputes `world_to_camera`, `cam_to_world`, the
//! world-space clip planes, and the frustum AABB used as a cheap disjoint
//! prefilter. Perspective mode supplies 5 planes (the geometric near plane is
//! skipped because the near distance is tiny); the orthographic modes supply
//! all 6.
//!
//! The shadow/animation volume is the view frustum extruded along the sun
//! direction by the maximum shadowing distance, closed by silhouette-edge
//! planes.

use glam::{Mat4, Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use crate::scene::bounds::Aabb;

/// Maximum number of planes a [`CullVolume`] can carry: 6 faces plus up to
/// 6 silhouette-edge planes from the sun extrusion.
const MAX_CULL_PLANES: usize = 12;

// ============================================================================
// Projection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    /// Infinite-far perspective from the sensor model.
    Perspective,
    /// Orthographic; sensor dimensions are world-space extents.
    Orthographic,
    /// Orthographic sheared along the view axis by `diagonal_slope`
    /// world units of XY drift per unit depth.
    DiagonalOrthographic,
    /// Pass-through clip space; used by fullscreen and overlay drawing.
    Identity,
}

/// Lens/sensor parameters shared by all projection modes.
///
/// `use_sensor_width`/`use_sensor_height` are the sensor extents actually in
/// use (after aspect fitting); `lens_sensor_dist` is the focal distance and
/// `lens_shift_x/y` shift the sensor for off-centre projections.
#[derive(Debug, Clone, Copy)]
pub struct SensorParams {
    pub use_sensor_width: f32,
    pub use_sensor_height: f32,
    pub lens_sensor_dist: f32,
    pub lens_shift_x: f32,
    pub lens_shift_y: f32,
}

impl Default for SensorParams {
    fn default() -> Self {
        Self {
            use_sensor_width: 0.035,
            use_sensor_height: 0.035 * 9.0 / 16.0,
            lens_sensor_dist: 0.025,
            lens_shift_x: 0.0,
            lens_shift_y: 0.0,
        }
    }
}

// ============================================================================
// Camera
// ============================================================================

#[derive(Debug, Clone)]
pub struct Camera {
    pub mode: ProjectionMode,
    pub sensor: SensorParams,
    /// Near clip distance. Very small for perspective, hence no near culling
    /// plane in that mode.
    pub near: f32,
    /// Far distance used for culling and the frustum AABB. The perspective
    /// projection matrix itself has an infinite far plane.
    pub max_draw_dist: f32,
    /// XY drift per unit depth for [`ProjectionMode::DiagonalOrthographic`].
    pub diagonal_slope: Vec2,

    reverse_z: bool,

    world_to_camera: Mat4,
    cam_to_world: Mat4,
    proj: Mat4,
    frustum: Frustum,
}

impl Camera {
    #[must_use]
    pub fn new(reverse_z: bool) -> Self {
        let mut cam = Self {
            mode: ProjectionMode::Perspective,
            sensor: SensorParams::default(),
            near: 0.03,
            max_draw_dist: 1000.0,
            diagonal_slope: Vec2::new(1.0, 1.0),
            reverse_z,
            world_to_camera: Mat4::IDENTITY,
            cam_to_world: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            frustum: Frustum::default(),
        };
        cam.recompute();
        cam
    }

    /// Sets the world transform of the camera (camera-to-world) and
    /// recomputes all derived state.
    pub fn set_transform(&mut self, cam_to_world: Mat4) {
        self.cam_to_world = cam_to_world;
        self.world_to_camera = cam_to_world.inverse();
        self.recompute();
    }

    pub fn set_projection(&mut self, mode: ProjectionMode, sensor: SensorParams) {
        self.mode = mode;
        self.sensor = sensor;
        self.recompute();
    }

    pub fn set_near_and_far(&mut self, near: f32, max_draw_dist: f32) {
        self.near = near;
        self.max_draw_dist = max_draw_dist;
        self.recompute();
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.cam_to_world.w_axis.truncate()
    }

    /// World-space forward direction (camera looks down −Z).
    #[inline]
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        -self.cam_to_world.z_axis.truncate().normalize_or_zero()
    }

    #[inline]
    #[must_use]
    pub fn world_to_camera(&self) -> Mat4 {
        self.world_to_camera
    }

    #[inline]
    #[must_use]
    pub fn cam_to_world(&self) -> Mat4 {
        self.cam_to_world
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.proj
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.proj * self.world_to_camera
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    #[inline]
    #[must_use]
    pub fn reverse_z(&self) -> bool {
        self.reverse_z
    }

    /// Depth comparison for the main passes under the active convention.
    #[inline]
    #[must_use]
    pub fn depth_compare(&self) -> wgpu::CompareFunction {
        if self.reverse_z {
            wgpu::CompareFunction::Greater
        } else {
            wgpu::CompareFunction::Less
        }
    }

    // ------------------------------------------------------------------------
    // Projection construction
    // ------------------------------------------------------------------------

    fn build_projection(&self) -> Mat4 {
        let s = &self.sensor;
        let hw = s.use_sensor_width * 0.5;
        let hh = s.use_sensor_height * 0.5;

        match self.mode {
            ProjectionMode::Perspective => {
                // Off-centre frustum bounds at the near plane.
                let scale = self.near / s.lens_sensor_dist;
                let l = (-hw + s.lens_shift_x) * scale;
                let r = (hw + s.lens_shift_x) * scale;
                let b = (-hh + s.lens_shift_y) * scale;
                let t = (hh + s.lens_shift_y) * scale;
                let n = self.near;

                // RH, depth 0..1, infinite far. The reverse-Z variant maps
                // near→1 / far→0; the default maps near→0 / far→1.
                let x = 2.0 * n / (r - l);
                let y = 2.0 * n / (t - b);
                let a = (r + l) / (r - l);
                let bb = (t + b) / (t - b);
                if self.reverse_z {
                    Mat4::from_cols(
                        Vec4::new(x, 0.0, 0.0, 0.0),
                        Vec4::new(0.0, y, 0.0, 0.0),
                        Vec4::new(a, bb, 0.0, -1.0),
                        Vec4::new(0.0, 0.0, n, 0.0),
                    )
                } else {
                    Mat4::from_cols(
                        Vec4::new(x, 0.0, 0.0, 0.0),
                        Vec4::new(0.0, y, 0.0, 0.0),
                        Vec4::new(a, bb, -1.0, -1.0),
                        Vec4::new(0.0, 0.0, -n, 0.0),
                    )
                }
            }
            ProjectionMode::Orthographic | ProjectionMode::DiagonalOrthographic => {
                let l = -hw + s.lens_shift_x;
                let r = hw + s.lens_shift_x;
                let b = -hh + s.lens_shift_y;
                let t = hh + s.lens_shift_y;
                // Reverse-Z orthographic: swap near and far.
                let ortho = if self.reverse_z {
                    Mat4::orthographic_rh(l, r, b, t, self.max_draw_dist, self.near)
                } else {
                    Mat4::orthographic_rh(l, r, b, t, self.near, self.max_draw_dist)
                };
                if self.mode == ProjectionMode::DiagonalOrthographic {
                    // Shear camera space so view rays run diagonally: a point
                    // at depth d (z = -d) drifts by `diagonal_slope * d` in XY
                    // before the orthographic mapping. The clip planes below
                    // are extracted from the composed matrix, so the sheared
                    // volume is culled exactly rather than via a widened
                    // sensor estimate.
                    let mut shear = Mat4::IDENTITY;
                    shear.z_axis.x = self.diagonal_slope.x;
                    shear.z_axis.y = self.diagonal_slope.y;
                    ortho * shear
                } else {
                    ortho
                }
            }
            ProjectionMode::Identity => Mat4::IDENTITY,
        }
    }

    fn recompute(&mut self) {
        self.proj = self.build_projection();
        let vp = self.proj * self.world_to_camera;
        let use_near_plane = !matches!(self.mode, ProjectionMode::Perspective);
        let corners = self.world_corners();
        self.frustum = Frustum::from_view_projection(
            vp,
            use_near_plane,
            self.explicit_far_plane(),
            Aabb::from_points(corners),
        );
    }

    /// For the infinite-far perspective matrix the far clip plane degenerates,
    /// so culling uses an explicit plane at `max_draw_dist`.
    fn explicit_far_plane(&self) -> Option<Vec4> {
        if self.mode != ProjectionMode::Perspective {
            return None;
        }
        let fwd = self.forward();
        let p = self.position() + fwd * self.max_draw_dist;
        Some(Vec4::new(-fwd.x, -fwd.y, -fwd.z, fwd.dot(p)))
    }

    /// The 8 world-space frustum corners (near face first), with the far face
    /// taken at `max_draw_dist`.
    #[must_use]
    pub fn world_corners(&self) -> [Vec3; 8] {
        self.world_corners_for_slice(self.near, self.max_draw_dist)
    }

    /// Corners of the view sub-volume between `slice_near` and `slice_far`.
    /// Used by the cascaded shadow renderer.
    #[must_use]
    pub fn world_corners_for_slice(&self, slice_near: f32, slice_far: f32) -> [Vec3; 8] {
        let s = &self.sensor;
        let hw = s.use_sensor_width * 0.5;
        let hh = s.use_sensor_height * 0.5;

        let face = |d: f32| -> [Vec3; 4] {
            let (l, r, b, t) = match self.mode {
                ProjectionMode::Perspective => {
                    let k = d / s.lens_sensor_dist;
                    (
                        (-hw + s.lens_shift_x) * k,
                        (hw + s.lens_shift_x) * k,
                        (-hh + s.lens_shift_y) * k,
                        (hh + s.lens_shift_y) * k,
                    )
                }
                ProjectionMode::Orthographic | ProjectionMode::Identity => (
                    -hw + s.lens_shift_x,
                    hw + s.lens_shift_x,
                    -hh + s.lens_shift_y,
                    hh + s.lens_shift_y,
                ),
                ProjectionMode::DiagonalOrthographic => {
                    // x' = x + slope.x * z with z = -d, so the visible slab
                    // at depth d is the sensor rect shifted by +slope*d.
                    let drift = self.diagonal_slope * d;
                    (
                        -hw + s.lens_shift_x + drift.x,
                        hw + s.lens_shift_x + drift.x,
                        -hh + s.lens_shift_y + drift.y,
                        hh + s.lens_shift_y + drift.y,
                    )
                }
            };
            [
                Vec3::new(l, b, -d),
                Vec3::new(r, b, -d),
                Vec3::new(r, t, -d),
                Vec3::new(l, t, -d),
            ]
        };

        let near_face = face(slice_near);
        let far_face = face(slice_far);
        let mut out = [Vec3::ZERO; 8];
        for i in 0..4 {
            out[i] = self.cam_to_world.transform_point3(near_face[i]);
            out[i + 4] = self.cam_to_world.transform_point3(far_face[i]);
        }
        out
    }

    /// Culling volume for shadow casting and animation gating: the view
    /// frustum (sliced at `slice_far`) extruded toward the sun.
    #[must_use]
    pub fn shadow_volume(
        &self,
        sun_dir: Vec3,
        max_shadowing_dist: f32,
        slice_far: f32,
    ) -> CullVolume {
        let corners = self.world_corners_for_slice(self.near, slice_far.min(self.max_draw_dist));
        CullVolume::from_extruded_frustum(&corners, sun_dir * max_shadowing_dist)
    }
}

// ============================================================================
// Frustum
// ============================================================================

/// World-space clip planes plus an AABB prefilter.
///
/// Planes store inward-pointing unit normals in `xyz` and the offset in `w`;
/// a point `p` is inside the half-space when `dot(n, p) + w >= 0`.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
    num_planes: usize,
    aabb: Aabb,
}

impl Default for Frustum {
    fn default() -> Self {
        Self {
            planes: [Vec4::ZERO; 6],
            num_planes: 0,
            aabb: Aabb::new(Vec3::splat(f32::MIN), Vec3::splat(f32::MAX)),
        }
    }
}

impl Frustum {
    /// Extracts world-space planes from a view-projection matrix
    /// (Gribb-Hartmann). Works for every projection mode including the
    /// sheared diagonal-orthographic volume, because the planes come from the
    /// actual clip volume of the composed matrix.
    #[must_use]
    pub fn from_view_projection(
        vp: Mat4,
        use_near_plane: bool,
        explicit_far: Option<Vec4>,
        aabb: Aabb,
    ) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [Vec4::ZERO; 6];
        let mut n = 0;
        let mut push = |p: Vec4| {
            let len = p.truncate().length();
            if len > 1e-8 && n < 6 {
                planes[n] = p / len;
                n += 1;
            }
        };

        push(rows[3] + rows[0]); // left
        push(rows[3] - rows[0]); // right
        push(rows[3] + rows[1]); // bottom
        push(rows[3] - rows[1]); // top

        // Depth 0..1 clip volume: z_clip >= 0 and z_clip <= w. Under
        // reverse-Z the two swap geometric roles; both are pushed (degenerate
        // rows are skipped by `push`), with the geometric near plane dropped
        // for perspective via `use_near_plane`.
        if use_near_plane {
            push(rows[2]);
            push(rows[3] - rows[2]);
        } else if let Some(far) = explicit_far {
            push(far);
        }

        Self {
            planes,
            num_planes: n,
            aabb,
        }
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> &[Vec4] {
        &self.planes[..self.num_planes]
    }

    #[inline]
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// AABB-vs-frustum test. The frustum AABB acts as a fast disjoint
    /// prefilter; a box exactly tangent to a plane counts as intersecting.
    #[must_use]
    pub fn intersects_aabb(&self, b: &Aabb) -> bool {
        if !self.aabb.intersects(b) {
            return false;
        }
        for plane in self.planes() {
            if b.p_vertex_dist(*plane) < 0.0 {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// CullVolume — extruded shadow/animation volume
// ============================================================================

/// Convex culling volume with a variable plane count.
///
/// Built by sweeping the view frustum along the sun vector: frustum faces the
/// sweep enters through are kept, faces it exits through are translated to
/// the swept position, and each silhouette edge (shared by one entering and
/// one exiting face) contributes a closing plane containing the sweep
/// direction.
#[derive(Debug, Clone)]
pub struct CullVolume {
    pub planes: SmallVec<[Vec4; MAX_CULL_PLANES]>,
    pub aabb: Aabb,
}

/// Frustum faces as corner quads; corners are `world_corners` order
/// (near 0-3, far 4-7).
const FACE_CORNERS: [[usize; 4]; 6] = [
    [0, 1, 2, 3], // near
    [4, 5, 6, 7], // far
    [0, 3, 7, 4], // left
    [1, 2, 6, 5], // right
    [0, 1, 5, 4], // bottom
    [3, 2, 6, 7], // top
];

/// Frustum edges: corner pair plus the two adjacent faces.
const EDGES: [(usize, usize, usize, usize); 12] = [
    (0, 1, 0, 4),
    (1, 2, 0, 3),
    (2, 3, 0, 5),
    (3, 0, 0, 2),
    (4, 5, 1, 4),
    (5, 6, 1, 3),
    (6, 7, 1, 5),
    (7, 4, 1, 2),
    (0, 4, 2, 4),
    (1, 5, 3, 4),
    (2, 6, 3, 5),
    (3, 7, 2, 5),
];

impl CullVolume {
    /// Builds the volume `hull(corners ∪ corners + sweep)`.
    #[must_use]
    pub fn from_extruded_frustum(corners: &[Vec3; 8], sweep: Vec3) -> Self {
        let centroid = corners.iter().copied().sum::<Vec3>() / 8.0;

        // Inward-oriented face planes.
        let mut face_planes = [Vec4::ZERO; 6];
        let mut face_dot = [0.0f32; 6];
        for (i, quad) in FACE_CORNERS.iter().enumerate() {
            let a = corners[quad[0]];
            let b = corners[quad[1]];
            let c = corners[quad[2]];
            let mut n = (b - a).cross(c - a).normalize_or_zero();
            if n.dot(centroid - a) < 0.0 {
                n = -n;
            }
            face_planes[i] = Vec4::new(n.x, n.y, n.z, -n.dot(a));
            face_dot[i] = n.dot(sweep);
        }

        let mut planes: SmallVec<[Vec4; MAX_CULL_PLANES]> = SmallVec::new();
        for i in 0..6 {
            let p = face_planes[i];
            if p.truncate().length_squared() < 1e-12 {
                continue;
            }
            if face_dot[i] >= 0.0 {
                // The sweep moves into this half-space: the face survives.
                planes.push(p);
            } else {
                // The sweep exits through this face: slide it out to the
                // swept position so extruded casters stay inside.
                planes.push(Vec4::new(p.x, p.y, p.z, p.w - face_dot[i]));
            }
        }

        // Silhouette edges: adjacent faces with opposite sweep-facing sign.
        for &(c0, c1, f0, f1) in &EDGES {
            if (face_dot[f0] >= 0.0) == (face_dot[f1] >= 0.0) {
                continue;
            }
            let a = corners[c0];
            let b = corners[c1];
            let mut n = (b - a).cross(sweep).normalize_or_zero();
            if n.length_squared() < 1e-12 {
                continue;
            }
            if n.dot(centroid - a) < 0.0 {
                n = -n;
            }
            planes.push(Vec4::new(n.x, n.y, n.z, -n.dot(a)));
        }

        let mut aabb = Aabb::from_points(corners.iter().copied());
        aabb = aabb.union(&Aabb::from_points(corners.iter().map(|c| *c + sweep)));

        Self { planes, aabb }
    }

    /// Tangent-inclusive AABB test, with the volume AABB as prefilter.
    #[must_use]
    pub fn intersects_aabb(&self, b: &Aabb) -> bool {
        if !self.aabb.intersects(b) {
            return false;
        }
        for plane in &self.planes {
            if b.p_vertex_dist(*plane) < 0.0 {
                return false;
            }
        }
        true
    }
}
