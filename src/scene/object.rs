//! Renderable world objects.
//!
//! An object ties a mesh to an ordered list of material slots, a world
//! transform, and the GPU slots it owns once admitted: its per-object table
//! row, its per-slot material rows, and (for skinned objects) a contiguous
//! joint-matrix block. Its denormalised draw records are rebuilt by the
//! renderer whenever a transform, material flag or texture change requires
//! it.

use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};
use slotmap::new_key_type;

use crate::animation::AnimationState;
use crate::renderer::draw::BatchRecord;
use crate::resources::material::Material;
use crate::resources::mesh::MeshHandle;
use crate::scene::bounds::Aabb;
use crate::scene::light::MAX_NUM_LIGHT_INDICES;

new_key_type! {
    /// Stable handle to an object within a scene.
    pub struct ObjectKey;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ObjectFlags: u32 {
        /// Drawn via the always-visible pass: depth-test-off ghost first,
        /// then a depth-tested draw.
        const ALWAYS_VISIBLE = 1 << 0;
        /// Included in mask-target renders.
        const DRAW_TO_MASK   = 1 << 1;
        const IS_IMPOSTER    = 1 << 2;
    }
}

/// Adjugate-transpose of the upper-left 3×3 of `m`, widened back to 4×4.
///
/// This is the normal matrix without the division by the determinant; the
/// shader renormalises, and the determinant's sign is tracked separately for
/// face-culling flips.
#[must_use]
pub fn adjugate_transpose_3x3(m: &Mat4) -> Mat4 {
    let c0 = m.x_axis.truncate();
    let c1 = m.y_axis.truncate();
    let c2 = m.z_axis.truncate();
    let r0 = c1.cross(c2);
    let r1 = c2.cross(c0);
    let r2 = c0.cross(c1);
    Mat4::from_cols(
        Vec4::new(r0.x, r0.y, r0.z, 0.0),
        Vec4::new(r1.x, r1.y, r1.z, 0.0),
        Vec4::new(r2.x, r2.y, r2.z, 0.0),
        Vec4::W,
    )
}

#[must_use]
pub fn upper_left_det(m: &Mat4) -> f32 {
    m.x_axis
        .truncate()
        .cross(m.y_axis.truncate())
        .dot(m.z_axis.truncate())
}

pub struct Object {
    pub ob_to_world: Mat4,
    /// Adjugate-transpose of `ob_to_world` (normal matrix, unnormalised).
    pub normal_matrix: Mat4,
    /// Sign of the upper-left determinant; negative transforms flip face
    /// culling.
    pub det_sign: f32,

    pub aabb_os: Aabb,
    pub aabb_ws: Aabb,

    pub mesh: MeshHandle,
    /// One material per mesh batch slot.
    pub materials: Vec<Material>,

    /// Object-space instance transforms for GPU instancing;
    /// `num_instances == 0` means not instanced. Populated through
    /// [`Object::set_instance_matrices`]; admission uploads the block into
    /// the instance-transform region.
    pub instance_matrices: Option<Vec<Mat4>>,
    pub num_instances: u32,

    pub flags: ObjectFlags,
    /// Pool-assigned value; low bits pick the static-shadow rebuild subset.
    pub random_num: u32,

    pub uv0_scale: f32,
    pub uv1_scale: f32,
    pub depth_draw_depth_bias: f32,

    // --- GPU slots owned once admitted ---
    pub per_ob_vert_index: Option<u32>,
    pub joint_matrices_base_index: Option<u32>,
    pub joint_count: u32,
    /// First matrix of this object's block in the instance-transform
    /// region, when instanced.
    pub instance_transforms_base_index: Option<u32>,

    pub light_indices: [i32; MAX_NUM_LIGHT_INDICES],

    // --- Denormalised draw data ---
    pub mesh_buffer_key: u16,
    pub batch_records: Vec<BatchRecord>,
    pub depth_draw_batches: Vec<BatchRecord>,

    pub anim: Option<Box<AnimationState>>,
}

impl Object {
    #[must_use]
    pub fn new(mesh: MeshHandle, materials: Vec<Material>, ob_to_world: Mat4) -> Self {
        Self {
            ob_to_world,
            normal_matrix: adjugate_transpose_3x3(&ob_to_world),
            det_sign: upper_left_det(&ob_to_world).signum(),
            aabb_os: Aabb::EMPTY,
            aabb_ws: Aabb::EMPTY,
            mesh,
            materials,
            instance_matrices: None,
            num_instances: 0,
            flags: ObjectFlags::empty(),
            random_num: 0,
            uv0_scale: 1.0,
            uv1_scale: 1.0,
            depth_draw_depth_bias: 0.0,
            per_ob_vert_index: None,
            joint_matrices_base_index: None,
            joint_count: 0,
            instance_transforms_base_index: None,
            light_indices: [-1; MAX_NUM_LIGHT_INDICES],
            mesh_buffer_key: 0,
            batch_records: Vec::new(),
            depth_draw_batches: Vec::new(),
            anim: None,
        }
    }

    /// Updates the transform and every matrix derived from it. The world
    /// AABB is recomputed from the stored object-space box.
    pub fn set_transform(&mut self, ob_to_world: Mat4) {
        self.ob_to_world = ob_to_world;
        self.normal_matrix = adjugate_transpose_3x3(&ob_to_world);
        self.det_sign = upper_left_det(&ob_to_world).signum();
        self.aabb_ws = self.aabb_os.transformed(&ob_to_world);
    }

    /// Turns the object into a GPU-instanced draw: one instance per
    /// object-space transform. Call before admission, or re-run the
    /// denormalised-data rebuild afterwards so the instance block and draw
    /// records refresh.
    pub fn set_instance_matrices(&mut self, matrices: Vec<Mat4>) {
        self.num_instances = matrices.len() as u32;
        self.instance_matrices = if matrices.is_empty() {
            None
        } else {
            Some(matrices)
        };
    }

    #[inline]
    #[must_use]
    pub fn is_instanced(&self) -> bool {
        self.num_instances > 0
    }

    #[inline]
    #[must_use]
    pub fn is_animated(&self) -> bool {
        self.anim.is_some()
    }

    /// Approximate projected length of the object as a fraction of the
    /// viewport, used to gate animation evaluation.
    #[must_use]
    pub fn projected_frac(&self, cam_pos: Vec3, sensor_over_lens: f32) -> f32 {
        let dist = self.aabb_ws.centroid().distance(cam_pos).max(1e-3);
        self.aabb_ws.longest_side() / (dist * sensor_over_lens.max(1e-6))
    }
}
