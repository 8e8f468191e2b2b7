//! Batch enumeration, sort keys and draw coalescing.
//!
//! Every admitted object carries denormalised per-batch draw records; each
//! frame the passes enumerate visible objects, emit one [`BatchDrawInfo`]
//! per surviving batch, radix-sort them on a packed 32-bit key, and walk the
//! sorted list coalescing consecutive batches that share all binding state
//! into [`DrawRun`]s. A run maps to one multi-draw-indirect call when the
//! feature is available, or to a loop of direct draws otherwise; either way
//! each draw's `(per_ob_index, joint_base, material_index)` indirection rows
//! are addressed through the shader's instance index — instanced draws emit
//! one row per instance so every instance resolves to its own transform.
//!
//! # Key layout
//!
//! `prog_vao_key` packs, in decreasing significance:
//!
//! ```text
//! [31:20] program index   (12 bits)
//! [19:18] face-cull bits  (2 bits)
//! [17: 2] mesh buffer key (16 bits)
//! [ 1: 0] index type      (2 bits)
//! ```
//!
//! so an ascending sort minimises program switches first, then face-culling
//! switches, then vertex/index buffer binds.

use slotmap::SlotMap;

use crate::renderer::buffers::{DrawCommand, ObJointAndMatIndices};
use crate::renderer::programs::ProgramIndex;
use crate::resources::mesh::{IndexType, MeshHandle, MeshStore};
use crate::scene::bounds::Aabb;
use crate::scene::camera::{CullVolume, Frustum};
use crate::scene::object::{Object, ObjectKey};

// ============================================================================
// Batch record flags
// ============================================================================

/// Set once the batch's program has finished building; only batches with
/// this bit set are drawn.
pub const BATCH_FLAG_PROGRAM_BUILT: u32 = 1 << 31;
pub const BATCH_FLAG_TRANSPARENT: u32 = 1 << 30;
pub const BATCH_FLAG_WATER: u32 = 1 << 29;
pub const BATCH_FLAG_DECAL: u32 = 1 << 28;
pub const BATCH_FLAG_ALPHA_BLEND: u32 = 1 << 27;

const BATCH_CULL_SHIFT: u32 = 25;
const BATCH_CULL_MASK: u32 = 0b11 << BATCH_CULL_SHIFT;
const BATCH_PROGRAM_MASK: u32 = 0xFFFF;

/// Face culling state of a batch, folded into keys and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FaceCull {
    #[default]
    Back,
    Front,
    None,
}

impl FaceCull {
    #[inline]
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Self::Back => 0,
            Self::Front => 1,
            Self::None => 2,
        }
    }

    #[inline]
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            1 => Self::Front,
            2 => Self::None,
            _ => Self::Back,
        }
    }

    /// Swaps front/back; applied when an object's transform determinant is
    /// negative so winding-dependent culling stays correct.
    #[inline]
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Back => Self::Front,
            Self::Front => Self::Back,
            Self::None => Self::None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_wgpu(self) -> Option<wgpu::Face> {
        match self {
            Self::Back => Some(wgpu::Face::Back),
            Self::Front => Some(wgpu::Face::Front),
            Self::None => None,
        }
    }
}

/// Packs the per-batch `program_index_and_flags` word.
#[must_use]
pub fn pack_program_index_and_flags(
    program_index: ProgramIndex,
    cull: FaceCull,
    behaviour_bits: u32,
    built: bool,
) -> u32 {
    debug_assert!(program_index <= BATCH_PROGRAM_MASK);
    (program_index & BATCH_PROGRAM_MASK)
        | (cull.bits() << BATCH_CULL_SHIFT)
        | behaviour_bits
        | if built { BATCH_FLAG_PROGRAM_BUILT } else { 0 }
}

#[inline]
#[must_use]
pub fn batch_program_index(program_index_and_flags: u32) -> ProgramIndex {
    program_index_and_flags & BATCH_PROGRAM_MASK
}

#[inline]
#[must_use]
pub fn batch_face_cull(program_index_and_flags: u32) -> FaceCull {
    FaceCull::from_bits((program_index_and_flags & BATCH_CULL_MASK) >> BATCH_CULL_SHIFT)
}

#[inline]
#[must_use]
pub fn batch_is_built(program_index_and_flags: u32) -> bool {
    program_index_and_flags & BATCH_FLAG_PROGRAM_BUILT != 0
}

// ============================================================================
// Denormalised batch records
// ============================================================================

/// Precomputed draw record for one mesh batch of one object; everything the
/// sort-and-draw loop needs without touching the mesh or material again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRecord {
    pub program_index_and_flags: u32,
    /// Row in the GPU material table.
    pub material_index: u32,
    /// Byte offset of the first index.
    pub prim_start_offset_b: u32,
    pub num_indices: u32,
}

// ============================================================================
// Sort keys
// ============================================================================

#[inline]
#[must_use]
pub fn pack_prog_vao_key(
    program_index: ProgramIndex,
    cull: FaceCull,
    buffer_key: u16,
    index_type: IndexType,
) -> u32 {
    let index_bits = match index_type {
        IndexType::U16 => 0,
        IndexType::U32 => 1,
    };
    ((program_index & 0xFFF) << 20)
        | (cull.bits() << 18)
        | (u32::from(buffer_key) << 2)
        | index_bits
}

#[inline]
#[must_use]
pub fn prog_vao_key_program(key: u32) -> ProgramIndex {
    key >> 20
}

#[inline]
#[must_use]
pub fn prog_vao_key_cull(key: u32) -> FaceCull {
    FaceCull::from_bits((key >> 18) & 0b11)
}

#[inline]
#[must_use]
pub fn prog_vao_key_buffer(key: u32) -> u16 {
    ((key >> 2) & 0xFFFF) as u16
}

#[inline]
#[must_use]
pub fn prog_vao_key_index_type(key: u32) -> IndexType {
    if key & 0b11 == 1 {
        IndexType::U32
    } else {
        IndexType::U16
    }
}

/// Back-to-front key for the alpha-blended pass: bit-inverted distance in
/// the high word so greater distances sort first, program key as tiebreak.
#[inline]
#[must_use]
pub fn pack_alpha_sort_key(dist_to_camera: f32, prog_vao_key: u32) -> u64 {
    let d = if dist_to_camera.is_sign_negative() {
        0
    } else {
        dist_to_camera.to_bits()
    };
    (u64::from(!d) << 32) | u64::from(prog_vao_key)
}

/// One enumerated batch awaiting sort-and-draw.
#[derive(Debug, Clone, Copy)]
pub struct BatchDrawInfo {
    pub prog_vao_key: u32,
    pub object: ObjectKey,
    pub batch_i: u32,
}

/// Alpha-pass variant with the 64-bit distance key.
#[derive(Debug, Clone, Copy)]
pub struct AlphaBatchDrawInfo {
    pub sort_key: u64,
    pub info: BatchDrawInfo,
}

// ============================================================================
// Radix sort
// ============================================================================

/// LSD radix sort of batch infos on the 32-bit key, 4 passes of 8 bits.
/// Stable, O(n); `scratch` is reused frame to frame.
pub fn radix_sort_batches(items: &mut Vec<BatchDrawInfo>, scratch: &mut Vec<BatchDrawInfo>) {
    radix_sort_by(items, scratch, 4, |b, pass| {
        ((b.prog_vao_key >> (pass * 8)) & 0xFF) as usize
    });
}

/// LSD radix sort for the 64-bit alpha keys, 8 passes of 8 bits.
pub fn radix_sort_alpha_batches(
    items: &mut Vec<AlphaBatchDrawInfo>,
    scratch: &mut Vec<AlphaBatchDrawInfo>,
) {
    radix_sort_by(items, scratch, 8, |b, pass| {
        ((b.sort_key >> (pass * 8)) & 0xFF) as usize
    });
}

fn radix_sort_by<T: Copy, F: Fn(&T, u32) -> usize>(
    items: &mut Vec<T>,
    scratch: &mut Vec<T>,
    passes: u32,
    digit: F,
) {
    if items.len() < 2 {
        return;
    }
    scratch.clear();
    scratch.resize(items.len(), items[0]);

    let mut src_is_items = true;
    for pass in 0..passes {
        let (src, dst): (&[T], &mut [T]) = if src_is_items {
            (items.as_slice(), scratch.as_mut_slice())
        } else {
            (scratch.as_slice(), items.as_mut_slice())
        };

        let mut counts = [0usize; 256];
        for it in src {
            counts[digit(it, pass)] += 1;
        }
        // Skip passes where every key shares the digit.
        if counts.iter().any(|&c| c == src.len()) {
            continue;
        }
        let mut offsets = [0usize; 256];
        let mut sum = 0;
        for (o, c) in offsets.iter_mut().zip(counts.iter()) {
            *o = sum;
            sum += c;
        }
        for it in src {
            let d = digit(it, pass);
            dst[offsets[d]] = *it;
            offsets[d] += 1;
        }
        src_is_items = !src_is_items;
    }
    if !src_is_items {
        items.copy_from_slice(scratch);
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-frame draw statistics; written only by the render thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub num_batches_considered: u32,
    pub num_objects_culled: u32,
    pub num_draw_commands: u32,
    pub num_multi_draw_calls: u32,
    pub num_prog_changes: u32,
    pub num_vao_binds: u32,
    pub num_face_culling_changes: u32,
    pub num_indices_drawn: u64,
    pub num_animated_obs_processed: u32,
    pub num_textures_evicted: u32,
}

impl FrameStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Enumeration
// ============================================================================

/// Which record list of an object a pass draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSource {
    /// The full per-batch records (colour passes).
    Normal,
    /// The coalesced depth-draw batches (shadow and prepass).
    Depth,
}

/// Behaviour filter for enumeration: a batch is emitted when
/// `(flags & mask) == wanted`.
#[derive(Debug, Clone, Copy)]
pub struct BatchFilter {
    pub mask: u32,
    pub wanted: u32,
}

impl BatchFilter {
    /// Opaque batches: none of the behaviour bits set.
    #[must_use]
    pub fn opaque() -> Self {
        Self {
            mask: BATCH_FLAG_TRANSPARENT
                | BATCH_FLAG_WATER
                | BATCH_FLAG_DECAL
                | BATCH_FLAG_ALPHA_BLEND,
            wanted: 0,
        }
    }

    #[must_use]
    pub fn with_bit(bit: u32) -> Self {
        Self {
            mask: bit,
            wanted: bit,
        }
    }

    #[inline]
    #[must_use]
    pub fn accepts(&self, flags: u32) -> bool {
        flags & self.mask == self.wanted
    }
}

/// The culling volume a pass enumerates against.
#[derive(Clone, Copy)]
pub enum CullTest<'a> {
    /// No culling (always-visible and overlay passes).
    None,
    Frustum(&'a Frustum),
    /// Sun-extruded shadow/animation volume.
    Volume(&'a CullVolume),
}

impl CullTest<'_> {
    #[inline]
    #[must_use]
    pub fn intersects(&self, aabb: &Aabb) -> bool {
        match self {
            Self::None => true,
            Self::Frustum(f) => f.intersects_aabb(aabb),
            Self::Volume(v) => v.intersects_aabb(aabb),
        }
    }
}

/// Extra enumeration constraints used by the shadow and prepass paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumerationExtras {
    /// Objects whose world AABB longest side is below this are skipped
    /// (tiny casters contribute nothing at the cascade's resolution).
    pub min_longest_side: f32,
    /// When set, only objects with `random_num & 3 == subset` are emitted
    /// (static-shadow stagger).
    pub subset: Option<u32>,
    /// When set, only objects whose AABB centroid lies within the given
    /// distance of the point are emitted (SSAO prepass range limit).
    pub max_dist: Option<(glam::Vec3, f32)>,
}

/// Emits `BatchDrawInfo` for every batch of every listed object that
/// survives culling, has a ready mesh, a built program, and matches
/// `filter`.
pub fn enumerate_batches<'a>(
    objects: &SlotMap<ObjectKey, Object>,
    keys: impl Iterator<Item = &'a ObjectKey>,
    meshes: &MeshStore,
    cull: CullTest<'_>,
    source: BatchSource,
    filter: &BatchFilter,
    extras: &EnumerationExtras,
    out: &mut Vec<BatchDrawInfo>,
    stats: &mut FrameStats,
) {
    for &key in keys {
        let Some(ob) = objects.get(key) else { continue };

        if let Some(subset) = extras.subset
            && ob.random_num & 3 != subset
        {
            continue;
        }
        if extras.min_longest_side > 0.0 && ob.aabb_ws.longest_side() < extras.min_longest_side {
            continue;
        }
        if let Some((from, max_dist)) = extras.max_dist
            && ob.aabb_ws.centroid().distance_squared(from) > max_dist * max_dist
        {
            continue;
        }
        if !cull.intersects(&ob.aabb_ws) {
            stats.num_objects_culled += 1;
            continue;
        }
        let Some(mesh) = meshes.get(ob.mesh) else {
            continue;
        };
        if !mesh.ready_to_draw() {
            continue;
        }

        let records = match source {
            BatchSource::Normal => &ob.batch_records,
            BatchSource::Depth => &ob.depth_draw_batches,
        };
        for (batch_i, rec) in records.iter().enumerate() {
            stats.num_batches_considered += 1;
            if !batch_is_built(rec.program_index_and_flags) {
                continue;
            }
            if !filter.accepts(rec.program_index_and_flags) {
                continue;
            }
            out.push(BatchDrawInfo {
                prog_vao_key: pack_prog_vao_key(
                    batch_program_index(rec.program_index_and_flags),
                    batch_face_cull(rec.program_index_and_flags),
                    ob.mesh_buffer_key,
                    mesh.index_type,
                ),
                object: key,
                batch_i: batch_i as u32,
            });
        }
    }
}

// ============================================================================
// Draw list construction
// ============================================================================

/// A maximal span of sorted batches sharing program, face culling and mesh
/// buffers: one multi-draw-indirect call, or `cmd_count` direct draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRun {
    pub program_index: ProgramIndex,
    pub cull: FaceCull,
    pub buffer_key: u16,
    pub index_type: IndexType,
    pub mesh: MeshHandle,
    pub cmd_start: u32,
    pub cmd_count: u32,
}

/// The output of one pass's sort-and-coalesce: runs plus the parallel
/// command and indirection arrays. `commands[i]` has
/// `base_instance = indices_base + i` so the shader finds its indirection
/// row through the instance index.
#[derive(Default)]
pub struct DrawList {
    pub runs: Vec<DrawRun>,
    pub commands: Vec<DrawCommand>,
    pub indices_rows: Vec<ObJointAndMatIndices>,
}

impl DrawList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.runs.clear();
        self.commands.clear();
        self.indices_rows.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Walks sorted batches building [`DrawRun`]s, flushing on any key change,
/// and accumulates state-change statistics.
///
/// `indices_base` offsets `base_instance` so several passes can share one
/// indirection buffer per frame.
pub fn build_draw_list(
    sorted: &[BatchDrawInfo],
    source: BatchSource,
    objects: &SlotMap<ObjectKey, Object>,
    indices_base: u32,
    list: &mut DrawList,
    stats: &mut FrameStats,
) {
    list.clear();
    let mut last_program: Option<ProgramIndex> = None;
    let mut last_cull: Option<FaceCull> = None;
    let mut last_buffer: Option<u16> = None;
    let mut open_run: Option<DrawRun> = None;

    for info in sorted {
        let Some(ob) = objects.get(info.object) else {
            continue;
        };
        let records = match source {
            BatchSource::Normal => &ob.batch_records,
            BatchSource::Depth => &ob.depth_draw_batches,
        };
        let rec = &records[info.batch_i as usize];

        let program = prog_vao_key_program(info.prog_vao_key);
        let cull = prog_vao_key_cull(info.prog_vao_key);
        let buffer_key = prog_vao_key_buffer(info.prog_vao_key);
        let index_type = prog_vao_key_index_type(info.prog_vao_key);

        let state_changed = last_program != Some(program)
            || last_cull != Some(cull)
            || last_buffer != Some(buffer_key);

        if state_changed {
            if let Some(run) = open_run.take() {
                list.runs.push(run);
            }
            if last_program != Some(program) {
                stats.num_prog_changes += 1;
            }
            if last_cull.is_some() && last_cull != Some(cull) {
                stats.num_face_culling_changes += 1;
            }
            if last_buffer != Some(buffer_key) {
                stats.num_vao_binds += 1;
            }
            last_program = Some(program);
            last_cull = Some(cull);
            last_buffer = Some(buffer_key);
            open_run = Some(DrawRun {
                program_index: program,
                cull,
                buffer_key,
                index_type,
                mesh: ob.mesh,
                cmd_start: list.commands.len() as u32,
                cmd_count: 0,
            });
        }

        // One indirection row per instance so `instance_index` resolves to
        // a valid row for every instance of the draw, each selecting its
        // own transform from the instance block.
        let row_index = indices_base + list.indices_rows.len() as u32;
        let instance_count = ob.num_instances.max(1);
        let instance_base = ob.instance_transforms_base_index.unwrap_or(0);
        for instance in 0..instance_count {
            list.indices_rows.push(ObJointAndMatIndices {
                per_ob_index: ob.per_ob_vert_index.unwrap_or(0),
                joint_base_index: ob.joint_matrices_base_index.unwrap_or(0),
                material_index: rec.material_index,
                instance_transform_index: instance_base + instance,
            });
        }
        list.commands.push(DrawCommand {
            count: rec.num_indices,
            instance_count,
            first_index: rec.prim_start_offset_b / index_type.size_b(),
            base_vertex: 0,
            base_instance: row_index,
        });
        if let Some(run) = &mut open_run {
            run.cmd_count += 1;
        }
        stats.num_draw_commands += 1;
        stats.num_indices_drawn += u64::from(rec.num_indices);
    }
    if let Some(run) = open_run {
        list.runs.push(run);
    }
}
