//! GPU-resident tables.
//!
//! The renderer keeps per-object transforms, material parameters, joint
//! matrices, light records and per-draw indirection rows in GPU buffers that
//! live as long as the renderer; shaders fetch per-draw data by index instead
//! of receiving per-draw uniform uploads.
//!
//! Each table pairs a CPU mirror with its GPU buffer. Slot management is
//! CPU-side ([`FreeIndexAllocator`] / [`BestFitAllocator`]); exhausted tables
//! double their capacity and the next [`sync_gpu`](ResidentTable::sync_gpu)
//! grows the GPU buffer with a buffer-to-buffer copy, bumping a generation
//! counter so the frame-data bind group is rebuilt (the "rebind after
//! expand" contract).
//!
//! Element updates either become individual driver sub-updates or are
//! accumulated into the scatter-compute path: a staging buffer of
//! `(dst_offset, payload)` records scattered into the target by a compute
//! dispatch at the start of the frame.

use bytemuck::{Pod, Zeroable};
use glam::{IVec4, Mat4, Vec2, Vec4};

use crate::errors::{Result, VistaError};
use crate::renderer::buffers::allocator::{BestFitAllocator, FreeIndexAllocator};

// ============================================================================
// Row layouts
// ============================================================================

/// Per-frame vertex-stage uniforms, written once per frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SharedVertUniforms {
    pub proj_matrix: Mat4,
    pub view_matrix: Mat4,
    pub vert_sun_dir: Vec4,
    pub grass_pusher_sphere_pos: Vec4,
    pub campos_ws: Vec4,
    pub vert_uniforms_time: f32,
    pub wind_strength: f32,
    pub padding_a0: f32,
    pub padding_a1: f32,
}

/// Per-frame fragment-stage uniforms, written once per frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialCommonUniforms {
    pub frag_sun_dir: Vec4,
    pub sun_spec_rad_times_solid_angle: Vec4,
    pub sun_and_sky_av_spec_rad: Vec4,
    pub air_scattering_coeffs: Vec4,
    pub mat_common_campos_ws: Vec4,
    pub near_clip_dist: f32,
    pub far_clip_dist: f32,
    pub mat_common_time: f32,
    pub l_over_w: f32,
    pub l_over_h: f32,
    pub env_phi: f32,
    pub water_level_z: f32,
    pub mat_common_flags: u32,
    pub shadow_map_samples_xy_scale: f32,
    pub padding_b0: f32,
    pub padding_b1: f32,
    pub padding_b2: f32,
}

/// One row of the per-object table, read by the vertex stage via object
/// index.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PerObjectVertData {
    pub model_matrix: Mat4,
    /// Adjugate-transpose of the model matrix.
    pub normal_matrix: Mat4,
    pub light_indices: [IVec4; 2],
    pub depth_draw_depth_bias: f32,
    pub model_matrix_upper_left_det: f32,
    pub uv0_scale: f32,
    pub uv1_scale: f32,
    pub dequantise_scale: Vec4,
    pub dequantise_translation: Vec4,
}

impl Default for PerObjectVertData {
    fn default() -> Self {
        Self {
            model_matrix: Mat4::IDENTITY,
            normal_matrix: Mat4::IDENTITY,
            light_indices: [IVec4::splat(-1); 2],
            depth_draw_depth_bias: 0.0,
            model_matrix_upper_left_det: 1.0,
            uv0_scale: 1.0,
            uv1_scale: 1.0,
            dequantise_scale: Vec4::ONE,
            dequantise_translation: Vec4::ZERO,
        }
    }
}

/// One row of the material table, read by the fragment stage via material
/// index.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct MaterialData {
    pub diffuse_colour: Vec4,
    pub emission_colour: Vec4,
    pub texture_upper_left_matrix_col0: Vec2,
    pub texture_upper_left_matrix_col1: Vec2,
    pub texture_matrix_translation: Vec2,
    pub flags: u32,
    pub roughness: f32,
    pub fresnel_scale: f32,
    pub metallic_frac: f32,
    pub begin_fade_out_distance: f32,
    pub end_fade_out_distance: f32,
    pub materialise_lower_z: f32,
    pub materialise_upper_z: f32,
    pub materialise_start_time: f32,
    pub dopacity: f32,
}

/// One row of the light table.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct LightData {
    pub pos: Vec4,
    pub dir: Vec4,
    pub light_colour: Vec4,
    pub light_type: i32,
    pub cone_cos_angle_start: f32,
    pub cone_cos_angle_end: f32,
    pub padding_l0: f32,
}

/// Per-draw indirection row: which per-object row, joint block and material
/// row a draw reads, addressed by the shader's `instance_index`. Instanced
/// draws own one row per instance (all sharing the object/material indices)
/// so `instance_transform_index` selects that instance's matrix from the
/// instance-transform region.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ObJointAndMatIndices {
    pub per_ob_index: u32,
    pub joint_base_index: u32,
    pub material_index: u32,
    pub instance_transform_index: u32,
}

/// Multi-draw-indirect command, packed to the indirect-buffer layout.
/// `first_index` is an index count, not a byte offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawCommand {
    pub count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub base_instance: u32,
}

// WGSL-side struct sizes; checked against the Rust layouts at init.
const WGSL_SHARED_VERT_UNIFORMS_SIZE: usize = 192;
const WGSL_MATERIAL_COMMON_UNIFORMS_SIZE: usize = 128;
const WGSL_PER_OBJECT_VERT_DATA_SIZE: usize = 208;
const WGSL_MATERIAL_DATA_SIZE: usize = 96;
const WGSL_LIGHT_DATA_SIZE: usize = 64;
const WGSL_OB_JOINT_AND_MAT_INDICES_SIZE: usize = 16;

/// Validates that every CPU-side block layout matches the size the shaders
/// declare. A mismatch is a fatal configuration error: binding would read
/// garbage from every row after the first.
pub fn validate_block_sizes() -> Result<()> {
    fn check(name: &str, rust: usize, wgsl: usize) -> Result<()> {
        if rust == wgsl {
            Ok(())
        } else {
            Err(VistaError::FatalConfig(format!(
                "uniform/storage block size mismatch for {name}: CPU {rust} B, shader {wgsl} B"
            )))
        }
    }
    check(
        "SharedVertUniforms",
        size_of::<SharedVertUniforms>(),
        WGSL_SHARED_VERT_UNIFORMS_SIZE,
    )?;
    check(
        "MaterialCommonUniforms",
        size_of::<MaterialCommonUniforms>(),
        WGSL_MATERIAL_COMMON_UNIFORMS_SIZE,
    )?;
    check(
        "PerObjectVertData",
        size_of::<PerObjectVertData>(),
        WGSL_PER_OBJECT_VERT_DATA_SIZE,
    )?;
    check("MaterialData", size_of::<MaterialData>(), WGSL_MATERIAL_DATA_SIZE)?;
    check("LightData", size_of::<LightData>(), WGSL_LIGHT_DATA_SIZE)?;
    check(
        "ObJointAndMatIndices",
        size_of::<ObJointAndMatIndices>(),
        WGSL_OB_JOINT_AND_MAT_INDICES_SIZE,
    )?;
    Ok(())
}

// ============================================================================
// ResidentTable
// ============================================================================

/// A slot-allocated GPU table with a CPU mirror.
pub struct ResidentTable<T: Pod + Default> {
    label: &'static str,
    allocator: FreeIndexAllocator,
    cpu: Vec<T>,
    dirty: Vec<u32>,
    buffer: Option<wgpu::Buffer>,
    /// Bumped whenever the buffer object is replaced; consumers rebuild
    /// their bind groups when it changes.
    generation: u64,
    usage: wgpu::BufferUsages,
}

impl<T: Pod + Default> ResidentTable<T> {
    #[must_use]
    pub fn new(label: &'static str, initial_capacity: u32, usage: wgpu::BufferUsages) -> Self {
        Self {
            label,
            allocator: FreeIndexAllocator::new(initial_capacity),
            cpu: vec![T::default(); initial_capacity as usize],
            dirty: Vec::new(),
            buffer: None,
            generation: 0,
            usage,
        }
    }

    /// Allocates a slot, doubling the CPU mirror when exhausted. The GPU
    /// buffer catches up (with a copy) at the next `sync_gpu`.
    pub fn allocate(&mut self) -> u32 {
        if self.allocator.is_full() {
            let new_capacity = (self.allocator.capacity() * 2).max(16);
            log::info!(
                "Expanding table '{}': {} -> {new_capacity} elements",
                self.label,
                self.allocator.capacity()
            );
            self.allocator.expand_to(new_capacity);
            self.cpu.resize(new_capacity as usize, T::default());
        }
        self.allocator
            .allocate()
            .expect("allocator cannot be full after expand")
    }

    pub fn free(&mut self, index: u32) {
        self.cpu[index as usize] = T::default();
        self.dirty.push(index);
        self.allocator.free(index);
    }

    /// Writes one element; the GPU copy is updated at the next flush.
    pub fn update(&mut self, index: u32, value: T) {
        self.cpu[index as usize] = value;
        self.dirty.push(index);
    }

    #[must_use]
    pub fn get(&self, index: u32) -> &T {
        &self.cpu[index as usize]
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.allocator.capacity()
    }

    #[inline]
    #[must_use]
    pub fn num_allocated(&self) -> u32 {
        self.allocator.num_allocated()
    }

    #[inline]
    #[must_use]
    pub fn num_free(&self) -> u32 {
        self.allocator.num_free()
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    fn byte_capacity(&self) -> u64 {
        u64::from(self.allocator.capacity()) * size_of::<T>() as u64
    }

    /// Ensures the GPU buffer exists and covers the CPU capacity, growing by
    /// buffer-to-buffer copy so live rows survive.
    pub fn sync_gpu(&mut self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) {
        let needed = self.byte_capacity();
        let current = self.buffer.as_ref().map_or(0, wgpu::Buffer::size);
        if current >= needed && self.buffer.is_some() {
            return;
        }
        let new_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(self.label),
            size: needed,
            usage: self.usage | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        if let Some(old) = &self.buffer
            && current > 0
        {
            encoder.copy_buffer_to_buffer(old, 0, &new_buffer, 0, current);
        }
        self.buffer = Some(new_buffer);
        self.generation += 1;
    }

    /// Flushes dirty elements as direct driver sub-updates, or into `scatter`
    /// when the scatter-compute path is active.
    pub fn flush_updates(&mut self, queue: &wgpu::Queue, mut scatter: Option<&mut ScatterUploader>) {
        let Some(buffer) = &self.buffer else {
            self.dirty.clear();
            return;
        };
        self.dirty.sort_unstable();
        self.dirty.dedup();
        let elem_size = size_of::<T>() as u64;
        for &index in &self.dirty {
            let offset = u64::from(index) * elem_size;
            let bytes = bytemuck::bytes_of(&self.cpu[index as usize]);
            if let Some(s) = scatter.as_deref_mut() {
                s.push(offset, bytes);
            } else {
                queue.write_buffer(buffer, offset, bytes);
            }
        }
        self.dirty.clear();
    }
}

// ============================================================================
// MatrixBlockTable
// ============================================================================

/// Contiguous variable-length matrix blocks over one storage buffer.
///
/// Two instantiations exist: the joint-matrix region (one block per
/// animated object, sized to its joint count) and the instance-transform
/// region (one block per instanced object, sized to its instance count).
pub struct MatrixBlockTable {
    label: &'static str,
    pub allocator: BestFitAllocator,
    cpu: Vec<Mat4>,
    dirty_blocks: Vec<(u32, u32)>,
    buffer: Option<wgpu::Buffer>,
    generation: u64,
}

impl MatrixBlockTable {
    #[must_use]
    pub fn new(label: &'static str, initial_capacity: u32) -> Self {
        Self {
            label,
            allocator: BestFitAllocator::new(initial_capacity),
            cpu: vec![Mat4::IDENTITY; initial_capacity as usize],
            dirty_blocks: Vec::new(),
            buffer: None,
            generation: 0,
        }
    }

    /// Allocates a block of `num_matrices`, expanding the region to the
    /// next power of two when best-fit fails.
    pub fn allocate_block(&mut self, num_matrices: u32) -> u32 {
        if let Some(offset) = self.allocator.allocate(num_matrices) {
            return offset;
        }
        let old = self.allocator.capacity();
        let new_capacity = self.allocator.expand(num_matrices);
        log::info!(
            "Expanding matrix region '{}': {old} -> {new_capacity} matrices",
            self.label
        );
        self.cpu.resize(new_capacity as usize, Mat4::IDENTITY);
        self.allocator
            .allocate(num_matrices)
            .expect("expand guarantees space for the requested block")
    }

    pub fn free_block(&mut self, offset: u32) {
        self.allocator.free(offset);
    }

    /// Writes a block of matrices starting at `offset`.
    pub fn update_block(&mut self, offset: u32, matrices: &[Mat4]) {
        let start = offset as usize;
        self.cpu[start..start + matrices.len()].copy_from_slice(matrices);
        self.dirty_blocks.push((offset, matrices.len() as u32));
    }

    #[must_use]
    pub fn block(&self, offset: u32, len: u32) -> &[Mat4] {
        &self.cpu[offset as usize..(offset + len) as usize]
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    pub fn sync_gpu(&mut self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) {
        let needed = self.cpu.len() as u64 * size_of::<Mat4>() as u64;
        let current = self.buffer.as_ref().map_or(0, wgpu::Buffer::size);
        if current >= needed && self.buffer.is_some() {
            return;
        }
        let new_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(self.label),
            size: needed,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        if let Some(old) = &self.buffer
            && current > 0
        {
            encoder.copy_buffer_to_buffer(old, 0, &new_buffer, 0, current);
        }
        self.buffer = Some(new_buffer);
        self.generation += 1;
    }

    pub fn flush_updates(&mut self, queue: &wgpu::Queue, mut scatter: Option<&mut ScatterUploader>) {
        let Some(buffer) = &self.buffer else {
            self.dirty_blocks.clear();
            return;
        };
        let elem = size_of::<Mat4>() as u64;
        for &(offset, len) in &self.dirty_blocks {
            let byte_offset = u64::from(offset) * elem;
            let bytes =
                bytemuck::cast_slice(&self.cpu[offset as usize..(offset + len) as usize]);
            if let Some(s) = scatter.as_deref_mut() {
                s.push(byte_offset, bytes);
            } else {
                queue.write_buffer(buffer, byte_offset, bytes);
            }
        }
        self.dirty_blocks.clear();
    }
}

// ============================================================================
// GrowBuffer — per-frame rebuilt arrays (draw commands, indirection rows)
// ============================================================================

/// A per-frame array uploaded wholesale, with capacity-doubling buffer reuse.
pub struct GrowBuffer<T: Pod> {
    label: &'static str,
    pub cpu: Vec<T>,
    buffer: Option<wgpu::Buffer>,
    generation: u64,
    usage: wgpu::BufferUsages,
}

impl<T: Pod> GrowBuffer<T> {
    #[must_use]
    pub fn new(label: &'static str, usage: wgpu::BufferUsages) -> Self {
        Self {
            label,
            cpu: Vec::new(),
            buffer: None,
            generation: 0,
            usage,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.cpu.clear();
    }

    #[inline]
    pub fn push(&mut self, value: T) -> u32 {
        self.cpu.push(value);
        (self.cpu.len() - 1) as u32
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    /// Uploads the whole array, recreating the buffer with doubled capacity
    /// when it has outgrown the current one.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let needed = (self.cpu.len().max(1) * size_of::<T>()) as u64;
        let current = self.buffer.as_ref().map_or(0, wgpu::Buffer::size);
        if current < needed {
            let size = needed.next_power_of_two().max(256);
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size,
                usage: self.usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.generation += 1;
        }
        if !self.cpu.is_empty()
            && let Some(buffer) = &self.buffer
        {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&self.cpu));
        }
    }
}

// ============================================================================
// ScatterUploader — batched data-update path
// ============================================================================

/// Compute shader scattering 16-byte records from a staging buffer into the
/// target storage buffer.
const SCATTER_WGSL: &str = "
struct ScatterRecord {
    dst_chunk: u32,
    padding0: u32,
    padding1: u32,
    padding2: u32,
    data: vec4<u32>,
};

@group(0) @binding(0) var<storage, read> records: array<ScatterRecord>;
@group(0) @binding(1) var<storage, read_write> target: array<vec4<u32>>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= arrayLength(&records)) {
        return;
    }
    target[records[i].dst_chunk] = records[i].data;
}
";

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ScatterRecord {
    dst_chunk: u32,
    padding0: u32,
    padding1: u32,
    padding2: u32,
    data: [u32; 4],
}

/// Accumulates element writes and scatters them with one compute dispatch.
///
/// Writes are split into 16-byte chunks (every table row size is a multiple
/// of 16). The dispatch is followed by wgpu's implicit barrier, so same-frame
/// draws observe the updates.
pub struct ScatterUploader {
    records: Vec<ScatterRecord>,
    staging: GrowBuffer<ScatterRecord>,
    pipeline: Option<wgpu::ComputePipeline>,
    layout: Option<wgpu::BindGroupLayout>,
}

impl Default for ScatterUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScatterUploader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            staging: GrowBuffer::new("scatter_staging", wgpu::BufferUsages::STORAGE),
            pipeline: None,
            layout: None,
        }
    }

    /// Queues `bytes` for writing at `dst_byte_offset`. Both must be 16-byte
    /// multiples.
    pub fn push(&mut self, dst_byte_offset: u64, bytes: &[u8]) {
        debug_assert_eq!(dst_byte_offset % 16, 0);
        debug_assert_eq!(bytes.len() % 16, 0);
        let base_chunk = (dst_byte_offset / 16) as u32;
        for (i, chunk) in bytes.chunks_exact(16).enumerate() {
            self.records.push(ScatterRecord {
                dst_chunk: base_chunk + i as u32,
                padding0: 0,
                padding1: 0,
                padding2: 0,
                data: [
                    u32::from_le_bytes(chunk[0..4].try_into().unwrap()),
                    u32::from_le_bytes(chunk[4..8].try_into().unwrap()),
                    u32::from_le_bytes(chunk[8..12].try_into().unwrap()),
                    u32::from_le_bytes(chunk[12..16].try_into().unwrap()),
                ],
            });
        }
    }

    #[must_use]
    pub fn num_pending(&self) -> usize {
        self.records.len()
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device) {
        if self.pipeline.is_some() {
            return;
        }
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scatter_updates"),
            source: wgpu::ShaderSource::Wgsl(SCATTER_WGSL.into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scatter Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scatter Pipeline Layout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });
        self.pipeline = Some(device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Scatter Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        }));
        self.layout = Some(layout);
    }

    /// Dispatches the accumulated records into `target` and clears the queue.
    pub fn flush(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::Buffer,
    ) {
        if self.records.is_empty() {
            return;
        }
        self.ensure_pipeline(device);
        self.staging.clear();
        for r in self.records.drain(..) {
            self.staging.push(r);
        }
        self.staging.upload(device, queue);

        let (Some(pipeline), Some(layout), Some(staging)) =
            (&self.pipeline, &self.layout, self.staging.buffer())
        else {
            return;
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scatter BindGroup"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    // Bind only the live records so `arrayLength` in the
                    // shader sees the real count, not the grown capacity.
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: staging,
                        offset: 0,
                        size: wgpu::BufferSize::new(
                            self.staging.len() as u64 * size_of::<ScatterRecord>() as u64,
                        ),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: target.as_entire_binding(),
                },
            ],
        });

        let n = self.staging.len() as u32;
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Scatter Updates"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(n.div_ceil(64), 1, 1);
    }
}
