//! Frame data: the group-0 bind group and everything behind it.
//!
//! Owns the resident tables (per-object, material, light rows plus the
//! joint and instance-transform matrix regions), the two once-per-frame
//! uniform blocks, and the per-frame draw-command/indirection arrays. Whenever a table buffer is
//! replaced (growth) the group-0 bind group is rebuilt — consumers just call
//! [`FrameData::bind_group`] after [`FrameData::sync_and_rebind`].
//!
//! The shadow passes render with their own view-projection but the same
//! shader interface, so one extra `SharedVertUniforms` buffer (and matching
//! bind group) exists per shadow view.

use glam::Mat4;

use crate::renderer::buffers::{
    DrawCommand, GrowBuffer, LightData, MaterialCommonUniforms, MaterialData, MatrixBlockTable,
    ObJointAndMatIndices, PerObjectVertData, ResidentTable, ScatterUploader, SharedVertUniforms,
};

/// Initial table capacities.
const INITIAL_OBJECTS: u32 = 512;
const INITIAL_MATERIALS: u32 = 512;
const INITIAL_JOINTS: u32 = 1024;
const INITIAL_INSTANCE_TRANSFORMS: u32 = 1024;
const INITIAL_LIGHTS: u32 = 256;

pub struct FrameData {
    pub per_object: ResidentTable<PerObjectVertData>,
    pub materials: ResidentTable<MaterialData>,
    pub joints: MatrixBlockTable,
    /// Per-instance object-space transforms; instanced objects own a
    /// contiguous block addressed through their indirection rows.
    pub instance_transforms: MatrixBlockTable,
    pub lights: ResidentTable<LightData>,

    /// Per-frame MDI command list.
    pub draw_commands: GrowBuffer<DrawCommand>,
    /// Per-frame indirection rows, addressed by draw base instance.
    pub indices_rows: GrowBuffer<ObJointAndMatIndices>,

    shared_vert_main: wgpu::Buffer,
    shared_vert_shadow: Vec<wgpu::Buffer>,
    material_common: wgpu::Buffer,

    pub layout: wgpu::BindGroupLayout,
    bind_group_main: Option<wgpu::BindGroup>,
    bind_groups_shadow: Vec<wgpu::BindGroup>,
    bound_generations: (u64, u64, u64, u64, u64, u64),
}

impl FrameData {
    #[must_use]
    pub fn new(device: &wgpu::Device, num_shadow_views: usize) -> Self {
        let uniform_entry = |binding: u32, size: usize| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(size as u64),
            },
            count: None,
        };
        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        // min_binding_size doubles as the link-time block size check: a
        // shader whose block disagrees fails validation when the pipeline is
        // created against this layout.
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Data Layout"),
            entries: &[
                uniform_entry(0, size_of::<SharedVertUniforms>()),
                uniform_entry(1, size_of::<MaterialCommonUniforms>()),
                storage_entry(2),
                storage_entry(3),
                storage_entry(4),
                storage_entry(5),
                storage_entry(6),
                storage_entry(7),
            ],
        });

        let make_shared_buffer = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size_of::<SharedVertUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let shared_vert_main = make_shared_buffer("SharedVertUniforms");
        let shared_vert_shadow = (0..num_shadow_views)
            .map(|_| make_shared_buffer("SharedVertUniforms (shadow view)"))
            .collect();
        let material_common = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("MaterialCommonUniforms"),
            size: size_of::<MaterialCommonUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            per_object: ResidentTable::new(
                "per_object_vert_data",
                INITIAL_OBJECTS,
                wgpu::BufferUsages::STORAGE,
            ),
            materials: ResidentTable::new(
                "materials",
                INITIAL_MATERIALS,
                wgpu::BufferUsages::STORAGE,
            ),
            joints: MatrixBlockTable::new("joint_matrices", INITIAL_JOINTS),
            instance_transforms: MatrixBlockTable::new(
                "instance_transforms",
                INITIAL_INSTANCE_TRANSFORMS,
            ),
            lights: ResidentTable::new("lights", INITIAL_LIGHTS, wgpu::BufferUsages::STORAGE),
            draw_commands: GrowBuffer::new(
                "draw_commands",
                wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::STORAGE,
            ),
            indices_rows: GrowBuffer::new("ob_and_mat_indices", wgpu::BufferUsages::STORAGE),
            shared_vert_main,
            shared_vert_shadow,
            material_common,
            layout,
            bind_group_main: None,
            bind_groups_shadow: Vec::new(),
            bound_generations: (u64::MAX, 0, 0, 0, 0, 0),
        }
    }

    /// Writes the once-per-frame shared vertex uniforms for the main view.
    pub fn write_shared_vert(&self, queue: &wgpu::Queue, uniforms: &SharedVertUniforms) {
        queue.write_buffer(&self.shared_vert_main, 0, bytemuck::bytes_of(uniforms));
    }

    /// Writes the shared vertex uniforms of one shadow view (its
    /// view-projection stands in for the camera's).
    pub fn write_shadow_view(
        &self,
        queue: &wgpu::Queue,
        view_index: usize,
        proj: Mat4,
        view: Mat4,
        base: &SharedVertUniforms,
    ) {
        let mut u = *base;
        u.proj_matrix = proj;
        u.view_matrix = view;
        queue.write_buffer(
            &self.shared_vert_shadow[view_index],
            0,
            bytemuck::bytes_of(&u),
        );
    }

    pub fn write_material_common(&self, queue: &wgpu::Queue, uniforms: &MaterialCommonUniforms) {
        queue.write_buffer(&self.material_common, 0, bytemuck::bytes_of(uniforms));
    }

    /// Uploads the per-frame arrays and flushes table updates (directly or
    /// through the scatter path), then rebuilds bind groups if any table
    /// buffer moved.
    pub fn sync_and_rebind(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scatter: Option<&mut ScatterUploader>,
    ) {
        self.per_object.sync_gpu(device, encoder);
        self.materials.sync_gpu(device, encoder);
        self.joints.sync_gpu(device, encoder);
        self.instance_transforms.sync_gpu(device, encoder);
        self.lights.sync_gpu(device, encoder);

        // The scatter path funnels every table's writes through one staging
        // buffer per table flush; the compute dispatches land before any
        // draw in this frame's encoder.
        match scatter {
            Some(scatter) => {
                self.per_object.flush_updates(queue, Some(&mut *scatter));
                if let Some(buffer) = self.per_object.buffer() {
                    scatter.flush(device, queue, encoder, buffer);
                }
                self.materials.flush_updates(queue, Some(&mut *scatter));
                if let Some(buffer) = self.materials.buffer() {
                    scatter.flush(device, queue, encoder, buffer);
                }
                self.joints.flush_updates(queue, Some(&mut *scatter));
                if let Some(buffer) = self.joints.buffer() {
                    scatter.flush(device, queue, encoder, buffer);
                }
                self.instance_transforms.flush_updates(queue, Some(&mut *scatter));
                if let Some(buffer) = self.instance_transforms.buffer() {
                    scatter.flush(device, queue, encoder, buffer);
                }
                self.lights.flush_updates(queue, Some(&mut *scatter));
                if let Some(buffer) = self.lights.buffer() {
                    scatter.flush(device, queue, encoder, buffer);
                }
            }
            None => {
                self.per_object.flush_updates(queue, None);
                self.materials.flush_updates(queue, None);
                self.joints.flush_updates(queue, None);
                self.instance_transforms.flush_updates(queue, None);
                self.lights.flush_updates(queue, None);
            }
        }

        self.draw_commands.upload(device, queue);
        self.indices_rows.upload(device, queue);

        let generations = (
            self.per_object.generation(),
            self.materials.generation(),
            self.joints.generation(),
            self.instance_transforms.generation(),
            self.lights.generation(),
            self.indices_rows.generation(),
        );
        if self.bind_group_main.is_none() || generations != self.bound_generations {
            self.rebuild_bind_groups(device);
            self.bound_generations = generations;
        }
    }

    fn rebuild_bind_groups(&mut self, device: &wgpu::Device) {
        let (Some(per_ob), Some(mats), Some(joints), Some(instances), Some(lights), Some(indices)) = (
            self.per_object.buffer(),
            self.materials.buffer(),
            self.joints.buffer(),
            self.instance_transforms.buffer(),
            self.lights.buffer(),
            self.indices_rows.buffer(),
        ) else {
            return;
        };

        let make = |shared_vert: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Frame Data BindGroup"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: shared_vert.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self.material_common.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: per_ob.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: mats.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: joints.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: lights.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: indices.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: instances.as_entire_binding(),
                    },
                ],
            })
        };

        self.bind_group_main = Some(make(&self.shared_vert_main));
        self.bind_groups_shadow = self.shared_vert_shadow.iter().map(make).collect();
    }

    #[must_use]
    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group_main.as_ref()
    }

    #[must_use]
    pub fn shadow_bind_group(&self, view_index: usize) -> Option<&wgpu::BindGroup> {
        self.bind_groups_shadow.get(view_index)
    }

    #[must_use]
    pub fn num_shadow_views(&self) -> usize {
        self.shared_vert_shadow.len()
    }
}
