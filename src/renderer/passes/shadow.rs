//! Cascaded shadow maps: dynamic cascades every frame, static cascades
//! rebuilt on a 12-frame stagger.
//!
//! # Dynamic cascades
//!
//! Each of N cascades covers the view slice `[ε·s^i, ε·s^{i+1}]`. The 8
//! slice corners are projected into a sun-aligned basis; the orthographic
//! volume is texel-snapped to stop shimmer and its near plane is pushed
//! toward the sun by `max_shadowing_dist` to admit out-of-view casters.
//! Casters are culled by the sun-extruded slice volume, and objects smaller
//! than ~0.2% of the slice width are skipped.
//!
//! # Static cascades
//!
//! Two texture stacks exist; shaders always sample the *current* one while
//! the *other* is rebuilt over 12 frames: `cascade = (frame % 12) / 4`,
//! `object subset = frame % 4`. On subset 0 the cascade's slice is cleared
//! and the camera position (snapped to a 10-unit grid) becomes the cascade
//! volume centre. Objects are assigned to subsets by `random_num & 3`.
//! After frame 11 the stacks swap.
//!
//! All cascades of a stack occupy horizontal slices of one tall depth
//! texture; the per-cascade `texture · bias · proj · view` matrix bakes the
//! slice selection so shaders index cascades with a matrix multiply.
//!
//! Shadow rendering always uses the standard depth mapping and a
//! less-equal compare; the main passes restore reverse-Z through their own
//! pipeline state.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::renderer::buffers::SharedVertUniforms;
use crate::renderer::draw::{
    BatchFilter, BatchSource, CullTest, EnumerationExtras, FrameStats, enumerate_batches,
    radix_sort_batches, build_draw_list,
};
use crate::renderer::frame_data::FrameData;
use crate::renderer::passes::common::{MaterialTextures, PreparedSceneDraw, ScenePipeState};
use crate::renderer::programs::ProgramCache;
use crate::renderer::targets::{DEPTH_FORMAT, RenderTargets};
use crate::resources::mesh::MeshStore;
use crate::scene::Scene;

pub const MAX_DYNAMIC_CASCADES: usize = 4;
pub const NUM_STATIC_CASCADES: usize = 3;
/// Frames per full static rebuild: 3 cascades × 4 object subsets.
pub const STATIC_UPDATE_PERIOD: u64 = 12;

/// View-slice growth factor between dynamic cascades.
const CASCADE_SCALE: f32 = 6.0;
/// Near distance of dynamic cascade 0.
const CASCADE_NEAR_EPS: f32 = 1.0;
/// Half-width of static cascade 0's volume; each further cascade is 4×.
const STATIC_BASE_HALF_W: f32 = 64.0;
/// Camera snap grid for static volume centres.
const STATIC_SNAP_GRID: f32 = 10.0;
/// Casters smaller than this fraction of the slice width are skipped.
const SMALL_CASTER_FRAC: f32 = 0.002;

/// Picks `(cascade, subset)` for one frame of the static stagger.
#[inline]
#[must_use]
pub fn static_update_phase(frame: u64) -> (u32, u32) {
    let phase = (frame % STATIC_UPDATE_PERIOD) as u32;
    (phase / 4, phase % 4)
}

/// Snaps a point to the static-volume grid.
#[must_use]
pub fn quantise_centre(p: Vec3) -> Vec3 {
    (p / STATIC_SNAP_GRID).floor() * STATIC_SNAP_GRID + Vec3::splat(STATIC_SNAP_GRID * 0.5)
}

/// Dynamic cascade view slice `[near, far]`.
#[inline]
#[must_use]
pub fn dynamic_cascade_slice(i: u32) -> (f32, f32) {
    let near = CASCADE_NEAR_EPS * CASCADE_SCALE.powi(i as i32);
    (near, near * CASCADE_SCALE)
}

/// NDC → cascade-slice texture coordinates: `u = x/2 + 1/2`,
/// `v = (−y/2 + 1/2 + cascade) / num`, z unchanged.
#[must_use]
pub fn cascade_bias_matrix(cascade: u32, num_cascades: u32) -> Mat4 {
    let n = num_cascades as f32;
    Mat4::from_cols(
        Vec4::new(0.5, 0.0, 0.0, 0.0),
        Vec4::new(0.0, -0.5 / n, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(0.5, (0.5 + cascade as f32) / n, 0.0, 1.0),
    )
}

/// Sun-basis orthographic projection over `corners`, texel-snapped, with the
/// near plane extended toward the sun.
#[must_use]
pub fn build_sun_ortho(
    sun_dir: Vec3,
    corners: &[Vec3; 8],
    map_size: u32,
    caster_extension: f32,
) -> (Mat4, Mat4) {
    let safe_sun = if sun_dir.length_squared() > 1e-6 {
        sun_dir.normalize()
    } else {
        Vec3::Z
    };

    let mut centre = Vec3::ZERO;
    for c in corners {
        centre += *c;
    }
    centre /= 8.0;

    let up = if safe_sun.z.abs() > 0.99 { Vec3::X } else { Vec3::Z };
    let view = Mat4::look_at_rh(centre + safe_sun, centre, up);

    let mut ls_min = Vec3::splat(f32::MAX);
    let mut ls_max = Vec3::splat(f32::MIN);
    for c in corners {
        let ls = view.transform_point3(*c);
        ls_min = ls_min.min(ls);
        ls_max = ls_max.max(ls);
    }

    // Admit casters between the slice and the sun.
    ls_max.z += caster_extension;

    // Texel snap to stop shimmer under camera motion.
    let texel_x = (ls_max.x - ls_min.x) / map_size as f32;
    let texel_y = (ls_max.y - ls_min.y) / map_size as f32;
    if texel_x > 0.0 {
        ls_min.x = (ls_min.x / texel_x).floor() * texel_x;
        ls_max.x = (ls_max.x / texel_x).ceil() * texel_x;
    }
    if texel_y > 0.0 {
        ls_min.y = (ls_min.y / texel_y).floor() * texel_y;
        ls_max.y = (ls_max.y / texel_y).ceil() * texel_y;
    }

    let proj = Mat4::orthographic_rh(
        ls_min.x,
        ls_max.x,
        ls_min.y,
        ls_max.y,
        -ls_max.z,
        -ls_min.z,
    );
    (proj, view)
}

// ============================================================================
// GPU uniforms
// ============================================================================

/// Matches `ShadowMatrixUniforms` in the lit-family WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowMatrixUniforms {
    pub dynamic_tex_matrix: [Mat4; 4],
    pub static_tex_matrix: [Mat4; 4],
    pub num_dynamic_cascades: u32,
    pub num_static_cascades: u32,
    pub padding_s0: u32,
    pub padding_s1: u32,
}

// ============================================================================
// Clear-slice program
// ============================================================================

/// Depth-only fullscreen triangle at the far plane; with compare `Always`
/// and the viewport set to one cascade slice it clears just that slice.
const CLEAR_DEPTH_WGSL: &str = "
@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i32(vi) / 2) * 4.0 - 1.0;
    let y = f32(i32(vi) % 2) * 4.0 - 1.0;
    return vec4<f32>(x, y, 1.0, 1.0);
}

@fragment
fn fs_main() {}
";

// ============================================================================
// ShadowRenderer
// ============================================================================

struct DepthStack {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthStack {
    fn new(device: &wgpu::Device, label: &'static str, map_size: u32, num_cascades: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: map_size,
                height: map_size * num_cascades,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

pub struct ShadowRenderer {
    map_size: u32,
    num_dynamic: u32,

    dynamic_stack: DepthStack,
    static_stacks: [DepthStack; 2],
    /// Index of the stack shaders sample this frame; `1 - cur` is being
    /// rebuilt.
    cur_static: usize,

    /// Texture matrices of the current (sampled) static stack.
    static_matrices_current: [Mat4; NUM_STATIC_CASCADES],
    /// Texture matrices accumulating for the stack under rebuild.
    static_matrices_other: [Mat4; NUM_STATIC_CASCADES],
    /// Raw proj/view of the stack under rebuild (draw matrices).
    static_proj_view_other: [(Mat4, Mat4); NUM_STATIC_CASCADES],

    uniform_buffer: wgpu::Buffer,
    comparison_sampler: wgpu::Sampler,
    point_sampler: wgpu::Sampler,
    /// Group-2 layout for the lit scene families.
    pub lit_layout: wgpu::BindGroupLayout,
    lit_bind_group: Option<wgpu::BindGroup>,

    clear_pipeline: Option<wgpu::RenderPipeline>,

    // Per-frame prepared draws.
    dynamic_draws: Vec<PreparedSceneDraw>,
    dynamic_proj_view: Vec<(Mat4, Mat4)>,
    static_draw: PreparedSceneDraw,
    static_cascade_this_frame: u32,
    static_clear_this_frame: bool,

    batch_scratch: Vec<crate::renderer::draw::BatchDrawInfo>,
    sort_scratch: Vec<crate::renderer::draw::BatchDrawInfo>,
}

impl ShadowRenderer {
    #[must_use]
    pub fn new(device: &wgpu::Device, map_size: u32, num_dynamic: u32) -> Self {
        let num_dynamic = num_dynamic.clamp(1, MAX_DYNAMIC_CASCADES as u32);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ShadowMatrixUniforms"),
            size: size_of::<ShadowMatrixUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let comparison_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_comparison_sampler"),
            compare: Some(wgpu::CompareFunction::LessEqual),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let point_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ssao_point_sampler"),
            ..Default::default()
        });

        let depth_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let lit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lit Pass Resources Layout"),
            entries: &[
                depth_entry(0),
                depth_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            size_of::<ShadowMatrixUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        Self {
            map_size,
            num_dynamic,
            dynamic_stack: DepthStack::new(device, "dynamic_shadow_depth", map_size, num_dynamic),
            static_stacks: [
                DepthStack::new(device, "static_shadow_depth_a", map_size, NUM_STATIC_CASCADES as u32),
                DepthStack::new(device, "static_shadow_depth_b", map_size, NUM_STATIC_CASCADES as u32),
            ],
            cur_static: 0,
            static_matrices_current: [Mat4::IDENTITY; NUM_STATIC_CASCADES],
            static_matrices_other: [Mat4::IDENTITY; NUM_STATIC_CASCADES],
            static_proj_view_other: [(Mat4::IDENTITY, Mat4::IDENTITY); NUM_STATIC_CASCADES],
            uniform_buffer,
            comparison_sampler,
            point_sampler,
            lit_layout,
            lit_bind_group: None,
            clear_pipeline: None,
            dynamic_draws: Vec::new(),
            dynamic_proj_view: Vec::new(),
            static_draw: PreparedSceneDraw::default(),
            static_cascade_this_frame: 0,
            static_clear_this_frame: false,
            batch_scratch: Vec::new(),
            sort_scratch: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn num_dynamic_cascades(&self) -> u32 {
        self.num_dynamic
    }

    /// Proj/view of one dynamic cascade prepared this frame.
    #[must_use]
    pub fn dynamic_proj_view(&self, i: usize) -> Option<(Mat4, Mat4)> {
        self.dynamic_proj_view.get(i).copied()
    }

    /// Shadow-view index in [`FrameData`] for dynamic cascade `i`.
    #[inline]
    #[must_use]
    pub fn dynamic_view_index(i: u32) -> usize {
        i as usize
    }

    /// Shadow-view index for the static cascade drawn this frame.
    #[inline]
    #[must_use]
    pub fn static_view_index(&self) -> usize {
        self.num_dynamic as usize
    }

    #[must_use]
    pub fn num_shadow_views(num_dynamic: u32) -> usize {
        num_dynamic as usize + 1
    }

    // ------------------------------------------------------------------------
    // Prepare
    // ------------------------------------------------------------------------

    /// Builds the frame's shadow draw lists and writes the shadow-view
    /// uniforms and the lit-pass matrix uniforms.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: u64,
        scene: &Scene,
        meshes: &MeshStore,
        programs: &mut ProgramCache,
        frame_data: &mut FrameData,
        material_textures: &MaterialTextures,
        base_uniforms: &SharedVertUniforms,
        stats: &mut FrameStats,
    ) {
        let sun_dir = scene.params.sun_dir;
        let max_shadowing_dist = scene.params.max_shadowing_dist;

        // ---- Dynamic cascades ----
        self.dynamic_draws.clear();
        self.dynamic_proj_view.clear();
        let mut dynamic_tex = [Mat4::IDENTITY; 4];
        for i in 0..self.num_dynamic {
            let (near, far) = dynamic_cascade_slice(i);
            let corners = scene.camera.world_corners_for_slice(near, far);
            let (proj, view) = build_sun_ortho(sun_dir, &corners, self.map_size, max_shadowing_dist);
            dynamic_tex[i as usize] =
                cascade_bias_matrix(i, self.num_dynamic) * proj * view;

            let volume = scene.camera.shadow_volume(sun_dir, max_shadowing_dist, far);
            let slice_width = (far - near).max(1.0);

            self.batch_scratch.clear();
            enumerate_batches(
                &scene.objects,
                scene.object_set.iter(),
                meshes,
                CullTest::Volume(&volume),
                BatchSource::Depth,
                &BatchFilter::opaque(),
                &EnumerationExtras {
                    min_longest_side: slice_width * SMALL_CASTER_FRAC,
                    subset: None,
                    max_dist: None,
                },
                &mut self.batch_scratch,
                stats,
            );
            radix_sort_batches(&mut self.batch_scratch, &mut self.sort_scratch);

            let mut prepared = PreparedSceneDraw::default();
            build_draw_list(
                &self.batch_scratch,
                BatchSource::Depth,
                &scene.objects,
                frame_data.indices_rows.len() as u32,
                &mut prepared.list,
                stats,
            );
            prepared.append_to_frame(frame_data);
            prepared.resolve_pipelines(
                device,
                programs,
                meshes,
                |_| Self::depth_pipe_state(),
                None,
                &frame_data.layout,
                &material_textures.layout,
                None,
            );
            frame_data.write_shadow_view(
                queue,
                Self::dynamic_view_index(i),
                proj,
                view,
                base_uniforms,
            );
            self.dynamic_proj_view.push((proj, view));
            self.dynamic_draws.push(prepared);
        }

        // ---- Static cascade for this frame ----
        let (cascade, subset) = static_update_phase(frame);
        self.static_cascade_this_frame = cascade;
        self.static_clear_this_frame = subset == 0;

        if subset == 0 {
            // Snapshot: quantised camera position becomes the volume centre.
            let centre = quantise_centre(scene.camera.position());
            let half_w = STATIC_BASE_HALF_W * 4f32.powi(cascade as i32);
            let eye = centre + sun_dir * max_shadowing_dist;
            let up = if sun_dir.z.abs() > 0.99 { Vec3::X } else { Vec3::Z };
            let view = Mat4::look_at_rh(eye, centre, up);
            let proj = Mat4::orthographic_rh(
                -half_w,
                half_w,
                -half_w,
                half_w,
                0.0,
                2.0 * max_shadowing_dist + half_w,
            );
            self.static_proj_view_other[cascade as usize] = (proj, view);
            self.static_matrices_other[cascade as usize] =
                cascade_bias_matrix(cascade, NUM_STATIC_CASCADES as u32) * proj * view;
        }

        let (proj, view) = self.static_proj_view_other[cascade as usize];
        let volume_aabb = {
            // Inverse of the ortho volume: centre ± half extents in world
            // space via the view inverse.
            let inv = (proj * view).inverse();
            let mut aabb = crate::scene::bounds::Aabb::EMPTY;
            for z in [0.0f32, 1.0] {
                for y in [-1.0f32, 1.0] {
                    for x in [-1.0f32, 1.0] {
                        let p = inv.project_point3(Vec3::new(x, y, z));
                        aabb.enlarge_to_include_point(p);
                    }
                }
            }
            aabb
        };

        self.batch_scratch.clear();
        let static_frustum = crate::scene::camera::Frustum::from_view_projection(
            proj * view,
            true,
            None,
            volume_aabb,
        );
        enumerate_batches(
            &scene.objects,
            scene.object_set.iter(),
            meshes,
            CullTest::Frustum(&static_frustum),
            BatchSource::Depth,
            &BatchFilter::opaque(),
            &EnumerationExtras {
                min_longest_side: 0.0,
                subset: Some(subset),
                max_dist: None,
            },
            &mut self.batch_scratch,
            stats,
        );
        radix_sort_batches(&mut self.batch_scratch, &mut self.sort_scratch);

        self.static_draw = PreparedSceneDraw::default();
        build_draw_list(
            &self.batch_scratch,
            BatchSource::Depth,
            &scene.objects,
            frame_data.indices_rows.len() as u32,
            &mut self.static_draw.list,
            stats,
        );
        self.static_draw.append_to_frame(frame_data);
        self.static_draw.resolve_pipelines(
            device,
            programs,
            meshes,
            |_| Self::depth_pipe_state(),
            None,
            &frame_data.layout,
            &material_textures.layout,
            None,
        );
        frame_data.write_shadow_view(queue, self.static_view_index(), proj, view, base_uniforms);

        // ---- Lit-pass uniforms (sampling the *current* static stack) ----
        let mut static_tex = [Mat4::IDENTITY; 4];
        static_tex[..NUM_STATIC_CASCADES].copy_from_slice(&self.static_matrices_current);
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&ShadowMatrixUniforms {
                dynamic_tex_matrix: dynamic_tex,
                static_tex_matrix: static_tex,
                num_dynamic_cascades: self.num_dynamic,
                num_static_cascades: NUM_STATIC_CASCADES as u32,
                padding_s0: 0,
                padding_s1: 0,
            }),
        );

        self.ensure_clear_pipeline(device);
    }

    fn depth_pipe_state() -> ScenePipeState {
        ScenePipeState {
            pass_label: "Shadow Depth Pass",
            colour_targets: Vec::new(),
            depth: Some((DEPTH_FORMAT, true, wgpu::CompareFunction::LessEqual)),
            cull: crate::renderer::draw::FaceCull::Back,
            vertex_hash: 0,
            uses_pass_resources: false,
            depth_bias: 2,
        }
    }

    fn ensure_clear_pipeline(&mut self, device: &wgpu::Device) {
        if self.clear_pipeline.is_some() {
            return;
        }
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("clear_depth_slice"),
            source: wgpu::ShaderSource::Wgsl(CLEAR_DEPTH_WGSL.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Clear Depth Layout"),
            bind_group_layouts: &[],
            immediate_size: 0,
        });
        self.clear_pipeline = Some(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Clear Depth Slice"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: Some(true),
                depth_compare: Some(wgpu::CompareFunction::Always),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        }));
    }

    // ------------------------------------------------------------------------
    // Encode
    // ------------------------------------------------------------------------

    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame_data: &FrameData,
        meshes: &MeshStore,
        material_textures: &MaterialTextures,
        use_mdi: bool,
        stats: &mut FrameStats,
    ) {
        let indirect = frame_data.draw_commands.buffer();

        // Dynamic stack: one pass, cleared whole, one viewport per cascade.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Dynamic Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.dynamic_stack.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for (i, prepared) in self.dynamic_draws.iter().enumerate() {
                let Some(bind_group) = frame_data.shadow_bind_group(Self::dynamic_view_index(i as u32))
                else {
                    continue;
                };
                pass.set_viewport(
                    0.0,
                    (i as u32 * self.map_size) as f32,
                    self.map_size as f32,
                    self.map_size as f32,
                    0.0,
                    1.0,
                );
                prepared.encode(
                    &mut pass,
                    meshes,
                    bind_group,
                    &material_textures.bind_group,
                    None,
                    indirect,
                    use_mdi,
                    stats,
                );
            }
        }

        // Static stack: draw into the *other* texture only.
        {
            let other = &self.static_stacks[1 - self.cur_static];
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Static Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &other.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_viewport(
                0.0,
                (self.static_cascade_this_frame * self.map_size) as f32,
                self.map_size as f32,
                self.map_size as f32,
                0.0,
                1.0,
            );

            if self.static_clear_this_frame
                && let Some(clear) = &self.clear_pipeline
            {
                pass.set_pipeline(clear);
                pass.draw(0..3, 0..1);
            }

            if let Some(bind_group) = frame_data.shadow_bind_group(self.static_view_index()) {
                self.static_draw.encode(
                    &mut pass,
                    meshes,
                    bind_group,
                    &material_textures.bind_group,
                    None,
                    indirect,
                    use_mdi,
                    stats,
                );
            }
        }
    }

    /// Frame-end bookkeeping: after the 12th stagger frame the freshly
    /// rebuilt stack becomes current.
    pub fn end_frame(&mut self, frame: u64) {
        if frame % STATIC_UPDATE_PERIOD == STATIC_UPDATE_PERIOD - 1 {
            self.cur_static = 1 - self.cur_static;
            self.static_matrices_current = self.static_matrices_other;
        }
    }

    /// Builds the group-2 bind group the lit passes use this frame; the
    /// sampled static stack is always the *current* one.
    pub fn rebuild_lit_bind_group(
        &mut self,
        device: &wgpu::Device,
        targets: &RenderTargets,
    ) {
        self.lit_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lit Pass Resources"),
            layout: &self.lit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.dynamic_stack.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        &self.static_stacks[self.cur_static].view,
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.comparison_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&targets.blurred_ssao.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
            ],
        }));
    }

    #[must_use]
    pub fn lit_bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.lit_bind_group.as_ref()
    }
}
