//! Shared pass plumbing.
//!
//! Scene-geometry passes all follow the same shape: enumerate batches, sort,
//! coalesce into a [`DrawList`], resolve one pipeline per run at prepare
//! time, then encode the runs — one multi-draw-indirect call per run when
//! the feature is present, a loop of direct draws otherwise. The per-draw
//! indirection row is addressed by the draw's base instance in both paths.

use crate::renderer::draw::{DrawList, FaceCull, FrameStats};
use crate::renderer::frame_data::FrameData;
use crate::renderer::programs::{ProgramCache, ProgramIndex, fx_hash_key};
use crate::resources::mesh::{MeshStore, VertexSpec};

// ============================================================================
// Material textures (group 1)
// ============================================================================

/// Group-1 resources: the material texture slots at their fixed bindings,
/// backed by 1×1 placeholder textures until the residency cache supplies
/// real ones.
pub struct MaterialTextures {
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    _white: wgpu::Texture,
    _flat_normal: wgpu::Texture,
}

impl MaterialTextures {
    #[must_use]
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let make_1x1 = |label: &str, data: [u8; 4]| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4),
                    rows_per_image: None,
                },
                wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
            );
            texture
        };

        let white = make_1x1("dummy_white", [255, 255, 255, 255]);
        let flat_normal = make_1x1("dummy_flat_normal", [128, 128, 255, 255]);
        let white_view = white.create_view(&wgpu::TextureViewDescriptor::default());
        let normal_view = flat_normal.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            anisotropy_clamp: 16,
            ..Default::default()
        });

        let tex_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Textures Layout"),
            entries: &[
                tex_entry(0),
                tex_entry(1),
                tex_entry(2),
                tex_entry(3),
                tex_entry(4),
                tex_entry(5),
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Textures BindGroup"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&white_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&white_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&white_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&normal_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&white_view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&white_view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        Self {
            layout,
            bind_group,
            _white: white,
            _flat_normal: flat_normal,
        }
    }
}

// ============================================================================
// Scene pipeline state
// ============================================================================

/// Blend mirror that hashes (wgpu::BlendState is not Hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendKind {
    None,
    AlphaOver,
    /// Premultiplied additive accumulation (OIT accumulation target).
    Additive,
    /// `dst * src` (OIT transmittance target).
    Multiply,
    /// Blend-constant alpha; the always-visible ghost draw sets the
    /// constant to 0.5.
    ConstantAlpha,
    /// RGB blends as alpha-over while destination alpha saturates toward 1
    /// (overlay pass over external surfaces).
    OverlayPremultipliedAlpha,
}

impl BlendKind {
    #[must_use]
    pub fn as_wgpu(self) -> Option<wgpu::BlendState> {
        match self {
            Self::None => None,
            Self::AlphaOver => Some(wgpu::BlendState::ALPHA_BLENDING),
            Self::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            Self::Multiply => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Zero,
                    dst_factor: wgpu::BlendFactor::Src,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Zero,
                    dst_factor: wgpu::BlendFactor::Src,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            Self::ConstantAlpha => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Constant,
                    dst_factor: wgpu::BlendFactor::OneMinusConstant,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Constant,
                    dst_factor: wgpu::BlendFactor::OneMinusConstant,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            Self::OverlayPremultipliedAlpha => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
        }
    }
}

/// Hashable render-state description for a scene-geometry pipeline.
/// The `bool` in each colour target disables writes (used where a pass
/// shares attachments but must leave one untouched, e.g. decals and the
/// normal attachment).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScenePipeState {
    pub pass_label: &'static str,
    pub colour_targets: Vec<(wgpu::TextureFormat, BlendKind, bool)>,
    pub depth: Option<(wgpu::TextureFormat, bool, wgpu::CompareFunction)>,
    pub cull: FaceCull,
    pub vertex_hash: u64,
    pub uses_pass_resources: bool,
    pub depth_bias: i32,
}

/// Hashes a vertex spec for pipeline-state keying.
#[must_use]
pub fn vertex_spec_hash(spec: &VertexSpec) -> u64 {
    #[derive(Hash)]
    struct Mirror<'a> {
        stride: u32,
        attrs: Vec<(u32, &'a wgpu::VertexFormat, u32)>,
    }
    fx_hash_key(&Mirror {
        stride: spec.stride,
        attrs: spec
            .attributes
            .iter()
            .map(|a| (a.shader_location, &a.format, a.offset))
            .collect(),
    })
}

fn vertex_layout<'a>(
    spec: &VertexSpec,
    attrs_scratch: &'a mut Vec<wgpu::VertexAttribute>,
) -> wgpu::VertexBufferLayout<'a> {
    attrs_scratch.clear();
    attrs_scratch.extend(spec.attributes.iter().map(|a| wgpu::VertexAttribute {
        format: a.format,
        offset: u64::from(a.offset),
        shader_location: a.shader_location,
    }));
    wgpu::VertexBufferLayout {
        array_stride: u64::from(spec.stride),
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: attrs_scratch,
    }
}

/// Looks up or creates the pipeline for one draw run.
pub fn scene_pipeline(
    device: &wgpu::Device,
    programs: &mut ProgramCache,
    program_index: ProgramIndex,
    state: &ScenePipeState,
    vertex_spec: &VertexSpec,
    frame_layout: &wgpu::BindGroupLayout,
    material_layout: &wgpu::BindGroupLayout,
    pass_layout: Option<&wgpu::BindGroupLayout>,
) -> Option<wgpu::RenderPipeline> {
    let hash = fx_hash_key(state);
    programs
        .get_or_create_pipeline(program_index, hash, |module| {
            let mut group_layouts: Vec<Option<&wgpu::BindGroupLayout>> =
                vec![Some(frame_layout), Some(material_layout)];
            if state.uses_pass_resources
                && let Some(pl) = pass_layout
            {
                group_layouts.push(Some(pl));
            }
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(state.pass_label),
                bind_group_layouts: &group_layouts,
                immediate_size: 0,
            });

            let colour_targets: Vec<Option<wgpu::ColorTargetState>> = state
                .colour_targets
                .iter()
                .map(|(format, blend, write)| {
                    Some(wgpu::ColorTargetState {
                        format: *format,
                        blend: blend.as_wgpu(),
                        write_mask: if *write {
                            wgpu::ColorWrites::ALL
                        } else {
                            wgpu::ColorWrites::empty()
                        },
                    })
                })
                .collect();

            let mut attrs_scratch = Vec::new();
            let vb = vertex_layout(vertex_spec, &mut attrs_scratch);

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(state.pass_label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    buffers: &[vb],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some("fs_main"),
                    targets: &colour_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: state.cull.as_wgpu(),
                    ..Default::default()
                },
                depth_stencil: state.depth.map(|(format, write, compare)| {
                    wgpu::DepthStencilState {
                        format,
                        depth_write_enabled: Some(write),
                        depth_compare: Some(compare),
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState {
                            constant: state.depth_bias,
                            slope_scale: if state.depth_bias != 0 { 2.0 } else { 0.0 },
                            clamp: 0.0,
                        },
                    }
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        })
        .cloned()
}

// ============================================================================
// Prepared scene draws
// ============================================================================

/// A pass's prepared output: its draw list, the pipeline per run, and where
/// its commands landed in the frame-global command buffer.
#[derive(Default)]
pub struct PreparedSceneDraw {
    pub list: DrawList,
    pub pipelines: Vec<Option<wgpu::RenderPipeline>>,
    pub global_cmd_base: u32,
}

impl PreparedSceneDraw {
    /// Appends the list's commands and indirection rows to the frame-global
    /// arrays; must be called before [`FrameData::sync_and_rebind`].
    pub fn append_to_frame(&mut self, frame_data: &mut FrameData) {
        self.global_cmd_base = frame_data.draw_commands.len() as u32;
        for cmd in &self.list.commands {
            frame_data.draw_commands.push(*cmd);
        }
        for row in &self.list.indices_rows {
            frame_data.indices_rows.push(*row);
        }
    }

    /// Resolves pipelines for every run. `program_override` substitutes a
    /// fixed program for the records' own (the outline pass draws ordinary
    /// records with the flat-colour program).
    pub fn resolve_pipelines(
        &mut self,
        device: &wgpu::Device,
        programs: &mut ProgramCache,
        meshes: &MeshStore,
        state_for_run: impl Fn(&crate::renderer::draw::DrawRun) -> ScenePipeState,
        program_override: Option<ProgramIndex>,
        frame_layout: &wgpu::BindGroupLayout,
        material_layout: &wgpu::BindGroupLayout,
        pass_layout: Option<&wgpu::BindGroupLayout>,
    ) {
        self.pipelines.clear();
        for run in &self.list.runs {
            let Some(mesh) = meshes.get(run.mesh) else {
                self.pipelines.push(None);
                continue;
            };
            let mut state = state_for_run(run);
            state.vertex_hash = vertex_spec_hash(&mesh.vertex_spec);
            state.cull = run.cull;
            self.pipelines.push(scene_pipeline(
                device,
                programs,
                program_override.unwrap_or(run.program_index),
                &state,
                &mesh.vertex_spec,
                frame_layout,
                material_layout,
                pass_layout,
            ));
        }
    }

    /// Encodes every run into `pass`.
    pub fn encode(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        meshes: &MeshStore,
        frame_bind_group: &wgpu::BindGroup,
        material_bind_group: &wgpu::BindGroup,
        pass_bind_group: Option<&wgpu::BindGroup>,
        indirect_buffer: Option<&wgpu::Buffer>,
        use_mdi: bool,
        stats: &mut FrameStats,
    ) {
        pass.set_bind_group(0, frame_bind_group, &[]);
        pass.set_bind_group(1, material_bind_group, &[]);
        if let Some(bg) = pass_bind_group {
            pass.set_bind_group(2, bg, &[]);
        }

        for (run, pipeline) in self.list.runs.iter().zip(&self.pipelines) {
            let Some(pipeline) = pipeline else { continue };
            let Some(mesh) = meshes.get(run.mesh) else {
                continue;
            };
            let Some(gpu) = &mesh.gpu else { continue };

            pass.set_pipeline(pipeline);
            pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
            pass.set_index_buffer(gpu.index_buffer.slice(..), run.index_type.as_wgpu());

            if use_mdi && let Some(indirect) = indirect_buffer {
                let offset = u64::from(self.global_cmd_base + run.cmd_start)
                    * size_of::<crate::renderer::buffers::DrawCommand>() as u64;
                pass.multi_draw_indexed_indirect(indirect, offset, run.cmd_count);
                stats.num_multi_draw_calls += 1;
            } else {
                let cmds = &self.list.commands
                    [run.cmd_start as usize..(run.cmd_start + run.cmd_count) as usize];
                for cmd in cmds {
                    pass.draw_indexed(
                        cmd.first_index..cmd.first_index + cmd.count,
                        cmd.base_vertex,
                        cmd.base_instance..cmd.base_instance + cmd.instance_count,
                    );
                }
            }
        }
    }
}
