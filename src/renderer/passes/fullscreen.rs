//! Fullscreen-triangle pass helper.
//!
//! The SSAO, outline and post-process passes are all "sample some textures,
//! write one target" fragment passes. This helper owns the layouts,
//! pipelines and bind-group plumbing so each pass supplies only its WGSL
//! fragment body, its input views, and an optional uniform buffer.

use rustc_hash::FxHashMap;

use crate::renderer::passes::common::BlendKind;
use crate::renderer::programs::fx_hash_key;
use crate::renderer::shaders::FULLSCREEN_VERT;

/// Kind of each sampled input; depth textures bind differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Float,
    Depth,
}

#[derive(Clone, Copy)]
pub struct FullscreenInput<'a> {
    pub view: &'a wgpu::TextureView,
    pub kind: InputKind,
}

/// Description of one fullscreen dispatch.
pub struct FullscreenDraw<'a> {
    pub label: &'static str,
    /// Fragment body; `fs_main(in: FsOut)` sampling `input0..inputN` with
    /// `input_sampler`, plus `uniforms` when a uniform buffer is given.
    pub wgsl: &'static str,
    pub inputs: &'a [FullscreenInput<'a>],
    pub uniform: Option<&'a wgpu::Buffer>,
    /// One or two colour targets, all sharing `blend`.
    pub targets: &'a [(&'a wgpu::TextureView, wgpu::TextureFormat)],
    pub blend: BlendKind,
    /// Restrict the draw to a viewport `(x, y, w, h)`.
    pub viewport: Option<(f32, f32, f32, f32)>,
}

#[derive(PartialEq, Eq, Hash)]
struct LayoutKey {
    kinds: Vec<InputKind>,
    has_uniform: bool,
}

pub struct FullscreenHelper {
    sampler: wgpu::Sampler,
    layouts: FxHashMap<u64, wgpu::BindGroupLayout>,
    pipelines: FxHashMap<u64, wgpu::RenderPipeline>,
}

impl FullscreenHelper {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("fullscreen_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            sampler,
            layouts: FxHashMap::default(),
            pipelines: FxHashMap::default(),
        }
    }

    fn layout_for(
        &mut self,
        device: &wgpu::Device,
        kinds: &[InputKind],
        has_uniform: bool,
    ) -> &wgpu::BindGroupLayout {
        let key = fx_hash_key(&LayoutKey {
            kinds: kinds.to_vec(),
            has_uniform,
        });
        self.layouts.entry(key).or_insert_with(|| {
            let mut entries = Vec::new();
            for (i, kind) in kinds.iter().enumerate() {
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: i as u32,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: match kind {
                            InputKind::Float => {
                                wgpu::TextureSampleType::Float { filterable: true }
                            }
                            InputKind::Depth => wgpu::TextureSampleType::Depth,
                        },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                });
            }
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: kinds.len() as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
            if has_uniform {
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: kinds.len() as u32 + 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                });
            }
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Fullscreen Pass Layout"),
                entries: &entries,
            })
        })
    }

    /// Encodes one fullscreen draw as its own render pass.
    pub fn run(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        draw: &FullscreenDraw<'_>,
    ) {
        let kinds: Vec<InputKind> = draw.inputs.iter().map(|i| i.kind).collect();
        let has_uniform = draw.uniform.is_some();

        // Pipeline lookup by (shader identity, target state).
        let target_formats: Vec<wgpu::TextureFormat> =
            draw.targets.iter().map(|(_, f)| *f).collect();
        let pipe_key = fx_hash_key(&(
            draw.label,
            draw.wgsl.as_ptr() as usize,
            &target_formats,
            draw.blend,
            &kinds,
            has_uniform,
        ));
        if !self.pipelines.contains_key(&pipe_key) {
            let layout = self.layout_for(device, &kinds, has_uniform);
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(draw.label),
                bind_group_layouts: &[Some(layout)],
                immediate_size: 0,
            });

            let mut source = String::with_capacity(draw.wgsl.len() + 1024);
            source.push_str(FULLSCREEN_VERT);
            for (i, kind) in kinds.iter().enumerate() {
                let ty = match kind {
                    InputKind::Float => "texture_2d<f32>",
                    InputKind::Depth => "texture_depth_2d",
                };
                source.push_str(&format!(
                    "@group(0) @binding({i}) var input{i}: {ty};\n"
                ));
            }
            source.push_str(&format!(
                "@group(0) @binding({}) var input_sampler: sampler;\n",
                kinds.len()
            ));
            source.push_str(draw.wgsl);

            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(draw.label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(draw.label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    targets: &target_formats
                        .iter()
                        .map(|format| {
                            Some(wgpu::ColorTargetState {
                                format: *format,
                                blend: draw.blend.as_wgpu(),
                                write_mask: wgpu::ColorWrites::ALL,
                            })
                        })
                        .collect::<Vec<_>>(),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
            self.pipelines.insert(pipe_key, pipeline);
        }

        let layout = self.layout_for(device, &kinds, has_uniform).clone();
        let mut entries: Vec<wgpu::BindGroupEntry> = draw
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(input.view),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: kinds.len() as u32,
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        });
        if let Some(uniform) = draw.uniform {
            entries.push(wgpu::BindGroupEntry {
                binding: kinds.len() as u32 + 1,
                resource: uniform.as_entire_binding(),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(draw.label),
            layout: &layout,
            entries: &entries,
        });

        let pipeline = &self.pipelines[&pipe_key];
        let colour_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = draw
            .targets
            .iter()
            .map(|(view, _)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(draw.label),
            color_attachments: &colour_attachments,
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        if let Some((x, y, w, h)) = draw.viewport {
            pass.set_viewport(x, y, w, h, 0.0, 1.0);
        }
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
