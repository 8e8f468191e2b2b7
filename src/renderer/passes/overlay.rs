//! 2D overlay pass.
//!
//! Overlays draw after the post-process chain, straight into the final
//! target. They are sorted by their Z translation in descending order
//! (painter's algorithm) and blended so RGB composites as normal alpha-over
//! while destination alpha accumulates toward 1 — which matters when the
//! final framebuffer is itself composited over an external surface.
//!
//! Per-overlay data goes through one dynamic-offset uniform buffer that
//! grows by doubling, one 256-byte slot per overlay.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::scene::overlay::OverlayObject;

const OVERLAY_WGSL: &str = "
struct OverlayUniforms {
    transform_col0: vec4<f32>,
    transform_col1: vec4<f32>,
    transform_col2: vec4<f32>,
    colour: vec4<f32>,
    flags: vec4<f32>,
};

@group(0) @binding(0) var<uniform> overlay: OverlayUniforms;
@group(0) @binding(1) var overlay_tex: texture_2d<f32>;
@group(0) @binding(2) var overlay_sampler: sampler;

struct VsOut {
    @builtin(position) clip_pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VsOut {
    // Unit quad as two triangles.
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(0.0, 1.0),
    );
    let corner = corners[vi];
    let m = mat3x3<f32>(
        overlay.transform_col0.xyz,
        overlay.transform_col1.xyz,
        overlay.transform_col2.xyz,
    );
    let p = m * vec3<f32>(corner, 1.0);

    var out: VsOut;
    out.clip_pos = vec4<f32>(p.xy, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    var colour = overlay.colour;
    if (overlay.flags.x > 0.5) {
        let tex = textureSample(overlay_tex, overlay_sampler, in.uv);
        if (overlay.flags.y > 0.5) {
            // SDF text: the texture holds a signed distance in the alpha
            // channel.
            let dist = tex.a;
            let aa = fwidth(dist);
            colour.a = colour.a * smoothstep(0.5 - aa, 0.5 + aa, dist);
        } else {
            colour = colour * tex;
        }
    }
    return colour;
}
";

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct OverlayUniforms {
    transform_col0: Vec4,
    transform_col1: Vec4,
    transform_col2: Vec4,
    colour: Vec4,
    /// x = has texture, y = is SDF text.
    flags: Vec4,
}

const SLOT_STRIDE: u64 = 256;

pub struct OverlayPass {
    layout: wgpu::BindGroupLayout,
    pipeline: Option<wgpu::RenderPipeline>,
    pipeline_format: Option<wgpu::TextureFormat>,
    buffer: wgpu::Buffer,
    capacity: u32,
    bind_group: wgpu::BindGroup,
    _white_tex: wgpu::Texture,
    white_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    /// Per-overlay (dynamic offset, scissor rect) resolved at prepare.
    draws: Vec<(u32, Option<(u32, u32, u32, u32)>)>,
}

impl OverlayPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Overlay Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            size_of::<OverlayUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let white_tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("overlay_white"),
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
                texture: &white_tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255, 255, 255, 255],
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
        let white_view = white_tex.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("overlay_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let capacity = 64;
        let buffer = Self::make_buffer(device, capacity);
        let bind_group = Self::make_bind_group(device, &layout, &buffer, &white_view, &sampler);

        Self {
            layout,
            pipeline: None,
            pipeline_format: None,
            buffer,
            capacity,
            bind_group,
            _white_tex: white_tex,
            white_view,
            sampler,
            draws: Vec::new(),
        }
    }

    fn make_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("overlay_uniforms"),
            size: SLOT_STRIDE * u64::from(capacity),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn make_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
        white_view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overlay BindGroup"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(size_of::<OverlayUniforms>() as u64),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(white_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) {
        if self.pipeline.is_some() && self.pipeline_format == Some(format) {
            return;
        }
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("overlay"),
            source: wgpu::ShaderSource::Wgsl(OVERLAY_WGSL.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Overlay Pipeline Layout"),
            bind_group_layouts: &[Some(&self.layout)],
            immediate_size: 0,
        });
        self.pipeline = Some(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Overlay Pipeline"),
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
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: crate::renderer::passes::common::BlendKind::OverlayPremultipliedAlpha
                        .as_wgpu(),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        }));
        self.pipeline_format = Some(format);
    }

    /// Sorts overlays back-to-front by Z and uploads their uniform slots.
    pub fn prepare<'a>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        overlays: impl Iterator<Item = &'a OverlayObject>,
        viewport: (u32, u32),
    ) {
        let mut sorted: Vec<&OverlayObject> = overlays.collect();
        // Painter's algorithm: larger Z first.
        sorted.sort_by(|a, b| b.z.total_cmp(&a.z));

        let needed = sorted.len() as u32;
        if needed > self.capacity {
            let mut capacity = self.capacity.max(1);
            while capacity < needed {
                capacity *= 2;
            }
            log::info!(
                "Expanding overlay uniform buffer: {} -> {capacity} slots",
                self.capacity
            );
            self.buffer = Self::make_buffer(device, capacity);
            self.bind_group = Self::make_bind_group(
                device,
                &self.layout,
                &self.buffer,
                &self.white_view,
                &self.sampler,
            );
            self.capacity = capacity;
        }

        self.draws.clear();
        let mut staging = vec![0u8; SLOT_STRIDE as usize * sorted.len()];
        for (i, overlay) in sorted.iter().enumerate() {
            let m = overlay.transform;
            let uniforms = OverlayUniforms {
                transform_col0: Vec4::new(m.x_axis.x, m.x_axis.y, m.x_axis.z, 0.0),
                transform_col1: Vec4::new(m.y_axis.x, m.y_axis.y, m.y_axis.z, 0.0),
                transform_col2: Vec4::new(m.z_axis.x, m.z_axis.y, m.z_axis.z, 0.0),
                colour: overlay.colour,
                flags: Vec4::new(
                    f32::from(overlay.texture.is_some()),
                    f32::from(overlay.is_sdf_text),
                    0.0,
                    0.0,
                ),
            };
            let offset = i * SLOT_STRIDE as usize;
            staging[offset..offset + size_of::<OverlayUniforms>()]
                .copy_from_slice(bytemuck::bytes_of(&uniforms));

            // Clip rect from clip space to pixels.
            let scissor = overlay.clip_rect.map(|(min, max)| {
                let (w, h) = (viewport.0 as f32, viewport.1 as f32);
                let x0 = ((min.x * 0.5 + 0.5) * w).clamp(0.0, w) as u32;
                let y0 = (((-max.y) * 0.5 + 0.5) * h).clamp(0.0, h) as u32;
                let x1 = ((max.x * 0.5 + 0.5) * w).clamp(0.0, w) as u32;
                let y1 = (((-min.y) * 0.5 + 0.5) * h).clamp(0.0, h) as u32;
                (x0, y0, x1.saturating_sub(x0).max(1), y1.saturating_sub(y0).max(1))
            });
            self.draws.push(((i as u32) * SLOT_STRIDE as u32, scissor));
        }
        if !staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &staging);
        }
    }

    /// Draws the prepared overlays into `target`.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        viewport: (u32, u32),
    ) {
        if self.draws.is_empty() {
            return;
        }
        self.ensure_pipeline(device, format);
        let Some(pipeline) = &self.pipeline else { return };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Overlay Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(pipeline);
        for (offset, scissor) in &self.draws {
            match scissor {
                Some((x, y, w, h)) => pass.set_scissor_rect(*x, *y, *w, *h),
                None => pass.set_scissor_rect(0, 0, viewport.0, viewport.1),
            }
            pass.set_bind_group(0, &self.bind_group, &[*offset]);
            pass.draw(0..6, 0..1);
        }
    }
}
