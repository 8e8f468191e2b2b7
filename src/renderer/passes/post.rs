//! Post-process chain: OIT composite → depth-of-field → bloom → final
//! imaging.
//!
//! Each stage reads the previous stage's colour; the chain ping-pongs
//! between the two post buffers and finally resolves into the caller's
//! target (the surface, or a user framebuffer). Intermediates live in
//! [`RenderTargets`] and are only reallocated on viewport change.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::renderer::passes::common::BlendKind;
use crate::renderer::passes::fullscreen::{
    FullscreenDraw, FullscreenHelper, FullscreenInput, InputKind,
};
use crate::renderer::targets::{HDR_FORMAT, RenderTargets};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DofUniforms {
    /// x = focus distance, y = blur strength, z = near clip, w unused.
    params: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FinalUniforms {
    /// x = bloom strength, y = exposure, z = saturation, w unused.
    params: Vec4,
}

const OIT_COMPOSITE_WGSL: &str = "
@fragment
fn fs_main(in: FsOut) -> @location(0) vec4<f32> {
    let scene = textureSampleLevel(input0, input_sampler, in.uv, 0.0);
    let accum = textureSampleLevel(input1, input_sampler, in.uv, 0.0);
    let transmittance = textureSampleLevel(input2, input_sampler, in.uv, 0.0);

    let reveal = clamp(transmittance.a, 0.0, 1.0);
    let avg_colour = accum.rgb / max(accum.a, 1e-5);
    return vec4<f32>(scene.rgb * reveal + avg_colour * (1.0 - reveal), scene.a);
}
";

const DOF_BLUR_WGSL: &str = "
struct DofUniforms {
    params: vec4<f32>,
};
@group(0) @binding(3) var<uniform> uniforms: DofUniforms;

const NUM_TAPS: u32 = 16u;

fn linear_depth(d: f32) -> f32 {
    // Reverse-Z infinite perspective: z_view = near / depth.
    return uniforms.params.z / max(d, 1e-6);
}

@fragment
fn fs_main(in: FsOut) -> @location(0) vec4<f32> {
    let focus = uniforms.params.x;
    let strength = uniforms.params.y;

    let centre_depth = linear_depth(textureSampleLevel(input1, input_sampler, in.uv, 0.0));
    let coc = clamp(abs(centre_depth - focus) / max(focus, 1e-3), 0.0, 1.0) * strength;

    let dims = vec2<f32>(textureDimensions(input0));
    var sum = textureSampleLevel(input0, input_sampler, in.uv, 0.0).rgb;
    var count = 1.0;
    for (var i = 0u; i < NUM_TAPS; i = i + 1u) {
        let angle = f32(i) * 2.39996;
        let r = sqrt((f32(i) + 0.5) / f32(NUM_TAPS));
        let offset = vec2<f32>(cos(angle), sin(angle)) * r * coc * 16.0 / dims;
        sum = sum + textureSampleLevel(input0, input_sampler, in.uv + offset, 0.0).rgb;
        count = count + 1.0;
    }
    return vec4<f32>(sum / count, 1.0);
}
";

/// 4-tap gather downsize into the next half-size level.
const DOWNSIZE_WGSL: &str = "
@fragment
fn fs_main(in: FsOut) -> @location(0) vec4<f32> {
    let texel = 1.0 / vec2<f32>(textureDimensions(input0));
    let a = textureSampleLevel(input0, input_sampler, in.uv + texel * vec2<f32>(-0.5, -0.5), 0.0);
    let b = textureSampleLevel(input0, input_sampler, in.uv + texel * vec2<f32>(0.5, -0.5), 0.0);
    let c = textureSampleLevel(input0, input_sampler, in.uv + texel * vec2<f32>(-0.5, 0.5), 0.0);
    let d = textureSampleLevel(input0, input_sampler, in.uv + texel * vec2<f32>(0.5, 0.5), 0.0);
    return (a + b + c + d) * 0.25;
}
";

const GAUSSIAN_X_WGSL: &str = "
@fragment
fn fs_main(in: FsOut) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let texel = 1.0 / vec2<f32>(textureDimensions(input0));
    var sum = textureSampleLevel(input0, input_sampler, in.uv, 0.0) * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = vec2<f32>(texel.x * f32(i), 0.0);
        sum = sum + textureSampleLevel(input0, input_sampler, in.uv + offset, 0.0) * weights[i];
        sum = sum + textureSampleLevel(input0, input_sampler, in.uv - offset, 0.0) * weights[i];
    }
    return sum;
}
";

const GAUSSIAN_Y_WGSL: &str = "
@fragment
fn fs_main(in: FsOut) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let texel = 1.0 / vec2<f32>(textureDimensions(input0));
    var sum = textureSampleLevel(input0, input_sampler, in.uv, 0.0) * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = vec2<f32>(0.0, texel.y * f32(i));
        sum = sum + textureSampleLevel(input0, input_sampler, in.uv + offset, 0.0) * weights[i];
        sum = sum + textureSampleLevel(input0, input_sampler, in.uv - offset, 0.0) * weights[i];
    }
    return sum;
}
";

/// Final imaging: tone map + bloom sum + exposure + saturation.
/// Inputs: 0 = pre-bloom colour, 1..=8 = the bloom blur levels.
const FINAL_IMAGING_WGSL: &str = "
struct FinalUniforms {
    params: vec4<f32>,
};
@group(0) @binding(10) var<uniform> uniforms: FinalUniforms;

fn sample_bloom(uv: vec2<f32>) -> vec3<f32> {
    var bloom = textureSampleLevel(input1, input_sampler, uv, 0.0).rgb;
    bloom = bloom + textureSampleLevel(input2, input_sampler, uv, 0.0).rgb;
    bloom = bloom + textureSampleLevel(input3, input_sampler, uv, 0.0).rgb;
    bloom = bloom + textureSampleLevel(input4, input_sampler, uv, 0.0).rgb;
    bloom = bloom + textureSampleLevel(input5, input_sampler, uv, 0.0).rgb;
    bloom = bloom + textureSampleLevel(input6, input_sampler, uv, 0.0).rgb;
    bloom = bloom + textureSampleLevel(input7, input_sampler, uv, 0.0).rgb;
    bloom = bloom + textureSampleLevel(input8, input_sampler, uv, 0.0).rgb;
    return bloom / 8.0;
}

@fragment
fn fs_main(in: FsOut) -> @location(0) vec4<f32> {
    let bloom_strength = uniforms.params.x;
    let exposure = uniforms.params.y;
    let saturation = uniforms.params.z;

    var colour = textureSampleLevel(input0, input_sampler, in.uv, 0.0).rgb;
    colour = colour + sample_bloom(in.uv) * bloom_strength;
    colour = colour * exposure;

    let grey = dot(colour, vec3<f32>(0.2126, 0.7152, 0.0722));
    colour = mix(vec3<f32>(grey), colour, saturation);

    // Map to the display transfer function; highlights clamp rather than
    // roll off so a frame with default knobs reproduces its inputs.
    colour = clamp(pow(colour, vec3<f32>(1.0 / 2.2)), vec3<f32>(0.0), vec3<f32>(1.0));
    return vec4<f32>(colour, 1.0);
}
";

pub struct PostChain {
    dof_uniforms: wgpu::Buffer,
    final_uniforms: wgpu::Buffer,
}

impl PostChain {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let make = |label: &str, size: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            dof_uniforms: make("DofUniforms", size_of::<DofUniforms>()),
            final_uniforms: make("FinalUniforms", size_of::<FinalUniforms>()),
        }
    }

    pub fn prepare(
        &self,
        queue: &wgpu::Queue,
        focus_distance: f32,
        dof_blur_strength: f32,
        near_clip: f32,
        bloom_strength: f32,
        exposure: f32,
        saturation: f32,
    ) {
        queue.write_buffer(
            &self.dof_uniforms,
            0,
            bytemuck::bytes_of(&DofUniforms {
                params: Vec4::new(focus_distance, dof_blur_strength, near_clip, 0.0),
            }),
        );
        queue.write_buffer(
            &self.final_uniforms,
            0,
            bytemuck::bytes_of(&FinalUniforms {
                params: Vec4::new(bloom_strength, exposure, saturation, 0.0),
            }),
        );
    }

    /// Runs the chain. `oit` supplies the accumulation/transmittance pair
    /// when order-independent transparency ran this frame; `dof` enables the
    /// bokeh blur. The composited result lands in `final_target`.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        helper: &mut FullscreenHelper,
        targets: &RenderTargets,
        oit: bool,
        dof: bool,
        final_target: &wgpu::TextureView,
        final_format: wgpu::TextureFormat,
    ) {
        // The running colour image; each enabled stage advances it.
        let mut current: &wgpu::TextureView = &targets.main_colour.view;

        // ---- OIT composite ----
        if oit {
            helper.run(
                device,
                encoder,
                &FullscreenDraw {
                    label: "OIT Composite",
                    wgsl: OIT_COMPOSITE_WGSL,
                    inputs: &[
                        FullscreenInput {
                            view: current,
                            kind: InputKind::Float,
                        },
                        FullscreenInput {
                            view: &targets.oit_accum.view,
                            kind: InputKind::Float,
                        },
                        FullscreenInput {
                            view: &targets.oit_transmittance.view,
                            kind: InputKind::Float,
                        },
                    ],
                    uniform: None,
                    targets: &[(&targets.post_a.view, HDR_FORMAT)],
                    blend: BlendKind::None,
                    viewport: None,
                },
            );
            current = &targets.post_a.view;
        }

        // ---- Depth of field ----
        if dof {
            helper.run(
                device,
                encoder,
                &FullscreenDraw {
                    label: "DOF Blur",
                    wgsl: DOF_BLUR_WGSL,
                    inputs: &[
                        FullscreenInput {
                            view: current,
                            kind: InputKind::Float,
                        },
                        FullscreenInput {
                            view: &targets.main_depth.view,
                            kind: InputKind::Depth,
                        },
                    ],
                    uniform: Some(&self.dof_uniforms),
                    targets: &[(&targets.post_b.view, HDR_FORMAT)],
                    blend: BlendKind::None,
                    viewport: None,
                },
            );
            current = &targets.post_b.view;
        }

        // ---- Bloom chain: downsize then separable blur per step ----
        let mut prev: &wgpu::TextureView = current;
        for (i, step) in targets.bloom_steps.iter().enumerate() {
            helper.run(
                device,
                encoder,
                &FullscreenDraw {
                    label: if i == 0 { "Bloom Downsize 0" } else { "Bloom Downsize" },
                    wgsl: DOWNSIZE_WGSL,
                    inputs: &[FullscreenInput {
                        view: prev,
                        kind: InputKind::Float,
                    }],
                    uniform: None,
                    targets: &[(&step.downsize.view, HDR_FORMAT)],
                    blend: BlendKind::None,
                    viewport: None,
                },
            );
            helper.run(
                device,
                encoder,
                &FullscreenDraw {
                    label: "Bloom Gaussian X",
                    wgsl: GAUSSIAN_X_WGSL,
                    inputs: &[FullscreenInput {
                        view: &step.downsize.view,
                        kind: InputKind::Float,
                    }],
                    uniform: None,
                    targets: &[(&step.tmp.view, HDR_FORMAT)],
                    blend: BlendKind::None,
                    viewport: None,
                },
            );
            helper.run(
                device,
                encoder,
                &FullscreenDraw {
                    label: "Bloom Gaussian Y",
                    wgsl: GAUSSIAN_Y_WGSL,
                    inputs: &[FullscreenInput {
                        view: &step.tmp.view,
                        kind: InputKind::Float,
                    }],
                    uniform: None,
                    targets: &[(&step.blur.view, HDR_FORMAT)],
                    blend: BlendKind::None,
                    viewport: None,
                },
            );
            prev = &step.blur.view;
        }

        // ---- Final imaging ----
        let mut inputs: Vec<FullscreenInput> = Vec::with_capacity(9);
        inputs.push(FullscreenInput {
            view: current,
            kind: InputKind::Float,
        });
        for step in &targets.bloom_steps {
            inputs.push(FullscreenInput {
                view: &step.blur.view,
                kind: InputKind::Float,
            });
        }
        helper.run(
            device,
            encoder,
            &FullscreenDraw {
                label: "Final Imaging",
                wgsl: FINAL_IMAGING_WGSL,
                inputs: &inputs,
                uniform: Some(&self.final_uniforms),
                targets: &[(final_target, final_format)],
                blend: BlendKind::None,
                viewport: None,
            },
        );
    }
}
