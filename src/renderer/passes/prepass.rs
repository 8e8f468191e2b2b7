//! Screen-space ambient occlusion.
//!
//! The half-resolution prepass geometry (drawn by the orchestrator into the
//! prepass colour/normal/depth set and blitted to copies) feeds two
//! fullscreen programs:
//!
//! - **Compute SSAO**: per pixel, samples prepass depth and normal and
//!   produces AO plus small-radius indirect lighting into `ssao_texture`,
//!   and a screen-space specular tint into `ssao_specular_texture`.
//! - **Blur SSAO**: two-axis separable blur with depth and normal edge
//!   awareness, run twice (once over the AO result, once over the specular
//!   result).
//!
//! Later passes sample `blurred_ssao` / `blurred_ssao_specular` through the
//! lit-pass resource group.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::renderer::passes::common::BlendKind;
use crate::renderer::passes::fullscreen::{
    FullscreenDraw, FullscreenHelper, FullscreenInput, InputKind,
};
use crate::renderer::targets::{HDR_FORMAT, RenderTargets};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SsaoUniforms {
    proj_matrix: Mat4,
    inv_proj_matrix: Mat4,
    /// xy = texel size, z = AO radius (view space), w = intensity.
    params: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlurUniforms {
    /// xy = blur axis in texels, z = `is_ssao_blur` (1 for the AO image,
    /// 0 for the specular image), w unused.
    axis_and_mode: Vec4,
}

const COMPUTE_SSAO_WGSL: &str = "
struct SsaoUniforms {
    proj_matrix: mat4x4<f32>,
    inv_proj_matrix: mat4x4<f32>,
    params: vec4<f32>,
};
@group(0) @binding(4) var<uniform> uniforms: SsaoUniforms;

const NUM_TAPS: u32 = 12u;

fn view_pos_at(uv: vec2<f32>) -> vec3<f32> {
    let depth = textureSampleLevel(input0, input_sampler, uv, 0.0);
    let ndc = vec3<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth);
    let v = uniforms.inv_proj_matrix * vec4<f32>(ndc, 1.0);
    return v.xyz / v.w;
}

struct FragOut {
    @location(0) ssao: vec4<f32>,
    @location(1) specular: vec4<f32>,
};

@fragment
fn fs_main(in: FsOut) -> FragOut {
    let centre = view_pos_at(in.uv);
    let normal_sample = textureSampleLevel(input1, input_sampler, in.uv, 0.0).xyz;
    let n = normalize(normal_sample * 2.0 - vec3<f32>(1.0));

    let radius = uniforms.params.z;
    let texel = uniforms.params.xy;

    var occlusion = 0.0;
    var indirect = vec3<f32>(0.0);
    var specular = vec3<f32>(0.0);

    for (var i = 0u; i < NUM_TAPS; i = i + 1u) {
        // Spiral taps; the golden-angle increment decorrelates directions.
        let angle = f32(i) * 2.39996 + (in.uv.x + in.uv.y) * 37.0;
        let r = (f32(i) + 1.0) / f32(NUM_TAPS);
        let offset = vec2<f32>(cos(angle), sin(angle)) * r * radius * texel * 256.0;
        let tap_uv = clamp(in.uv + offset, vec2<f32>(0.0), vec2<f32>(1.0));

        let tap_pos = view_pos_at(tap_uv);
        let delta = tap_pos - centre;
        let dist2 = dot(delta, delta);
        let falloff = 1.0 / (1.0 + dist2 / (radius * radius));
        let facing = max(dot(n, normalize(delta)) - 0.05, 0.0);
        occlusion = occlusion + facing * falloff;

        let tap_colour = textureSampleLevel(input2, input_sampler, tap_uv, 0.0).rgb;
        indirect = indirect + tap_colour * facing * falloff;

        let mirror = reflect(normalize(centre), n);
        let spec_weight = pow(max(dot(mirror, normalize(delta)), 0.0), 8.0);
        specular = specular + tap_colour * spec_weight * falloff;
    }

    let ao = clamp(1.0 - occlusion * (uniforms.params.w / f32(NUM_TAPS)), 0.0, 1.0);
    var out: FragOut;
    out.ssao = vec4<f32>(indirect / f32(NUM_TAPS), ao);
    out.specular = vec4<f32>(specular / f32(NUM_TAPS), 1.0);
    return out;
}
";

const BLUR_SSAO_WGSL: &str = "
struct BlurUniforms {
    axis_and_mode: vec4<f32>,
};
@group(0) @binding(4) var<uniform> uniforms: BlurUniforms;

const RADIUS: i32 = 4;

@fragment
fn fs_main(in: FsOut) -> @location(0) vec4<f32> {
    let dims = vec2<f32>(textureDimensions(input0));
    let texel = 1.0 / dims;
    let axis = uniforms.axis_and_mode.xy;

    let centre_depth = textureSampleLevel(input1, input_sampler, in.uv, 0.0);
    let centre_normal = normalize(
        textureSampleLevel(input2, input_sampler, in.uv, 0.0).xyz * 2.0 - vec3<f32>(1.0));

    var sum = vec4<f32>(0.0);
    var weight_sum = 0.0;
    for (var i = -RADIUS; i <= RADIUS; i = i + 1) {
        let uv = clamp(in.uv + axis * texel * f32(i), vec2<f32>(0.0), vec2<f32>(1.0));
        let tap_depth = textureSampleLevel(input1, input_sampler, uv, 0.0);
        let tap_normal = normalize(
            textureSampleLevel(input2, input_sampler, uv, 0.0).xyz * 2.0 - vec3<f32>(1.0));

        // Edge awareness: reject across depth discontinuities and creases.
        let depth_w = exp(-abs(tap_depth - centre_depth) * 800.0);
        let normal_w = pow(max(dot(tap_normal, centre_normal), 0.0), 8.0);
        let gauss = exp(-f32(i * i) / (2.0 * 2.5 * 2.5));
        let w = gauss * depth_w * normal_w;

        sum = sum + textureSampleLevel(input0, input_sampler, uv, 0.0) * w;
        weight_sum = weight_sum + w;
    }
    return sum / max(weight_sum, 1e-5);
}
";

pub struct SsaoPass {
    compute_uniforms: wgpu::Buffer,
    blur_x_ssao: wgpu::Buffer,
    blur_y_ssao: wgpu::Buffer,
    blur_x_spec: wgpu::Buffer,
    blur_y_spec: wgpu::Buffer,
}

impl SsaoPass {
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
            compute_uniforms: make("SsaoUniforms", size_of::<SsaoUniforms>()),
            blur_x_ssao: make("BlurUniforms x/ssao", size_of::<BlurUniforms>()),
            blur_y_ssao: make("BlurUniforms y/ssao", size_of::<BlurUniforms>()),
            blur_x_spec: make("BlurUniforms x/spec", size_of::<BlurUniforms>()),
            blur_y_spec: make("BlurUniforms y/spec", size_of::<BlurUniforms>()),
        }
    }

    /// Writes this frame's uniforms.
    pub fn prepare(&self, queue: &wgpu::Queue, proj: Mat4, targets: &RenderTargets) {
        let half_w = (targets.width / 2).max(16) as f32;
        let half_h = (targets.height / 2).max(16) as f32;
        queue.write_buffer(
            &self.compute_uniforms,
            0,
            bytemuck::bytes_of(&SsaoUniforms {
                proj_matrix: proj,
                inv_proj_matrix: proj.inverse(),
                params: Vec4::new(1.0 / half_w, 1.0 / half_h, 0.5, 1.6),
            }),
        );
        let write_blur = |buffer: &wgpu::Buffer, axis: (f32, f32), is_ssao: f32| {
            queue.write_buffer(
                buffer,
                0,
                bytemuck::bytes_of(&BlurUniforms {
                    axis_and_mode: Vec4::new(axis.0, axis.1, is_ssao, 0.0),
                }),
            );
        };
        write_blur(&self.blur_x_ssao, (1.0, 0.0), 1.0);
        write_blur(&self.blur_y_ssao, (0.0, 1.0), 1.0);
        write_blur(&self.blur_x_spec, (1.0, 0.0), 0.0);
        write_blur(&self.blur_y_spec, (0.0, 1.0), 0.0);
    }

    /// Encodes compute + both blur chains. The prepass copies must already
    /// be blitted.
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        helper: &mut FullscreenHelper,
        targets: &RenderTargets,
    ) {
        let depth = FullscreenInput {
            view: &targets.prepass_depth_copy.view,
            kind: InputKind::Depth,
        };
        let normal = FullscreenInput {
            view: &targets.prepass_normal_copy.view,
            kind: InputKind::Float,
        };
        let colour = FullscreenInput {
            view: &targets.prepass_colour_copy.view,
            kind: InputKind::Float,
        };

        helper.run(
            device,
            encoder,
            &FullscreenDraw {
                label: "Compute SSAO",
                wgsl: COMPUTE_SSAO_WGSL,
                inputs: &[depth, normal, colour],
                uniform: Some(&self.compute_uniforms),
                targets: &[
                    (&targets.ssao.view, HDR_FORMAT),
                    (&targets.ssao_specular.view, HDR_FORMAT),
                ],
                blend: BlendKind::None,
                viewport: None,
            },
        );

        // AO blur: x into tmp, y into the final image.
        let blur = |helper: &mut FullscreenHelper,
                    encoder: &mut wgpu::CommandEncoder,
                    label: &'static str,
                    src: &wgpu::TextureView,
                    dst: &wgpu::TextureView,
                    uniform: &wgpu::Buffer| {
            helper.run(
                device,
                encoder,
                &FullscreenDraw {
                    label,
                    wgsl: BLUR_SSAO_WGSL,
                    inputs: &[
                        FullscreenInput {
                            view: src,
                            kind: InputKind::Float,
                        },
                        depth,
                        normal,
                    ],
                    uniform: Some(uniform),
                    targets: &[(dst, HDR_FORMAT)],
                    blend: BlendKind::None,
                    viewport: None,
                },
            );
        };

        blur(
            helper,
            encoder,
            "Blur SSAO x",
            &targets.ssao.view,
            &targets.ssao_blur_tmp.view,
            &self.blur_x_ssao,
        );
        blur(
            helper,
            encoder,
            "Blur SSAO y",
            &targets.ssao_blur_tmp.view,
            &targets.blurred_ssao.view,
            &self.blur_y_ssao,
        );
        blur(
            helper,
            encoder,
            "Blur SSAO specular x",
            &targets.ssao_specular.view,
            &targets.ssao_blur_tmp.view,
            &self.blur_x_spec,
        );
        blur(
            helper,
            encoder,
            "Blur SSAO specular y",
            &targets.ssao_blur_tmp.view,
            &targets.blurred_ssao_specular.view,
            &self.blur_y_spec,
        );
    }
}
