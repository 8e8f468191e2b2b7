//! Selection outline.
//!
//! Three sub-steps: the orchestrator first draws the selected objects with a
//! flat-colour program into a dedicated colour+depth pair; then a
//! Sobel-style edge extraction turns that image into an edge mask; finally
//! the mask is composited over the main colour with alpha blending.

use crate::renderer::passes::common::BlendKind;
use crate::renderer::passes::fullscreen::{
    FullscreenDraw, FullscreenHelper, FullscreenInput, InputKind,
};
use crate::renderer::targets::{HDR_FORMAT, OUTLINE_MASK_FORMAT, RenderTargets};

const EDGE_EXTRACT_WGSL: &str = "
@fragment
fn fs_main(in: FsOut) -> @location(0) vec4<f32> {
    let texel = 1.0 / vec2<f32>(textureDimensions(input0));

    var gx = 0.0;
    var gy = 0.0;
    for (var y = -1; y <= 1; y = y + 1) {
        for (var x = -1; x <= 1; x = x + 1) {
            let uv = in.uv + texel * vec2<f32>(f32(x), f32(y));
            let v = textureSampleLevel(input0, input_sampler, uv, 0.0).a;
            let sx = f32(x) * select(1.0, 2.0, y == 0);
            let sy = f32(y) * select(1.0, 2.0, x == 0);
            gx = gx + v * sx;
            gy = gy + v * sy;
        }
    }
    let edge = clamp(sqrt(gx * gx + gy * gy), 0.0, 1.0);
    return vec4<f32>(edge, 0.0, 0.0, edge);
}
";

const OUTLINE_COMPOSITE_WGSL: &str = "
@fragment
fn fs_main(in: FsOut) -> @location(0) vec4<f32> {
    let edge = textureSampleLevel(input0, input_sampler, in.uv, 0.0).r;
    // Selection tint; alpha drives the blend with the scene colour.
    return vec4<f32>(0.1, 0.8, 1.0, edge);
}
";

pub struct OutlinePass;

impl OutlinePass {
    /// Runs edge extraction then composites the mask over the main colour.
    /// The flat-colour object draw must already be encoded.
    pub fn encode(
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        helper: &mut FullscreenHelper,
        targets: &RenderTargets,
    ) {
        helper.run(
            device,
            encoder,
            &FullscreenDraw {
                label: "Outline Edge Extract",
                wgsl: EDGE_EXTRACT_WGSL,
                inputs: &[FullscreenInput {
                    view: &targets.outline_colour.view,
                    kind: InputKind::Float,
                }],
                uniform: None,
                targets: &[(&targets.outline_edge_mask.view, OUTLINE_MASK_FORMAT)],
                blend: BlendKind::None,
                viewport: None,
            },
        );

        helper.run(
            device,
            encoder,
            &FullscreenDraw {
                label: "Outline Composite",
                wgsl: OUTLINE_COMPOSITE_WGSL,
                inputs: &[FullscreenInput {
                    view: &targets.outline_edge_mask.view,
                    kind: InputKind::Float,
                }],
                uniform: None,
                targets: &[(&targets.main_colour.view, HDR_FORMAT)],
                blend: BlendKind::AlphaOver,
                viewport: None,
            },
        );
    }
}
