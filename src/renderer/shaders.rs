//! WGSL shader sources and variant assembly.
//!
//! Each program family has one WGSL body; feature variants are produced by
//! prepending a generated block of `const` feature switches the body branches
//! on. The compiled module is therefore fully specialised by the constant
//! folder — the same mechanism the driver-side preprocessor provided in the
//! original GL sources, expressed in WGSL.

use std::fmt::Write as _;

use crate::renderer::programs::{ProgramFlags, ProgramName};

/// Generates the feature-switch header for a variant.
#[must_use]
pub fn variant_header(flags: ProgramFlags) -> String {
    let mut h = String::with_capacity(1024);
    let mut flag = |name: &str, bit: ProgramFlags| {
        let v = u32::from(flags.contains(bit));
        let _ = writeln!(h, "const {name}: u32 = {v}u;");
    };
    flag("ALPHA_TEST", ProgramFlags::ALPHA_TEST);
    flag("VERT_COLOURS", ProgramFlags::VERT_COLOURS);
    flag("INSTANCE_MATRICES", ProgramFlags::INSTANCE_MATRICES);
    flag("LIGHTMAPPING", ProgramFlags::LIGHTMAPPING);
    flag("GEN_PLANAR_UVS", ProgramFlags::GEN_PLANAR_UVS);
    flag("PLANAR_UV_GRID", ProgramFlags::PLANAR_UV_GRID);
    flag("SKINNING", ProgramFlags::SKINNING);
    flag("IMPOSTER", ProgramFlags::IMPOSTER);
    flag("IMPOSTERABLE", ProgramFlags::IMPOSTERABLE);
    flag("WIND_VERT_ANIM", ProgramFlags::USE_WIND_VERT_SHADER);
    flag("FANCY_DOUBLE_SIDED", ProgramFlags::FANCY_DOUBLE_SIDED);
    flag("MATERIALISE_EFFECT", ProgramFlags::MATERIALISE_EFFECT);
    flag("TERRAIN", ProgramFlags::TERRAIN);
    flag("DECAL", ProgramFlags::DECAL);
    flag("PARTICIPATING_MEDIA", ProgramFlags::PARTICIPATING_MEDIA);
    flag("VERT_TANGENTS", ProgramFlags::VERT_TANGENTS);
    flag("SDF_TEXT", ProgramFlags::SDF_TEXT);
    flag("COMBINED", ProgramFlags::COMBINED);
    flag("POSITION_W_IS_OCT16_NORMAL", ProgramFlags::POSITION_W_IS_OCT16_NORMAL);
    h
}

/// Shared binding declarations: frame data (group 0) and per-material
/// textures (group 1). Pass-specific resources live in group 2 and are
/// declared by the per-family bodies that use them.
pub const SHARED_BINDINGS_WGSL: &str = "
struct SharedVertUniforms {
    proj_matrix: mat4x4<f32>,
    view_matrix: mat4x4<f32>,
    vert_sun_dir: vec4<f32>,
    grass_pusher_sphere_pos: vec4<f32>,
    campos_ws: vec4<f32>,
    vert_uniforms_time: f32,
    wind_strength: f32,
    padding_a0: f32,
    padding_a1: f32,
};

struct MaterialCommonUniforms {
    frag_sun_dir: vec4<f32>,
    sun_spec_rad_times_solid_angle: vec4<f32>,
    sun_and_sky_av_spec_rad: vec4<f32>,
    air_scattering_coeffs: vec4<f32>,
    mat_common_campos_ws: vec4<f32>,
    near_clip_dist: f32,
    far_clip_dist: f32,
    mat_common_time: f32,
    l_over_w: f32,
    l_over_h: f32,
    env_phi: f32,
    water_level_z: f32,
    mat_common_flags: u32,
    shadow_map_samples_xy_scale: f32,
    padding_b0: f32,
    padding_b1: f32,
    padding_b2: f32,
};

struct PerObjectVertData {
    model_matrix: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    light_indices: array<vec4<i32>, 2>,
    depth_draw_depth_bias: f32,
    model_matrix_upper_left_det: f32,
    uv0_scale: f32,
    uv1_scale: f32,
    dequantise_scale: vec4<f32>,
    dequantise_translation: vec4<f32>,
};

struct MaterialData {
    diffuse_colour: vec4<f32>,
    emission_colour: vec4<f32>,
    texture_upper_left_matrix_col0: vec2<f32>,
    texture_upper_left_matrix_col1: vec2<f32>,
    texture_matrix_translation: vec2<f32>,
    flags: u32,
    roughness: f32,
    fresnel_scale: f32,
    metallic_frac: f32,
    begin_fade_out_distance: f32,
    end_fade_out_distance: f32,
    materialise_lower_z: f32,
    materialise_upper_z: f32,
    materialise_start_time: f32,
    dopacity: f32,
};

struct LightData {
    pos: vec4<f32>,
    dir: vec4<f32>,
    light_colour: vec4<f32>,
    light_type: i32,
    cone_cos_angle_start: f32,
    cone_cos_angle_end: f32,
    padding_l0: f32,
};

struct ObJointAndMatIndices {
    per_ob_index: u32,
    joint_base_index: u32,
    material_index: u32,
    instance_transform_index: u32,
};

@group(0) @binding(0) var<uniform> shared_vert: SharedVertUniforms;
@group(0) @binding(1) var<uniform> material_common: MaterialCommonUniforms;
@group(0) @binding(2) var<storage, read> per_object_vert_data: array<PerObjectVertData>;
@group(0) @binding(3) var<storage, read> materials: array<MaterialData>;
@group(0) @binding(4) var<storage, read> joint_matrices: array<mat4x4<f32>>;
@group(0) @binding(5) var<storage, read> lights: array<LightData>;
@group(0) @binding(6) var<storage, read> ob_and_mat_indices: array<ObJointAndMatIndices>;
@group(0) @binding(7) var<storage, read> instance_transforms: array<mat4x4<f32>>;

@group(1) @binding(0) var diffuse_tex: texture_2d<f32>;
@group(1) @binding(1) var metallic_roughness_tex: texture_2d<f32>;
@group(1) @binding(2) var emission_tex: texture_2d<f32>;
@group(1) @binding(3) var normal_map: texture_2d<f32>;
@group(1) @binding(4) var transmission_tex: texture_2d<f32>;
@group(1) @binding(5) var lightmap_tex: texture_2d<f32>;
@group(1) @binding(6) var main_tex_sampler: sampler;
";

/// Vertex fetch + transform preamble shared by the scene-geometry families.
const SCENE_VERTEX_COMMON: &str = "
struct VertexIn {
    @location(0) position_in: vec4<f32>,
    @location(1) normal_in: vec3<f32>,
    @location(2) uv0_in: vec2<f32>,
    @location(3) vert_colour_in: vec4<f32>,
    @location(4) joint_in: vec4<u32>,
    @location(5) weight_in: vec4<f32>,
    @builtin(instance_index) instance_index: u32,
};

struct VertexOut {
    @builtin(position) clip_pos: vec4<f32>,
    @location(0) pos_ws: vec3<f32>,
    @location(1) normal_ws: vec3<f32>,
    @location(2) uv0: vec2<f32>,
    @location(3) vert_colour: vec4<f32>,
    @location(4) @interpolate(flat) draw_index: u32,
};

fn oct16_decode(w: f32) -> vec3<f32> {
    let bits = u32(w);
    let fx = f32(bits & 0xffu) * (2.0 / 255.0) - 1.0;
    let fy = f32((bits >> 8u) & 0xffu) * (2.0 / 255.0) - 1.0;
    var v = vec3<f32>(fx, fy, 1.0 - abs(fx) - abs(fy));
    if (v.z < 0.0) {
        let old_x = v.x;
        v.x = (1.0 - abs(v.y)) * select(-1.0, 1.0, old_x >= 0.0);
        v.y = (1.0 - abs(old_x)) * select(-1.0, 1.0, v.y >= 0.0);
    }
    return normalize(v);
}

fn skinned_matrix(ob: PerObjectVertData, indices: ObJointAndMatIndices, joints: vec4<u32>, weights: vec4<f32>) -> mat4x4<f32> {
    let base = indices.joint_base_index;
    return joint_matrices[base + joints.x] * weights.x
         + joint_matrices[base + joints.y] * weights.y
         + joint_matrices[base + joints.z] * weights.z
         + joint_matrices[base + joints.w] * weights.w;
}

fn transform_vertex(v: VertexIn, draw_index: u32) -> VertexOut {
    let indices = ob_and_mat_indices[draw_index];
    let ob = per_object_vert_data[indices.per_ob_index];

    var pos_os = v.position_in.xyz * ob.dequantise_scale.xyz + ob.dequantise_translation.xyz;
    var normal_os = v.normal_in;
    if (POSITION_W_IS_OCT16_NORMAL == 1u) {
        normal_os = oct16_decode(v.position_in.w);
    }

    var model = ob.model_matrix;
    if (INSTANCE_MATRICES == 1u) {
        // Each instance owns an indirection row; its transform composes in
        // object space, between the object transform and skinning.
        let inst = instance_transforms[indices.instance_transform_index];
        model = model * inst;
        normal_os = (inst * vec4<f32>(normal_os, 0.0)).xyz;
    }
    if (SKINNING == 1u) {
        model = model * skinned_matrix(ob, indices, v.joint_in, v.weight_in);
    }
    if (WIND_VERT_ANIM == 1u) {
        let t = shared_vert.vert_uniforms_time;
        let sway = sin(t * 1.7 + pos_os.x * 0.5 + pos_os.y * 0.3)
            * shared_vert.wind_strength * 0.02 * pos_os.z;
        pos_os = pos_os + vec3<f32>(sway, sway * 0.5, 0.0);
    }

    var out: VertexOut;
    let pos_ws = model * vec4<f32>(pos_os, 1.0);
    out.pos_ws = pos_ws.xyz;
    out.clip_pos = shared_vert.proj_matrix * (shared_vert.view_matrix * pos_ws);
    out.normal_ws = normalize((ob.normal_matrix * vec4<f32>(normal_os, 0.0)).xyz);
    var uv = v.uv0_in;
    if (GEN_PLANAR_UVS == 1u) {
        uv = pos_ws.xy;
        if (PLANAR_UV_GRID == 1u) {
            uv = fract(uv);
        }
    }
    out.uv0 = uv * ob.uv0_scale;
    out.vert_colour = v.vert_colour_in;
    out.draw_index = draw_index;
    return out;
}

@vertex
fn vs_main(v: VertexIn) -> VertexOut {
    return transform_vertex(v, v.instance_index);
}
";

/// Pass-owned shadow resources (group 2) shared by the lit scene families.
/// Dynamic cascades occupy horizontal slices of one wide depth texture; the
/// static stack repeats the layout on the "current" swap texture.
const SHADOW_SAMPLE_WGSL: &str = "
struct ShadowMatrixUniforms {
    dynamic_tex_matrix: array<mat4x4<f32>, 4>,
    static_tex_matrix: array<mat4x4<f32>, 4>,
    num_dynamic_cascades: u32,
    num_static_cascades: u32,
    padding_s0: u32,
    padding_s1: u32,
};

@group(2) @binding(0) var dynamic_depth_tex: texture_depth_2d;
@group(2) @binding(1) var static_depth_tex: texture_depth_2d;
@group(2) @binding(2) var shadow_sampler: sampler_comparison;
@group(2) @binding(3) var<uniform> shadow_uniforms: ShadowMatrixUniforms;
@group(2) @binding(4) var blurred_ssao_tex: texture_2d<f32>;
@group(2) @binding(5) var ssao_point_sampler: sampler;

fn sample_cascade(tex: texture_depth_2d, uv: vec2<f32>, depth: f32) -> f32 {
    return textureSampleCompareLevel(tex, shadow_sampler, uv, depth);
}

fn sun_shadow_factor(pos_ws: vec3<f32>) -> f32 {
    // Dynamic cascades first (nearest coverage).
    for (var i = 0u; i < shadow_uniforms.num_dynamic_cascades; i = i + 1u) {
        let p = shadow_uniforms.dynamic_tex_matrix[i] * vec4<f32>(pos_ws, 1.0);
        if (p.x >= 0.0 && p.x <= 1.0 && p.y >= 0.0 && p.y <= 1.0 && p.z >= 0.0 && p.z <= 1.0) {
            return sample_cascade(dynamic_depth_tex, p.xy, p.z);
        }
    }
    for (var i = 0u; i < shadow_uniforms.num_static_cascades; i = i + 1u) {
        let p = shadow_uniforms.static_tex_matrix[i] * vec4<f32>(pos_ws, 1.0);
        if (p.x >= 0.0 && p.x <= 1.0 && p.y >= 0.0 && p.y <= 1.0 && p.z >= 0.0 && p.z <= 1.0) {
            return sample_cascade(static_depth_tex, p.xy, p.z);
        }
    }
    return 1.0;
}
";

/// Phong-family fragment body (also used by the transparent and imposter
/// families with different blend state).
const PHONG_FRAG: &str = "
fn apply_tex_matrix(mat: MaterialData, uv: vec2<f32>) -> vec2<f32> {
    return vec2<f32>(
        dot(vec2<f32>(mat.texture_upper_left_matrix_col0.x, mat.texture_upper_left_matrix_col1.x), uv),
        dot(vec2<f32>(mat.texture_upper_left_matrix_col0.y, mat.texture_upper_left_matrix_col1.y), uv),
    ) + mat.texture_matrix_translation;
}

struct FragOut {
    @location(0) colour: vec4<f32>,
    @location(1) normal_out: vec4<f32>,
};

@fragment
fn fs_main(in: VertexOut, @builtin(front_facing) front_facing: bool) -> FragOut {
    let indices = ob_and_mat_indices[in.draw_index];
    let mat = materials[indices.material_index];
    let ob = per_object_vert_data[indices.per_ob_index];

    var uv = apply_tex_matrix(mat, in.uv0);
    if (IMPOSTER == 1u) {
        // Multi-angle imposter textures store view slices side by side;
        // flag bit 64 selects the slice facing the camera.
        if ((mat.flags & 64u) != 0u) {
            let to_cam = material_common.mat_common_campos_ws.xyz - in.pos_ws;
            let angle = atan2(to_cam.y, to_cam.x);
            let slice = floor((angle / 6.2831853 + 0.5) * 8.0);
            uv = vec2<f32>((fract(uv.x) + slice) / 8.0, uv.y);
        }
    }
    // Sampled outside the flag branch to keep derivatives in uniform
    // control flow.
    let albedo_sample = textureSample(diffuse_tex, main_tex_sampler, uv);
    var albedo = mat.diffuse_colour;
    if ((mat.flags & 1u) != 0u) {
        albedo = albedo * albedo_sample;
    }
    if (VERT_COLOURS == 1u) {
        albedo = vec4<f32>(albedo.rgb * in.vert_colour.rgb, albedo.a);
    }
    if (ALPHA_TEST == 1u) {
        if (albedo.a < 0.5) {
            discard;
        }
    }

    var n = normalize(in.normal_ws);
    if (FANCY_DOUBLE_SIDED == 1u) {
        if (!front_facing) {
            n = -n;
        }
    }

    if (MATERIALISE_EFFECT == 1u) {
        let span = max(mat.materialise_upper_z - mat.materialise_lower_z, 1e-4);
        let frac_z = (in.pos_ws.z - mat.materialise_lower_z) / span;
        let elapsed = material_common.mat_common_time - mat.materialise_start_time;
        if (frac_z > elapsed) {
            discard;
        }
    }

    let sun_dir = material_common.frag_sun_dir.xyz;
    let shadow = sun_shadow_factor(in.pos_ws);
    var radiance = albedo.rgb * max(dot(n, sun_dir), 0.0)
        * material_common.sun_spec_rad_times_solid_angle.rgb * shadow;

    // Screen-space AO darkens the ambient term. l_over_w / l_over_h are
    // 1 / viewport dimensions.
    let screen_uv = vec2<f32>(in.clip_pos.x * material_common.l_over_w,
                              in.clip_pos.y * material_common.l_over_h);
    let ao = textureSampleLevel(blurred_ssao_tex, ssao_point_sampler, screen_uv, 0.0).a;
    radiance = radiance + albedo.rgb * material_common.sun_and_sky_av_spec_rad.rgb * ao;

    // Local cone lights from the per-object light index list.
    for (var i = 0; i < 8; i = i + 1) {
        let li = ob.light_indices[i / 4][i % 4];
        if (li < 0) {
            continue;
        }
        let light = lights[u32(li)];
        let to_light = light.pos.xyz - in.pos_ws;
        let dist2 = max(dot(to_light, to_light), 1e-4);
        let l = to_light * inverseSqrt(dist2);
        let axis_cos = dot(-l, light.dir.xyz);
        if (axis_cos < light.cone_cos_angle_end) {
            continue;
        }
        let cone = smoothstep(light.cone_cos_angle_end, light.cone_cos_angle_start, axis_cos);
        radiance = radiance + albedo.rgb * light.light_colour.rgb
            * (max(dot(n, l), 0.0) * cone / dist2);
    }

    radiance = radiance + mat.emission_colour.rgb;

    var out: FragOut;
    out.colour = vec4<f32>(radiance, albedo.a);
    out.normal_out = vec4<f32>(n * 0.5 + vec3<f32>(0.5), 1.0);
    return out;
}
";

/// Depth-only fragment body. Alpha-tested variants still sample the albedo
/// texture; everything else writes depth only.
const DEPTH_FRAG: &str = "
fn apply_tex_matrix(mat: MaterialData, uv: vec2<f32>) -> vec2<f32> {
    return vec2<f32>(
        dot(vec2<f32>(mat.texture_upper_left_matrix_col0.x, mat.texture_upper_left_matrix_col1.x), uv),
        dot(vec2<f32>(mat.texture_upper_left_matrix_col0.y, mat.texture_upper_left_matrix_col1.y), uv),
    ) + mat.texture_matrix_translation;
}

@fragment
fn fs_main(in: VertexOut) {
    if (ALPHA_TEST == 1u) {
        let indices = ob_and_mat_indices[in.draw_index];
        let mat = materials[indices.material_index];
        let alpha = textureSample(diffuse_tex, main_tex_sampler, apply_tex_matrix(mat, in.uv0)).a;
        if (alpha < 0.5) {
            discard;
        }
    }
}
";

/// Water fragment body: refraction from the opaque colour copy with a
/// depth-fade read from the depth copy (group 2).
const WATER_FRAG: &str = "
@group(2) @binding(0) var main_colour_copy: texture_2d<f32>;
@group(2) @binding(1) var main_normal_copy: texture_2d<f32>;
@group(2) @binding(2) var main_depth_copy: texture_depth_2d;
@group(2) @binding(3) var copy_sampler: sampler;

struct FragOut {
    @location(0) colour: vec4<f32>,
    @location(1) normal_out: vec4<f32>,
};

@fragment
fn fs_main(in: VertexOut) -> FragOut {
    let indices = ob_and_mat_indices[in.draw_index];
    let mat = materials[indices.material_index];

    let n = normalize(in.normal_ws);
    let dims = vec2<f32>(textureDimensions(main_colour_copy));
    let screen_uv = in.clip_pos.xy / dims;

    let ripple = sin(in.pos_ws.x * 4.0 + material_common.mat_common_time * 1.3)
        * cos(in.pos_ws.y * 4.0 - material_common.mat_common_time * 0.9);
    let refract_uv = clamp(screen_uv + vec2<f32>(ripple) * 0.004, vec2<f32>(0.0), vec2<f32>(1.0));
    let refracted = textureSampleLevel(main_colour_copy, copy_sampler, refract_uv, 0.0).rgb;

    let ground_depth = textureSampleLevel(main_depth_copy, copy_sampler, screen_uv, 0.0);
    let depth_fade = clamp(abs(ground_depth - in.clip_pos.z) * 400.0, 0.0, 1.0);

    let deep = mat.diffuse_colour.rgb;
    let sun_dir = material_common.frag_sun_dir.xyz;
    let spec = pow(max(dot(reflect(-sun_dir, n), normalize(material_common.mat_common_campos_ws.xyz - in.pos_ws)), 0.0), 64.0);

    var out: FragOut;
    out.colour = vec4<f32>(mix(refracted, deep, depth_fade * 0.7) + vec3<f32>(spec), 1.0);
    out.normal_out = vec4<f32>(n * 0.5 + vec3<f32>(0.5), 1.0);
    return out;
}
";

/// Flat-colour fragment body for the selection-outline object draw.
const OUTLINE_FLAT_FRAG: &str = "
@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
";

/// OIT transparent fragment body: weighted-blended accumulation and
/// transmittance targets (sum and product blends respectively).
const TRANSPARENT_OIT_FRAG: &str = "
fn apply_tex_matrix(mat: MaterialData, uv: vec2<f32>) -> vec2<f32> {
    return vec2<f32>(
        dot(vec2<f32>(mat.texture_upper_left_matrix_col0.x, mat.texture_upper_left_matrix_col1.x), uv),
        dot(vec2<f32>(mat.texture_upper_left_matrix_col0.y, mat.texture_upper_left_matrix_col1.y), uv),
    ) + mat.texture_matrix_translation;
}

struct FragOut {
    @location(0) accum: vec4<f32>,
    @location(1) transmittance: vec4<f32>,
};

@fragment
fn fs_main(in: VertexOut) -> FragOut {
    let indices = ob_and_mat_indices[in.draw_index];
    let mat = materials[indices.material_index];

    let albedo_sample =
        textureSample(diffuse_tex, main_tex_sampler, apply_tex_matrix(mat, in.uv0));
    var albedo = mat.diffuse_colour;
    if ((mat.flags & 1u) != 0u) {
        albedo = albedo * albedo_sample;
    }

    let n = normalize(in.normal_ws);
    let sun_dir = material_common.frag_sun_dir.xyz;
    let shadow = sun_shadow_factor(in.pos_ws);
    var radiance = albedo.rgb * max(dot(n, sun_dir), 0.0)
        * material_common.sun_spec_rad_times_solid_angle.rgb * shadow
        + albedo.rgb * material_common.sun_and_sky_av_spec_rad.rgb;
    radiance = radiance + mat.emission_colour.rgb;

    let alpha = clamp(albedo.a, 0.0, 1.0);
    // Depth-independent weight keeps the blend order-free; view-space
    // distance falloff stops distant surfaces washing out near ones.
    let w = clamp(10.0 / (1e-5 + pow(in.clip_pos.z * 0.5, 4.0)), 1e-2, 3e3) * alpha;

    var out: FragOut;
    out.accum = vec4<f32>(radiance * alpha, alpha) * w;
    out.transmittance = vec4<f32>(vec3<f32>(1.0 - alpha), 1.0 - alpha);
    return out;
}
";

/// Fullscreen-triangle vertex shader shared by every post-process family.
pub const FULLSCREEN_VERT: &str = "
struct FsOut {
    @builtin(position) clip_pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> FsOut {
    var out: FsOut;
    let x = f32(i32(vi) / 2) * 4.0 - 1.0;
    let y = f32(i32(vi) % 2) * 4.0 - 1.0;
    out.clip_pos = vec4<f32>(x, y, 0.0, 1.0);
    out.uv = vec2<f32>(x, -y) * 0.5 + vec2<f32>(0.5);
    return out;
}
";

/// Returns the full WGSL source for `(name, header)`.
///
/// Families not listed here (post-process and utility families) own their
/// sources in their pass modules and are registered through
/// [`crate::renderer::programs::ProgramCache`] with explicit source text.
#[must_use]
pub fn family_source(name: ProgramName, header: &str) -> String {
    let mut src = String::with_capacity(16 * 1024);
    src.push_str(header);
    match name {
        ProgramName::Phong | ProgramName::Imposter | ProgramName::ParticipatingMedia => {
            src.push_str(SHARED_BINDINGS_WGSL);
            src.push_str(SHADOW_SAMPLE_WGSL);
            src.push_str(SCENE_VERTEX_COMMON);
            src.push_str(PHONG_FRAG);
        }
        ProgramName::Transparent => {
            src.push_str(SHARED_BINDINGS_WGSL);
            src.push_str(SHADOW_SAMPLE_WGSL);
            src.push_str(SCENE_VERTEX_COMMON);
            src.push_str(TRANSPARENT_OIT_FRAG);
        }
        ProgramName::Outline => {
            src.push_str(SHARED_BINDINGS_WGSL);
            src.push_str(SCENE_VERTEX_COMMON);
            src.push_str(OUTLINE_FLAT_FRAG);
        }
        ProgramName::Depth => {
            src.push_str(SHARED_BINDINGS_WGSL);
            src.push_str(SCENE_VERTEX_COMMON);
            src.push_str(DEPTH_FRAG);
        }
        ProgramName::Water => {
            src.push_str(SHARED_BINDINGS_WGSL);
            src.push_str(SCENE_VERTEX_COMMON);
            src.push_str(WATER_FRAG);
        }
        // Post-process and 2D families start from the fullscreen triangle;
        // their fragment bodies are supplied by the owning pass.
        _ => {
            src.push_str(FULLSCREEN_VERT);
        }
    }
    src
}
