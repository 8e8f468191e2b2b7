//! The scene-geometry passes: opaque, water, decal, alpha-blend, OIT
//! transparency and always-visible, plus the env background clear.
//!
//! Each pass prepares its draw list during the frame's prepare phase
//! (enumerate → sort → coalesce → resolve pipelines → append commands) and
//! encodes during the execute phase. The orchestrator sequences the passes
//! and the copy-blits between them.

use glam::Vec3;

use crate::renderer::draw::{
    AlphaBatchDrawInfo, BatchDrawInfo, BatchFilter, BatchSource, CullTest, EnumerationExtras,
    FaceCull, FrameStats, build_draw_list, enumerate_batches, pack_alpha_sort_key,
    radix_sort_alpha_batches, radix_sort_batches,
};
use crate::renderer::frame_data::FrameData;
use crate::renderer::passes::common::{
    BlendKind, MaterialTextures, PreparedSceneDraw, ScenePipeState,
};
use crate::renderer::programs::ProgramCache;
use crate::renderer::targets::{DEPTH_FORMAT, HDR_FORMAT, NORMAL_FORMAT, RenderTargets};
use crate::resources::mesh::MeshStore;
use crate::scene::object::ObjectKey;
use crate::scene::Scene;

/// Objects beyond this distance are left out of the SSAO geometry prepass.
const PREPASS_MAX_DIST: f32 = 80.0;

/// Reused enumeration/sort scratch.
#[derive(Default)]
pub struct PassScratch {
    batch: Vec<BatchDrawInfo>,
    sort: Vec<BatchDrawInfo>,
    alpha: Vec<AlphaBatchDrawInfo>,
    alpha_sort: Vec<AlphaBatchDrawInfo>,
}

/// How a pass orders its batches.
enum SortOrder {
    /// Radix sort on the packed state key (minimal state changes).
    StateKey,
    /// Back-to-front by AABB distance to the camera, state key as tiebreak.
    BackToFront(Vec3),
}

#[allow(clippy::too_many_arguments)]
fn prepare_geometry_pass<'a>(
    device: &wgpu::Device,
    programs: &mut ProgramCache,
    meshes: &MeshStore,
    frame_data: &mut FrameData,
    material_textures: &MaterialTextures,
    pass_layout: Option<&wgpu::BindGroupLayout>,
    scene: &Scene,
    keys: impl Iterator<Item = &'a ObjectKey>,
    cull: CullTest<'_>,
    filter: &BatchFilter,
    extras: &EnumerationExtras,
    order: &SortOrder,
    state: &ScenePipeState,
    program_override: Option<crate::renderer::programs::ProgramIndex>,
    scratch: &mut PassScratch,
    stats: &mut FrameStats,
) -> PreparedSceneDraw {
    scratch.batch.clear();
    enumerate_batches(
        &scene.objects,
        keys,
        meshes,
        cull,
        BatchSource::Normal,
        filter,
        extras,
        &mut scratch.batch,
        stats,
    );

    match order {
        SortOrder::StateKey => {
            radix_sort_batches(&mut scratch.batch, &mut scratch.sort);
        }
        SortOrder::BackToFront(cam_pos) => {
            scratch.alpha.clear();
            for info in &scratch.batch {
                let dist = scene
                    .objects
                    .get(info.object)
                    .map_or(0.0, |ob| ob.aabb_ws.centroid().distance(*cam_pos));
                scratch.alpha.push(AlphaBatchDrawInfo {
                    sort_key: pack_alpha_sort_key(dist, info.prog_vao_key),
                    info: *info,
                });
            }
            radix_sort_alpha_batches(&mut scratch.alpha, &mut scratch.alpha_sort);
            scratch.batch.clear();
            scratch.batch.extend(scratch.alpha.iter().map(|a| a.info));
        }
    }

    let mut prepared = PreparedSceneDraw::default();
    build_draw_list(
        &scratch.batch,
        BatchSource::Normal,
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
        |_| state.clone(),
        program_override,
        &frame_data.layout,
        &material_textures.layout,
        pass_layout,
    );
    prepared
}

// ============================================================================
// Water-pass resources (group 2: the main-target copies)
// ============================================================================

pub struct WaterPassResources {
    pub layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    sampler: wgpu::Sampler,
}

impl WaterPassResources {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Water Pass Resources Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
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
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("water_copy_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            layout,
            bind_group: None,
            sampler,
        }
    }

    pub fn rebuild(&mut self, device: &wgpu::Device, targets: &RenderTargets) {
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Water Pass Resources"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.colour_copy.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.normal_copy.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&targets.depth_copy.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
    }

    #[must_use]
    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }
}

// ============================================================================
// ScenePasses
// ============================================================================

/// Prepared draw lists for every scene-geometry pass of one frame.
pub struct ScenePasses {
    pub opaque: PreparedSceneDraw,
    pub prepass: PreparedSceneDraw,
    pub water: PreparedSceneDraw,
    pub decal: PreparedSceneDraw,
    pub alpha: PreparedSceneDraw,
    pub transparency: PreparedSceneDraw,
    pub always_visible_ghost: PreparedSceneDraw,
    pub always_visible_solid: PreparedSceneDraw,
    pub outline_objects: PreparedSceneDraw,
    scratch: PassScratch,
}

impl Default for ScenePasses {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenePasses {
    #[must_use]
    pub fn new() -> Self {
        Self {
            opaque: PreparedSceneDraw::default(),
            prepass: PreparedSceneDraw::default(),
            water: PreparedSceneDraw::default(),
            decal: PreparedSceneDraw::default(),
            alpha: PreparedSceneDraw::default(),
            transparency: PreparedSceneDraw::default(),
            always_visible_ghost: PreparedSceneDraw::default(),
            always_visible_solid: PreparedSceneDraw::default(),
            outline_objects: PreparedSceneDraw::default(),
            scratch: PassScratch::default(),
        }
    }

    /// Builds every pass's draw list and pipelines for this frame.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        programs: &mut ProgramCache,
        meshes: &MeshStore,
        frame_data: &mut FrameData,
        material_textures: &MaterialTextures,
        lit_layout: &wgpu::BindGroupLayout,
        water_layout: &wgpu::BindGroupLayout,
        scene: &Scene,
        ssao_enabled: bool,
        oit_enabled: bool,
        outline_program: crate::renderer::programs::ProgramIndex,
        stats: &mut FrameStats,
    ) {
        let frustum = *scene.camera.frustum();
        let cam_pos = scene.camera.position();
        let depth_compare = scene.camera.depth_compare();

        let lit_targets = vec![
            (HDR_FORMAT, BlendKind::None, true),
            (NORMAL_FORMAT, BlendKind::None, true),
        ];

        // ---- Opaque ----
        self.opaque = prepare_geometry_pass(
            device,
            programs,
            meshes,
            frame_data,
            material_textures,
            Some(lit_layout),
            scene,
            scene.object_set.iter(),
            CullTest::Frustum(&frustum),
            &BatchFilter::opaque(),
            &EnumerationExtras::default(),
            &SortOrder::StateKey,
            &ScenePipeState {
                pass_label: "Opaque Pass",
                colour_targets: lit_targets.clone(),
                depth: Some((DEPTH_FORMAT, true, depth_compare)),
                cull: FaceCull::Back,
                vertex_hash: 0,
                uses_pass_resources: true,
                depth_bias: 0,
            },
            None,
            &mut self.scratch,
            stats,
        );

        // ---- SSAO geometry prepass: opaque objects near the camera ----
        if ssao_enabled {
            self.prepass = prepare_geometry_pass(
                device,
                programs,
                meshes,
                frame_data,
                material_textures,
                Some(lit_layout),
                scene,
                scene.object_set.iter(),
                CullTest::Frustum(&frustum),
                &BatchFilter::opaque(),
                &EnumerationExtras {
                    max_dist: Some((cam_pos, PREPASS_MAX_DIST)),
                    ..Default::default()
                },
                &SortOrder::StateKey,
                &ScenePipeState {
                    pass_label: "SSAO Geometry Prepass",
                    colour_targets: lit_targets.clone(),
                    depth: Some((DEPTH_FORMAT, true, depth_compare)),
                    cull: FaceCull::Back,
                    vertex_hash: 0,
                    uses_pass_resources: true,
                    depth_bias: 0,
                },
                None,
                &mut self.scratch,
                stats,
            );
        } else {
            self.prepass = PreparedSceneDraw::default();
        }

        // ---- Water ----
        self.water = prepare_geometry_pass(
            device,
            programs,
            meshes,
            frame_data,
            material_textures,
            Some(water_layout),
            scene,
            scene.water_objects.iter(),
            CullTest::Frustum(&frustum),
            &BatchFilter::with_bit(crate::renderer::draw::BATCH_FLAG_WATER),
            &EnumerationExtras::default(),
            &SortOrder::StateKey,
            &ScenePipeState {
                pass_label: "Water Pass",
                colour_targets: lit_targets.clone(),
                depth: Some((DEPTH_FORMAT, true, depth_compare)),
                cull: FaceCull::Back,
                vertex_hash: 0,
                uses_pass_resources: true,
                depth_bias: 0,
            },
            None,
            &mut self.scratch,
            stats,
        );

        // ---- Decals: colour only, depth tested, no depth write ----
        self.decal = prepare_geometry_pass(
            device,
            programs,
            meshes,
            frame_data,
            material_textures,
            Some(lit_layout),
            scene,
            scene.decal_objects.iter(),
            CullTest::Frustum(&frustum),
            &BatchFilter::with_bit(crate::renderer::draw::BATCH_FLAG_DECAL),
            &EnumerationExtras::default(),
            &SortOrder::StateKey,
            &ScenePipeState {
                pass_label: "Decal Pass",
                colour_targets: vec![
                    (HDR_FORMAT, BlendKind::AlphaOver, true),
                    (NORMAL_FORMAT, BlendKind::None, false),
                ],
                depth: Some((DEPTH_FORMAT, false, depth_compare)),
                cull: FaceCull::Back,
                vertex_hash: 0,
                uses_pass_resources: true,
                depth_bias: 0,
            },
            None,
            &mut self.scratch,
            stats,
        );

        // ---- Alpha-blended (participating media, text): back-to-front ----
        self.alpha = prepare_geometry_pass(
            device,
            programs,
            meshes,
            frame_data,
            material_textures,
            Some(lit_layout),
            scene,
            scene.alpha_blended_objects.iter(),
            CullTest::Frustum(&frustum),
            &BatchFilter::with_bit(crate::renderer::draw::BATCH_FLAG_ALPHA_BLEND),
            &EnumerationExtras::default(),
            &SortOrder::BackToFront(cam_pos),
            &ScenePipeState {
                pass_label: "Alpha Blend Pass",
                colour_targets: vec![
                    (HDR_FORMAT, BlendKind::AlphaOver, true),
                    (NORMAL_FORMAT, BlendKind::None, false),
                ],
                depth: Some((DEPTH_FORMAT, false, depth_compare)),
                cull: FaceCull::Back,
                vertex_hash: 0,
                uses_pass_resources: true,
                depth_bias: 0,
            },
            None,
            &mut self.scratch,
            stats,
        );

        // ---- Transparency ----
        if oit_enabled {
            self.transparency = prepare_geometry_pass(
                device,
                programs,
                meshes,
                frame_data,
                material_textures,
                Some(lit_layout),
                scene,
                scene.transparent_objects.iter(),
                CullTest::Frustum(&frustum),
                &BatchFilter::with_bit(crate::renderer::draw::BATCH_FLAG_TRANSPARENT),
                &EnumerationExtras::default(),
                &SortOrder::StateKey,
                &ScenePipeState {
                    pass_label: "OIT Transparency Pass",
                    colour_targets: vec![
                        (HDR_FORMAT, BlendKind::Additive, true),
                        (HDR_FORMAT, BlendKind::Multiply, true),
                    ],
                    depth: Some((DEPTH_FORMAT, false, depth_compare)),
                    cull: FaceCull::Back,
                    vertex_hash: 0,
                    uses_pass_resources: true,
                    depth_bias: 0,
                },
                None,
                &mut self.scratch,
                stats,
            );
        } else {
            // Fallback: sorted alpha-over into the main targets.
            self.transparency = prepare_geometry_pass(
                device,
                programs,
                meshes,
                frame_data,
                material_textures,
                Some(lit_layout),
                scene,
                scene.transparent_objects.iter(),
                CullTest::Frustum(&frustum),
                &BatchFilter::with_bit(crate::renderer::draw::BATCH_FLAG_TRANSPARENT),
                &EnumerationExtras::default(),
                &SortOrder::BackToFront(cam_pos),
                &ScenePipeState {
                    pass_label: "Transparency Pass",
                    colour_targets: vec![
                        (HDR_FORMAT, BlendKind::AlphaOver, true),
                        (NORMAL_FORMAT, BlendKind::None, false),
                    ],
                    depth: Some((DEPTH_FORMAT, false, depth_compare)),
                    cull: FaceCull::Back,
                    vertex_hash: 0,
                    uses_pass_resources: true,
                    depth_bias: 0,
                },
                None,
                &mut self.scratch,
                stats,
            );
        }

        // ---- Always-visible: ghost (no depth test, constant 50% alpha)
        //      then a depth-tested solid draw ----
        self.always_visible_ghost = prepare_geometry_pass(
            device,
            programs,
            meshes,
            frame_data,
            material_textures,
            Some(lit_layout),
            scene,
            scene.always_visible_objects.iter(),
            CullTest::None,
            &BatchFilter::opaque(),
            &EnumerationExtras::default(),
            &SortOrder::StateKey,
            &ScenePipeState {
                pass_label: "Always Visible Ghost",
                colour_targets: vec![
                    (HDR_FORMAT, BlendKind::ConstantAlpha, true),
                    (NORMAL_FORMAT, BlendKind::None, false),
                ],
                depth: Some((DEPTH_FORMAT, false, wgpu::CompareFunction::Always)),
                cull: FaceCull::Back,
                vertex_hash: 0,
                uses_pass_resources: true,
                depth_bias: 0,
            },
            None,
            &mut self.scratch,
            stats,
        );
        self.always_visible_solid = prepare_geometry_pass(
            device,
            programs,
            meshes,
            frame_data,
            material_textures,
            Some(lit_layout),
            scene,
            scene.always_visible_objects.iter(),
            CullTest::None,
            &BatchFilter::opaque(),
            &EnumerationExtras::default(),
            &SortOrder::StateKey,
            &ScenePipeState {
                pass_label: "Always Visible Solid",
                colour_targets: lit_targets,
                depth: Some((DEPTH_FORMAT, true, depth_compare)),
                cull: FaceCull::Back,
                vertex_hash: 0,
                uses_pass_resources: true,
                depth_bias: 0,
            },
            None,
            &mut self.scratch,
            stats,
        );

        // ---- Selection outline: flat draw of selected objects ----
        self.outline_objects = PreparedSceneDraw::default();
        if !scene.selected_objects.is_empty() {
            self.outline_objects = prepare_geometry_pass(
                device,
                programs,
                meshes,
                frame_data,
                material_textures,
                None,
                scene,
                scene.selected_objects.iter(),
                CullTest::Frustum(&frustum),
                &BatchFilter { mask: 0, wanted: 0 },
                &EnumerationExtras::default(),
                &SortOrder::StateKey,
                &ScenePipeState {
                    pass_label: "Outline Object Pass",
                    colour_targets: vec![(
                        wgpu::TextureFormat::Rgba8Unorm,
                        BlendKind::None,
                        true,
                    )],
                    depth: Some((DEPTH_FORMAT, true, wgpu::CompareFunction::Less)),
                    cull: FaceCull::Back,
                    vertex_hash: 0,
                    uses_pass_resources: false,
                    depth_bias: 0,
                },
                Some(outline_program),
                &mut self.scratch,
                stats,
            );
        }
    }
}
