//! The renderer: GPU context, resident state, and the per-frame pipeline.
//!
//! - [`programs`]: shader program variant cache
//! - [`buffers`]: GPU-resident tables and allocators
//! - [`draw`]: batch enumeration, sort keys and draw coalescing
//! - [`frame_data`]: the group-0 bind group and the tables behind it
//! - [`targets`]: offscreen render targets
//! - [`passes`]: the pass subroutines
//! - [`frame`]: the per-frame orchestrator
//! - [`admission`]: object admission and draw-record maintenance
//!
//! The renderer follows a two-phase lifecycle: [`Renderer::new`] stores
//! configuration only; [`Renderer::init`] creates the GPU context. A failed
//! init leaves the renderer in a non-initialised state in which every
//! operation is a no-op — the tier-1 error contract.

pub mod admission;
pub mod buffers;
pub mod draw;
pub mod frame;
pub mod frame_data;
pub mod passes;
pub mod programs;
pub mod settings;
pub mod shaders;
pub mod targets;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::errors::{Result, VistaError};
use crate::renderer::buffers::ScatterUploader;
use crate::renderer::draw::FrameStats;
use crate::renderer::frame_data::FrameData;
use crate::renderer::passes::{
    FullscreenHelper, MaterialTextures, OverlayPass, PostChain, ScenePasses, ShadowRenderer,
    SsaoPass, WaterPassResources,
};
use crate::renderer::programs::{ProgramCache, ProgramFlags, ProgramIndex, ProgramKey, ProgramName};
use crate::renderer::settings::{RendererSettings, RuntimeFeatures};
use crate::renderer::targets::RenderTargets;
use crate::resources::mesh::{MeshDesc, MeshGpu, MeshHandle, MeshStore, MeshUploadProgress};
use crate::resources::texture::TextureCache;
use crate::utils::rand_pool::RandNumPool;
use crate::utils::task_pool::TaskPool;

/// GPU context and resident renderer state; exists only after a successful
/// [`Renderer::init`].
pub struct RendererState {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,

    pub features: RuntimeFeatures,
    pub programs: ProgramCache,
    pub frame_data: FrameData,
    pub targets: RenderTargets,
    pub material_textures: MaterialTextures,
    pub shadow: ShadowRenderer,
    pub water_resources: WaterPassResources,
    pub scene_passes: ScenePasses,
    pub ssao: SsaoPass,
    pub post: PostChain,
    pub overlay: OverlayPass,
    pub fullscreen: FullscreenHelper,
    pub scatter: Option<ScatterUploader>,

    pub outline_program: ProgramIndex,

    pub frame_counter: u64,
    pub stats: FrameStats,
}

pub struct Renderer {
    pub settings: RendererSettings,
    pub(crate) state: Option<RendererState>,
    pub meshes: MeshStore,
    pub textures: TextureCache,
    pub(crate) task_pool: TaskPool,
    pub(crate) rand_pool: RandNumPool,
    size: (u32, u32),
}

impl Renderer {
    /// Phase 1: store configuration; no GPU resources are touched.
    #[must_use]
    pub fn new(settings: RendererSettings) -> Self {
        let textures = TextureCache::new(settings.texture_budgets);
        Self {
            settings,
            state: None,
            meshes: MeshStore::new(),
            textures,
            task_pool: TaskPool::new(),
            rand_pool: RandNumPool::default(),
            size: (0, 0),
        }
    }

    /// Phase 2: create the GPU context against a window surface.
    pub async fn init<W>(&mut self, window: W, width: u32, height: u32) -> Result<()>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        if self.state.is_some() {
            return Ok(());
        }
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: self.settings.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| VistaError::AdapterRequestFailed(e.to_string()))?;

        let features = RuntimeFeatures::detect(&adapter);
        features.log_summary();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("vista_device"),
                required_features: features.requested_device_features(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .first()
            .copied()
            .ok_or_else(|| VistaError::FatalConfig("surface has no formats".to_owned()))?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if self.settings.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        self.init_state_with_features(
            device,
            queue,
            Some((surface, surface_config)),
            features,
            width,
            height,
        )
    }

    /// Headless init against an already-created device (offscreen targets
    /// only); used by tooling and image-output paths.
    pub fn init_offscreen(
        &mut self,
        device: wgpu::Device,
        queue: wgpu::Queue,
        features: RuntimeFeatures,
        width: u32,
        height: u32,
    ) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }
        features.log_summary();
        self.init_state_with_features(device, queue, None, features, width, height)
    }

    fn init_state_with_features(
        &mut self,
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: Option<(wgpu::Surface<'static>, wgpu::SurfaceConfiguration)>,
        features: RuntimeFeatures,
        width: u32,
        height: u32,
    ) -> Result<()> {
        // Block layout validation is a fatal configuration error.
        buffers::validate_block_sizes()?;

        self.size = (width, height);
        let num_shadow_views =
            ShadowRenderer::num_shadow_views(self.settings.num_dynamic_cascades);

        let mut programs = ProgramCache::new();
        programs.create_fallbacks(&device);
        let outline_program = programs.get_program(
            &device,
            ProgramKey::new(ProgramName::Outline, ProgramFlags::empty()),
        );

        let frame_data = FrameData::new(&device, num_shadow_views);
        let targets = RenderTargets::new(&device, width, height);
        let material_textures = MaterialTextures::new(&device, &queue);
        let shadow = ShadowRenderer::new(
            &device,
            self.settings.shadow_map_size,
            self.settings.num_dynamic_cascades,
        );
        let water_resources = WaterPassResources::new(&device);
        let ssao = SsaoPass::new(&device);
        let post = PostChain::new(&device);
        let overlay = OverlayPass::new(&device, &queue);
        let fullscreen = FullscreenHelper::new(&device);

        let (surface, surface_config) = match surface {
            Some((s, c)) => (Some(s), Some(c)),
            None => (None, None),
        };

        self.state = Some(RendererState {
            device,
            queue,
            surface,
            surface_config,
            features,
            programs,
            frame_data,
            targets,
            material_textures,
            shadow,
            water_resources,
            scene_passes: ScenePasses::new(),
            ssao,
            post,
            overlay,
            fullscreen,
            scatter: if self.settings.use_scatter_updates {
                Some(ScatterUploader::new())
            } else {
                None
            },
            outline_program,
            frame_counter: 0,
            stats: FrameStats::default(),
        });

        log::info!("Renderer initialised ({width}x{height})");
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.state.is_some()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.state.as_ref().map(|s| s.stats).unwrap_or_default()
    }

    #[must_use]
    pub fn features(&self) -> Option<RuntimeFeatures> {
        self.state.as_ref().map(|s| s.features)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        if let Some(state) = &mut self.state {
            if let (Some(surface), Some(config)) =
                (state.surface.as_ref(), state.surface_config.as_mut())
                && width > 0
                && height > 0
            {
                config.width = width;
                config.height = height;
                surface.configure(&state.device, config);
            }
            state.targets.ensure_size(&state.device, width, height);
        }
    }

    // ------------------------------------------------------------------------
    // Meshes
    // ------------------------------------------------------------------------

    /// Registers mesh data and creates its GPU buffers. The data uploads
    /// synchronously unless `progressive` is set, in which case it streams
    /// in per-frame chunks and no batch referencing the mesh draws until
    /// the indices finish.
    pub fn register_mesh(&mut self, desc: MeshDesc, progressive: bool) -> Result<MeshHandle> {
        let handle = self.meshes.insert(desc)?;
        if let Some(state) = self.state.as_ref()
            && let Some(mesh) = self.meshes.get_mut(handle)
        {
            let vertex_buffer = state.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mesh_vertices"),
                size: (mesh.vert_data.len().max(4) as u64).next_multiple_of(4),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let index_buffer = state.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mesh_indices"),
                size: (mesh.index_data.len().max(4) as u64).next_multiple_of(4),
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            mesh.gpu = Some(MeshGpu {
                vertex_buffer,
                index_buffer,
            });
            if progressive {
                mesh.upload = MeshUploadProgress::default();
            } else {
                if !mesh.vert_data.is_empty()
                    && let Some(gpu) = &mesh.gpu
                {
                    state
                        .queue
                        .write_buffer(&gpu.vertex_buffer, 0, &mesh.vert_data);
                }
                if !mesh.index_data.is_empty()
                    && let Some(gpu) = &mesh.gpu
                {
                    state
                        .queue
                        .write_buffer(&gpu.index_buffer, 0, &mesh.index_data);
                }
                mesh.upload = MeshUploadProgress::complete(
                    mesh.vert_data.len() as u64,
                    mesh.index_data.len() as u64,
                );
            }
        }
        Ok(handle)
    }

    /// Advances in-flight progressive mesh uploads within the per-frame
    /// byte budget. Vertex data streams first, then index data; the mesh
    /// becomes drawable once its indices finish.
    pub(crate) fn upload_some_mesh_data(&mut self) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let mut budget = self.settings.max_mesh_upload_bytes_per_frame;
        for (_, mesh) in self.meshes.iter_mut() {
            if budget == 0 {
                break;
            }
            if mesh.upload.done() {
                continue;
            }
            let Some(gpu) = &mesh.gpu else { continue };

            if !mesh.upload.verts_done {
                let start = mesh.upload.vert_bytes_uploaded;
                let remaining = mesh.vert_data.len() as u64 - start;
                let chunk = remaining.min(budget & !3);
                if chunk > 0 {
                    state.queue.write_buffer(
                        &gpu.vertex_buffer,
                        start,
                        &mesh.vert_data[start as usize..(start + chunk) as usize],
                    );
                    mesh.upload.vert_bytes_uploaded += chunk;
                    budget = budget.saturating_sub(chunk);
                }
                if mesh.upload.vert_bytes_uploaded >= mesh.vert_data.len() as u64 {
                    mesh.upload.verts_done = true;
                }
                continue;
            }

            let start = mesh.upload.index_bytes_uploaded;
            let remaining = mesh.index_data.len() as u64 - start;
            let chunk = remaining.min(budget & !3);
            if chunk > 0 {
                state.queue.write_buffer(
                    &gpu.index_buffer,
                    start,
                    &mesh.index_data[start as usize..(start + chunk) as usize],
                );
                mesh.upload.index_bytes_uploaded += chunk;
                budget = budget.saturating_sub(chunk);
            }
            if mesh.upload.index_bytes_uploaded >= mesh.index_data.len() as u64 {
                mesh.upload.indices_done = true;
            }
        }
    }

    /// Blocks until every in-flight program build has resolved; only used
    /// at shutdown-like moments.
    pub fn wait_for_all_building_programs(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.programs.wait_for_all_building_programs(&state.device);
        }
    }
}
