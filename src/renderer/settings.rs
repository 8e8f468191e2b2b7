//! Renderer configuration and runtime feature detection.

use crate::resources::texture::TextureBudgets;

/// Configuration options for the renderer.
///
/// | Field | Description | Default |
/// |-------|-------------|---------|
/// | `vsync` | Present with vertical sync | `true` |
/// | `shadow_map_size` | Pixel size of one shadow cascade | `2048` |
/// | `num_dynamic_cascades` | Dynamic shadow cascades (1-4) | `3` |
/// | `ssao_enabled` | Screen-space ambient occlusion prepass | `true` |
/// | `oit_enabled` | Order-independent transparency | `true` |
/// | `use_scatter_updates` | Batch table writes through the compute scatter path | `false` |
/// | `max_mesh_upload_bytes_per_frame` | Incremental mesh upload cap | `4 MiB` |
#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub vsync: bool,
    pub power_preference: wgpu::PowerPreference,

    pub shadow_map_size: u32,
    pub num_dynamic_cascades: u32,

    pub ssao_enabled: bool,
    pub oit_enabled: bool,
    pub use_scatter_updates: bool,

    pub texture_budgets: TextureBudgets,
    pub max_mesh_upload_bytes_per_frame: u64,

    /// Prefer the reverse-Z depth convention when available.
    pub reverse_z: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            vsync: true,
            power_preference: wgpu::PowerPreference::HighPerformance,
            shadow_map_size: 2048,
            num_dynamic_cascades: 3,
            ssao_enabled: true,
            oit_enabled: true,
            use_scatter_updates: false,
            texture_budgets: TextureBudgets::default(),
            max_mesh_upload_bytes_per_frame: 4 * 1024 * 1024,
            reverse_z: true,
        }
    }
}

/// Capabilities read once at init and surfaced as plain booleans.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeFeatures {
    /// Reverse-Z depth mapping is available (always true on this backend;
    /// kept as a flag because shadow passes still switch conventions).
    pub reverse_z: bool,
    /// Multi-draw-indirect with per-draw base instance.
    pub multi_draw_indirect: bool,
    /// Storage buffers large enough for the resident tables.
    pub storage_buffers: bool,
    /// Bindless texture arrays.
    pub bindless_textures: bool,
    /// The driver compiles pipelines on background threads.
    pub parallel_shader_compile: bool,
    pub compression_bc: bool,
    pub compression_etc2: bool,
    pub max_anisotropy: u16,
}

impl RuntimeFeatures {
    #[must_use]
    pub fn detect(adapter: &wgpu::Adapter) -> Self {
        let features = adapter.features();
        let limits = adapter.limits();
        Self {
            reverse_z: true,
            multi_draw_indirect: features.contains(wgpu::Features::INDIRECT_FIRST_INSTANCE),
            storage_buffers: limits.max_storage_buffer_binding_size >= 128 << 20,
            bindless_textures: features
                .contains(wgpu::Features::TEXTURE_BINDING_ARRAY),
            parallel_shader_compile: true,
            compression_bc: features.contains(wgpu::Features::TEXTURE_COMPRESSION_BC),
            compression_etc2: features.contains(wgpu::Features::TEXTURE_COMPRESSION_ETC2),
            max_anisotropy: 16,
        }
    }

    /// Features to request at device creation, filtered to what the adapter
    /// offers.
    #[must_use]
    pub fn requested_device_features(&self) -> wgpu::Features {
        let mut f = wgpu::Features::empty();
        if self.multi_draw_indirect {
            f |= wgpu::Features::INDIRECT_FIRST_INSTANCE;
        }
        if self.compression_bc {
            f |= wgpu::Features::TEXTURE_COMPRESSION_BC;
        }
        if self.compression_etc2 {
            f |= wgpu::Features::TEXTURE_COMPRESSION_ETC2;
        }
        f
    }

    pub fn log_summary(&self) {
        log::info!(
            "Renderer features: reverse_z={}, multi_draw_indirect={}, storage_buffers={}, \
             bindless_textures={}, bc={}, etc2={}, max_anisotropy={}",
            self.reverse_z,
            self.multi_draw_indirect,
            self.storage_buffers,
            self.bindless_textures,
            self.compression_bc,
            self.compression_etc2,
            self.max_anisotropy,
        );
    }
}
