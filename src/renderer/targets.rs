//! Offscreen render targets.
//!
//! The frame pipeline draws into a persistent set of offscreen textures:
//! main colour + normal + depth, their copy set (read by the water and decal
//! shaders), the half-resolution prepass set feeding SSAO, the OIT
//! accumulation pair, the outline pair, and the bloom/DOF chain. Every
//! intermediate is sized `max(16, viewport)` and reallocated only when the
//! viewport size changes.

/// HDR colour format of the main pipeline.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// World-space normal attachment format.
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Edge mask format for the selection outline.
pub const OUTLINE_MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Number of bloom downsize/blur steps.
pub const NUM_BLOOM_STEPS: usize = 8;

/// One colour texture + view.
pub struct ColourTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl ColourTarget {
    fn new(
        device: &wgpu::Device,
        label: &'static str,
        w: u32,
        h: u32,
        format: wgpu::TextureFormat,
        extra_usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | extra_usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// One step of the bloom chain: downsize target, X-blur temporary, and the
/// step's final blur target, all at the step's (halved) resolution.
pub struct BloomStep {
    pub width: u32,
    pub height: u32,
    pub downsize: ColourTarget,
    pub tmp: ColourTarget,
    pub blur: ColourTarget,
}

/// The full persistent target set.
pub struct RenderTargets {
    pub width: u32,
    pub height: u32,

    // Main pass attachments.
    pub main_colour: ColourTarget,
    pub main_normal: ColourTarget,
    pub main_depth: ColourTarget,

    // Copies read by the water/decal shaders and DOF.
    pub colour_copy: ColourTarget,
    pub normal_copy: ColourTarget,
    pub depth_copy: ColourTarget,

    // Half-resolution prepass set (SSAO input) plus its copies.
    pub prepass_colour: ColourTarget,
    pub prepass_normal: ColourTarget,
    pub prepass_depth: ColourTarget,
    pub prepass_colour_copy: ColourTarget,
    pub prepass_normal_copy: ColourTarget,
    pub prepass_depth_copy: ColourTarget,

    // SSAO results.
    pub ssao: ColourTarget,
    pub ssao_specular: ColourTarget,
    pub blurred_ssao: ColourTarget,
    pub blurred_ssao_specular: ColourTarget,
    pub ssao_blur_tmp: ColourTarget,

    // OIT attachments.
    pub oit_accum: ColourTarget,
    pub oit_transmittance: ColourTarget,

    // Selection outline.
    pub outline_colour: ColourTarget,
    pub outline_depth: ColourTarget,
    pub outline_edge_mask: ColourTarget,

    // Post-process ping-pong (pre-DOF / post-DOF).
    pub post_a: ColourTarget,
    pub post_b: ColourTarget,

    pub bloom_steps: Vec<BloomStep>,
}

impl RenderTargets {
    #[must_use]
    pub fn new(device: &wgpu::Device, viewport_w: u32, viewport_h: u32) -> Self {
        let w = viewport_w.max(16);
        let h = viewport_h.max(16);
        let half_w = (w / 2).max(16);
        let half_h = (h / 2).max(16);

        let copy_usage = wgpu::TextureUsages::COPY_DST;
        let copy_src = wgpu::TextureUsages::COPY_SRC;

        let mut bloom_steps = Vec::with_capacity(NUM_BLOOM_STEPS);
        let (mut bw, mut bh) = (w, h);
        for _ in 0..NUM_BLOOM_STEPS {
            bw = (bw / 2).max(16);
            bh = (bh / 2).max(16);
            bloom_steps.push(BloomStep {
                width: bw,
                height: bh,
                downsize: ColourTarget::new(device, "bloom_downsize", bw, bh, HDR_FORMAT, wgpu::TextureUsages::empty()),
                tmp: ColourTarget::new(device, "bloom_tmp", bw, bh, HDR_FORMAT, wgpu::TextureUsages::empty()),
                blur: ColourTarget::new(device, "bloom_blur", bw, bh, HDR_FORMAT, wgpu::TextureUsages::empty()),
            });
        }

        Self {
            width: w,
            height: h,
            main_colour: ColourTarget::new(device, "main_colour", w, h, HDR_FORMAT, copy_src),
            main_normal: ColourTarget::new(device, "main_normal", w, h, NORMAL_FORMAT, copy_src),
            main_depth: ColourTarget::new(device, "main_depth", w, h, DEPTH_FORMAT, copy_src),
            colour_copy: ColourTarget::new(device, "main_colour_copy", w, h, HDR_FORMAT, copy_usage),
            normal_copy: ColourTarget::new(device, "main_normal_copy", w, h, NORMAL_FORMAT, copy_usage),
            depth_copy: ColourTarget::new(device, "main_depth_copy", w, h, DEPTH_FORMAT, copy_usage),
            prepass_colour: ColourTarget::new(device, "prepass_colour", half_w, half_h, HDR_FORMAT, copy_src),
            prepass_normal: ColourTarget::new(device, "prepass_normal", half_w, half_h, NORMAL_FORMAT, copy_src),
            prepass_depth: ColourTarget::new(device, "prepass_depth", half_w, half_h, DEPTH_FORMAT, copy_src),
            prepass_colour_copy: ColourTarget::new(device, "prepass_colour_copy", half_w, half_h, HDR_FORMAT, copy_usage),
            prepass_normal_copy: ColourTarget::new(device, "prepass_normal_copy", half_w, half_h, NORMAL_FORMAT, copy_usage),
            prepass_depth_copy: ColourTarget::new(device, "prepass_depth_copy", half_w, half_h, DEPTH_FORMAT, copy_usage),
            ssao: ColourTarget::new(device, "ssao", half_w, half_h, HDR_FORMAT, wgpu::TextureUsages::empty()),
            ssao_specular: ColourTarget::new(device, "ssao_specular", half_w, half_h, HDR_FORMAT, wgpu::TextureUsages::empty()),
            blurred_ssao: ColourTarget::new(device, "blurred_ssao", half_w, half_h, HDR_FORMAT, wgpu::TextureUsages::empty()),
            blurred_ssao_specular: ColourTarget::new(device, "blurred_ssao_specular", half_w, half_h, HDR_FORMAT, wgpu::TextureUsages::empty()),
            ssao_blur_tmp: ColourTarget::new(device, "ssao_blur_tmp", half_w, half_h, HDR_FORMAT, wgpu::TextureUsages::empty()),
            oit_accum: ColourTarget::new(device, "oit_accum", w, h, HDR_FORMAT, wgpu::TextureUsages::empty()),
            oit_transmittance: ColourTarget::new(device, "oit_transmittance", w, h, HDR_FORMAT, wgpu::TextureUsages::empty()),
            outline_colour: ColourTarget::new(device, "outline_colour", w, h, wgpu::TextureFormat::Rgba8Unorm, wgpu::TextureUsages::empty()),
            outline_depth: ColourTarget::new(device, "outline_depth", w, h, DEPTH_FORMAT, wgpu::TextureUsages::empty()),
            outline_edge_mask: ColourTarget::new(device, "outline_edge_mask", w, h, OUTLINE_MASK_FORMAT, wgpu::TextureUsages::empty()),
            post_a: ColourTarget::new(device, "post_a", w, h, HDR_FORMAT, wgpu::TextureUsages::empty()),
            post_b: ColourTarget::new(device, "post_b", w, h, HDR_FORMAT, wgpu::TextureUsages::empty()),
            bloom_steps,
        }
    }

    /// Recreates the whole set iff the viewport size changed.
    pub fn ensure_size(&mut self, device: &wgpu::Device, viewport_w: u32, viewport_h: u32) {
        let w = viewport_w.max(16);
        let h = viewport_h.max(16);
        if self.width != w || self.height != h {
            *self = Self::new(device, w, h);
        }
    }

    /// Copies colour + normal + depth into the copy set (water pass input).
    pub fn blit_main_to_copies(&self, encoder: &mut wgpu::CommandEncoder) {
        for (src, dst) in [
            (&self.main_colour, &self.colour_copy),
            (&self.main_normal, &self.normal_copy),
            (&self.main_depth, &self.depth_copy),
        ] {
            copy_whole_texture(encoder, &src.texture, &dst.texture, self.width, self.height);
        }
    }

    /// Copies depth + normal only (decal pass input).
    pub fn blit_depth_and_normal_to_copies(&self, encoder: &mut wgpu::CommandEncoder) {
        for (src, dst) in [
            (&self.main_normal, &self.normal_copy),
            (&self.main_depth, &self.depth_copy),
        ] {
            copy_whole_texture(encoder, &src.texture, &dst.texture, self.width, self.height);
        }
    }

    pub fn blit_prepass_to_copies(&self, encoder: &mut wgpu::CommandEncoder) {
        let w = (self.width / 2).max(16);
        let h = (self.height / 2).max(16);
        for (src, dst) in [
            (&self.prepass_colour, &self.prepass_colour_copy),
            (&self.prepass_normal, &self.prepass_normal_copy),
            (&self.prepass_depth, &self.prepass_depth_copy),
        ] {
            copy_whole_texture(encoder, &src.texture, &dst.texture, w, h);
        }
    }
}

fn copy_whole_texture(
    encoder: &mut wgpu::CommandEncoder,
    src: &wgpu::Texture,
    dst: &wgpu::Texture,
    w: u32,
    h: u32,
) {
    encoder.copy_texture_to_texture(
        wgpu::TexelCopyTextureInfo {
            texture: src,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyTextureInfo {
            texture: dst,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        },
    );
}
